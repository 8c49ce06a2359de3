//! Route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use finvue_core::{Cik, ConceptKey};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{AppState, error::ApiError};

/// `GET /api/company-tickers`
pub async fn company_tickers(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let directory = state.source.fetch_directory_json().await?;
    debug!(
        entities = directory.as_object().map_or(0, |rows| rows.len()),
        "Forwarding company tickers"
    );
    Ok(Json(directory))
}

/// `GET /api/company-concept/{cik}/{concept}`
///
/// `concept` is a bare `us-gaap` tag or `taxonomy:tag`. Waits the configured
/// delay before forwarding the upstream payload as received.
pub async fn company_concept(
    State(state): State<AppState>,
    Path((cik, concept)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let cik: Cik = cik.parse()?;
    let key: ConceptKey = concept.parse()?;
    info!(%cik, %key, "Received concept request");

    sleep(state.config.concept_delay()).await;
    Ok(Json(state.source.fetch_concept_json(cik, &key).await?))
}

/// `GET /api/company-facts/{cik}`
pub async fn company_facts(
    State(state): State<AppState>,
    Path(cik): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cik: Cik = cik.parse()?;
    info!(%cik, "Received company facts request");

    sleep(state.config.concept_delay()).await;
    Ok(Json(state.source.fetch_company_facts_json(cik).await?))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
