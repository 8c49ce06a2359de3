#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finvue/finvue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Proxy gateway between the FinVue dashboard and the upstream adapter.
//!
//! Exposes an axum [`Router`] forwarding directory, concept and facts lookups
//! to any [`DisclosureSource`], behind an origin allow-list and a per-address
//! throttle.

/// Error responses.
pub mod error;
/// Route handlers.
pub mod handlers;
/// Origin restriction and security headers.
pub mod security;
/// Layered configuration.
pub mod settings;
/// Per-address sliding-window throttle.
pub mod throttle;

pub use error::ApiError;
pub use settings::GatewayConfig;
pub use throttle::Throttle;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, header},
    middleware,
    routing::get,
};
use finvue_core::{DataError, DisclosureSource, Result};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

/// Shared state threaded through all handlers and middleware.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Where lookups are forwarded.
    pub source: Arc<dyn DisclosureSource>,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Throttle window state.
    pub throttle: Arc<Throttle>,
    frontend_origin: HeaderValue,
    backend_origin: HeaderValue,
    csp: HeaderValue,
}

fn header_value(what: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| DataError::Configuration(format!("invalid {what} {value:?}: {e}")))
}

impl AppState {
    /// Builds the state, validating the configured origins.
    pub fn new(source: Arc<dyn DisclosureSource>, config: GatewayConfig) -> Result<Self> {
        let frontend_origin = header_value("frontend origin", &config.frontend_origin)?;
        let backend_origin = header_value("backend origin", &config.backend_origin)?;
        let csp = header_value("content security policy", &config.content_security_policy())?;
        let throttle = Throttle::new(config.rate_limit_max, config.rate_limit_window());

        Ok(Self {
            source,
            config: Arc::new(config),
            throttle: Arc::new(throttle),
            frontend_origin,
            backend_origin,
            csp,
        })
    }

    /// The allowed browser origin.
    #[must_use]
    pub const fn frontend_origin(&self) -> &HeaderValue {
        &self.frontend_origin
    }

    /// The gateway's own public origin.
    #[must_use]
    pub const fn backend_origin(&self) -> &HeaderValue {
        &self.backend_origin
    }
}

/// Builds the gateway [`Router`].
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/company-tickers", get(handlers::company_tickers))
        .route(
            "/api/company-concept/{cik}/{concept}",
            get(handlers::company_concept),
        )
        .route("/api/company-facts/{cik}", get(handlers::company_facts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            throttle::enforce,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::check_origin,
        ))
        .layer(security::cors_layer(state.frontend_origin.clone()))
        .layer(middleware::map_response(security::hardening_headers))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            state.csp.clone(),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
        response::Response,
    };
    use finvue_core::{Cik, CompanyFacts, ConceptDocument, ConceptKey, Directory, Entity};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;
    use tower::ServiceExt as _;

    const FRONTEND: &str = "https://app.example.com";
    const BACKEND: &str = "https://api.example.com";

    #[derive(Debug, Default)]
    struct MockSource {
        error: Option<DataError>,
        facts_json: Option<Value>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn fail_with(error: DataError) -> Self {
            Self {
                error: Some(error),
                ..Default::default()
            }
        }

        fn outcome<T>(&self, ok: T) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(ok),
            }
        }
    }

    #[async_trait]
    impl DisclosureSource for MockSource {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch_directory(&self) -> Result<Directory> {
            self.outcome(Directory::from_entities([
                Entity::new(Cik::new(320_193)?, "AAPL", "Apple Inc."),
                Entity::new(Cik::new(789_019)?, "MSFT", "MICROSOFT CORP"),
            ]))
        }

        async fn fetch_concept_document(&self, cik: Cik, key: &ConceptKey) -> Result<ConceptDocument> {
            let doc = serde_json::from_value(serde_json::json!({
                "cik": cik.value(),
                "taxonomy": key.taxonomy(),
                "tag": key.tag(),
                "label": "Assets",
                "entityName": "Apple Inc.",
                "units": {"USD": [
                    {"end": "2023-09-30", "val": 352583000000u64, "accn": "0000320193-23-000106",
                     "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03", "frame": "CY2023Q3I"}
                ]}
            }))
            .map_err(|e| DataError::Parse(e.to_string()))?;
            self.outcome(doc)
        }

        async fn fetch_company_facts(&self, cik: Cik) -> Result<CompanyFacts> {
            self.outcome(CompanyFacts {
                cik,
                entity_name: "Apple Inc.".to_string(),
                facts: Default::default(),
            })
        }

        async fn fetch_company_facts_json(&self, cik: Cik) -> Result<Value> {
            match &self.facts_json {
                Some(raw) => self.outcome(raw.clone()),
                None => serde_json::to_value(self.fetch_company_facts(cik).await?)
                    .map_err(|e| DataError::Parse(e.to_string())),
            }
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            frontend_origin: FRONTEND.to_string(),
            backend_origin: BACKEND.to_string(),
            contact: "Test/1.0 (test@example.com)".to_string(),
            ..Default::default()
        }
    }

    fn state_with(source: Arc<MockSource>, config: GatewayConfig) -> AppState {
        AppState::new(source, config).unwrap()
    }

    fn get_req(uri: &str, client: [u8; 4], origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((client, 40_000))));
        req
    }

    async fn body_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const CLIENT: [u8; 4] = [192, 0, 2, 1];

    #[tokio::test]
    async fn test_tickers_passthrough_with_security_headers() {
        let state = state_with(Arc::new(MockSource::default()), config());
        let res = router(state)
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let csp = res.headers()[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(csp.starts_with("default-src 'self'; img-src 'self' data:;"));
        assert!(csp.ends_with(&format!("connect-src 'self' {FRONTEND} {BACKEND}")));
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");

        let body = body_json(res).await;
        assert_eq!(body["0"]["cik_str"], 320_193);
        assert_eq!(body["1"]["ticker"], "MSFT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concept_is_delayed_and_passed_through() {
        let source = Arc::new(MockSource::default());
        let state = state_with(source.clone(), config());

        let started = Instant::now();
        let res = router(state)
            .oneshot(get_req(
                "/api/company-concept/0000320193/Assets",
                CLIENT,
                Some(FRONTEND),
            ))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);

        let body = body_json(res).await;
        assert_eq!(body["cik"], 320_193);
        assert_eq!(body["entityName"], "Apple Inc.");
        let usd = &body["units"]["USD"][0];
        assert_eq!(usd["form"], "10-K");
        assert_eq!(usd["accn"], "0000320193-23-000106");
        assert_eq!(usd["frame"], "CY2023Q3I");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_company_facts_route() {
        let state = state_with(Arc::new(MockSource::default()), config());
        let res = router(state)
            .oneshot(get_req("/api/company-facts/320193", CLIENT, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["entityName"], "Apple Inc.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_facts_payload_is_forwarded_unchanged() {
        let raw = serde_json::json!({
            "cik": 320193,
            "entityName": "Apple Inc.",
            "facts": {"dei": {"EntityCommonStockSharesOutstanding": {"units": {"shares": [
                {"end": "2023-10-20", "val": 15552752000u64, "form": "10-K", "extra": true}
            ]}}}}
        });
        let source = Arc::new(MockSource {
            facts_json: Some(raw.clone()),
            ..Default::default()
        });
        let res = router(state_with(source, config()))
            .oneshot(get_req("/api/company-facts/320193", CLIENT, None))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, raw);
    }

    #[tokio::test]
    async fn test_upstream_429_is_passed_through() {
        let source = Arc::new(MockSource::fail_with(DataError::from_status(
            429,
            "Request Rate Threshold Exceeded",
            "https://www.sec.gov/files/company_tickers.json",
        )));
        let res = router(state_with(source, config()))
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().get(header::RETRY_AFTER).is_none());
        let body = body_json(res).await;
        assert_eq!(body["error"], "Error fetching data from SEC API");
        assert_eq!(body["details"], "Request Rate Threshold Exceeded");
        assert!(body["url"].as_str().unwrap().ends_with("company_tickers.json"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_error_is_mapped() {
        let source = Arc::new(MockSource::fail_with(DataError::UpstreamError {
            status: 403,
            body: r#"{"message":"Forbidden"}"#.to_string(),
            url: "https://data.sec.gov/api/xbrl/companyconcept/CIK0000320193/us-gaap/Assets.json"
                .to_string(),
        }));
        let state = state_with(source, config());
        let res = router(state)
            .oneshot(get_req("/api/company-concept/320193/Assets", CLIENT, None))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = body_json(res).await;
        assert_eq!(body["error"], "Error fetching data from SEC API");
        assert_eq!(body["details"]["message"], "Forbidden");
        assert_eq!(body["status"], 403);
        assert!(body["url"].as_str().unwrap().contains("CIK0000320193"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_500() {
        let source = Arc::new(MockSource::fail_with(DataError::UpstreamUnavailable(
            "connection refused".to_string(),
        )));
        let res = router(state_with(source, config()))
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["error"], "No response received from SEC API");
        assert_eq!(body["details"], "connection refused");
    }

    #[tokio::test]
    async fn test_invalid_cik_never_reaches_source() {
        let source = Arc::new(MockSource::default());
        let app = router(state_with(source.clone(), config()));

        for uri in [
            "/api/company-concept/12ab/Assets",
            "/api/company-concept/12345678901/Assets",
            "/api/company-facts/abc",
        ] {
            let res = app.clone().oneshot(get_req(uri, CLIENT, None)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_origin_is_forbidden() {
        let source = Arc::new(MockSource::default());
        let app = router(state_with(source.clone(), config()));

        let res = app
            .clone()
            .oneshot(get_req("/api/company-tickers", CLIENT, Some("https://evil.example")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        let res = app
            .oneshot(get_req("/api/company-tickers", CLIENT, Some(BACKEND)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttles_101st_request_and_resets_after_window() {
        let source = Arc::new(MockSource::default());
        let app = router(state_with(source.clone(), config()));

        for i in 0..100 {
            let res = app
                .clone()
                .oneshot(get_req("/api/company-tickers", CLIENT, None))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK, "request {}", i + 1);
        }

        let res = app
            .clone()
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[header::RETRY_AFTER], "900");
        assert_eq!(
            body_json(res).await["error"],
            "Too many requests, please try again later."
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 100);

        // another address has its own window
        let res = app
            .clone()
            .oneshot(get_req("/api/company-tickers", [192, 0, 2, 2], None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        tokio::time::advance(Duration::from_secs(15 * 60)).await;
        let res = app
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_not_throttled() {
        let cfg = GatewayConfig {
            rate_limit_max: 1,
            ..config()
        };
        let app = router(state_with(Arc::new(MockSource::default()), cfg));

        for _ in 0..3 {
            let res = app.clone().oneshot(get_req("/health", CLIENT, None)).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let first = app
            .clone()
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app
            .oneshot(get_req("/api/company-tickers", CLIENT, None))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_invalid_origin_is_configuration_error() {
        let cfg = GatewayConfig {
            frontend_origin: "bad\norigin".to_string(),
            ..config()
        };
        assert!(matches!(
            AppState::new(Arc::new(MockSource::default()), cfg),
            Err(DataError::Configuration(_))
        ));
    }
}
