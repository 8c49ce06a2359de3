//! Dashboard session: directory, selection, cache and fetch cycles.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use finvue_core::{
    Concept, DataError, Directory, DisclosureSource, Entity, MetricsTable, Result, SessionCache,
};

use crate::fanout::FanOutFetcher;
use crate::normalize::{StatementView, statement_rows};
use crate::presentation::DashboardView;

/// Banner shown when the directory cannot be loaded.
pub const DIRECTORY_ERROR: &str =
    "An error occurred while fetching company data. Please try again later.";

/// How a fetch cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The cycle was the latest one; its table is now the session's.
    Committed(MetricsTable),
    /// A newer cycle started before this one settled; results were dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct State {
    directory: Directory,
    selection: Vec<Entity>,
    comparing: bool,
    metrics: MetricsTable,
    error: Option<String>,
}

/// Keeps the loading counter accurate even if a cycle bails out early.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One user's dashboard session.
///
/// Fetched metrics are cached per ticker for the session's lifetime and
/// dropped by [`end`](Self::end). When several refreshes overlap, only the
/// one started last may commit its results.
pub struct DashboardSession {
    source: Arc<dyn DisclosureSource>,
    cache: Arc<dyn SessionCache>,
    fetcher: FanOutFetcher,
    concepts: Vec<Concept>,
    state: RwLock<State>,
    generation: AtomicU64,
    loading: AtomicUsize,
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("source", &self.source.name())
            .field("concepts", &self.concepts.len())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DashboardSession {
    /// Creates a session fetching the dashboard concept set.
    #[must_use]
    pub fn new(source: Arc<dyn DisclosureSource>, cache: Arc<dyn SessionCache>) -> Self {
        Self::with_concepts(source, cache, Concept::dashboard_set())
    }

    /// Creates a session fetching a custom concept set.
    #[must_use]
    pub fn with_concepts(
        source: Arc<dyn DisclosureSource>,
        cache: Arc<dyn SessionCache>,
        concepts: Vec<Concept>,
    ) -> Self {
        Self {
            fetcher: FanOutFetcher::new(Arc::clone(&source)),
            source,
            cache,
            concepts,
            state: RwLock::new(State::default()),
            generation: AtomicU64::new(0),
            loading: AtomicUsize::new(0),
        }
    }

    /// Concepts fetched by each cycle.
    #[must_use]
    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    /// Looks up a fetched concept by label, ignoring ASCII case.
    #[must_use]
    pub fn concept(&self, label: &str) -> Option<&Concept> {
        self.concepts
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(label))
    }

    /// The fan-out fetcher used by refreshes.
    #[must_use]
    pub const fn fetcher(&self) -> &FanOutFetcher {
        &self.fetcher
    }

    /// True while any load or refresh is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Loads the directory and selects its first entity.
    ///
    /// On failure the session keeps a single aggregate error message, see
    /// [`error`](Self::error).
    pub async fn load_directory(&self) -> Result<()> {
        let _loading = LoadingGuard::enter(&self.loading);

        match self.source.fetch_directory().await {
            Ok(directory) => {
                info!(entities = directory.len(), "Loaded company directory");
                let mut state = self.state.write().await;
                state.selection = directory.first().cloned().into_iter().collect();
                state.directory = directory;
                state.error = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load company directory");
                self.state.write().await.error = Some(DIRECTORY_ERROR.to_string());
                Err(e)
            }
        }
    }

    /// The aggregate error banner, if the directory failed to load.
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// The loaded directory.
    pub async fn directory(&self) -> Directory {
        self.state.read().await.directory.clone()
    }

    /// Currently selected entities, in selection order.
    pub async fn selection(&self) -> Vec<Entity> {
        self.state.read().await.selection.clone()
    }

    /// Whether comparison mode is on.
    pub async fn is_comparing(&self) -> bool {
        self.state.read().await.comparing
    }

    /// Selects a ticker from the directory.
    ///
    /// Replaces the selection, or appends to it in comparison mode. Selecting
    /// an already selected ticker while comparing is a no-op.
    pub async fn select(&self, ticker: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entity = state.directory.find_ticker(ticker).cloned().ok_or_else(|| {
            DataError::InvalidParameter(format!("Unknown ticker: {ticker:?}"))
        })?;

        if state.comparing {
            if !state.selection.iter().any(|e| e.ticker == entity.ticker) {
                state.selection.push(entity);
            }
        } else {
            state.selection = vec![entity];
        }
        Ok(())
    }

    /// Flips comparison mode and returns the new mode.
    ///
    /// Switching comparison on keeps only the first selected entity.
    pub async fn toggle_comparison(&self) -> bool {
        let mut state = self.state.write().await;
        state.comparing = !state.comparing;
        if state.comparing {
            state.selection.truncate(1);
        }
        state.comparing
    }

    /// Runs one fetch cycle for the current selection.
    ///
    /// Tickers already in the cache are served from it; the rest go through
    /// the fan-out. Tickers whose every pair succeeded are cached. The table
    /// is committed only if no other cycle started in the meantime.
    pub async fn refresh(&self) -> Result<CycleOutcome> {
        let _loading = LoadingGuard::enter(&self.loading);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let selection = self.selection().await;
        if selection.is_empty() {
            return Err(DataError::InvalidParameter(
                "no company selected".to_string(),
            ));
        }

        let mut table = MetricsTable::new();
        let mut misses = Vec::new();
        for entity in selection {
            match self.cache.get(&entity.ticker).await? {
                Some(metrics) => {
                    table.insert(entity.ticker.clone(), metrics);
                }
                None => misses.push(entity),
            }
        }
        debug!(
            generation,
            cached = table.len(),
            fetching = misses.len(),
            "Starting fetch cycle"
        );

        if !misses.is_empty() {
            let report = self
                .fetcher
                .fetch_with_report(&misses, &self.concepts)
                .await?;
            for (ticker, metrics) in report.table {
                if report.failures.iter().all(|f| f.ticker != ticker) {
                    self.cache.put(&ticker, &metrics).await?;
                }
                table.insert(ticker, metrics);
            }
        }

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Fetch cycle superseded, dropping results");
            return Ok(CycleOutcome::Superseded);
        }
        state.metrics = table.clone();
        Ok(CycleOutcome::Committed(table))
    }

    /// The last committed table.
    pub async fn metrics(&self) -> MetricsTable {
        self.state.read().await.metrics.clone()
    }

    /// Builds the dashboard view for the committed table.
    pub async fn view(&self, selected_label: &str) -> DashboardView {
        let state = self.state.read().await;
        DashboardView::build(
            &state.selection,
            &state.metrics,
            &self.concepts,
            selected_label,
        )
    }

    /// Fetches company facts for a ticker and builds its statement view.
    pub async fn statement(&self, ticker: &str) -> Result<StatementView> {
        let _loading = LoadingGuard::enter(&self.loading);
        let cik = self
            .state
            .read()
            .await
            .directory
            .find_ticker(ticker)
            .map(Entity::cik)
            .ok_or_else(|| DataError::InvalidParameter(format!("Unknown ticker: {ticker:?}")))?;

        let facts = self.source.fetch_company_facts(cik).await?;
        Ok(statement_rows(&facts, &Concept::statement_set()))
    }

    /// Ends the session, invalidating everything it cached.
    pub async fn end(&self) -> Result<()> {
        self.cache.clear().await?;
        let mut state = self.state.write().await;
        state.metrics.clear();
        debug!("Session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use finvue_cache::InMemoryCache;
    use finvue_core::{Cik, CompanyFacts, ConceptDocument, ConceptKey};
    use tokio::sync::{Notify, Semaphore};

    #[derive(Debug, Default)]
    struct MockSource {
        directory_fails: bool,
        fail_tag: Option<&'static str>,
        /// Fetches of this (cik, tag) pair wait for a permit.
        gate: Option<(u64, &'static str, Arc<Semaphore>, Arc<Notify>)>,
        calls: AtomicUsize,
    }

    fn directory() -> Directory {
        Directory::from_entities([
            Entity::new(Cik::new(320_193).unwrap(), "AAPL", "Apple Inc."),
            Entity::new(Cik::new(789_019).unwrap(), "MSFT", "MICROSOFT CORP"),
            Entity::new(Cik::new(1_652_044).unwrap(), "GOOGL", "Alphabet Inc."),
        ])
    }

    #[async_trait]
    impl DisclosureSource for MockSource {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch_directory(&self) -> Result<Directory> {
            if self.directory_fails {
                return Err(DataError::UpstreamUnavailable("offline".to_string()));
            }
            Ok(directory())
        }

        async fn fetch_concept_document(&self, cik: Cik, key: &ConceptKey) -> Result<ConceptDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((gated, tag, permits, started)) = &self.gate {
                if *gated == cik.value() && *tag == key.tag() {
                    started.notify_one();
                    let _permit = permits.acquire().await.unwrap();
                }
            }
            if self.fail_tag == Some(key.tag()) {
                return Err(DataError::from_status(404, "", "mock"));
            }
            let json = format!(
                r#"{{"cik": {}, "taxonomy": "us-gaap", "tag": "{}", "entityName": "x",
                    "units": {{"USD": [{{"end": "2023-12-31", "val": {}, "form": "10-K"}}]}}}}"#,
                cik.value(),
                key.tag(),
                cik.value()
            );
            Ok(serde_json::from_str(&json).unwrap())
        }

        async fn fetch_company_facts(&self, cik: Cik) -> Result<CompanyFacts> {
            let json = format!(
                r#"{{"cik": {}, "entityName": "Apple Inc.", "facts": {{"us-gaap": {{
                    "Assets": {{"units": {{"USD": [{{"end": "2023-09-30", "val": 300, "form": "10-K"}}]}}}},
                    "Liabilities": {{"units": {{"USD": [{{"end": "2023-09-30", "val": 120, "form": "10-K"}}]}}}}
                }}}}}}"#,
                cik.value()
            );
            Ok(serde_json::from_str(&json).unwrap())
        }
    }

    fn session(source: MockSource) -> (Arc<MockSource>, Arc<InMemoryCache>, DashboardSession) {
        let source = Arc::new(source);
        let cache = Arc::new(InMemoryCache::new());
        let session = DashboardSession::new(source.clone(), cache.clone());
        (source, cache, session)
    }

    #[test]
    fn test_concept_lookup_is_limited_to_fetched_set() {
        let (_, _, session) = session(MockSource::default());
        assert_eq!(session.concept("assets").map(|c| c.label.as_str()), Some("Assets"));
        assert!(session.concept("OperatingCashFlow").is_none());
        assert!(Concept::by_label("OperatingCashFlow").is_some());
    }

    #[tokio::test]
    async fn test_load_selects_first_entity() {
        let (_, _, session) = session(MockSource::default());
        session.load_directory().await.unwrap();

        assert_eq!(session.directory().await.len(), 3);
        let selection = session.selection().await;
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].ticker, "AAPL");
        assert!(session.error().await.is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_directory_failure_sets_banner() {
        let (_, _, session) = session(MockSource {
            directory_fails: true,
            ..Default::default()
        });
        assert!(session.load_directory().await.is_err());
        assert_eq!(session.error().await.as_deref(), Some(DIRECTORY_ERROR));
        assert!(session.selection().await.is_empty());
        assert!(matches!(
            session.refresh().await,
            Err(DataError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_selection_and_comparison() {
        let (_, _, session) = session(MockSource::default());
        session.load_directory().await.unwrap();

        session.select("msft").await.unwrap();
        assert_eq!(session.selection().await[0].ticker, "MSFT");

        assert!(session.toggle_comparison().await);
        session.select("GOOGL").await.unwrap();
        session.select("GOOGL").await.unwrap();
        let tickers: Vec<String> = session.selection().await.into_iter().map(|e| e.ticker).collect();
        assert_eq!(tickers, vec!["MSFT", "GOOGL"]);

        // switching off keeps the selection, switching on trims it
        assert!(!session.toggle_comparison().await);
        assert_eq!(session.selection().await.len(), 2);
        assert!(session.toggle_comparison().await);
        assert_eq!(session.selection().await.len(), 1);

        assert!(matches!(
            session.select("NOPE").await,
            Err(DataError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_uses_cache() {
        let (source, cache, session) = session(MockSource::default());
        session.load_directory().await.unwrap();

        let CycleOutcome::Committed(table) = session.refresh().await.unwrap() else {
            panic!("first cycle should commit");
        };
        assert_eq!(table["AAPL"].len(), 5);
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(cache.len().await, 1);

        session.refresh().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(session.metrics().await, table);

        session.end().await.unwrap();
        assert!(cache.is_empty().await);
        assert!(session.metrics().await.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_ticker_is_not_cached() {
        let (source, cache, session) = session(MockSource {
            fail_tag: Some("Revenues"),
            ..Default::default()
        });
        session.load_directory().await.unwrap();

        session.refresh().await.unwrap();
        assert!(cache.is_empty().await);
        assert!(session.metrics().await["AAPL"]["Revenue"].is_empty());

        session.refresh().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_last_cycle_wins() {
        let permits = Arc::new(Semaphore::new(0));
        let started = Arc::new(Notify::new());
        let (_, _, session) = session(MockSource {
            gate: Some((320_193, "Assets", permits.clone(), started.clone())),
            ..Default::default()
        });
        session.load_directory().await.unwrap();

        let (stale, fresh) = tokio::join!(session.refresh(), async {
            started.notified().await;
            session.select("MSFT").await.unwrap();
            let outcome = session.refresh().await.unwrap();
            permits.add_permits(1);
            outcome
        });

        assert_eq!(stale.unwrap(), CycleOutcome::Superseded);
        let CycleOutcome::Committed(table) = fresh else {
            panic!("latest cycle should commit");
        };
        assert!(table.contains_key("MSFT"));
        let committed = session.metrics().await;
        assert!(committed.contains_key("MSFT"));
        assert!(!committed.contains_key("AAPL"));
    }

    #[tokio::test]
    async fn test_view_and_statement() {
        let (_, _, session) = session(MockSource::default());
        session.load_directory().await.unwrap();
        session.refresh().await.unwrap();

        let view = session.view("Assets").await;
        assert_eq!(view.annual.series.len(), 1);
        assert_eq!(view.annual.series[0].points[0].date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(view.overview[0].entries[0].display_value(), "$320,193");

        let statement = session.statement("AAPL").await.unwrap();
        assert_eq!(statement.entity_name, "Apple Inc.");
        assert_eq!(statement.ratios[0].current_ratio, 2.5);
        assert!(session.statement("NOPE").await.is_err());
    }
}
