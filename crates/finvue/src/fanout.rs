//! Bounded fan-out over (entity, concept) pairs.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use finvue_core::{
    Concept, ConceptSeries, DataError, DisclosureSource, Entity, MetricsTable, Result,
};

/// Number of fetches allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Semaphore-gated limiter that also records how many tasks run at once.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    limit: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Decrements the in-flight counter when a task settles.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `limit` slots (at least one).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            limit,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks that ever held a slot at the same time.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Runs `task` once a slot is free. Queued tasks wait in FIFO order.
    pub async fn run<T, F>(&self, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| DataError::Configuration(format!("concurrency limiter closed: {e}")))?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        task.await
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

/// A pair whose fetch failed and was replaced by an empty series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairFailure {
    /// Ticker of the entity.
    pub ticker: String,
    /// Label of the concept.
    pub label: String,
    /// The error that was swallowed.
    pub error: DataError,
}

/// Result of a fan-out cycle, including the failures that were degraded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    /// Ticker → label → series, one entry per requested pair.
    pub table: MetricsTable,
    /// Pairs that fell back to an empty series.
    pub failures: Vec<PairFailure>,
}

/// Fetches every (entity, concept) pair through a shared concurrency limiter.
///
/// Each pair is isolated: a failure degrades that pair to
/// `{annual: [], quarterly: []}` without affecting its siblings. The call
/// resolves only once every pair has settled.
#[derive(Debug, Clone)]
pub struct FanOutFetcher {
    source: Arc<dyn DisclosureSource>,
    limiter: Arc<ConcurrencyLimiter>,
}

impl FanOutFetcher {
    /// Creates a fetcher with the default limit of five concurrent requests.
    #[must_use]
    pub fn new(source: Arc<dyn DisclosureSource>) -> Self {
        Self::with_limit(source, DEFAULT_CONCURRENCY)
    }

    /// Creates a fetcher with a custom concurrency limit.
    #[must_use]
    pub fn with_limit(source: Arc<dyn DisclosureSource>, limit: usize) -> Self {
        Self {
            source,
            limiter: Arc::new(ConcurrencyLimiter::new(limit)),
        }
    }

    /// The limiter shared by all cycles of this fetcher.
    #[must_use]
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Fetches all pairs and returns ticker → label → series.
    pub async fn fetch(&self, entities: &[Entity], concepts: &[Concept]) -> Result<MetricsTable> {
        Ok(self.fetch_with_report(entities, concepts).await?.table)
    }

    /// Like [`fetch`](Self::fetch), also reporting which pairs degraded.
    pub async fn fetch_with_report(
        &self,
        entities: &[Entity],
        concepts: &[Concept],
    ) -> Result<FanOutReport> {
        if entities.is_empty() {
            return Err(DataError::InvalidParameter(
                "fan-out needs at least one entity".to_string(),
            ));
        }

        debug!(
            source = self.source.name(),
            entities = entities.len(),
            concepts = concepts.len(),
            limit = self.limiter.limit(),
            "Starting fan-out"
        );

        let pairs = entities
            .iter()
            .flat_map(|entity| concepts.iter().map(move |concept| (entity, concept)));
        let settled = join_all(pairs.map(|(entity, concept)| self.fetch_pair(entity, concept))).await;

        let mut report = FanOutReport::default();
        for entity in entities {
            report.table.entry(entity.ticker.clone()).or_default();
        }
        for (ticker, label, outcome) in settled {
            let series = match outcome {
                Ok(series) => series,
                Err(error) => {
                    report.failures.push(PairFailure {
                        ticker: ticker.clone(),
                        label: label.clone(),
                        error,
                    });
                    ConceptSeries::empty()
                }
            };
            report.table.entry(ticker).or_default().insert(label, series);
        }

        debug!(failures = report.failures.len(), "Fan-out settled");
        Ok(report)
    }

    async fn fetch_pair(
        &self,
        entity: &Entity,
        concept: &Concept,
    ) -> (String, String, Result<ConceptSeries>) {
        debug!(ticker = %entity.ticker, concept = %concept.label, "Fetching pair");
        let outcome = self
            .limiter
            .run(self.source.fetch_concept(entity.cik(), &concept.key))
            .await
            .map(ConceptSeries::from_observations);

        if let Err(e) = &outcome {
            warn!(
                ticker = %entity.ticker,
                concept = %concept.label,
                error = %e,
                "Fetch failed, using empty series"
            );
        }

        (entity.ticker.clone(), concept.label.clone(), outcome)
    }
}
