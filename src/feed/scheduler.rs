use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::adapters::SourceAdapter;
use super::pipeline::{ErrorKind, IngestOutcome, Ingestor};
use super::registry::SourceRegistry;

/// Sweep cadence used when none (or zero) is configured (1 hour)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,
}

/// Result of one source within a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Updated { inserted: usize, updated: usize },
    NotDue,
    Failed { kind: ErrorKind, error: String },
    /// The ingestion task panicked; caught and contained to this source
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub outcome: SourceOutcome,
}

/// Per-source outcomes of one sweep, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sources: Vec<SourceReport>,
}

impl SweepReport {
    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.sources.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::NotDue))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed { .. }))
    }

    pub fn panicked(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Panicked(_)))
    }

    pub fn get(&self, source: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.outcome)
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives ingestion across every registered source on a fixed cadence.
///
/// `start` runs one sweep immediately and then one per interval tick. Each
/// sweep spawns one task per adapter, so sources never wait on each other
/// and a failing (or panicking) source only affects its own report entry.
/// The timer loop only spawns sweeps; it never awaits one inline.
///
/// Sweeps are not serialized against each other: if one runs longer than
/// the interval, the next starts anyway.
pub struct Scheduler {
    registry: Arc<SourceRegistry>,
    ingestor: Ingestor,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(registry: Arc<SourceRegistry>, ingestor: Ingestor, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            interval
        };
        Self {
            registry,
            ingestor,
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Start the recurring sweep loop. Must be called inside a tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.registry),
            self.ingestor.clone(),
            self.interval,
            stop_rx,
        ));

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            sources = self.registry.len(),
            "Scheduler started"
        );
        *running = Some(Running { stop_tx, handle });
        Ok(())
    }

    /// Disarm the timer and wait for sweeps already in flight to finish.
    ///
    /// No new sweep starts once this is called. Stopping a scheduler that
    /// isn't running is a no-op.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(Running { stop_tx, handle }) = running else {
            return;
        };

        // Receiver gone means the loop already exited
        let _ = stop_tx.send(true);
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler loop terminated abnormally");
        }
        tracing::info!("Scheduler stopped");
    }

    /// Run one sweep now and wait for every source to finish.
    pub async fn sweep(&self) -> SweepReport {
        sweep(&self.registry, &self.ingestor).await
    }
}

async fn run_loop(
    registry: Arc<SourceRegistry>,
    ingestor: Ingestor,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    // First tick completes immediately, giving the initial sweep
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweeps: JoinSet<SweepReport> = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                let registry = Arc::clone(&registry);
                let ingestor = ingestor.clone();
                sweeps.spawn(async move { sweep(&registry, &ingestor).await });
            }
            Some(done) = sweeps.join_next(), if !sweeps.is_empty() => {
                if let Err(e) = done {
                    tracing::error!(error = %e, "Sweep task failed");
                }
            }
        }
    }

    let in_flight = sweeps.len();
    if in_flight > 0 {
        tracing::info!(in_flight = in_flight, "Waiting for in-flight sweeps");
    }
    while let Some(done) = sweeps.join_next().await {
        if let Err(e) = done {
            tracing::error!(error = %e, "Sweep task failed");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

async fn ingest_one(ingestor: Ingestor, adapter: Arc<dyn SourceAdapter>) -> SourceReport {
    let source = adapter.source_name().to_string();

    let result = AssertUnwindSafe(ingestor.ingest(adapter.as_ref()))
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(IngestOutcome::Updated { inserted, updated })) => {
            SourceOutcome::Updated { inserted, updated }
        }
        Ok(Ok(IngestOutcome::NotDue)) => SourceOutcome::NotDue,
        // Already logged by the pipeline
        Ok(Err(e)) => SourceOutcome::Failed {
            kind: e.kind(),
            error: e.to_string(),
        },
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(source = %source, panic = %message, "Ingestion task panicked");
            SourceOutcome::Panicked(message)
        }
    };

    SourceReport { source, outcome }
}

async fn sweep(registry: &SourceRegistry, ingestor: &Ingestor) -> SweepReport {
    let adapters = registry.snapshot();
    tracing::info!(sources = adapters.len(), "Sweep started");

    let mut tasks = JoinSet::new();
    for adapter in adapters {
        tasks.spawn(ingest_one(ingestor.clone(), adapter));
    }

    let mut report = SweepReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(source_report) => report.sources.push(source_report),
            Err(e) => tracing::error!(error = %e, "Ingestion task did not complete"),
        }
    }

    tracing::info!(
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        panicked = report.panicked(),
        "Sweep finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::adapters::GenericFeedAdapter;
    use crate::feed::fetcher::{Fetch, FetchError};
    use crate::feed::parser::ParseError;
    use crate::storage::{FeedStore, MemoryStore, NewItem};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>One</title><link>https://example.com/one</link></item>
</channel></rss>"#;

    /// Fails for URLs containing "broken", serves RSS otherwise
    struct RoutedFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetch for RoutedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                Err(FetchError::Timeout)
            } else {
                Ok(RSS.as_bytes().to_vec())
            }
        }
    }

    struct PanickingAdapter;

    impl SourceAdapter for PanickingAdapter {
        fn fetch_url(&self) -> &str {
            "https://panic.example.com/rss"
        }

        fn source_name(&self) -> &str {
            "Panics"
        }

        fn parse_feed(&self, _raw: &[u8], _source_id: i64) -> Result<Vec<NewItem>, ParseError> {
            panic!("adapter bug");
        }
    }

    fn setup(
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> (Scheduler, Arc<MemoryStore>, Arc<RoutedFetcher>) {
        let registry = Arc::new(SourceRegistry::new());
        for adapter in adapters {
            registry.register(adapter).unwrap();
        }
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(RoutedFetcher {
            calls: AtomicUsize::new(0),
        });
        let ingestor = Ingestor::new(store.clone(), fetcher.clone());
        (
            Scheduler::new(registry, ingestor, Duration::from_secs(3600)),
            store,
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_sweep_isolates_failures() {
        let (scheduler, store, _) = setup(vec![
            Arc::new(GenericFeedAdapter::new("A", "https://broken.example.com/rss")),
            Arc::new(GenericFeedAdapter::new("B", "https://ok.example.com/rss")),
        ]);

        let report = scheduler.sweep().await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(matches!(
            report.get("A"),
            Some(SourceOutcome::Failed {
                kind: ErrorKind::TransientNetwork,
                ..
            })
        ));
        let b = store.find_source_by_name("B").await.unwrap().unwrap();
        assert_eq!(store.items_for_source(b.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_contains_panics() {
        let (scheduler, store, _) = setup(vec![
            Arc::new(PanickingAdapter),
            Arc::new(GenericFeedAdapter::new("B", "https://ok.example.com/rss")),
        ]);

        let report = scheduler.sweep().await;

        assert_eq!(report.panicked(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            report.get("Panics"),
            Some(&SourceOutcome::Panicked("adapter bug".to_string()))
        );
        assert_eq!(store.item_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_sweep_skips_fresh_sources() {
        let (scheduler, _, fetcher) = setup(vec![Arc::new(GenericFeedAdapter::new(
            "B",
            "https://ok.example.com/rss",
        ))]);

        scheduler.sweep().await;
        let report = scheduler.sweep().await;

        assert_eq!(report.skipped(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_runs_immediate_sweep_then_stops() {
        let (scheduler, store, _) = setup(vec![Arc::new(GenericFeedAdapter::new(
            "B",
            "https://ok.example.com/rss",
        ))]);

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert_eq!(scheduler.start(), Err(SchedulerError::AlreadyRunning));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while store.item_count().await == 0 {
            assert!(tokio::time::Instant::now() < deadline, "initial sweep never ran");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let (scheduler, _, _) = setup(Vec::new());
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (scheduler, _, _) = setup(Vec::new());
        scheduler.start().unwrap();
        scheduler.stop().await;
        assert!(scheduler.start().is_ok());
        scheduler.stop().await;
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let registry = Arc::new(SourceRegistry::new());
        let ingestor = Ingestor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RoutedFetcher {
                calls: AtomicUsize::new(0),
            }),
        );
        let scheduler = Scheduler::new(registry, ingestor, Duration::ZERO);
        assert_eq!(scheduler.interval(), DEFAULT_SWEEP_INTERVAL);
    }
}
