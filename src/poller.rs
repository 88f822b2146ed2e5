use crate::metrics::Metrics;
use crate::render;
use crate::snapshot::Snapshot;
use crate::source::{FetchError, TelemetrySource};
use crate::speedtest::SharedPhase;
use crate::surface::DisplaySurface;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Fixed cadence between poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Rendered,
    /// A newer cycle rendered first; this snapshot was dropped.
    Stale,
}

/// Fetch-and-render loop. Idle until [`Poller::start`] turns it into a
/// running [`PollHandle`].
pub struct Poller<S> {
    inner: Arc<PollerInner<S>>,
}

struct PollerInner<S> {
    source: Arc<S>,
    surface: Arc<dyn DisplaySurface>,
    phase: SharedPhase,
    metrics: Arc<Metrics>,
    next_cycle: AtomicU64,
    last_rendered: Mutex<u64>,
}

impl<S: TelemetrySource> Poller<S> {
    pub fn new(
        source: Arc<S>,
        surface: Arc<dyn DisplaySurface>,
        phase: SharedPhase,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                source,
                surface,
                phase,
                metrics,
                next_cycle: AtomicU64::new(0),
                last_rendered: Mutex::new(0),
            }),
        }
    }

    /// Runs one fetch-then-render cycle. On failure nothing is rendered.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, FetchError> {
        self.inner.run_cycle().await
    }

    /// Starts polling: one cycle right away, then one every [`POLL_INTERVAL`].
    ///
    /// Each cycle runs on its own task, so a slow fetch never shifts the
    /// cadence. Dropping the returned handle also stops the loop.
    pub fn start(self) -> PollHandle {
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let inner = self.inner;

        let task = tokio::spawn(async move {
            info!(interval_ms = POLL_INTERVAL.as_millis() as u64, "polling started");
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut cycles = JoinSet::new();

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("polling stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let inner = inner.clone();
                        cycles.spawn(async move {
                            // failures are logged and counted inside the cycle
                            let _ = inner.run_cycle().await;
                        });
                    }
                    Some(_) = cycles.join_next() => {}
                }
            }

            cycles.shutdown().await;
        });

        PollHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

impl<S: TelemetrySource> PollerInner<S> {
    async fn run_cycle(&self) -> Result<CycleOutcome, FetchError> {
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics.inc_poll_cycle();

        match self.source.fetch_snapshot().await {
            Ok(snapshot) => Ok(self.apply(cycle, &snapshot)),
            Err(err) => {
                warn!(
                    cycle,
                    kind = err.kind(),
                    error = %err,
                    "telemetry fetch failed, keeping previous render"
                );
                self.metrics.inc_fetch_error(err.kind());
                Err(err)
            }
        }
    }

    fn apply(&self, cycle: u64, snapshot: &Snapshot) -> CycleOutcome {
        let mut last = self
            .last_rendered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last > cycle {
            debug!(cycle, newer = *last, "dropping stale snapshot");
            self.metrics.inc_stale_snapshot();
            return CycleOutcome::Stale;
        }

        render::render_snapshot(self.surface.as_ref(), &self.phase, snapshot);
        *last = cycle;
        self.metrics.observe_render(snapshot, now_unix());
        CycleOutcome::Rendered
    }
}

/// Running poll loop.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stops the loop and aborts cycles still in flight.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "poll task ended abnormally");
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
