//! Speed-test trigger and result rendering.
//!
//! The trigger control is written from two places: [`SpeedTestController::activate`]
//! locks it optimistically when the user starts a test, and every rendered
//! snapshot re-derives it from `speedtest.running`. The snapshot always wins.

use crate::metrics::Metrics;
use crate::render::region;
use crate::snapshot::{nonzero, present, SpeedTestInfo};
use crate::source::TelemetrySource;
use crate::surface::{ControlState, DisplaySurface};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

pub const START_LABEL: &str = "Start Speed Test";
pub const RUNNING_LABEL: &str = "Running...";
pub const ERROR_INDICATOR: &str = "Error";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTestPhase {
    #[default]
    Idle,
    /// Start command issued, waiting for a snapshot to confirm.
    Starting,
    Running,
    Errored,
}

impl SpeedTestPhase {
    pub fn from_info(info: &SpeedTestInfo) -> Self {
        if info.running {
            SpeedTestPhase::Running
        } else if info.error_message().is_some() {
            SpeedTestPhase::Errored
        } else {
            SpeedTestPhase::Idle
        }
    }

    pub fn control_state(self) -> ControlState {
        match self {
            SpeedTestPhase::Starting | SpeedTestPhase::Running => {
                ControlState::new(false, RUNNING_LABEL)
            }
            SpeedTestPhase::Idle | SpeedTestPhase::Errored => ControlState::new(true, START_LABEL),
        }
    }

    fn accepts_activation(self) -> bool {
        matches!(self, SpeedTestPhase::Idle | SpeedTestPhase::Errored)
    }
}

/// Trigger phase shared by the controller and the poll cycle.
#[derive(Debug, Clone, Default)]
pub struct SharedPhase(Arc<Mutex<SpeedTestPhase>>);

impl SharedPhase {
    pub fn get(&self) -> SpeedTestPhase {
        *self.lock()
    }

    fn set(&self, phase: SpeedTestPhase) {
        *self.lock() = phase;
    }

    /// Moves to `Starting` if the trigger is currently enabled.
    fn try_begin(&self) -> bool {
        let mut phase = self.lock();
        if !phase.accepts_activation() {
            return false;
        }
        *phase = SpeedTestPhase::Starting;
        true
    }

    /// Reverts a failed start. A snapshot that arrived meanwhile keeps its say.
    fn revert_if_starting(&self) -> bool {
        let mut phase = self.lock();
        if *phase != SpeedTestPhase::Starting {
            return false;
        }
        *phase = SpeedTestPhase::Idle;
        true
    }

    fn lock(&self) -> MutexGuard<'_, SpeedTestPhase> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Renders the speed-test section and re-derives the trigger from the snapshot.
pub fn render_speedtest(surface: &dyn DisplaySurface, phase: &SharedPhase, info: &SpeedTestInfo) {
    let next = SpeedTestPhase::from_info(info);
    phase.set(next);
    surface.set_control_state(region::SPEEDTEST_TRIGGER, next.control_state());

    if let Some(message) = info.error_message() {
        surface.write(region::DOWNLOAD_SPEED, ERROR_INDICATOR);
        surface.write(region::UPLOAD_SPEED, ERROR_INDICATOR);
        surface.write(region::PING_TIME, ERROR_INDICATOR);
        surface.write(region::SERVER_INFO, message);
        surface.write(region::LAST_UPDATED, "");
        return;
    }

    surface.write(region::DOWNLOAD_SPEED, &decimal_or_dash(info.download, 2));
    surface.write(region::UPLOAD_SPEED, &decimal_or_dash(info.upload, 2));
    surface.write(region::PING_TIME, &decimal_or_dash(info.ping, 1));
    surface.write(region::SERVER_INFO, present(&info.server).unwrap_or(""));
    let updated = present(&info.last_updated)
        .map(|ts| format!("Last updated: {ts}"))
        .unwrap_or_default();
    surface.write(region::LAST_UPDATED, &updated);
}

fn decimal_or_dash(value: Option<f64>, precision: usize) -> String {
    match nonzero(value) {
        Some(v) => format!("{v:.precision$}"),
        None => "-".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Start command accepted by the producer.
    Dispatched,
    /// Trigger is disabled: a test is starting or running.
    Busy,
    /// Start command failed, trigger re-enabled.
    Failed,
}

impl Activation {
    pub fn as_str(self) -> &'static str {
        match self {
            Activation::Dispatched => "dispatched",
            Activation::Busy => "busy",
            Activation::Failed => "failed",
        }
    }
}

pub struct SpeedTestController<S> {
    source: Arc<S>,
    surface: Arc<dyn DisplaySurface>,
    phase: SharedPhase,
    metrics: Arc<Metrics>,
}

impl<S: TelemetrySource> SpeedTestController<S> {
    /// Creates the controller and shows the trigger in its idle state.
    pub fn new(
        source: Arc<S>,
        surface: Arc<dyn DisplaySurface>,
        phase: SharedPhase,
        metrics: Arc<Metrics>,
    ) -> Self {
        surface.set_control_state(region::SPEEDTEST_TRIGGER, phase.get().control_state());
        Self {
            source,
            surface,
            phase,
            metrics,
        }
    }

    pub fn phase(&self) -> SpeedTestPhase {
        self.phase.get()
    }

    /// Handles a user activation of the trigger control.
    pub async fn activate(&self) -> Activation {
        let outcome = self.dispatch().await;
        self.metrics.inc_speedtest_activation(outcome.as_str());
        outcome
    }

    async fn dispatch(&self) -> Activation {
        if !self.phase.try_begin() {
            return Activation::Busy;
        }
        self.surface.set_control_state(
            region::SPEEDTEST_TRIGGER,
            SpeedTestPhase::Starting.control_state(),
        );

        match self.source.start_speedtest().await {
            Ok(ack) => {
                match present(&ack.error) {
                    Some(reason) => warn!(reason = %reason, "producer declined speed test start"),
                    None => info!(status = ?ack.status, "speed test started"),
                }
                Activation::Dispatched
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "failed to start speed test");
                if self.phase.revert_if_starting() {
                    self.surface.set_control_state(
                        region::SPEEDTEST_TRIGGER,
                        SpeedTestPhase::Idle.control_state(),
                    );
                }
                Activation::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::{unavailable, ScriptedSource};
    use crate::source::StartAck;
    use crate::surface::MemorySurface;
    use std::sync::atomic::Ordering;

    fn setup() -> (
        Arc<ScriptedSource>,
        Arc<MemorySurface>,
        SharedPhase,
        SpeedTestController<ScriptedSource>,
    ) {
        let source = Arc::new(ScriptedSource::new());
        let surface = Arc::new(MemorySurface::new());
        let phase = SharedPhase::default();
        let controller = SpeedTestController::new(
            source.clone(),
            surface.clone(),
            phase.clone(),
            Metrics::new().expect("metrics init"),
        );
        (source, surface, phase, controller)
    }

    fn trigger(surface: &MemorySurface) -> ControlState {
        surface
            .control(region::SPEEDTEST_TRIGGER)
            .expect("trigger state is always set")
    }

    fn started() -> Result<StartAck, crate::source::FetchError> {
        Ok(StartAck {
            status: Some("started".to_string()),
            error: None,
        })
    }

    #[test]
    fn new_controller_shows_enabled_trigger() {
        let (_, surface, _, controller) = setup();
        assert_eq!(controller.phase(), SpeedTestPhase::Idle);
        assert_eq!(trigger(&surface), ControlState::new(true, START_LABEL));
    }

    #[tokio::test]
    async fn full_flow_is_driven_by_snapshots() {
        let (source, surface, phase, controller) = setup();
        source.push_start(started());

        assert_eq!(controller.activate().await, Activation::Dispatched);
        assert_eq!(controller.phase(), SpeedTestPhase::Starting);
        assert_eq!(trigger(&surface), ControlState::new(false, RUNNING_LABEL));

        let running = SpeedTestInfo {
            running: true,
            ..SpeedTestInfo::default()
        };
        render_speedtest(&*surface, &phase, &running);
        assert_eq!(controller.phase(), SpeedTestPhase::Running);
        assert_eq!(trigger(&surface), ControlState::new(false, RUNNING_LABEL));

        let done = SpeedTestInfo {
            running: false,
            download: Some(100.5),
            upload: Some(20.0),
            ping: Some(12.34),
            server: Some("Example ISP (Berlin)".to_string()),
            last_updated: Some("2026-10-16 10:00:00".to_string()),
            ..SpeedTestInfo::default()
        };
        render_speedtest(&*surface, &phase, &done);
        assert_eq!(controller.phase(), SpeedTestPhase::Idle);
        assert_eq!(trigger(&surface), ControlState::new(true, START_LABEL));
        assert_eq!(surface.region(region::DOWNLOAD_SPEED).as_deref(), Some("100.50"));
        assert_eq!(surface.region(region::UPLOAD_SPEED).as_deref(), Some("20.00"));
        assert_eq!(surface.region(region::PING_TIME).as_deref(), Some("12.3"));
        assert_eq!(
            surface.region(region::SERVER_INFO).as_deref(),
            Some("Example ISP (Berlin)")
        );
        assert_eq!(
            surface.region(region::LAST_UPDATED).as_deref(),
            Some("Last updated: 2026-10-16 10:00:00")
        );

        let failed = SpeedTestInfo {
            error: Some("timeout".to_string()),
            ..SpeedTestInfo::default()
        };
        render_speedtest(&*surface, &phase, &failed);
        assert_eq!(controller.phase(), SpeedTestPhase::Errored);
        assert_eq!(trigger(&surface), ControlState::new(true, START_LABEL));
        for value_region in [region::DOWNLOAD_SPEED, region::UPLOAD_SPEED, region::PING_TIME] {
            assert_eq!(surface.region(value_region).as_deref(), Some(ERROR_INDICATOR));
        }
        assert_eq!(surface.region(region::SERVER_INFO).as_deref(), Some("timeout"));
        assert_eq!(surface.region(region::LAST_UPDATED).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn failed_start_restores_trigger() {
        let (source, surface, _, controller) = setup();
        source.push_start(Err(unavailable()));

        assert_eq!(controller.activate().await, Activation::Failed);
        assert_eq!(controller.phase(), SpeedTestPhase::Idle);
        assert_eq!(trigger(&surface), ControlState::new(true, START_LABEL));
        assert_eq!(surface.region(region::SERVER_INFO), None);
    }

    #[tokio::test]
    async fn activation_while_busy_is_ignored() {
        let (source, surface, phase, controller) = setup();
        render_speedtest(
            &*surface,
            &phase,
            &SpeedTestInfo {
                running: true,
                ..SpeedTestInfo::default()
            },
        );

        assert_eq!(controller.activate().await, Activation::Busy);
        assert_eq!(source.start_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.phase(), SpeedTestPhase::Running);
    }

    #[tokio::test]
    async fn errored_test_can_be_restarted() {
        let (source, surface, phase, controller) = setup();
        render_speedtest(
            &*surface,
            &phase,
            &SpeedTestInfo {
                error: Some("no servers".to_string()),
                ..SpeedTestInfo::default()
            },
        );
        source.push_start(started());

        assert_eq!(controller.activate().await, Activation::Dispatched);
        assert_eq!(source.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declined_start_stays_dispatched_until_snapshot() {
        let (source, surface, _, controller) = setup();
        source.push_start(Ok(StartAck {
            status: None,
            error: Some("Speed test already running".to_string()),
        }));

        assert_eq!(controller.activate().await, Activation::Dispatched);
        assert_eq!(controller.phase(), SpeedTestPhase::Starting);
        assert_eq!(trigger(&surface), ControlState::new(false, RUNNING_LABEL));
    }

    #[test]
    fn zero_results_render_dash() {
        let surface = MemorySurface::new();
        let info = SpeedTestInfo {
            download: Some(0.0),
            upload: None,
            ping: Some(0.0),
            server: Some(String::new()),
            ..SpeedTestInfo::default()
        };
        render_speedtest(&surface, &SharedPhase::default(), &info);

        assert_eq!(surface.region(region::DOWNLOAD_SPEED).as_deref(), Some("-"));
        assert_eq!(surface.region(region::UPLOAD_SPEED).as_deref(), Some("-"));
        assert_eq!(surface.region(region::PING_TIME).as_deref(), Some("-"));
        assert_eq!(surface.region(region::SERVER_INFO).as_deref(), Some(""));
        assert_eq!(surface.region(region::LAST_UPDATED).as_deref(), Some(""));
    }

    /// Source whose start command waits for `release` and then fails.
    #[derive(Default)]
    struct GatedSource {
        release: tokio::sync::Notify,
    }

    impl TelemetrySource for GatedSource {
        async fn fetch_snapshot(
            &self,
        ) -> Result<crate::snapshot::Snapshot, crate::source::FetchError> {
            Err(unavailable())
        }

        async fn start_speedtest(&self) -> Result<StartAck, crate::source::FetchError> {
            self.release.notified().await;
            Err(unavailable())
        }
    }

    #[tokio::test]
    async fn failed_start_does_not_override_newer_snapshot() {
        let source = Arc::new(GatedSource::default());
        let surface = Arc::new(MemorySurface::new());
        let phase = SharedPhase::default();
        let controller = SpeedTestController::new(
            source.clone(),
            surface.clone(),
            phase.clone(),
            Metrics::new().expect("metrics init"),
        );

        let running = SpeedTestInfo {
            running: true,
            ..SpeedTestInfo::default()
        };
        let (outcome, ()) = tokio::join!(controller.activate(), async {
            assert_eq!(phase.get(), SpeedTestPhase::Starting);
            render_speedtest(&*surface, &phase, &running);
            source.release.notify_one();
        });

        assert_eq!(outcome, Activation::Failed);
        assert_eq!(controller.phase(), SpeedTestPhase::Running);
        assert_eq!(trigger(&surface), ControlState::new(false, RUNNING_LABEL));
    }
}
