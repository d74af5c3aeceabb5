//! Scanner polling loop.
//!
//! Samples the frame source on a fixed interval and runs one recognition
//! cycle per tick. The loop owns a single in-flight slot: while a cycle is
//! running, ticks are skipped rather than queued. Ticks are also skipped until
//! the pipeline reports ready. A failed cycle is reported and the interval
//! keeps going.
//!
//! Events go out on a bounded channel. Cycle results wait for room; skipped
//! ticks are dropped when the consumer falls behind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::camera::CameraSession;
use crate::recognition::{DetectedStamp, Frame, RecognitionError, RecognitionPipeline};

/// Where the scanner gets frames from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> Result<Frame, RecognitionError>;
}

#[async_trait]
impl FrameSource for Mutex<CameraSession> {
    async fn next_frame(&self) -> Result<Frame, RecognitionError> {
        let session = self.lock().await;
        Ok(session.capture_frame().await?)
    }
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub interval: Duration,
    /// Events buffered for a slow consumer
    pub event_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            event_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CycleInFlight,
    NotReady,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A cycle finished; may carry zero detections
    Detections {
        cycle: u64,
        detections: Vec<DetectedStamp>,
    },
    CycleFailed {
        cycle: u64,
        error: String,
    },
    TickSkipped {
        reason: SkipReason,
    },
}

type CycleResult = Result<Vec<DetectedStamp>, RecognitionError>;

pub struct Scanner {
    pipeline: Arc<RecognitionPipeline>,
    source: Arc<dyn FrameSource>,
    config: ScannerConfig,
    ready: Option<watch::Receiver<bool>>,
}

impl Scanner {
    pub fn new(pipeline: Arc<RecognitionPipeline>, source: Arc<dyn FrameSource>) -> Self {
        Self {
            pipeline,
            source,
            config: ScannerConfig::default(),
            ready: None,
        }
    }

    pub fn with_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Gate cycles on a readiness signal (for example, a detection model still loading).
    pub fn with_ready_signal(mut self, ready: watch::Receiver<bool>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Start the loop. Events arrive on the returned receiver until the scanner stops.
    pub fn spawn(self) -> (ScannerHandle, mpsc::Receiver<ScanEvent>) {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(events_tx, shutdown_rx));

        (
            ScannerHandle {
                shutdown: shutdown_tx,
                task,
            },
            events_rx,
        )
    }

    fn is_ready(&self) -> bool {
        self.ready.as_ref().map_or(true, |rx| *rx.borrow())
    }

    fn start_cycle(&self) -> JoinHandle<CycleResult> {
        let pipeline = self.pipeline.clone();
        let source = self.source.clone();
        tokio::spawn(async move {
            let frame = source.next_frame().await?;
            pipeline.run_cycle(frame).await
        })
    }

    async fn run(self, events: mpsc::Sender<ScanEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<JoinHandle<CycleResult>> = None;
        let mut cycle: u64 = 0;

        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            strategy = self.pipeline.strategy_name(),
            "Scanner started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                result = join_slot(&mut in_flight) => {
                    in_flight = None;
                    let event = cycle_event(cycle, result);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        sent = events.send(event) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }

                _ = ticker.tick() => {
                    let reason = if in_flight.is_some() {
                        Some(SkipReason::CycleInFlight)
                    } else if !self.is_ready() {
                        Some(SkipReason::NotReady)
                    } else {
                        None
                    };

                    match reason {
                        Some(reason) => {
                            tracing::trace!(?reason, "Scanner tick skipped");
                            match events.try_send(ScanEvent::TickSkipped { reason }) {
                                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                                Err(mpsc::error::TrySendError::Closed(_)) => break,
                            }
                        }
                        None => {
                            cycle += 1;
                            in_flight = Some(self.start_cycle());
                        }
                    }
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            handle.abort();
        }
        tracing::info!(cycles = cycle, "Scanner stopped");
    }
}

/// Resolves when the in-flight cycle finishes; never resolves when the slot is empty.
async fn join_slot(slot: &mut Option<JoinHandle<CycleResult>>) -> Result<CycleResult, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn cycle_event(cycle: u64, result: Result<CycleResult, JoinError>) -> ScanEvent {
    match result {
        Ok(Ok(detections)) => {
            if !detections.is_empty() {
                tracing::info!(cycle, count = detections.len(), "Stamps detected");
            }
            ScanEvent::Detections { cycle, detections }
        }
        Ok(Err(e)) => {
            tracing::warn!(cycle, error = %e, "Recognition cycle failed");
            ScanEvent::CycleFailed {
                cycle,
                error: e.to_string(),
            }
        }
        Err(e) => {
            tracing::error!(cycle, error = %e, "Recognition cycle panicked");
            ScanEvent::CycleFailed {
                cycle,
                error: e.to_string(),
            }
        }
    }
}

/// Stops the scanner loop.
pub struct ScannerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Abort any in-flight cycle and wait for the loop to end.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scanner task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::{BoundingBox, MatchStrategy, Region, RegionDetector, WholeFrameDetector};
    use crate::recognition::PipelineConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct StillFrame;

    #[async_trait]
    impl FrameSource for StillFrame {
        async fn next_frame(&self) -> Result<Frame, RecognitionError> {
            Ok(Frame::new(16, 16))
        }
    }

    /// Sleeps for `work` on every call and tracks how many calls overlap.
    #[derive(Default)]
    struct SlowDetector {
        work: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
        calls: AtomicUsize,
        completed: AtomicUsize,
        fail_odd_calls: bool,
    }

    impl SlowDetector {
        fn new(work: Duration) -> Self {
            Self {
                work,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RegionDetector for SlowDetector {
        async fn detect(&self, _frame: &Frame) -> Result<Vec<Region>, RecognitionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.work).await;

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);

            if self.fail_odd_calls && call % 2 == 1 {
                return Err(RecognitionError::Detection("model inference failed".into()));
            }
            Ok(vec![Region {
                bounding_box: BoundingBox::new(0, 0, 16, 16),
                probability: 1.0,
            }])
        }
    }

    struct AlwaysMatch;

    #[async_trait]
    impl MatchStrategy for AlwaysMatch {
        fn name(&self) -> &'static str {
            "always"
        }

        async fn match_region(&self, _frame: &Frame, region: &Region) -> Result<Option<DetectedStamp>, RecognitionError> {
            Ok(Some(DetectedStamp {
                stamp_id: Uuid::nil(),
                name: "Blue Bird".to_string(),
                confidence: region.probability,
                bounding_box: region.bounding_box,
            }))
        }
    }

    fn scanner(detector: Arc<dyn RegionDetector>) -> Scanner {
        let pipeline = RecognitionPipeline::new(detector, Arc::new(AlwaysMatch)).with_config(PipelineConfig {
            preprocess: false,
            ..Default::default()
        });
        Scanner::new(Arc::new(pipeline), Arc::new(StillFrame))
    }

    fn drain(rx: &mut mpsc::Receiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_cycle_in_flight() {
        let detector = Arc::new(SlowDetector::new(Duration::from_millis(2500)));
        let (handle, mut rx) = scanner(detector.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.stop().await;

        assert_eq!(detector.max_running.load(Ordering::SeqCst), 1);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ScanEvent::TickSkipped {
                reason: SkipReason::CycleInFlight
            }
        )));
        let finished = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Detections { .. }))
            .count();
        assert!(finished >= 2, "only {} cycles finished", finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycles_do_not_stop_the_loop() {
        let detector = Arc::new(SlowDetector {
            work: Duration::from_millis(100),
            fail_odd_calls: true,
            ..Default::default()
        });
        let (handle, mut rx) = scanner(detector.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        handle.stop().await;

        let events = drain(&mut rx);
        let failed = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::CycleFailed { .. }))
            .count();
        let succeeded = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Detections { detections, .. } if detections.len() == 1))
            .count();
        assert!(failed >= 2, "failed = {}", failed);
        assert!(succeeded >= 2, "succeeded = {}", succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_skipped_until_ready() {
        let detector = Arc::new(SlowDetector::new(Duration::from_millis(10)));
        let (ready_tx, ready_rx) = watch::channel(false);
        let (handle, mut rx) = scanner(detector.clone())
            .with_ready_signal(ready_rx)
            .spawn();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        let events = drain(&mut rx);
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| matches!(
            e,
            ScanEvent::TickSkipped {
                reason: SkipReason::NotReady
            }
        )));

        ready_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        handle.stop().await;

        assert!(detector.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_in_flight_cycle() {
        let detector = Arc::new(SlowDetector::new(Duration::from_secs(60)));
        let (handle, _rx) = scanner(detector.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(detector.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_session_as_frame_source() {
        use crate::camera::{DeviceInfo, Platform, SimulatedBackend};

        let backend = Arc::new(SimulatedBackend::new(vec![DeviceInfo::camera("cam", "Webcam", None)]));
        let mut session = CameraSession::new(backend, Platform::Desktop);
        session.start().await.unwrap();

        let source: Arc<dyn FrameSource> = Arc::new(Mutex::new(session));
        let pipeline = RecognitionPipeline::new(Arc::new(WholeFrameDetector), Arc::new(AlwaysMatch));
        let (handle, mut rx) = Scanner::new(Arc::new(pipeline), source)
            .with_config(ScannerConfig {
                interval: Duration::from_millis(200),
                ..Default::default()
            })
            .spawn();

        let mut first = rx.recv().await.unwrap();
        while matches!(first, ScanEvent::TickSkipped { .. }) {
            first = rx.recv().await.unwrap();
        }
        handle.stop().await;

        match first {
            ScanEvent::Detections { cycle, detections } => {
                assert_eq!(cycle, 1);
                assert_eq!(detections.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capture_failure_is_a_failed_cycle() {
        use crate::camera::{Platform, SimulatedBackend};

        // Session never started: every capture fails
        let session = CameraSession::new(Arc::new(SimulatedBackend::new(vec![])), Platform::Desktop);
        let source: Arc<dyn FrameSource> = Arc::new(Mutex::new(session));
        let pipeline = RecognitionPipeline::new(Arc::new(WholeFrameDetector), Arc::new(AlwaysMatch));
        let (handle, mut rx) = Scanner::new(Arc::new(pipeline), source)
            .with_config(ScannerConfig {
                interval: Duration::from_millis(10),
                ..Default::default()
            })
            .spawn();

        let first = rx.recv().await.unwrap();
        handle.stop().await;
        assert!(matches!(first, ScanEvent::CycleFailed { cycle: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_consumer_does_not_grow_the_queue() {
        let detector = Arc::new(SlowDetector::new(Duration::from_millis(5500)));
        let (handle, mut rx) = scanner(detector.clone())
            .with_config(ScannerConfig {
                interval: Duration::from_secs(1),
                event_capacity: 4,
            })
            .spawn();

        // Hundreds of ticks with nobody reading
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!handle.is_finished());
        let backlog = drain(&mut rx);
        assert!(backlog.len() <= 4, "buffered {} events", backlog.len());

        // Cycle results still get through once the consumer reads again
        let detections = loop {
            match rx.recv().await {
                Some(ScanEvent::Detections { detections, .. }) => break detections,
                Some(_) => continue,
                None => panic!("scanner stopped early"),
            }
        };
        handle.stop().await;
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ScanEvent::TickSkipped {
            reason: SkipReason::NotReady,
        })
        .unwrap();
        assert_eq!(json["event"], "tick_skipped");
        assert_eq!(json["reason"], "not_ready");
    }
}
