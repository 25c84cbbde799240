use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use thiserror::Error;

use crate::detection::domain::detected_face::{DetectedFace, FaceDetectionResult};
use crate::detection::domain::face_detector::{DetectorError, DetectorFactory, FaceDetector};
use crate::detection::domain::face_observation_adapter::FaceObservationAdapter;
use crate::detection::domain::raw_observation::RawObservation;
use crate::preview::domain::coordinate_transformer::{CoordinateTransformer, PreviewSurface};
use crate::shared::constants::{DRAIN_POLL_INTERVAL, DRAIN_TIMEOUT};
use crate::shared::frame::RawFrame;

use super::face_detection_options::{FaceDetectionOptions, OptionsError};
use super::frame_gate::{FrameGate, GateConfig, GateDecision};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error("failed to create detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("failed to spawn detection thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What the consumer receives for each analyzed frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DetectionEvent {
    Result(FaceDetectionResult),
    Failed {
        #[serde(rename = "timestamp")]
        timestamp_ms: u64,
        message: String,
    },
}

pub type EventConsumer = Box<dyn FnMut(DetectionEvent) + Send>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub offered: u64,
    pub admitted: u64,
    pub dropped_by_gate: u64,
    pub dropped_saturated: u64,
    pub delivered: u64,
    pub failed: u64,
    pub in_flight: usize,
}

/// Result of [`DetectionScheduler::stop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrainOutcome {
    /// True when every in-flight detection finished before the drain bound.
    pub completed: bool,
    /// Detections still running when the scheduler gave up waiting.
    pub in_flight: usize,
}

impl DrainOutcome {
    const NOTHING_TO_DRAIN: Self = Self {
        completed: true,
        in_flight: 0,
    };
}

#[derive(Default)]
struct SessionCounters {
    offered: AtomicU64,
    admitted: AtomicU64,
    dropped_by_gate: AtomicU64,
    dropped_saturated: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// State shared by the producer, worker and assembly threads of one session.
struct SessionShared {
    options: FaceDetectionOptions,
    cancelled: AtomicBool,
    in_flight: AtomicUsize,
    counters: SessionCounters,
}

impl SessionShared {
    fn new(options: FaceDetectionOptions) -> Self {
        Self {
            options,
            cancelled: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            counters: SessionCounters::default(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims an in-flight slot unless all are taken.
    fn try_acquire(self: &Arc<Self>) -> Option<InFlightGuard> {
        let max = self.options.max_concurrent_detections;
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| InFlightGuard(Arc::clone(self)))
    }

    fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            offered: c.offered.load(Ordering::Relaxed),
            admitted: c.admitted.load(Ordering::Relaxed),
            dropped_by_gate: c.dropped_by_gate.load(Ordering::Relaxed),
            dropped_saturated: c.dropped_saturated.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}

/// Holds one in-flight slot; released on drop, whichever path the task takes.
struct InFlightGuard(Arc<SessionShared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One admitted frame on its way through detection and assembly.
///
/// Dropping the task releases both the frame and its in-flight slot.
struct DetectionTask {
    frame: RawFrame,
    _slot: InFlightGuard,
}

struct DetectionOutcome {
    task: DetectionTask,
    result: Result<Vec<RawObservation>, DetectorError>,
    detect_ms: f64,
}

struct Session {
    shared: Arc<SessionShared>,
    detector: Arc<dyn FaceDetector>,
    task_tx: Sender<DetectionTask>,
    workers: Vec<JoinHandle<()>>,
    assembler: JoinHandle<()>,
}

enum SchedulerState {
    Idle,
    Running(Session),
    Draining,
}

type SharedLogger = Arc<Mutex<Box<dyn PipelineLogger>>>;

/// Owns the detection lifecycle: `Idle -> Running -> Draining -> Idle`.
///
/// [`process_frame`](Self::process_frame) runs on the caller's (camera)
/// thread and never blocks on detection. Admitted frames go to a pool of
/// `max_concurrent_detections` worker threads; their outcomes are assembled
/// on a single thread that owns the tracking table and the consumer.
pub struct DetectionScheduler {
    factory: DetectorFactory,
    state: Mutex<SchedulerState>,
    gate: Mutex<FrameGate>,
    preview: Arc<Mutex<Option<PreviewSurface>>>,
    logger: SharedLogger,
    last_session: Mutex<Option<Arc<SessionShared>>>,
}

impl DetectionScheduler {
    pub fn new(factory: DetectorFactory) -> Self {
        Self {
            factory,
            state: Mutex::new(SchedulerState::Idle),
            gate: Mutex::new(FrameGate::default()),
            preview: Arc::new(Mutex::new(None)),
            logger: Arc::new(Mutex::new(Box::new(NullPipelineLogger))),
            last_session: Mutex::new(None),
        }
    }

    pub fn with_logger(self, logger: Box<dyn PipelineLogger>) -> Self {
        *lock(&self.logger) = logger;
        self
    }

    /// Starts a session with a fresh detector and tracking table.
    ///
    /// A running session is stopped (and drained) first.
    pub fn start(
        &self,
        options: FaceDetectionOptions,
        consumer: impl FnMut(DetectionEvent) + Send + 'static,
    ) -> Result<(), SchedulerError> {
        options.validate()?;
        let detector = (self.factory)(&options)?;

        if self.is_running() {
            log::debug!("Restarting face detection");
            self.stop();
        }

        let shared = Arc::new(SessionShared::new(options));
        let session = match self.spawn_session(Arc::clone(&shared), detector, Box::new(consumer)) {
            Ok(session) => session,
            Err(e) => {
                shared.cancelled.store(true, Ordering::Release);
                return Err(e);
            }
        };

        lock(&self.gate).begin_session(GateConfig::from(&shared.options));
        *lock(&self.last_session) = Some(Arc::clone(&shared));
        log::debug!("Face detection started with options: {:?}", shared.options);

        self.install(session);
        Ok(())
    }

    /// Makes `session` the running one. A session installed concurrently in
    /// the meantime is drained without a logger summary, since the logger
    /// already collects for the new session.
    fn install(&self, session: Session) {
        let previous = std::mem::replace(&mut *lock(&self.state), SchedulerState::Running(session));
        if let SchedulerState::Running(stale) = previous {
            log::warn!("Concurrent start replaced a running session");
            self.drain(stale, false);
        }
    }

    fn spawn_session(
        &self,
        shared: Arc<SessionShared>,
        detector: Arc<dyn FaceDetector>,
        consumer: EventConsumer,
    ) -> Result<Session, SchedulerError> {
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<DetectionTask>();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<DetectionOutcome>();

        let adapter = FaceObservationAdapter::new(detector.conventions());
        let assembler = thread::Builder::new()
            .name("facecue-assemble".into())
            .spawn({
                let shared = Arc::clone(&shared);
                let preview = Arc::clone(&self.preview);
                let logger = Arc::clone(&self.logger);
                move || run_assembler(outcome_rx, adapter, consumer, shared, preview, logger)
            })?;

        let mut workers = Vec::with_capacity(shared.options.max_concurrent_detections);
        for i in 0..shared.options.max_concurrent_detections {
            let handle = thread::Builder::new()
                .name(format!("facecue-detect-{i}"))
                .spawn({
                    let detector = Arc::clone(&detector);
                    let shared = Arc::clone(&shared);
                    let task_rx = task_rx.clone();
                    let outcome_tx = outcome_tx.clone();
                    move || run_worker(detector, task_rx, outcome_tx, shared)
                })?;
            workers.push(handle);
        }

        Ok(Session {
            shared,
            detector,
            task_tx,
            workers,
            assembler,
        })
    }

    /// Offers one camera frame. Never blocks on detection and never fails:
    /// frames that are not admitted, or arrive while every slot is busy, are
    /// dropped (and thereby released) immediately.
    pub fn process_frame(&self, frame: RawFrame) {
        let (shared, task_tx) = match &*lock(&self.state) {
            SchedulerState::Running(session) => (Arc::clone(&session.shared), session.task_tx.clone()),
            SchedulerState::Idle | SchedulerState::Draining => return,
        };
        shared.counters.offered.fetch_add(1, Ordering::Relaxed);
        if shared.is_cancelled() {
            return;
        }

        let decision = lock(&self.gate).evaluate(&frame, Instant::now());
        if let GateDecision::Reject(reason) = decision {
            shared.counters.dropped_by_gate.fetch_add(1, Ordering::Relaxed);
            log::trace!("Frame {} rejected: {reason:?}", frame.timestamp_ms());
            return;
        }

        let Some(slot) = shared.try_acquire() else {
            shared.counters.dropped_saturated.fetch_add(1, Ordering::Relaxed);
            log::trace!("Frame {} dropped: detector saturated", frame.timestamp_ms());
            return;
        };
        shared.counters.admitted.fetch_add(1, Ordering::Relaxed);

        // A closed channel means the session is shutting down; the task is
        // dropped with the error, releasing frame and slot.
        let _ = task_tx.send(DetectionTask { frame, _slot: slot });
    }

    /// Cancels the session and waits up to [`DRAIN_TIMEOUT`] for in-flight
    /// detections. Session state is cleared either way.
    pub fn stop(&self) -> DrainOutcome {
        let session = {
            let mut state = lock(&self.state);
            match std::mem::replace(&mut *state, SchedulerState::Draining) {
                SchedulerState::Running(session) => session,
                other => {
                    *state = other;
                    return DrainOutcome::NOTHING_TO_DRAIN;
                }
            }
        };

        lock(&self.gate).end_session();
        let outcome = self.drain(session, true);

        let mut state = lock(&self.state);
        if matches!(*state, SchedulerState::Draining) {
            *state = SchedulerState::Idle;
        }
        log::debug!("Face detection stopped ({} still in flight)", outcome.in_flight);
        outcome
    }

    fn drain(&self, session: Session, summarize: bool) -> DrainOutcome {
        let Session {
            shared,
            detector,
            task_tx,
            workers,
            assembler,
        } = session;

        shared.cancelled.store(true, Ordering::Release);
        drop(task_tx);

        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while shared.in_flight() > 0 && Instant::now() < deadline {
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
        let remaining = shared.in_flight();
        detector.close();

        if remaining == 0 {
            for handle in workers.into_iter().chain(std::iter::once(assembler)) {
                if handle.join().is_err() {
                    log::warn!("Detection thread panicked");
                }
            }
        } else {
            log::warn!("Drain timed out with {remaining} detection(s) in flight; detaching threads");
        }

        if summarize {
            lock(&self.logger).summary();
        }
        DrainOutcome {
            completed: remaining == 0,
            in_flight: remaining,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.state), SchedulerState::Running(_))
    }

    /// Counters of the current session, or of the last one after `stop`.
    pub fn stats(&self) -> SchedulerStats {
        lock(&self.last_session)
            .as_ref()
            .map(|shared| shared.stats())
            .unwrap_or_default()
    }

    /// Sets the surface results are mapped onto; `None` delivers
    /// sensor-normalized geometry. Applies from the next assembled result.
    pub fn set_preview_surface(&self, surface: Option<PreviewSurface>) {
        *lock(&self.preview) = surface;
    }

    pub fn on_app_background(&self) {
        lock(&self.gate).on_app_background();
        log::debug!("App backgrounded, face detection paused");
    }

    pub fn on_app_foreground(&self) {
        lock(&self.gate).on_app_foreground();
        log::debug!("App foregrounded, face detection resumed");
    }

    pub fn enable_thermal_throttling(&self) {
        lock(&self.gate).set_thermal_throttling(true);
        log::debug!("Thermal throttling enabled");
    }

    pub fn disable_thermal_throttling(&self) {
        lock(&self.gate).set_thermal_throttling(false);
        log::debug!("Thermal throttling disabled");
    }

    pub fn is_thermal_throttling_active(&self) -> bool {
        lock(&self.gate).is_thermal_throttling_active()
    }

    pub fn configure_power_management(&self, frame_skip_count: u32, motion_detection_enabled: bool) {
        lock(&self.gate).configure_power_management(frame_skip_count, motion_detection_enabled);
        log::debug!(
            "Power management: frameSkip={frame_skip_count}, motionDetection={motion_detection_enabled}"
        );
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_worker(
    detector: Arc<dyn FaceDetector>,
    task_rx: Receiver<DetectionTask>,
    outcome_tx: Sender<DetectionOutcome>,
    shared: Arc<SessionShared>,
) {
    for task in task_rx {
        if shared.is_cancelled() {
            continue;
        }
        let started = Instant::now();
        let result = detector.detect(&task.frame);
        let detect_ms = started.elapsed().as_secs_f64() * 1000.0;
        if outcome_tx
            .send(DetectionOutcome {
                task,
                result,
                detect_ms,
            })
            .is_err()
        {
            break;
        }
    }
}

fn run_assembler(
    outcome_rx: Receiver<DetectionOutcome>,
    mut adapter: FaceObservationAdapter,
    mut consumer: EventConsumer,
    shared: Arc<SessionShared>,
    preview: Arc<Mutex<Option<PreviewSurface>>>,
    logger: SharedLogger,
) {
    for outcome in outcome_rx {
        if shared.is_cancelled() {
            continue;
        }
        let frame = &outcome.task.frame;

        let event = match &outcome.result {
            Ok(raw) => {
                let started = Instant::now();
                let faces = adapter.adapt(raw, frame.width(), frame.height(), &shared.options);
                let faces = match *lock(&preview) {
                    Some(surface) => map_to_preview(faces, frame, surface),
                    None => faces,
                };
                let assemble_ms = started.elapsed().as_secs_f64() * 1000.0;

                let mut sink = lock(&logger);
                sink.timing("detect", outcome.detect_ms);
                sink.timing("assemble", assemble_ms);
                sink.metric("faces", faces.len() as f64);
                sink.metric("in_flight", shared.in_flight() as f64);
                drop(sink);

                DetectionEvent::Result(FaceDetectionResult {
                    faces,
                    frame_width: frame.width(),
                    frame_height: frame.height(),
                    timestamp_ms: frame.timestamp_ms(),
                })
            }
            Err(e) => {
                log::warn!("Face detection failed for frame {}: {e}", frame.timestamp_ms());
                DetectionEvent::Failed {
                    timestamp_ms: frame.timestamp_ms(),
                    message: format!("Face detection failed: {e}"),
                }
            }
        };

        if shared.is_cancelled() {
            continue;
        }
        let counter = match event {
            DetectionEvent::Result(_) => &shared.counters.delivered,
            DetectionEvent::Failed { .. } => &shared.counters.failed,
        };
        consumer(event);
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn map_to_preview(faces: Vec<DetectedFace>, frame: &RawFrame, surface: PreviewSurface) -> Vec<DetectedFace> {
    let transformer = CoordinateTransformer::new(frame.rotation(), frame.width(), frame.height(), surface);
    faces
        .into_iter()
        .map(|mut face| {
            face.bounds = transformer.transform_bounds(face.bounds);
            if let Some(landmarks) = face.landmarks.as_mut() {
                for point in landmarks.values_mut() {
                    *point = transformer.transform_point(*point);
                }
            }
            face
        })
        .collect()
}
