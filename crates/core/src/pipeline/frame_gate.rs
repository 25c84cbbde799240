use std::time::{Duration, Instant};

use crate::shared::frame::RawFrame;

use super::face_detection_options::FaceDetectionOptions;

/// Gate parameters. Built from the session options and adjustable at runtime
/// through power management.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateConfig {
    pub frame_skip_count: u32,
    pub processing_throttle: Duration,
    pub motion_detection_enabled: bool,
    pub motion_check_interval: Duration,
    /// Minimum normalized center-luma change treated as motion.
    pub motion_threshold: f64,
}

impl From<&FaceDetectionOptions> for GateConfig {
    fn from(options: &FaceDetectionOptions) -> Self {
        Self {
            frame_skip_count: options.frame_skip_count,
            processing_throttle: options.processing_throttle(),
            motion_detection_enabled: options.motion_detection_enabled,
            motion_check_interval: options.motion_check_interval(),
            motion_threshold: options.motion_threshold,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::from(&FaceDetectionOptions::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    NotRunning,
    Background,
    Thermal,
    FrameSkip,
    Throttle,
    NoMotion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Admit,
    Reject(RejectReason),
}

impl GateDecision {
    pub fn is_admitted(self) -> bool {
        self == GateDecision::Admit
    }
}

/// Per-frame admission filter.
///
/// Checks run in a fixed order: session running, background, thermal,
/// frame skip, throttle, motion. The skip counter advances on every call,
/// before any check, so the skip cadence stays frame-accurate even while
/// other causes are rejecting.
pub struct FrameGate {
    config: GateConfig,
    running: bool,
    background: bool,
    thermal: bool,
    frame_counter: u64,
    last_processed: Option<Instant>,
    last_motion_check: Option<Instant>,
    /// Center luma (0-255) of the last admitted frame.
    motion_reference: Option<f64>,
}

impl FrameGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            running: false,
            background: false,
            thermal: false,
            frame_counter: 0,
            last_processed: None,
            last_motion_check: None,
            motion_reference: None,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Opens the gate for a new session. Background and thermal flags
    /// describe the host, not the session, and carry over.
    pub fn begin_session(&mut self, config: GateConfig) {
        self.config = config;
        self.reset_counters();
        self.running = true;
    }

    pub fn end_session(&mut self) {
        self.running = false;
        self.reset_counters();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn admit(&mut self, frame: &RawFrame, now: Instant) -> bool {
        self.evaluate(frame, now).is_admitted()
    }

    pub fn evaluate(&mut self, frame: &RawFrame, now: Instant) -> GateDecision {
        let position = self.frame_counter;
        self.frame_counter = self.frame_counter.wrapping_add(1);

        if !self.running {
            return GateDecision::Reject(RejectReason::NotRunning);
        }
        if self.background {
            return GateDecision::Reject(RejectReason::Background);
        }
        if self.thermal {
            return GateDecision::Reject(RejectReason::Thermal);
        }
        if position % (u64::from(self.config.frame_skip_count) + 1) != 0 {
            return GateDecision::Reject(RejectReason::FrameSkip);
        }
        if let Some(last) = self.last_processed {
            if now.saturating_duration_since(last) < self.config.processing_throttle {
                return GateDecision::Reject(RejectReason::Throttle);
            }
        }

        let luma = frame.center_luma();
        if self.config.motion_detection_enabled && !self.motion_significant(luma, now) {
            return GateDecision::Reject(RejectReason::NoMotion);
        }

        self.last_processed = Some(now);
        if self.config.motion_detection_enabled {
            self.last_motion_check = Some(now);
        }
        self.motion_reference = luma;
        GateDecision::Admit
    }

    fn motion_significant(&self, luma: Option<f64>, now: Instant) -> bool {
        let within_window = self
            .last_motion_check
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.motion_check_interval);
        if !within_window {
            return true;
        }
        match (luma, self.motion_reference) {
            (Some(current), Some(reference)) => {
                (current - reference).abs() / 255.0 >= self.config.motion_threshold
            }
            _ => true,
        }
    }

    pub fn on_app_background(&mut self) {
        self.background = true;
    }

    /// Clears the background flag and restarts the skip cadence.
    pub fn on_app_foreground(&mut self) {
        self.background = false;
        self.reset_counters();
    }

    pub fn set_thermal_throttling(&mut self, active: bool) {
        self.thermal = active;
    }

    pub fn is_thermal_throttling_active(&self) -> bool {
        self.thermal
    }

    pub fn configure_power_management(&mut self, frame_skip_count: u32, motion_detection_enabled: bool) {
        self.config.frame_skip_count = frame_skip_count;
        self.config.motion_detection_enabled = motion_detection_enabled;
        if !motion_detection_enabled {
            self.last_motion_check = None;
        }
    }

    fn reset_counters(&mut self) {
        self.frame_counter = 0;
        self.last_processed = None;
        self.last_motion_check = None;
        self.motion_reference = None;
    }
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::{PixelFormat, Rotation};
    use rstest::rstest;

    const FRAME_INTERVAL: Duration = Duration::from_millis(50);

    fn frame(luma: u8) -> RawFrame {
        RawFrame::new(
            vec![luma; 40 * 30],
            40,
            30,
            PixelFormat::PlanarLumaChroma,
            Rotation::Deg0,
            0,
        )
    }

    fn config(skip: u32) -> GateConfig {
        GateConfig {
            frame_skip_count: skip,
            processing_throttle: Duration::ZERO,
            motion_detection_enabled: false,
            motion_check_interval: Duration::from_millis(100),
            motion_threshold: 0.02,
        }
    }

    fn running_gate(config: GateConfig) -> FrameGate {
        let mut gate = FrameGate::default();
        gate.begin_session(config);
        gate
    }

    #[rstest]
    #[case::every_frame(0, 1)]
    #[case::every_second(1, 2)]
    #[case::every_third(2, 3)]
    fn test_frame_skip_cadence(#[case] skip: u32, #[case] period: usize) {
        let mut gate = running_gate(config(skip));
        let start = Instant::now();
        let admitted: Vec<bool> = (0..period * 4)
            .map(|i| gate.admit(&frame(100), start + FRAME_INTERVAL * i as u32))
            .collect();
        for (i, admitted) in admitted.iter().enumerate() {
            assert_eq!(*admitted, i % period == 0, "frame {i}");
        }
    }

    #[test]
    fn test_skip_two_admits_one_of_three() {
        let mut gate = running_gate(config(2));
        let start = Instant::now();
        let count = (0..300)
            .filter(|&i| gate.admit(&frame(100), start + FRAME_INTERVAL * i))
            .count();
        assert_eq!(count, 100);
    }

    #[test]
    fn test_rejects_when_not_running() {
        let mut gate = FrameGate::default();
        assert_eq!(
            gate.evaluate(&frame(100), Instant::now()),
            GateDecision::Reject(RejectReason::NotRunning)
        );
    }

    #[test]
    fn test_end_session_closes_gate() {
        let mut gate = running_gate(config(0));
        gate.end_session();
        assert!(!gate.is_running());
        assert!(!gate.admit(&frame(100), Instant::now()));
    }

    #[test]
    fn test_background_rejects_until_foreground() {
        let mut gate = running_gate(config(0));
        let now = Instant::now();
        gate.on_app_background();
        assert_eq!(
            gate.evaluate(&frame(100), now),
            GateDecision::Reject(RejectReason::Background)
        );
        gate.on_app_foreground();
        assert!(gate.admit(&frame(100), now + FRAME_INTERVAL));
    }

    #[test]
    fn test_foreground_resets_skip_cadence() {
        let mut gate = running_gate(config(2));
        let start = Instant::now();
        assert!(gate.admit(&frame(100), start));
        assert!(!gate.admit(&frame(100), start + FRAME_INTERVAL));
        gate.on_app_background();
        gate.on_app_foreground();
        assert!(gate.admit(&frame(100), start + FRAME_INTERVAL * 2));
    }

    #[test]
    fn test_thermal_throttling_rejects() {
        let mut gate = running_gate(config(0));
        gate.set_thermal_throttling(true);
        assert!(gate.is_thermal_throttling_active());
        assert_eq!(
            gate.evaluate(&frame(100), Instant::now()),
            GateDecision::Reject(RejectReason::Thermal)
        );
        gate.set_thermal_throttling(false);
        assert!(gate.admit(&frame(100), Instant::now()));
    }

    #[test]
    fn test_skip_counter_advances_during_other_rejections() {
        let mut gate = running_gate(config(2));
        let start = Instant::now();
        gate.set_thermal_throttling(true);
        // Positions 0 and 1 are consumed while thermal rejects.
        assert!(!gate.admit(&frame(100), start));
        assert!(!gate.admit(&frame(100), start + FRAME_INTERVAL));
        gate.set_thermal_throttling(false);
        assert_eq!(
            gate.evaluate(&frame(100), start + FRAME_INTERVAL * 2),
            GateDecision::Reject(RejectReason::FrameSkip)
        );
        assert!(gate.admit(&frame(100), start + FRAME_INTERVAL * 3));
    }

    #[test]
    fn test_throttle_spacing() {
        let mut gate = running_gate(GateConfig {
            processing_throttle: Duration::from_millis(33),
            ..config(0)
        });
        let start = Instant::now();
        assert!(gate.admit(&frame(100), start));
        assert_eq!(
            gate.evaluate(&frame(100), start + Duration::from_millis(20)),
            GateDecision::Reject(RejectReason::Throttle)
        );
        assert!(gate.admit(&frame(100), start + Duration::from_millis(33)));
    }

    #[test]
    fn test_static_scene_rejected_within_motion_window() {
        let mut gate = running_gate(GateConfig {
            motion_detection_enabled: true,
            ..config(0)
        });
        let start = Instant::now();
        assert!(gate.admit(&frame(100), start));
        assert_eq!(
            gate.evaluate(&frame(101), start + Duration::from_millis(40)),
            GateDecision::Reject(RejectReason::NoMotion)
        );
        // Window elapsed: a static scene is refreshed.
        assert!(gate.admit(&frame(101), start + Duration::from_millis(100)));
    }

    #[test]
    fn test_luma_change_admitted_within_motion_window() {
        let mut gate = running_gate(GateConfig {
            motion_detection_enabled: true,
            ..config(0)
        });
        let start = Instant::now();
        assert!(gate.admit(&frame(100), start));
        // 20 / 255 is about 0.078, above the 0.02 threshold.
        assert!(gate.admit(&frame(120), start + Duration::from_millis(40)));
    }

    #[test]
    fn test_unreadable_frame_counts_as_motion() {
        let mut gate = running_gate(GateConfig {
            motion_detection_enabled: true,
            ..config(0)
        });
        let start = Instant::now();
        let opaque = RawFrame::new(vec![], 40, 30, PixelFormat::Other, Rotation::Deg0, 0);
        assert!(gate.admit(&frame(100), start));
        assert!(gate.admit(&opaque, start + Duration::from_millis(10)));
    }

    #[test]
    fn test_power_management_updates_config() {
        let mut gate = running_gate(GateConfig {
            motion_detection_enabled: true,
            ..config(2)
        });
        gate.configure_power_management(0, false);
        assert_eq!(gate.config().frame_skip_count, 0);
        assert!(!gate.config().motion_detection_enabled);

        let start = Instant::now();
        for i in 0..5 {
            assert!(gate.admit(&frame(100), start + FRAME_INTERVAL * i));
        }
    }

    #[test]
    fn test_begin_session_keeps_host_flags() {
        let mut gate = running_gate(config(0));
        gate.set_thermal_throttling(true);
        gate.begin_session(config(1));
        assert!(gate.is_thermal_throttling_active());
        assert_eq!(gate.config().frame_skip_count, 1);
        assert!(!gate.admit(&frame(100), Instant::now()));
    }

    #[test]
    fn test_gate_config_from_options() {
        let options = FaceDetectionOptions {
            frame_skip_count: 4,
            processing_throttle_ms: 10,
            ..FaceDetectionOptions::default()
        };
        let config = GateConfig::from(&options);
        assert_eq!(config.frame_skip_count, 4);
        assert_eq!(config.processing_throttle, Duration::from_millis(10));
        assert!(config.motion_detection_enabled);
    }
}
