use std::time::Duration;

/// Upper bound on how long `stop()` waits for in-flight detections.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// ~30 fps ceiling on admitted frames.
pub const DEFAULT_PROCESSING_THROTTLE_MS: u64 = 33;
pub const DEFAULT_MOTION_CHECK_INTERVAL_MS: u64 = 100;
/// Center-luma change (normalized) that counts as motion; about 5/255.
pub const DEFAULT_MOTION_THRESHOLD: f64 = 0.02;

pub const DEFAULT_FRAME_SKIP_COUNT: u32 = 2;
pub const DEFAULT_MAX_FACES: usize = 3;
pub const DEFAULT_MIN_FACE_SIZE: f64 = 0.15;
pub const DEFAULT_MAX_CONCURRENT_DETECTIONS: usize = 2;
/// Each slot is a worker thread.
pub const MAX_CONCURRENT_DETECTIONS_LIMIT: usize = 8;

/// Tracking IDs start here and only grow within a session.
pub const FIRST_TRACKING_ID: u32 = 1;
