use serde::{Deserialize, Serialize};

use crate::shared::frame::RawFrame;

/// Luminance is sampled every Nth pixel in both directions.
const SAMPLE_STEP: usize = 8;

/// Brightness reported when the frame cannot be read.
pub const NEUTRAL_BRIGHTNESS: f64 = 0.5;

const MAX_EXPOSURE_COMPENSATION: f64 = 2.0;
const DARK_EXPOSURE_TARGET: f64 = 0.4;
const BRIGHT_EXPOSURE_TARGET: f64 = 0.7;
const EXPOSURE_GAIN: f64 = 3.0;

/// Brightness bands, all normalized to [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingThresholds {
    /// Below this the scene is too dark.
    pub min_brightness: f64,
    /// Above this the scene is too bright.
    pub max_brightness: f64,
    pub optimal_min: f64,
    pub optimal_max: f64,
}

impl Default for LightingThresholds {
    fn default() -> Self {
        Self {
            min_brightness: 0.25,
            max_brightness: 0.85,
            optimal_min: 0.35,
            optimal_max: 0.75,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingResult {
    pub brightness_level: f64,
    /// True for both optimal and acceptable-but-suboptimal lighting.
    pub is_good_lighting: bool,
    pub is_too_dark: bool,
    pub is_too_bright: bool,
    pub feedback: &'static str,
    /// Suggested EV adjustment in [-2, 2]; zero unless too dark or too bright.
    pub recommended_exposure_compensation: f64,
}

pub struct LightingQualityDetector {
    thresholds: LightingThresholds,
}

impl LightingQualityDetector {
    pub fn new(thresholds: LightingThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &LightingThresholds {
        &self.thresholds
    }

    /// Never fails: unreadable frames are classified at [`NEUTRAL_BRIGHTNESS`].
    pub fn analyze(&self, frame: &RawFrame) -> LightingResult {
        let brightness = match frame.mean_luma(SAMPLE_STEP) {
            Some(luma) => luma / 255.0,
            None => {
                log::debug!(
                    "Lighting: unreadable {:?} frame, using neutral brightness",
                    frame.pixel_format()
                );
                NEUTRAL_BRIGHTNESS
            }
        };
        self.classify(brightness)
    }

    pub fn classify(&self, brightness: f64) -> LightingResult {
        let t = &self.thresholds;
        let (is_good_lighting, is_too_dark, is_too_bright, feedback) = if brightness < t.min_brightness {
            (false, true, false, "Move to a brighter area")
        } else if brightness > t.max_brightness {
            (false, false, true, "Reduce lighting or move to shade")
        } else if brightness < t.optimal_min {
            (true, false, false, "Lighting acceptable, but brighter is better")
        } else if brightness > t.optimal_max {
            (true, false, false, "Lighting acceptable, but dimmer is better")
        } else {
            (true, false, false, "Lighting is good")
        };

        LightingResult {
            brightness_level: brightness,
            is_good_lighting,
            is_too_dark,
            is_too_bright,
            feedback,
            recommended_exposure_compensation: exposure_compensation(
                brightness,
                is_too_dark,
                is_too_bright,
            ),
        }
    }
}

impl Default for LightingQualityDetector {
    fn default() -> Self {
        Self::new(LightingThresholds::default())
    }
}

fn exposure_compensation(brightness: f64, too_dark: bool, too_bright: bool) -> f64 {
    let target = if too_dark {
        DARK_EXPOSURE_TARGET
    } else if too_bright {
        BRIGHT_EXPOSURE_TARGET
    } else {
        return 0.0;
    };
    ((target - brightness) * EXPOSURE_GAIN).clamp(-MAX_EXPOSURE_COMPENSATION, MAX_EXPOSURE_COMPENSATION)
}
