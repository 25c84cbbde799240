use std::fmt;
use std::ops::Range;

use ndarray::{ArrayView2, ArrayView3, ShapeBuilder};
use serde::{Deserialize, Serialize};

/// Bytes per pixel of a packed BGRA row.
const BGRA_CHANNELS: usize = 4;

/// Center-region side for the motion proxy, as a fraction of the smaller dimension.
const CENTER_REGION_FRACTION: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelFormat {
    /// Luma plane first (NV12/NV21/I420 style); chroma planes are ignored.
    PlanarLumaChroma,
    PackedBgra,
    /// Anything the pipeline cannot read pixels from.
    Other,
}

/// Clockwise rotation from sensor orientation to display orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Quarter turns exchange effective width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    pub fn inverse(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg0,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg180,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be 0, 90, 180 or 270 degrees, got {degrees}"))
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// One camera frame handed to the pipeline for a single gate/dispatch cycle.
///
/// The pipeline owns the frame until it is dropped; dropping it is the
/// release signal back to the camera collaborator (see
/// [`RawFrame::with_release_hook`]).
pub struct RawFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    row_stride: usize,
    pixel_format: PixelFormat,
    rotation: Rotation,
    timestamp_ms: u64,
    release: Option<ReleaseHook>,
}

impl RawFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        rotation: Rotation,
        timestamp_ms: u64,
    ) -> Self {
        let row_stride = match pixel_format {
            PixelFormat::PackedBgra => width as usize * BGRA_CHANNELS,
            PixelFormat::PlanarLumaChroma | PixelFormat::Other => width as usize,
        };
        Self {
            data,
            width,
            height,
            row_stride,
            pixel_format,
            rotation,
            timestamp_ms,
            release: None,
        }
    }

    /// Overrides the byte distance between rows of the first plane.
    pub fn with_row_stride(mut self, row_stride: usize) -> Self {
        self.row_stride = row_stride;
        self
    }

    /// Registers a callback fired exactly once when the pipeline lets go of the frame.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Luma plane as (rows, cols). `None` unless the format is planar and the
    /// buffer is large enough for the declared geometry.
    pub fn luma_plane(&self) -> Option<ArrayView2<'_, u8>> {
        if self.pixel_format != PixelFormat::PlanarLumaChroma {
            return None;
        }
        let shape = (self.height as usize, self.width as usize).strides((self.row_stride, 1));
        ArrayView2::from_shape(shape, &self.data).ok()
    }

    /// Packed pixels as (rows, cols, [B, G, R, A]).
    pub fn bgra(&self) -> Option<ArrayView3<'_, u8>> {
        if self.pixel_format != PixelFormat::PackedBgra {
            return None;
        }
        let shape = (self.height as usize, self.width as usize, BGRA_CHANNELS)
            .strides((self.row_stride, BGRA_CHANNELS, 1));
        ArrayView3::from_shape(shape, &self.data).ok()
    }

    /// Mean luminance (0-255) sampled every `step` pixels in both directions.
    ///
    /// `None` for unreadable formats or buffers, or when nothing was sampled.
    pub fn mean_luma(&self, step: usize) -> Option<f64> {
        self.sample_luma(0..self.width as usize, 0..self.height as usize, step)
    }

    /// Mean luminance of a small square around the frame center.
    pub fn center_luma(&self) -> Option<f64> {
        let w = self.width as usize;
        let h = self.height as usize;
        let side = (w.min(h) / CENTER_REGION_FRACTION).max(1);
        let x0 = (w / 2).saturating_sub(side / 2);
        let y0 = (h / 2).saturating_sub(side / 2);
        let step = (side / 16).max(1);
        self.sample_luma(x0..(x0 + side).min(w), y0..(y0 + side).min(h), step)
    }

    fn sample_luma(&self, cols: Range<usize>, rows: Range<usize>, step: usize) -> Option<f64> {
        let step = step.max(1);
        let mut sum = 0.0;
        let mut count = 0usize;

        match self.pixel_format {
            PixelFormat::PlanarLumaChroma => {
                let plane = self.luma_plane()?;
                for y in rows.step_by(step) {
                    for x in cols.clone().step_by(step) {
                        sum += plane[[y, x]] as f64;
                        count += 1;
                    }
                }
            }
            PixelFormat::PackedBgra => {
                let px = self.bgra()?;
                for y in rows.step_by(step) {
                    for x in cols.clone().step_by(step) {
                        let b = px[[y, x, 0]] as f64;
                        let g = px[[y, x, 1]] as f64;
                        let r = px[[y, x, 2]] as f64;
                        sum += 0.299 * r + 0.587 * g + 0.114 * b;
                        count += 1;
                    }
                }
            }
            PixelFormat::Other => return None,
        }

        (count > 0).then(|| sum / count as f64)
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_stride", &self.row_stride)
            .field("pixel_format", &self.pixel_format)
            .field("rotation", &self.rotation)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
