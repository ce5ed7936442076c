use crate::SlmError;
use ndarray::{Array2, ArrayView2};
use std::path::Path;

/// A square 8-bit phase image sized to the SLM.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseImage {
    pixels: Array2<u8>,
}

impl PhaseImage {
    /// Constant image. A fill of 255 is the blank calibration frame.
    pub fn filled(resolution: u32, value: u8) -> Self {
        let n = resolution as usize;
        Self {
            pixels: Array2::from_elem((n, n), value),
        }
    }

    /// Vertical ramps with an 8 pixel period, values 0 to 223 in seven
    /// steps. 255 wraps to 0 in phase, so the ramp stops at 7/8 of it.
    pub fn ramp(resolution: u32, increasing: bool) -> Self {
        let n = resolution as usize;
        let step = 255.0 / 8.0;
        let pixels = Array2::from_shape_fn((n, n), |(_, col)| {
            let k = col & 0x07;
            let k = if increasing { k } else { 7 - k };
            (k as f64 * step + 0.5) as u8
        });
        Self { pixels }
    }

    /// Reads a bitmap from disk and converts it to 8-bit luma.
    pub fn load(path: &Path, resolution: u32) -> Result<Self, SlmError> {
        let decoded = image::open(path)
            .map_err(|source| SlmError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .into_luma8();
        let (width, height) = decoded.dimensions();
        if width != resolution || height != resolution {
            return Err(SlmError::ImageSize {
                width,
                height,
                expected: resolution,
            });
        }
        let pixels = Array2::from_shape_vec((height as usize, width as usize), decoded.into_raw())
            .map_err(|_| SlmError::ImageSize {
                width,
                height,
                expected: resolution,
            })?;
        Ok(Self { pixels })
    }

    pub fn resolution(&self) -> u32 {
        self.pixels.nrows() as u32
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.pixels.view()
    }

    /// Row-major pixel bytes, as the SDK expects them.
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels
            .as_slice()
            .expect("phase images are built in standard layout")
    }

    pub fn check_resolution(&self, expected: u32) -> Result<(), SlmError> {
        let res = self.resolution();
        if res == expected {
            Ok(())
        } else {
            Err(SlmError::ImageSize {
                width: res,
                height: res,
                expected,
            })
        }
    }
}

/// The three images a run needs.
#[derive(Clone, Debug)]
pub struct ImageSet {
    pub calibration: PhaseImage,
    pub ramp_a: PhaseImage,
    pub ramp_b: PhaseImage,
}

impl ImageSet {
    /// Blank calibration plus an increasing and a decreasing ramp.
    pub fn generated(resolution: u32) -> Self {
        Self {
            calibration: PhaseImage::filled(resolution, 255),
            ramp_a: PhaseImage::ramp(resolution, true),
            ramp_b: PhaseImage::ramp(resolution, false),
        }
    }

    pub fn load(
        calibration: &Path,
        ramp_a: &Path,
        ramp_b: &Path,
        resolution: u32,
    ) -> Result<Self, SlmError> {
        Ok(Self {
            calibration: PhaseImage::load(calibration, resolution)?,
            ramp_a: PhaseImage::load(ramp_a, resolution)?,
            ramp_b: PhaseImage::load(ramp_b, resolution)?,
        })
    }
}
