use crate::{
    CreateParams, DeviceSetup, ErrorPolicy, ImageSet, LutSource, SequencePlan, SlmError, Trigger,
    WriteMode,
};
use confique::Config;
use serde::Deserialize;
use std::{path::Path, path::PathBuf, time::Duration};

/// Run configuration, read from a TOML file with `BLINK_*` environment
/// overrides. Every field has a default matching the vendor SDK example.
#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub sdk: SdkSettings,
    #[config(nested)]
    pub device: DeviceSettings,
    #[config(nested)]
    pub sequence: SequenceSettings,
}

/// Arguments for constructing the SDK.
#[derive(Config, Debug, Clone)]
pub struct SdkSettings {
    /// Vendor library name or path. A bare name gets the platform prefix
    /// and suffix.
    #[config(default = "Blink_SDK_C", env = "BLINK_LIBRARY")]
    pub library: String,
    #[config(default = 8)]
    pub bit_depth: u32,
    /// SLM width and height in pixels.
    #[config(default = 512)]
    pub resolution: u32,
    #[config(default = true)]
    pub is_nematic_type: bool,
    #[config(default = true)]
    pub ram_write_enable: bool,
    #[config(default = true)]
    pub use_gpu: bool,
    #[config(default = 20)]
    pub max_transients: u32,
    /// Static regional LUT for OverDrive Plus.
    #[config(
        default = "C:\\Program Files\\Meadowlark Optics\\OverDrive Plus SDK\\SLM_lut.txt",
        env = "BLINK_LUT_FILE"
    )]
    pub lut_file: PathBuf,
}

#[derive(Config, Debug, Clone)]
pub struct DeviceSettings {
    /// Controller board, 1-based.
    #[config(default = 1)]
    pub board: i32,
    #[config(default = 3)]
    pub true_frames: i32,
    #[config(default = "C:\\Program Files\\Meadowlark Optics\\OverDrive Plus SDK\\512white.bmp")]
    pub calibration_image: PathBuf,
    /// LUT file for the controller. A linear LUT is loaded when unset.
    pub lut: Option<PathBuf>,
    /// Regional OverDrive LUT loaded after construction.
    pub overdrive_lut: Option<PathBuf>,
    /// Frame rate in Hz passed to `Compute_TF`.
    pub frame_rate: Option<f32>,
}

#[derive(Config, Debug, Clone)]
pub struct SequenceSettings {
    /// `files` reads the bitmaps below; `generated` builds a blank
    /// calibration frame and two ramps in memory.
    #[config(default = "files")]
    pub images: ImageOrigin,
    #[config(default = "C:\\Program Files\\Meadowlark Optics\\OverDrive Plus SDK\\ramp_0_512.bmp")]
    pub image_a: PathBuf,
    #[config(default = "C:\\Program Files\\Meadowlark Optics\\OverDrive Plus SDK\\ramp_1_512.bmp")]
    pub image_b: PathBuf,
    #[config(default = 1000, env = "BLINK_CYCLES")]
    pub cycles: u32,
    /// Pause after every frame write, in milliseconds.
    #[config(default = 25)]
    pub pause_ms: u64,
    #[config(default = "overdrive")]
    pub mode: WriteMode,
    #[config(default = false)]
    pub wait_for_trigger: bool,
    #[config(default = false)]
    pub external_pulse: bool,
    #[config(default = 50)]
    pub progress_interval: u32,
    #[config(default = "abort")]
    pub on_error: ErrorPolicy,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    Files,
    Generated,
}

impl Conf {
    /// Loads from environment and, when given, a TOML file. `BLINK_*`
    /// variables take precedence over the file.
    pub fn load(path: Option<&Path>) -> Result<Self, confique::Error> {
        let mut builder = Conf::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        builder.load()
    }

    pub fn create_params(&self) -> CreateParams {
        CreateParams {
            bit_depth: self.sdk.bit_depth,
            resolution: self.sdk.resolution,
            is_nematic_type: self.sdk.is_nematic_type,
            ram_write_enable: self.sdk.ram_write_enable,
            use_gpu: self.sdk.use_gpu,
            max_transients: self.sdk.max_transients,
            regional_lut: self.sdk.lut_file.clone(),
        }
    }

    pub fn device_setup(&self) -> DeviceSetup {
        DeviceSetup {
            board: self.device.board,
            true_frames: self.device.true_frames,
            lut: match &self.device.lut {
                Some(path) => LutSource::File(path.clone()),
                None => LutSource::Linear,
            },
            overdrive_lut: self.device.overdrive_lut.clone(),
            frame_rate: self.device.frame_rate,
        }
    }

    pub fn sequence_plan(&self) -> SequencePlan {
        SequencePlan {
            cycles: self.sequence.cycles,
            pause: Duration::from_millis(self.sequence.pause_ms),
            mode: self.sequence.mode,
            trigger: Trigger {
                wait_for_trigger: self.sequence.wait_for_trigger,
                external_pulse: self.sequence.external_pulse,
            },
            progress_interval: self.sequence.progress_interval,
            on_error: self.sequence.on_error,
        }
    }

    pub fn load_images(&self) -> Result<ImageSet, SlmError> {
        match self.sequence.images {
            ImageOrigin::Generated => Ok(ImageSet::generated(self.sdk.resolution)),
            ImageOrigin::Files => ImageSet::load(
                &self.device.calibration_image,
                &self.sequence.image_a,
                &self.sequence.image_b,
                self.sdk.resolution,
            ),
        }
    }
}

/// Commented TOML template with every setting and its default.
pub fn template() -> String {
    confique::toml::template::<Conf>(confique::toml::FormatOptions::default())
}
