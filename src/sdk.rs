use crate::SlmError;
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Largest accepted SLM side length, in pixels.
pub const MAX_RESOLUTION: u32 = 4096;

/// Placeholder used whenever the SDK hands back an empty error string.
pub const NO_ERROR_MESSAGE: &str = "no error message reported by the Blink SDK";

/// Vendor entry points that report a status.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SdkCall {
    WriteCalBuffer,
    LoadLinearLut,
    LoadLutFile,
    LoadOverdriveLutFile,
    ComputeTf,
    WriteOverdriveImage,
    WriteImage,
    CalculateTransientFrames,
    RetrieveTransientFrames,
    WriteTransientFrames,
}

impl SdkCall {
    /// Exported symbol name in `Blink_SDK_C`.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::WriteCalBuffer => "Write_cal_buffer",
            Self::LoadLinearLut => "Load_linear_LUT",
            Self::LoadLutFile => "Load_LUT_file",
            Self::LoadOverdriveLutFile => "Load_overdrive_LUT_file",
            Self::ComputeTf => "Compute_TF",
            Self::WriteOverdriveImage => "Write_overdrive_image",
            Self::WriteImage => "Write_image",
            Self::CalculateTransientFrames => "Calculate_transient_frames",
            Self::RetrieveTransientFrames => "Retrieve_transient_frames",
            Self::WriteTransientFrames => "Write_transient_frames",
        }
    }
}

impl fmt::Display for SdkCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Arguments to `Create_SDK`. Fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateParams {
    pub bit_depth: u32,
    pub resolution: u32,
    pub is_nematic_type: bool,
    pub ram_write_enable: bool,
    pub use_gpu: bool,
    pub max_transients: u32,
    /// Static regional LUT used by OverDrive Plus.
    pub regional_lut: PathBuf,
}

impl CreateParams {
    pub fn validate(&self) -> Result<(), SlmError> {
        if !(1..=16).contains(&self.bit_depth) {
            return Err(SlmError::InvalidParameter(format!(
                "bit depth must be between 1 and 16, got {}",
                self.bit_depth
            )));
        }
        if !(1..=MAX_RESOLUTION).contains(&self.resolution) {
            return Err(SlmError::InvalidParameter(format!(
                "resolution must be between 1 and {MAX_RESOLUTION}, got {}",
                self.resolution
            )));
        }
        if self.max_transients == 0 || i32::try_from(self.max_transients).is_err() {
            return Err(SlmError::InvalidParameter(format!(
                "max transients must be a positive int, got {}",
                self.max_transients
            )));
        }
        Ok(())
    }

    /// Bytes in one full frame (one byte per pixel).
    pub fn frame_len(&self) -> usize {
        self.resolution as usize * self.resolution as usize
    }
}

/// Trigger flags accepted by every write call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trigger {
    pub wait_for_trigger: bool,
    pub external_pulse: bool,
}

/// What `Create_SDK` hands back. The handle exists even when
/// `constructed_ok` is false and must still be released.
#[derive(Debug)]
pub struct Construction<H> {
    pub handle: H,
    pub boards_found: u32,
    pub constructed_ok: bool,
}

/// Something that can construct SDK handles, i.e. the loaded vendor library.
pub trait SdkFactory {
    type Handle: SdkHandle;

    fn create(&self, params: &CreateParams) -> Result<Construction<Self::Handle>, SlmError>;
}

/// Calls on a constructed SDK handle.
///
/// Status-returning calls report the raw vendor result; callers decide what a
/// failure means. Dropping an implementor releases the handle (`Delete_SDK`).
pub trait SdkHandle {
    fn last_error_message(&self) -> String;
    fn version_info(&self) -> String;
    fn is_transient_constructed(&self) -> bool;
    fn set_true_frames(&mut self, true_frames: i32);
    fn write_cal_buffer(&mut self, board: i32, buffer: &[u8]) -> bool;
    fn load_linear_lut(&mut self, board: i32) -> bool;
    fn load_lut_file(&mut self, board: i32, path: &Path) -> bool;
    fn load_overdrive_lut_file(&mut self, path: &Path) -> bool;
    fn compute_tf(&mut self, frame_rate: f32) -> bool;
    fn slm_power(&mut self, on: bool);
    fn write_overdrive_image(&mut self, board: i32, image: &[u8], trigger: Trigger) -> bool;
    fn write_image(&mut self, board: i32, image: &[u8], trigger: Trigger) -> bool;
    /// Byte count of the transient sequence from the current state to `target`.
    fn calculate_transient_frames(&mut self, target: &[u8]) -> Option<u32>;
    fn retrieve_transient_frames(&mut self, buffer: &mut [u8]) -> bool;
    fn write_transient_frames(&mut self, board: i32, frames: &[u8], trigger: Trigger) -> bool;
}

/// Returns `message`, or a fixed placeholder when it is blank.
pub fn non_empty_message(message: String) -> String {
    if message.trim().is_empty() {
        NO_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}
