//! Run-time binding to the vendor `Blink_SDK_C` shared library.
//!
//! The library is opened with `libloading` and every entry point of the C
//! wrapper header is resolved up front, so a missing symbol is reported when
//! the library is loaded rather than halfway through a sequence.

use crate::{Construction, CreateParams, SdkCall, SdkFactory, SdkHandle, SlmError, Trigger};
use libc::{c_char, c_float, c_int, c_uchar, c_uint, c_void};
use libloading::Library;
use log::{debug, error};
use std::{
    ffi::{CStr, CString},
    path::{Path, PathBuf},
    ptr,
    sync::Arc,
};

/// Library name used when the configuration does not override it.
pub const DEFAULT_LIBRARY: &str = "Blink_SDK_C";

type CreateSdkFn = unsafe extern "C" fn(
    c_uint,
    c_uint,
    *mut c_uint,
    *mut c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    *mut c_char,
) -> *mut c_void;
type DeleteSdkFn = unsafe extern "C" fn(*mut c_void);
type MessageFn = unsafe extern "C" fn(*mut c_void) -> *const c_char;
type StatusFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type SetTrueFramesFn = unsafe extern "C" fn(*mut c_void, c_int);
type WriteCalBufferFn = unsafe extern "C" fn(*mut c_void, c_int, *const c_uchar) -> bool;
type LoadLinearLutFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type LoadLutFileFn = unsafe extern "C" fn(*mut c_void, c_int, *mut c_char) -> c_int;
type LoadOverdriveLutFileFn = unsafe extern "C" fn(*mut c_void, *mut c_char) -> c_int;
type ComputeTfFn = unsafe extern "C" fn(*mut c_void, c_float) -> c_int;
type SlmPowerFn = unsafe extern "C" fn(*mut c_void, c_int);
type WriteFramesFn = unsafe extern "C" fn(*mut c_void, c_int, *mut c_uchar, c_int, c_int) -> c_int;
type WriteImageFn =
    unsafe extern "C" fn(*mut c_void, c_int, *mut c_uchar, c_uint, c_int, c_int) -> c_int;
type CalculateTransientFramesFn =
    unsafe extern "C" fn(*mut c_void, *mut c_uchar, *mut c_uint) -> c_int;
type RetrieveTransientFramesFn = unsafe extern "C" fn(*mut c_void, *mut c_uchar) -> c_int;

/// Resolved entry points. `_library` keeps the function pointers valid.
struct BlinkApi {
    create_sdk: CreateSdkFn,
    delete_sdk: DeleteSdkFn,
    get_last_error_message: MessageFn,
    get_version_info: MessageFn,
    is_slm_transient_constructed: StatusFn,
    set_true_frames: SetTrueFramesFn,
    write_cal_buffer: WriteCalBufferFn,
    load_linear_lut: LoadLinearLutFn,
    load_lut_file: LoadLutFileFn,
    load_overdrive_lut_file: LoadOverdriveLutFileFn,
    compute_tf: ComputeTfFn,
    slm_power: SlmPowerFn,
    write_overdrive_image: WriteFramesFn,
    write_image: WriteImageFn,
    calculate_transient_frames: CalculateTransientFramesFn,
    retrieve_transient_frames: RetrieveTransientFramesFn,
    write_transient_frames: WriteFramesFn,
    _library: Library,
}

/// Copies a function pointer out of the library.
///
/// # Safety
///
/// `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, SlmError> {
    library
        .get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|source| SlmError::Symbol { name, source })
}

impl BlinkApi {
    /// # Safety
    ///
    /// The library must export the `Blink_SDK_C.h` ABI.
    unsafe fn bind(library: Library) -> Result<Self, SlmError> {
        Ok(Self {
            create_sdk: symbol(&library, "Create_SDK")?,
            delete_sdk: symbol(&library, "Delete_SDK")?,
            get_last_error_message: symbol(&library, "Get_last_error_message")?,
            get_version_info: symbol(&library, "Get_version_info")?,
            is_slm_transient_constructed: symbol(&library, "Is_slm_transient_constructed")?,
            set_true_frames: symbol(&library, "Set_true_frames")?,
            write_cal_buffer: symbol(&library, "Write_cal_buffer")?,
            load_linear_lut: symbol(&library, "Load_linear_LUT")?,
            load_lut_file: symbol(&library, "Load_LUT_file")?,
            load_overdrive_lut_file: symbol(&library, "Load_overdrive_LUT_file")?,
            compute_tf: symbol(&library, "Compute_TF")?,
            slm_power: symbol(&library, "SLM_power")?,
            write_overdrive_image: symbol(&library, "Write_overdrive_image")?,
            write_image: symbol(&library, "Write_image")?,
            calculate_transient_frames: symbol(&library, "Calculate_transient_frames")?,
            retrieve_transient_frames: symbol(&library, "Retrieve_transient_frames")?,
            write_transient_frames: symbol(&library, "Write_transient_frames")?,
            _library: library,
        })
    }
}

/// Turns a bare library name into the platform file name
/// (`Blink_SDK_C` -> `Blink_SDK_C.dll` / `libBlink_SDK_C.so`).
/// Anything that already looks like a path is used as-is.
pub fn resolve_library_path(name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.extension().is_some() || path.components().count() > 1 {
        path.to_path_buf()
    } else {
        PathBuf::from(libloading::library_filename(name))
    }
}

/// `Create_SDK` arguments in their C representation.
#[derive(Debug, PartialEq)]
pub struct RawCreateArgs {
    pub bit_depth: c_uint,
    pub resolution: c_uint,
    pub is_nematic_type: c_int,
    pub ram_write_enable: c_int,
    pub use_gpu: c_int,
    pub max_transients: c_int,
    pub regional_lut: CString,
}

impl RawCreateArgs {
    pub fn marshal(params: &CreateParams) -> Result<Self, SlmError> {
        params.validate()?;
        let max_transients = c_int::try_from(params.max_transients).map_err(|_| {
            SlmError::InvalidParameter(format!(
                "max transients {} does not fit a C int",
                params.max_transients
            ))
        })?;
        Ok(Self {
            bit_depth: params.bit_depth,
            resolution: params.resolution,
            is_nematic_type: c_int::from(params.is_nematic_type),
            ram_write_enable: c_int::from(params.ram_write_enable),
            use_gpu: c_int::from(params.use_gpu),
            max_transients,
            regional_lut: c_path(&params.regional_lut)?,
        })
    }
}

fn c_path(path: &Path) -> Result<CString, SlmError> {
    CString::new(path.to_string_lossy().into_owned()).map_err(|_| {
        SlmError::InvalidParameter(format!("path {} contains a NUL byte", path.display()))
    })
}

fn c_message(message: *const c_char) -> String {
    if message.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}

/// The loaded vendor library.
#[derive(Clone)]
pub struct BlinkLibrary {
    api: Arc<BlinkApi>,
    path: PathBuf,
}

impl BlinkLibrary {
    pub fn open(name: &str) -> Result<Self, SlmError> {
        let path = resolve_library_path(name);
        debug!("Loading {}", path.display());
        let library = unsafe { Library::new(&path) }.map_err(|source| SlmError::Library {
            path: path.clone(),
            source,
        })?;
        let api = unsafe { BlinkApi::bind(library) }?;
        Ok(Self {
            api: Arc::new(api),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SdkFactory for BlinkLibrary {
    type Handle = BlinkSdk;

    fn create(&self, params: &CreateParams) -> Result<Construction<BlinkSdk>, SlmError> {
        let args = RawCreateArgs::marshal(params)?;
        let mut boards_found: c_uint = 0;
        let mut constructed_ok: c_int = 0;
        let handle = unsafe {
            (self.api.create_sdk)(
                args.bit_depth,
                args.resolution,
                &mut boards_found,
                &mut constructed_ok,
                args.is_nematic_type,
                args.ram_write_enable,
                args.use_gpu,
                args.max_transients,
                args.regional_lut.as_ptr() as *mut c_char,
            )
        };
        Ok(Construction {
            handle: BlinkSdk {
                api: Arc::clone(&self.api),
                handle,
                resolution: params.resolution,
                frame_len: params.frame_len(),
                transient_lens: Vec::new(),
                rejected: None,
            },
            boards_found,
            constructed_ok: constructed_ok != 0,
        })
    }
}

/// An SDK handle obtained from `Create_SDK`. Released on drop.
///
/// The SDK takes buffers as bare pointers and reads or writes as many bytes as
/// it expects, so every buffer is checked against the frame size or a
/// reported transient byte count before it is handed over. A rejected buffer
/// makes the call return `false` without reaching the SDK, and
/// `last_error_message` then describes the rejection.
pub struct BlinkSdk {
    api: Arc<BlinkApi>,
    handle: *mut c_void,
    resolution: u32,
    frame_len: usize,
    /// Byte counts reported by `Calculate_transient_frames`, oldest first.
    transient_lens: Vec<usize>,
    rejected: Option<String>,
}

impl BlinkSdk {
    fn reject(&mut self, message: String) -> bool {
        error!("{message}");
        self.rejected = Some(message);
        false
    }

    fn accept(&mut self) -> bool {
        self.rejected = None;
        true
    }

    fn full_frame(&mut self, call: SdkCall, len: usize) -> bool {
        if len == self.frame_len {
            return self.accept();
        }
        self.reject(format!(
            "{call}: buffer holds {len} bytes, a {res}x{res} frame needs {}",
            self.frame_len,
            res = self.resolution
        ))
    }

    fn checked_path(&mut self, path: &Path) -> Option<CString> {
        match c_path(path) {
            Ok(path) => {
                self.accept();
                Some(path)
            }
            Err(e) => {
                self.reject(e.to_string());
                None
            }
        }
    }
}

impl SdkHandle for BlinkSdk {
    fn last_error_message(&self) -> String {
        if let Some(message) = &self.rejected {
            return message.clone();
        }
        c_message(unsafe { (self.api.get_last_error_message)(self.handle) })
    }

    fn version_info(&self) -> String {
        c_message(unsafe { (self.api.get_version_info)(self.handle) })
    }

    fn is_transient_constructed(&self) -> bool {
        unsafe { (self.api.is_slm_transient_constructed)(self.handle) != 0 }
    }

    fn set_true_frames(&mut self, true_frames: i32) {
        unsafe { (self.api.set_true_frames)(self.handle, true_frames) }
    }

    fn write_cal_buffer(&mut self, board: i32, buffer: &[u8]) -> bool {
        if !self.full_frame(SdkCall::WriteCalBuffer, buffer.len()) {
            return false;
        }
        unsafe { (self.api.write_cal_buffer)(self.handle, board, buffer.as_ptr()) }
    }

    fn load_linear_lut(&mut self, board: i32) -> bool {
        self.accept();
        unsafe { (self.api.load_linear_lut)(self.handle, board) != 0 }
    }

    fn load_lut_file(&mut self, board: i32, path: &Path) -> bool {
        let Some(path) = self.checked_path(path) else {
            return false;
        };
        unsafe { (self.api.load_lut_file)(self.handle, board, path.as_ptr() as *mut c_char) != 0 }
    }

    fn load_overdrive_lut_file(&mut self, path: &Path) -> bool {
        let Some(path) = self.checked_path(path) else {
            return false;
        };
        unsafe { (self.api.load_overdrive_lut_file)(self.handle, path.as_ptr() as *mut c_char) != 0 }
    }

    fn compute_tf(&mut self, frame_rate: f32) -> bool {
        self.accept();
        unsafe { (self.api.compute_tf)(self.handle, frame_rate) != 0 }
    }

    fn slm_power(&mut self, on: bool) {
        unsafe { (self.api.slm_power)(self.handle, c_int::from(on)) }
    }

    // The SDK takes phase data through non-const pointers but only reads it.
    fn write_overdrive_image(&mut self, board: i32, image: &[u8], trigger: Trigger) -> bool {
        if !self.full_frame(SdkCall::WriteOverdriveImage, image.len()) {
            return false;
        }
        unsafe {
            (self.api.write_overdrive_image)(
                self.handle,
                board,
                image.as_ptr() as *mut c_uchar,
                c_int::from(trigger.wait_for_trigger),
                c_int::from(trigger.external_pulse),
            ) != 0
        }
    }

    fn write_image(&mut self, board: i32, image: &[u8], trigger: Trigger) -> bool {
        if !self.full_frame(SdkCall::WriteImage, image.len()) {
            return false;
        }
        unsafe {
            (self.api.write_image)(
                self.handle,
                board,
                image.as_ptr() as *mut c_uchar,
                self.resolution,
                c_int::from(trigger.wait_for_trigger),
                c_int::from(trigger.external_pulse),
            ) != 0
        }
    }

    fn calculate_transient_frames(&mut self, target: &[u8]) -> Option<u32> {
        if !self.full_frame(SdkCall::CalculateTransientFrames, target.len()) {
            return None;
        }
        let mut byte_count: c_uint = 0;
        let ok = unsafe {
            (self.api.calculate_transient_frames)(
                self.handle,
                target.as_ptr() as *mut c_uchar,
                &mut byte_count,
            ) != 0
        };
        if ok {
            self.transient_lens.push(byte_count as usize);
        }
        ok.then_some(byte_count)
    }

    /// Fills `buffer` with the sequence from the last calculation.
    fn retrieve_transient_frames(&mut self, buffer: &mut [u8]) -> bool {
        let Some(&needed) = self.transient_lens.last() else {
            return self.reject(format!(
                "{}: no transient sequence has been calculated",
                SdkCall::RetrieveTransientFrames
            ));
        };
        if buffer.len() < needed {
            return self.reject(format!(
                "{}: buffer holds {} bytes, the sequence needs {needed}",
                SdkCall::RetrieveTransientFrames,
                buffer.len()
            ));
        }
        self.accept();
        unsafe { (self.api.retrieve_transient_frames)(self.handle, buffer.as_mut_ptr()) != 0 }
    }

    fn write_transient_frames(&mut self, board: i32, frames: &[u8], trigger: Trigger) -> bool {
        if !self.transient_lens.contains(&frames.len()) {
            return self.reject(format!(
                "{}: {} bytes do not match any calculated transient sequence",
                SdkCall::WriteTransientFrames,
                frames.len()
            ));
        }
        self.accept();
        unsafe {
            (self.api.write_transient_frames)(
                self.handle,
                board,
                frames.as_ptr() as *mut c_uchar,
                c_int::from(trigger.wait_for_trigger),
                c_int::from(trigger.external_pulse),
            ) != 0
        }
    }
}

impl Drop for BlinkSdk {
    fn drop(&mut self) {
        if self.handle.is_null() {
            debug!("Create_SDK returned a null handle, nothing to release");
            return;
        }
        unsafe { (self.api.delete_sdk)(self.handle) };
        self.handle = ptr::null_mut();
        debug!("Blink SDK handle released");
    }
}
