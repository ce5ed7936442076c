//! Recording stand-in for the vendor library, used by unit tests.

use crate::{
    Construction, CreateParams, Pacer, SdkCall, SdkFactory, SdkHandle, SlmError, Trigger,
};
use std::{cell::RefCell, path::Path, path::PathBuf, rc::Rc, time::Duration};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Create(CreateParams),
    LastError,
    VersionInfo,
    IsTransientConstructed,
    SetTrueFrames(i32),
    WriteCalBuffer(i32, Vec<u8>),
    LoadLinearLut(i32),
    LoadLutFile(i32, PathBuf),
    LoadOverdriveLutFile(PathBuf),
    ComputeTf(f32),
    SlmPower(bool),
    WriteOverdriveImage(i32, Vec<u8>, Trigger),
    WriteImage(i32, Vec<u8>, Trigger),
    CalculateTransientFrames(Vec<u8>),
    RetrieveTransientFrames,
    WriteTransientFrames(i32, Vec<u8>, Trigger),
    Pause(Duration),
    Delete,
}

type Log = Rc<RefCell<Vec<Call>>>;

#[derive(Clone, Debug)]
struct Behaviour {
    constructed_ok: bool,
    boards: u32,
    error_message: String,
    fail: Vec<SdkCall>,
    fail_writes_from: Option<usize>,
}

pub struct MockFactory {
    log: Log,
    behaviour: Behaviour,
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            behaviour: Behaviour {
                constructed_ok: true,
                boards: 1,
                error_message: "mock error".to_string(),
                fail: Vec::new(),
                fail_writes_from: None,
            },
        }
    }

    pub fn constructed_ok(mut self, ok: bool) -> Self {
        self.behaviour.constructed_ok = ok;
        self
    }

    pub fn boards(mut self, boards: u32) -> Self {
        self.behaviour.boards = boards;
        self
    }

    pub fn error_message(mut self, message: &str) -> Self {
        self.behaviour.error_message = message.to_string();
        self
    }

    /// Every call of this kind reports failure.
    pub fn fail(mut self, call: SdkCall) -> Self {
        self.behaviour.fail.push(call);
        self
    }

    /// Frame writes fail from the `n`th one on (0-based).
    pub fn fail_writes_from(mut self, n: usize) -> Self {
        self.behaviour.fail_writes_from = Some(n);
        self
    }

    pub fn pacer(&self) -> RecordingPacer {
        RecordingPacer {
            log: Rc::clone(&self.log),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|c| pred(c)).count()
    }
}

impl SdkFactory for MockFactory {
    type Handle = MockHandle;

    fn create(&self, params: &CreateParams) -> Result<Construction<MockHandle>, SlmError> {
        self.log.borrow_mut().push(Call::Create(params.clone()));
        Ok(Construction {
            handle: MockHandle {
                log: Rc::clone(&self.log),
                behaviour: self.behaviour.clone(),
                writes: 0,
                pending: Vec::new(),
            },
            boards_found: self.behaviour.boards,
            constructed_ok: self.behaviour.constructed_ok,
        })
    }
}

pub struct MockHandle {
    log: Log,
    behaviour: Behaviour,
    writes: usize,
    pending: Vec<u8>,
}

impl MockHandle {
    fn push(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn ok(&self, call: SdkCall) -> bool {
        !self.behaviour.fail.contains(&call)
    }

    fn write_ok(&mut self, call: SdkCall) -> bool {
        let index = self.writes;
        self.writes += 1;
        self.ok(call) && self.behaviour.fail_writes_from.map_or(true, |n| index < n)
    }
}

impl SdkHandle for MockHandle {
    fn last_error_message(&self) -> String {
        self.push(Call::LastError);
        self.behaviour.error_message.clone()
    }

    fn version_info(&self) -> String {
        self.push(Call::VersionInfo);
        "mock 1.0".to_string()
    }

    fn is_transient_constructed(&self) -> bool {
        self.push(Call::IsTransientConstructed);
        true
    }

    fn set_true_frames(&mut self, true_frames: i32) {
        self.push(Call::SetTrueFrames(true_frames));
    }

    fn write_cal_buffer(&mut self, board: i32, buffer: &[u8]) -> bool {
        self.push(Call::WriteCalBuffer(board, buffer.to_vec()));
        self.ok(SdkCall::WriteCalBuffer)
    }

    fn load_linear_lut(&mut self, board: i32) -> bool {
        self.push(Call::LoadLinearLut(board));
        self.ok(SdkCall::LoadLinearLut)
    }

    fn load_lut_file(&mut self, board: i32, path: &Path) -> bool {
        self.push(Call::LoadLutFile(board, path.to_path_buf()));
        self.ok(SdkCall::LoadLutFile)
    }

    fn load_overdrive_lut_file(&mut self, path: &Path) -> bool {
        self.push(Call::LoadOverdriveLutFile(path.to_path_buf()));
        self.ok(SdkCall::LoadOverdriveLutFile)
    }

    fn compute_tf(&mut self, frame_rate: f32) -> bool {
        self.push(Call::ComputeTf(frame_rate));
        self.ok(SdkCall::ComputeTf)
    }

    fn slm_power(&mut self, on: bool) {
        self.push(Call::SlmPower(on));
    }

    fn write_overdrive_image(&mut self, board: i32, image: &[u8], trigger: Trigger) -> bool {
        self.push(Call::WriteOverdriveImage(board, image.to_vec(), trigger));
        self.write_ok(SdkCall::WriteOverdriveImage)
    }

    fn write_image(&mut self, board: i32, image: &[u8], trigger: Trigger) -> bool {
        self.push(Call::WriteImage(board, image.to_vec(), trigger));
        self.write_ok(SdkCall::WriteImage)
    }

    fn calculate_transient_frames(&mut self, target: &[u8]) -> Option<u32> {
        self.push(Call::CalculateTransientFrames(target.to_vec()));
        if !self.ok(SdkCall::CalculateTransientFrames) {
            return None;
        }
        self.pending = target.to_vec();
        Some((2 * target.len()) as u32)
    }

    /// Fills the buffer with the last calculated target, repeated.
    fn retrieve_transient_frames(&mut self, buffer: &mut [u8]) -> bool {
        self.push(Call::RetrieveTransientFrames);
        if self.pending.is_empty() {
            return false;
        }
        for (i, b) in buffer.iter_mut().enumerate() {
            *b = self.pending[i % self.pending.len()];
        }
        self.ok(SdkCall::RetrieveTransientFrames)
    }

    fn write_transient_frames(&mut self, board: i32, frames: &[u8], trigger: Trigger) -> bool {
        self.push(Call::WriteTransientFrames(board, frames.to_vec(), trigger));
        self.write_ok(SdkCall::WriteTransientFrames)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.push(Call::Delete);
    }
}

pub struct RecordingPacer {
    log: Log,
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) {
        self.log.borrow_mut().push(Call::Pause(duration));
    }
}
