use crate::{
    non_empty_message, Construction, CreateParams, PhaseImage, SdkCall, SdkFactory, SdkHandle,
    SlmError,
};
use log::{debug, error, info};
use std::path::PathBuf;

/// Lookup table uploaded to the controller before streaming.
#[derive(Clone, Debug, PartialEq)]
pub enum LutSource {
    /// Identity LUT; required for OverDrive Plus.
    Linear,
    File(PathBuf),
}

/// Per-device settings applied after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSetup {
    pub board: i32,
    pub true_frames: i32,
    pub lut: LutSource,
    pub overdrive_lut: Option<PathBuf>,
    pub frame_rate: Option<f32>,
}

impl Default for DeviceSetup {
    fn default() -> Self {
        Self {
            board: 1,
            true_frames: 3,
            lut: LutSource::Linear,
            overdrive_lut: None,
            frame_rate: None,
        }
    }
}

/// One constructed Blink SDK instance.
///
/// Dropping the session powers the SLM off if it was powered on here, then
/// the handle itself is released.
pub struct Session<H: SdkHandle> {
    handle: H,
    boards_found: u32,
    resolution: u32,
    board: i32,
    powered: bool,
}

impl<H: SdkHandle> Session<H> {
    pub fn open<F>(factory: &F, params: &CreateParams) -> Result<Self, SlmError>
    where
        F: SdkFactory<Handle = H>,
    {
        params.validate()?;
        let Construction {
            handle,
            boards_found,
            constructed_ok,
        } = factory.create(params)?;

        if !constructed_ok {
            error!("Blink SDK was not successfully constructed");
            let message = non_empty_message(handle.last_error_message());
            error!("{message}");
            drop(handle);
            return Err(SlmError::Construction { message });
        }

        info!("Blink SDK was successfully constructed");
        info!("Found {boards_found} SLM controller(s)");

        Ok(Self {
            handle,
            boards_found,
            resolution: params.resolution,
            board: 1,
            powered: false,
        })
    }

    pub fn boards_found(&self) -> u32 {
        self.boards_found
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Board that image writes target, set by [`Session::configure`].
    pub fn board(&self) -> i32 {
        self.board
    }

    pub fn version_info(&self) -> String {
        self.handle.version_info()
    }

    pub fn is_transient_constructed(&self) -> bool {
        self.handle.is_transient_constructed()
    }

    /// Vendor message for the most recent failure, never empty.
    pub fn last_error(&self) -> String {
        non_empty_message(self.handle.last_error_message())
    }

    pub(crate) fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    /// Turns a vendor status into a result carrying the vendor message.
    pub fn check(&self, ok: bool, call: SdkCall) -> Result<(), SlmError> {
        if ok {
            Ok(())
        } else {
            Err(SlmError::Call {
                call,
                message: self.last_error(),
            })
        }
    }

    /// Sets true frames, uploads the calibration buffer and LUT, then powers
    /// the SLM on.
    pub fn configure(
        &mut self,
        setup: &DeviceSetup,
        calibration: &PhaseImage,
    ) -> Result<(), SlmError> {
        calibration.check_resolution(self.resolution)?;
        self.board = setup.board;

        self.handle.set_true_frames(setup.true_frames);
        debug!("True frames set to {}", setup.true_frames);

        let ok = self
            .handle
            .write_cal_buffer(setup.board, calibration.as_bytes());
        self.check(ok, SdkCall::WriteCalBuffer)?;

        match &setup.lut {
            LutSource::Linear => {
                let ok = self.handle.load_linear_lut(setup.board);
                self.check(ok, SdkCall::LoadLinearLut)?;
            }
            LutSource::File(path) => {
                info!("Loading LUT {}", path.display());
                let ok = self.handle.load_lut_file(setup.board, path);
                self.check(ok, SdkCall::LoadLutFile)?;
            }
        }

        if let Some(path) = &setup.overdrive_lut {
            info!("Loading OverDrive LUT {}", path.display());
            let ok = self.handle.load_overdrive_lut_file(path);
            self.check(ok, SdkCall::LoadOverdriveLutFile)?;
        }

        if let Some(rate) = setup.frame_rate {
            let ok = self.handle.compute_tf(rate);
            self.check(ok, SdkCall::ComputeTf)?;
            debug!("Transient frames computed for {rate} Hz");
        }

        self.power(true);
        Ok(())
    }

    pub fn power(&mut self, on: bool) {
        self.handle.slm_power(on);
        self.powered = on;
        info!("SLM power {}", if on { "on" } else { "off" });
    }
}

impl<H: SdkHandle> Drop for Session<H> {
    fn drop(&mut self) {
        if self.powered {
            self.power(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockFactory};

    fn params(resolution: u32) -> CreateParams {
        CreateParams {
            bit_depth: 8,
            resolution,
            is_nematic_type: true,
            ram_write_enable: true,
            use_gpu: true,
            max_transients: 20,
            regional_lut: PathBuf::from("SLM_lut.txt"),
        }
    }

    #[test]
    fn constructor_receives_configured_params() {
        let factory = MockFactory::new();
        let session = Session::open(&factory, &params(16)).unwrap();
        assert_eq!(session.boards_found(), 1);
        drop(session);

        assert_eq!(factory.calls()[0], Call::Create(params(16)));
    }

    #[test]
    fn failed_construction_reads_error_then_releases() {
        let factory = MockFactory::new()
            .constructed_ok(false)
            .error_message("no PCIe board");

        let err = Session::open(&factory, &params(16)).err().unwrap();
        match err {
            SlmError::Construction { message } => assert_eq!(message, "no PCIe board"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            factory.calls(),
            vec![Call::Create(params(16)), Call::LastError, Call::Delete]
        );
    }

    #[test]
    fn failed_construction_never_surfaces_empty_message() {
        let factory = MockFactory::new().constructed_ok(false).error_message("");
        match Session::open(&factory, &params(16)) {
            Err(SlmError::Construction { message }) => assert!(!message.is_empty()),
            _ => panic!("expected construction failure"),
        }
        assert_eq!(factory.count(|c| *c == Call::Delete), 1);
    }

    #[test]
    fn invalid_params_never_reach_the_sdk() {
        let factory = MockFactory::new();
        let mut bad = params(16);
        bad.bit_depth = 0;
        assert!(Session::open(&factory, &bad).is_err());
        assert!(factory.calls().is_empty());
    }

    #[test]
    fn configure_uploads_in_order_and_powers_on() {
        let factory = MockFactory::new();
        let cal = PhaseImage::filled(16, 255);
        {
            let mut session = Session::open(&factory, &params(16)).unwrap();
            session.configure(&DeviceSetup::default(), &cal).unwrap();
        }

        assert_eq!(
            factory.calls(),
            vec![
                Call::Create(params(16)),
                Call::SetTrueFrames(3),
                Call::WriteCalBuffer(1, cal.as_bytes().to_vec()),
                Call::LoadLinearLut(1),
                Call::SlmPower(true),
                Call::SlmPower(false),
                Call::Delete,
            ]
        );
    }

    #[test]
    fn configure_with_lut_files_and_frame_rate() {
        let factory = MockFactory::new();
        let setup = DeviceSetup {
            board: 2,
            true_frames: 5,
            lut: LutSource::File(PathBuf::from("slm.lut")),
            overdrive_lut: Some(PathBuf::from("slm3260_regional.txt")),
            frame_rate: Some(400.0),
        };
        let mut session = Session::open(&factory, &params(8)).unwrap();
        session
            .configure(&setup, &PhaseImage::filled(8, 255))
            .unwrap();
        assert_eq!(session.board(), 2);
        drop(session);

        let calls = factory.calls();
        assert!(calls.contains(&Call::LoadLutFile(2, PathBuf::from("slm.lut"))));
        assert!(calls.contains(&Call::LoadOverdriveLutFile(PathBuf::from(
            "slm3260_regional.txt"
        ))));
        assert!(calls.contains(&Call::ComputeTf(400.0)));
        assert!(!calls.contains(&Call::LoadLinearLut(2)));
    }

    #[test]
    fn setup_failure_carries_vendor_message_and_still_releases() {
        let factory = MockFactory::new()
            .fail(SdkCall::LoadLinearLut)
            .error_message("LUT rejected");
        {
            let mut session = Session::open(&factory, &params(8)).unwrap();
            let err = session
                .configure(&DeviceSetup::default(), &PhaseImage::filled(8, 255))
                .unwrap_err();
            match err {
                SlmError::Call { call, message } => {
                    assert_eq!(call, SdkCall::LoadLinearLut);
                    assert_eq!(message, "LUT rejected");
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
        assert!(!factory.calls().contains(&Call::SlmPower(true)));
        assert_eq!(factory.calls().last(), Some(&Call::Delete));
    }

    #[test]
    fn calibration_must_match_resolution() {
        let factory = MockFactory::new();
        let mut session = Session::open(&factory, &params(16)).unwrap();
        let err = session
            .configure(&DeviceSetup::default(), &PhaseImage::filled(8, 255))
            .unwrap_err();
        assert!(matches!(err, SlmError::ImageSize { .. }));
    }

    #[test]
    fn release_happens_once_on_panic() {
        let factory = MockFactory::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = Session::open(&factory, &params(8)).unwrap();
            panic!("operator abort");
        }));
        assert!(result.is_err());
        assert_eq!(factory.count(|c| *c == Call::Delete), 1);
    }
}
