use crate::{
    stream, CreateParams, DeviceSetup, ImageSet, Pacer, SdkFactory, SequencePlan, Session,
    SlmError, StreamReport,
};
use log::{info, warn};

/// The whole demo: construct, configure, stream. The handle is released
/// when the session goes out of scope, whichever way this returns.
pub fn run<F, P>(
    factory: &F,
    params: &CreateParams,
    setup: &DeviceSetup,
    plan: &SequencePlan,
    images: &ImageSet,
    pacer: &mut P,
) -> Result<StreamReport, SlmError>
where
    F: SdkFactory,
    P: Pacer,
{
    let mut session = Session::open(factory, params)?;
    info!("SDK version: {}", session.version_info());
    if session.boards_found() == 0 {
        warn!("No SLM controllers reported by the SDK");
    }
    if !session.is_transient_constructed() {
        warn!("OverDrive transient engine was not constructed");
    }

    session.configure(setup, &images.calibration)?;
    stream(&mut session, plan, &images.ramp_a, &images.ramp_b, pacer)
}
