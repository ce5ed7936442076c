//! Open-loop streaming of two alternating phase images.

use crate::{Counter, PhaseImage, SdkCall, SdkHandle, Session, SlmError, Trigger};
use clap::ValueEnum;
use log::{debug, info, warn};
use serde::Deserialize;
use std::{thread, time::Duration};

/// How frames reach the controller.
#[derive(Deserialize, ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// `Write_overdrive_image`, transients computed on every write.
    Overdrive,
    /// `Write_image`, no OverDrive compensation.
    Plain,
    /// Transient sequences for A->B and B->A computed once up front.
    Precalculated,
}

/// What a failed frame write does to the loop.
#[derive(Deserialize, ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop at the first failed write.
    Abort,
    /// Log the vendor message, count it and keep going.
    Continue,
}

/// Blocking pause between frames.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Pauses with `thread::sleep`; accuracy is whatever the host scheduler gives.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SequencePlan {
    pub cycles: u32,
    pub pause: Duration,
    pub mode: WriteMode,
    pub trigger: Trigger,
    /// Log progress every this many cycles; 0 disables it.
    pub progress_interval: u32,
    pub on_error: ErrorPolicy,
}

impl Default for SequencePlan {
    fn default() -> Self {
        Self {
            cycles: 1000,
            pause: Duration::from_millis(25),
            mode: WriteMode::Overdrive,
            trigger: Trigger::default(),
            progress_interval: 50,
            on_error: ErrorPolicy::Abort,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreamReport {
    pub cycles: u32,
    pub frames_written: u64,
    pub failed_writes: u64,
    pub elapsed: Duration,
    /// Successful writes per second over the whole run.
    pub mean_frame_rate: f64,
}

impl StreamReport {
    pub fn mean_cycle_period(&self) -> Option<Duration> {
        (self.cycles > 0).then(|| self.elapsed / self.cycles)
    }
}

enum Frames<'a> {
    Images { a: &'a [u8], b: &'a [u8] },
    /// `to_a` drives the SLM from B to A, `to_b` from A to B.
    Transients { to_a: Vec<u8>, to_b: Vec<u8> },
}

/// Writes A, pause, B, pause for `plan.cycles` cycles.
pub fn stream<H, P>(
    session: &mut Session<H>,
    plan: &SequencePlan,
    image_a: &PhaseImage,
    image_b: &PhaseImage,
    pacer: &mut P,
) -> Result<StreamReport, SlmError>
where
    H: SdkHandle,
    P: Pacer,
{
    image_a.check_resolution(session.resolution())?;
    image_b.check_resolution(session.resolution())?;

    let frames = match plan.mode {
        WriteMode::Precalculated => precalculate(session, plan.trigger, image_a, image_b)?,
        WriteMode::Overdrive | WriteMode::Plain => Frames::Images {
            a: image_a.as_bytes(),
            b: image_b.as_bytes(),
        },
    };

    info!(
        "Streaming {} cycles ({:?} mode, {:?} between frames)",
        plan.cycles, plan.mode, plan.pause
    );

    let mut counter = Counter::new();
    let mut cycles = 0;
    for cycle in 1..=plan.cycles {
        write_frame(session, plan, &frames, Target::A, &mut counter)?;
        pacer.pause(plan.pause);
        write_frame(session, plan, &frames, Target::B, &mut counter)?;
        pacer.pause(plan.pause);
        cycles = cycle;

        if plan.progress_interval > 0 && cycle % plan.progress_interval == 0 {
            info!(
                "Completed cycles: {cycle} ({:.1} frames/s)",
                counter.rate()
            );
        }
    }

    let report = StreamReport {
        cycles,
        frames_written: counter.n_frames,
        failed_writes: counter.n_failed,
        elapsed: counter.t_begin.elapsed(),
        mean_frame_rate: counter.average_rate(),
    };
    debug!("{report:?}");
    Ok(report)
}

#[derive(Clone, Copy, Debug)]
enum Target {
    A,
    B,
}

fn write_frame<H: SdkHandle>(
    session: &mut Session<H>,
    plan: &SequencePlan,
    frames: &Frames<'_>,
    target: Target,
    counter: &mut Counter,
) -> Result<(), SlmError> {
    let board = session.board();
    let (ok, call) = match frames {
        Frames::Images { a, b } => {
            let image = match target {
                Target::A => *a,
                Target::B => *b,
            };
            match plan.mode {
                WriteMode::Plain => (
                    session.handle_mut().write_image(board, image, plan.trigger),
                    SdkCall::WriteImage,
                ),
                _ => (
                    session
                        .handle_mut()
                        .write_overdrive_image(board, image, plan.trigger),
                    SdkCall::WriteOverdriveImage,
                ),
            }
        }
        Frames::Transients { to_a, to_b } => {
            let frames = match target {
                Target::A => to_a,
                Target::B => to_b,
            };
            (
                session
                    .handle_mut()
                    .write_transient_frames(board, frames, plan.trigger),
                SdkCall::WriteTransientFrames,
            )
        }
    };

    if ok {
        counter.increment();
        return Ok(());
    }

    counter.fail();
    let message = session.last_error();
    match plan.on_error {
        ErrorPolicy::Abort => Err(SlmError::Call { call, message }),
        ErrorPolicy::Continue => {
            warn!("{call} failed for image {target:?}: {message}");
            Ok(())
        }
    }
}

/// Puts the SLM into one state, asks for the transient sequence to the
/// other, and repeats the other way round. Leaves the SLM showing B.
fn precalculate<'a, H: SdkHandle>(
    session: &mut Session<H>,
    trigger: Trigger,
    image_a: &PhaseImage,
    image_b: &PhaseImage,
) -> Result<Frames<'a>, SlmError> {
    let to_b = transient(session, trigger, image_a, image_b)?;
    let to_a = transient(session, trigger, image_b, image_a)?;
    debug!(
        "Precalculated transients: {} bytes to A, {} bytes to B",
        to_a.len(),
        to_b.len()
    );
    Ok(Frames::Transients { to_a, to_b })
}

fn transient<H: SdkHandle>(
    session: &mut Session<H>,
    trigger: Trigger,
    from: &PhaseImage,
    to: &PhaseImage,
) -> Result<Vec<u8>, SlmError> {
    let board = session.board();
    let ok = session
        .handle_mut()
        .write_overdrive_image(board, from.as_bytes(), trigger);
    session.check(ok, SdkCall::WriteOverdriveImage)?;

    let Some(byte_count) = session
        .handle_mut()
        .calculate_transient_frames(to.as_bytes())
    else {
        return Err(SlmError::Call {
            call: SdkCall::CalculateTransientFrames,
            message: session.last_error(),
        });
    };
    if byte_count == 0 {
        return Err(SlmError::EmptyTransient);
    }

    let mut frames = vec![0u8; byte_count as usize];
    let ok = session.handle_mut().retrieve_transient_frames(&mut frames);
    session.check(ok, SdkCall::RetrieveTransientFrames)?;
    Ok(frames)
}
