//! Drive a Meadowlark Optics spatial light modulator through the vendor's
//! closed `Blink_SDK_C` library: construct the SDK, upload calibration and
//! LUT data, then stream two alternating phase images.

pub mod blink;
pub mod config;
pub mod error;
pub mod logger;
pub mod phase;
pub mod runner;
pub mod sdk;
pub mod sequence;
pub mod session;
pub mod utils;

#[cfg(test)]
mod testing;

pub use blink::*;
pub use config::*;
pub use error::*;
pub use phase::*;
pub use runner::*;
pub use sdk::*;
pub use sequence::*;
pub use session::*;
pub use utils::*;
