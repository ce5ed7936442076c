use crate::SdkCall;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlmError {
    #[error("failed to load vendor library {}", .path.display())]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("vendor library has no symbol {name}")]
    Symbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Blink SDK was not successfully constructed: {message}")]
    Construction { message: String },
    #[error("{call} failed: {message}")]
    Call { call: SdkCall, message: String },
    #[error("failed to read image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image is {width}x{height}, expected {expected}x{expected}")]
    ImageSize { width: u32, height: u32, expected: u32 },
    #[error("SDK reported an empty transient frame sequence")]
    EmptyTransient,
}
