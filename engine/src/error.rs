use thiserror::Error;
use vulkanalia::vk;

/// Errors a sample can fail with.
///
/// Unsupported extensions and features are detected once, while selecting a
/// physical device. Every other failure is a driver call that did not return
/// success, which the samples treat as unrecoverable.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("required extension `{0}` is not supported")]
    MissingExtension(String),
    #[error("required device feature `{0}` is not supported")]
    MissingFeature(&'static str),
    #[error("{operation} failed: {code}")]
    Driver {
        operation: &'static str,
        code: vk::ErrorCode,
    },
}

impl SampleError {
    /// Wraps a failed driver call, for use with `map_err`.
    pub fn driver(operation: &'static str) -> impl FnOnce(vk::ErrorCode) -> SampleError {
        move |code| SampleError::Driver { operation, code }
    }
}
