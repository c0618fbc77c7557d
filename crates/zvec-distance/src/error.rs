use zvec_error::{ErrorCodes, ZvecError};

#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    #[error("dim {dim} is not a multiple of {required} for this element type")]
    BadAlignment { dim: usize, required: usize },
    #[error("output buffer has length {actual}, expected at least {expected}")]
    OutputTooSmall { actual: usize, expected: usize },
}

impl ZvecError for DistanceError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}
