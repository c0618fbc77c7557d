use zvec_error::{ErrorCodes, ZvecError};

#[derive(Debug, thiserror::Error)]
pub enum SparseError {
    #[error("segment id went backwards at input index {index}: {prev} -> {current}")]
    OutOfOrderSegment {
        index: usize,
        prev: u32,
        current: u32,
    },
    #[error("buffer too short to hold a valid sparse vector header")]
    TruncatedHeader,
    #[error("buffer too short for the segment/index/value arrays it declares")]
    TruncatedBody,
}

impl ZvecError for SparseError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}
