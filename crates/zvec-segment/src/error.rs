use zvec_error::{ErrorCodes, ZvecError};

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("kernel executed without a required option: {0}")]
    MissingOption(&'static str),
    #[error("vector index not found: {0}")]
    IndexNotFound(String),
    #[error("writer schema mismatch: batch schema does not match the schema established by the first insert")]
    SchemaMismatch,
    #[error("writer already finalized, insert_batch is no longer accepted")]
    AlreadyFinalized,
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZvecError for SegmentError {
    fn code(&self) -> ErrorCodes {
        match self {
            SegmentError::MissingOption(_) => ErrorCodes::Internal,
            SegmentError::IndexNotFound(_) => ErrorCodes::NotFound,
            SegmentError::SchemaMismatch => ErrorCodes::InvalidArgument,
            SegmentError::AlreadyFinalized => ErrorCodes::FailedPrecondition,
            SegmentError::Arrow(_) | SegmentError::Parquet(_) | SegmentError::Io(_) => {
                ErrorCodes::Internal
            }
        }
    }
}
