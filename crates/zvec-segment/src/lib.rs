pub mod error;
pub mod filter;
pub mod kernels;
pub mod writer;

pub use error::SegmentError;
pub use filter::{BitmapIndexFilter, EasyIndexFilter, IndexFilter, NoopIndexFilter};
pub use kernels::{
    CheckNotFilteredKernel, ComputeKernel, FetchSparseVectorKernel, FetchVectorKernel,
    KernelContext, KernelRegistry, VectorIndexer,
};
pub use writer::{ForwardWriter, IpcForwardWriter, ParquetForwardWriter};
