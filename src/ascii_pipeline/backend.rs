//! Compute backend module
//!
//! The backend abstraction the pipeline runs against: buffer
//! allocation and transfer plus blocking dispatch of the four
//! elementary operations. Two CPU implementations ship by default, a
//! strictly sequential reference and a rayon work-item pool; a CUDA
//! device backend is available behind the `cuda` feature.

pub mod compute;
pub mod parallel;
pub mod pool;
pub mod reference;
pub mod scratch;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use compute::{BufferId, ComputeBackend, Operation, WorkShape};
pub use parallel::ParallelBackend;
pub use reference::ReferenceBackend;
pub use scratch::ScratchBuffers;

#[cfg(feature = "cuda")]
pub use cuda::CudaBackend;
