//! Core types and the coherence state machine for fevec.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every backend: scalar and memory-space types,
//! the error enum, the host/device coherence states with their transition
//! table, and the host numeric kernels.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod kernels;
pub mod state;
pub mod types;

pub use error::VectorError;
pub use state::{Access, CoherenceState, SyncCopy, Transition};
pub use types::{CopyMode, MemType, NormType, Scalar, EPSILON, MAX_LENGTH};
