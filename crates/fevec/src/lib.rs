//! fevec: backend-pluggable numeric vectors with host/device cache coherence.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all fevec sub-crates. For most users, adding `fevec` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use fevec::prelude::*;
//!
//! // An accelerator context on the emulated device.
//! let ctx = Context::init("/gpu/sim").unwrap();
//!
//! let v = ctx.vector_from_slice(&[1.0, -5.0, 3.0, 4.0]).unwrap();
//! assert_eq!(v.state(), CoherenceState::HostSynced);
//!
//! // Norms run on the device, so the data is copied over first.
//! assert_eq!(v.norm(NormType::One).unwrap(), 13.0);
//! assert_eq!(v.state(), CoherenceState::BothSynced);
//!
//! // `Max` is |x[i]| at the largest signed value, not the largest |x|.
//! assert_eq!(v.norm(NormType::Max).unwrap(), 4.0);
//!
//! v.reciprocal().unwrap();
//! assert_eq!(v.to_vec().unwrap(), vec![1.0, -0.2, 1.0 / 3.0, 0.25]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `fevec-core` | Scalars, memory spaces, errors, coherence states, host kernels |
//! | [`device`] | `fevec-device` | Device runtime trait, pointers, emulated device |
//! | [`vector`] | `fevec-vector` | Contexts, backends, vectors, access guards |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, errors, and the coherence state machine (`fevec-core`).
pub use fevec_core as types;

/// Device memory runtimes (`fevec-device`).
///
/// Implement [`device::DeviceRuntime`] to plug in a new accelerator;
/// [`device::SimDevice`] is the in-process reference.
pub use fevec_device as device;

/// Vectors, contexts, and backends (`fevec-vector`).
///
/// The [`vector::Backend`] trait is the extension point for new backends.
pub use fevec_vector as vector;

/// Common imports for typical fevec usage.
///
/// ```rust
/// use fevec::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use fevec_core::{CoherenceState, CopyMode, MemType, NormType, Scalar, VectorError};

    // Device
    pub use fevec_device::{DeviceConfig, DevicePtr, DeviceRuntime, SimDevice};

    // Vectors
    pub use fevec_vector::{AcceleratorBackend, Array, Backend, Context, HostBackend, Vector};
}
