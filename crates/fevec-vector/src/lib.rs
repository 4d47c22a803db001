//! Host/device coherent vectors for fevec.
//!
//! A [`Vector`] owns up to two copies of its data, one in host memory and
//! one in device memory, and tracks which copy is current with a
//! [`CoherenceState`](fevec_core::CoherenceState). Accesses sync the
//! requested space lazily, so data only crosses the host/device boundary
//! when a stale copy is actually used.
//!
//! # Architecture
//!
//! ```text
//! Context (resource string → Arc<dyn Backend>)
//! └── Vector<'a>
//!     ├── Arc<dyn Backend>        HostBackend | AcceleratorBackend | custom
//!     └── RefCell<Storage<'a>>
//!         ├── CoherenceState
//!         ├── HostRegion   Owned(Vec) | Borrowed(&'a mut [f64])
//!         └── DeviceRegion Owned(ptr) | Borrowed(ptr)  → Arc<dyn DeviceRuntime>
//! ```
//!
//! Backends implement the [`Backend`] trait. Its default methods are the
//! generic implementations; a backend overrides only what it runs
//! differently.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod accel;
pub mod backend;
pub mod context;
pub mod host;
pub mod region;
pub mod storage;
pub mod vector;

pub use accel::AcceleratorBackend;
pub use backend::Backend;
pub use context::Context;
pub use host::HostBackend;
pub use region::{Array, DeviceRegion, HostRegion};
pub use storage::Storage;
pub use vector::{ArrayRead, ArrayWrite, DeviceArrayRead, DeviceArrayWrite, Vector};
