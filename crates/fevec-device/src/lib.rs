//! Device memory primitives for fevec.
//!
//! A [`DeviceRuntime`] is the accelerator side of a backend: allocate, free,
//! copy across the host/device boundary, and run the handful of kernels a
//! vector needs. Device memory is addressed by opaque [`DevicePtr`] handles
//! and is never dereferenced from the host.
//!
//! [`SimDevice`] is an in-process runtime with its own address space. It
//! backs the `/gpu/sim` resource and the test suite, and enforces a byte
//! capacity so allocation failures can be exercised.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod ptr;
pub mod runtime;
pub mod sim;

pub use config::DeviceConfig;
pub use ptr::DevicePtr;
pub use runtime::DeviceRuntime;
pub use sim::SimDevice;
