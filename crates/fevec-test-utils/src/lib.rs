//! Test utilities and instrumented backends for fevec development.
//!
//! Provides a [`CountingBackend`] that records how often each operation is
//! dispatched, a [`TrueMaxBackend`] that overrides a single operation, and
//! helpers for building contexts on a capacity-limited [`SimDevice`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fevec_core::{kernels, Access, CopyMode, MemType, NormType, Scalar, VectorError};
use fevec_device::{DeviceConfig, SimDevice};
use fevec_vector::backend::generic;
use fevec_vector::{Array, Backend, Context, Storage};

/// Per-operation dispatch counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub set_array: AtomicUsize,
    pub take_array: AtomicUsize,
    pub get_array: AtomicUsize,
    pub set_value: AtomicUsize,
    pub norm: AtomicUsize,
    pub reciprocal: AtomicUsize,
    pub destroy: AtomicUsize,
}

impl CallCounts {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Forwards every operation to an inner backend and counts the calls.
#[derive(Debug)]
pub struct CountingBackend {
    inner: Arc<dyn Backend>,
    counts: Arc<CallCounts>,
}

impl CountingBackend {
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            counts: Arc::new(CallCounts::default()),
        }
    }

    /// Shared handle to the counters, readable after the backend has moved
    /// into a context.
    pub fn counts(&self) -> Arc<CallCounts> {
        Arc::clone(&self.counts)
    }
}

impl Backend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn device(&self) -> Option<Arc<dyn fevec_device::DeviceRuntime>> {
        self.inner.device()
    }

    fn set_array<'a>(
        &self,
        st: &mut Storage<'a>,
        mem: MemType,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        CallCounts::bump(&self.counts.set_array);
        self.inner.set_array(st, mem, mode, array)
    }

    fn take_array<'a>(
        &self,
        st: &mut Storage<'a>,
        mem: MemType,
    ) -> Result<Option<Array<'a>>, VectorError> {
        CallCounts::bump(&self.counts.take_array);
        self.inner.take_array(st, mem)
    }

    fn get_array(
        &self,
        st: &mut Storage<'_>,
        mem: MemType,
        access: Access,
    ) -> Result<(), VectorError> {
        CallCounts::bump(&self.counts.get_array);
        self.inner.get_array(st, mem, access)
    }

    fn set_value(&self, st: &mut Storage<'_>, value: Scalar) -> Result<(), VectorError> {
        CallCounts::bump(&self.counts.set_value);
        self.inner.set_value(st, value)
    }

    fn norm(&self, st: &mut Storage<'_>, kind: NormType) -> Result<Scalar, VectorError> {
        CallCounts::bump(&self.counts.norm);
        self.inner.norm(st, kind)
    }

    fn reciprocal(&self, st: &mut Storage<'_>) -> Result<(), VectorError> {
        CallCounts::bump(&self.counts.reciprocal);
        self.inner.reciprocal(st)
    }

    fn destroy(&self, st: &mut Storage<'_>) -> Result<(), VectorError> {
        CallCounts::bump(&self.counts.destroy);
        self.inner.destroy(st)
    }
}

/// Host backend whose `Max` norm is the largest absolute value rather than
/// the absolute value at the signed maximum. Every other operation uses the
/// generic implementation.
#[derive(Debug, Default)]
pub struct TrueMaxBackend;

impl Backend for TrueMaxBackend {
    fn name(&self) -> &str {
        "true-max"
    }

    fn norm(&self, st: &mut Storage<'_>, kind: NormType) -> Result<Scalar, VectorError> {
        if kind != NormType::Max {
            return generic::norm(st, kind);
        }
        // Syncs and validates state the same way as the generic norm.
        generic::norm(st, NormType::One)?;
        let data = st.host_slice().unwrap_or_default();
        Ok(data.iter().fold(0.0, |m: Scalar, x| m.max(x.abs())))
    }
}

/// Accelerator context on a fresh device with `capacity_bytes` of memory.
pub fn sim_context(capacity_bytes: usize) -> (Context, Arc<SimDevice>) {
    let config = DeviceConfig {
        capacity_bytes,
        label: "sim:test".to_string(),
    };
    let device = Arc::new(SimDevice::new(config).expect("valid device config"));
    (Context::accelerator(device.clone()), device)
}

/// Both the host and a simulated accelerator context, for tests that must
/// hold on every backend.
pub fn all_contexts() -> Vec<Context> {
    vec![Context::host(), sim_context(1 << 20).0]
}

/// Assert `actual` is within `tol` of `expected`.
#[track_caller]
pub fn assert_close(actual: Scalar, expected: Scalar, tol: Scalar) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual} (tol {tol})"
    );
}

/// Reference norm computed directly with the host kernels.
pub fn reference_norm(values: &[Scalar], kind: NormType) -> Scalar {
    kernels::norm(values, kind)
}
