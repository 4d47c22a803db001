//! In-process emulated accelerator.
//!
//! [`SimDevice`] keeps every allocation in its own buffer inside a private
//! heap, so device memory lives in a separate address space from the
//! vectors that use it: the only way in or out is through the
//! [`DeviceRuntime`] copy calls. Kernels run the host routines from
//! [`fevec_core::kernels`] against those buffers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use fevec_core::{kernels, MemType, Scalar, VectorError};
use indexmap::IndexMap;

use crate::config::DeviceConfig;
use crate::ptr::DevicePtr;
use crate::runtime::DeviceRuntime;

const SCALAR_BYTES: usize = std::mem::size_of::<Scalar>();

/// The device's private heap.
struct SimHeap {
    /// Live allocations keyed by handle id.
    buffers: IndexMap<u64, Vec<Scalar>>,
    /// Next id to hand out. Ids are never reused.
    next_id: u64,
    /// Bytes held by live allocations.
    used_bytes: usize,
}

impl SimHeap {
    fn buffer(&self, ptr: DevicePtr, len: usize) -> Result<&[Scalar], VectorError> {
        let buf = self
            .buffers
            .get(&ptr.id())
            .ok_or_else(|| VectorError::device(format!("invalid device pointer {ptr}")))?;
        buf.get(..len).ok_or_else(|| {
            VectorError::device(format!(
                "access of {len} elements exceeds allocation of {}",
                buf.len()
            ))
        })
    }

    fn buffer_mut(&mut self, ptr: DevicePtr, len: usize) -> Result<&mut [Scalar], VectorError> {
        let buf = self
            .buffers
            .get_mut(&ptr.id())
            .ok_or_else(|| VectorError::device(format!("invalid device pointer {ptr}")))?;
        let available = buf.len();
        buf.get_mut(..len).ok_or_else(|| {
            VectorError::device(format!(
                "access of {len} elements exceeds allocation of {available}"
            ))
        })
    }
}

/// An emulated accelerator with a fixed memory capacity.
///
/// Thread-safe: the heap sits behind a `Mutex`, so one device can be
/// shared by many vectors through an `Arc`.
pub struct SimDevice {
    config: DeviceConfig,
    heap: Mutex<SimHeap>,
    /// One-shot fault armed by [`SimDevice::inject_failure`].
    fault: AtomicBool,
}

impl SimDevice {
    /// Create a device from a validated config.
    pub fn new(config: DeviceConfig) -> Result<Self, VectorError> {
        config.validate()?;
        tracing::debug!(
            label = %config.label,
            capacity_bytes = config.capacity_bytes,
            "sim device created"
        );
        Ok(Self {
            config,
            heap: Mutex::new(SimHeap {
                buffers: IndexMap::new(),
                next_id: 1,
                used_bytes: 0,
            }),
            fault: AtomicBool::new(false),
        })
    }

    /// Create a device with the given capacity and default label.
    pub fn with_capacity(capacity_bytes: usize) -> Result<Self, VectorError> {
        Self::new(DeviceConfig::new(capacity_bytes))
    }

    /// The device's configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Make the next runtime call fail with
    /// [`VectorError::DeviceRuntimeFailure`].
    pub fn inject_failure(&self) {
        self.fault.store(true, Ordering::SeqCst);
    }

    /// Number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.heap.lock().map_or(0, |h| h.buffers.len())
    }

    /// Bytes held by live allocations.
    pub fn used_bytes(&self) -> usize {
        self.heap.lock().map_or(0, |h| h.used_bytes)
    }

    /// Whether `ptr` names a live allocation.
    pub fn is_live(&self, ptr: DevicePtr) -> bool {
        self.heap
            .lock()
            .is_ok_and(|h| h.buffers.contains_key(&ptr.id()))
    }

    /// Lock the heap, consuming an injected fault if one is armed.
    fn heap(&self) -> Result<MutexGuard<'_, SimHeap>, VectorError> {
        if self.fault.swap(false, Ordering::SeqCst) {
            return Err(VectorError::device(format!(
                "{}: injected fault",
                self.config.label
            )));
        }
        self.heap
            .lock()
            .map_err(|_| VectorError::device(format!("{}: heap lock poisoned", self.config.label)))
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("label", &self.config.label)
            .field("capacity_bytes", &self.config.capacity_bytes)
            .field("used_bytes", &self.used_bytes())
            .finish()
    }
}

impl DeviceRuntime for SimDevice {
    fn name(&self) -> &str {
        &self.config.label
    }

    fn alloc(&self, len: usize) -> Result<DevicePtr, VectorError> {
        let mut heap = self.heap()?;
        let failure = VectorError::AllocationFailure {
            space: MemType::Device,
            requested: len.saturating_mul(SCALAR_BYTES),
        };
        let bytes = len.checked_mul(SCALAR_BYTES).ok_or(failure.clone())?;
        let in_use = heap.used_bytes.checked_add(bytes).ok_or(failure.clone())?;
        if in_use > self.config.capacity_bytes {
            return Err(failure);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| failure)?;
        buf.resize(len, 0.0);

        let id = heap.next_id;
        heap.next_id += 1;
        heap.used_bytes = in_use;
        heap.buffers.insert(id, buf);
        tracing::debug!(device = %self.config.label, id, len, "device alloc");
        Ok(DevicePtr::new(id, len))
    }

    fn free(&self, ptr: DevicePtr) -> Result<(), VectorError> {
        let mut heap = self.heap()?;
        let buf = heap.buffers.swap_remove(&ptr.id()).ok_or_else(|| {
            VectorError::device(format!("free of invalid device pointer {ptr}"))
        })?;
        heap.used_bytes -= buf.len() * SCALAR_BYTES;
        tracing::debug!(device = %self.config.label, id = ptr.id(), "device free");
        Ok(())
    }

    fn copy_to_device(&self, src: &[Scalar], dst: DevicePtr) -> Result<(), VectorError> {
        let mut heap = self.heap()?;
        heap.buffer_mut(dst, src.len())?.copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&self, src: DevicePtr, dst: &mut [Scalar]) -> Result<(), VectorError> {
        let heap = self.heap()?;
        let len = dst.len();
        dst.copy_from_slice(heap.buffer(src, len)?);
        Ok(())
    }

    fn copy_device(&self, src: DevicePtr, dst: DevicePtr, len: usize) -> Result<(), VectorError> {
        let mut heap = self.heap()?;
        let staged = heap.buffer(src, len)?.to_vec();
        heap.buffer_mut(dst, len)?.copy_from_slice(&staged);
        Ok(())
    }

    fn set_value(&self, ptr: DevicePtr, len: usize, value: Scalar) -> Result<(), VectorError> {
        let mut heap = self.heap()?;
        kernels::set_value(heap.buffer_mut(ptr, len)?, value);
        Ok(())
    }

    fn reciprocal(&self, ptr: DevicePtr, len: usize) -> Result<(), VectorError> {
        let mut heap = self.heap()?;
        kernels::reciprocal(heap.buffer_mut(ptr, len)?);
        Ok(())
    }

    fn asum(&self, ptr: DevicePtr, len: usize) -> Result<Scalar, VectorError> {
        let heap = self.heap()?;
        Ok(kernels::asum(heap.buffer(ptr, len)?))
    }

    fn nrm2(&self, ptr: DevicePtr, len: usize) -> Result<Scalar, VectorError> {
        let heap = self.heap()?;
        Ok(kernels::nrm2(heap.buffer(ptr, len)?))
    }

    fn iamax(&self, ptr: DevicePtr, len: usize) -> Result<Option<usize>, VectorError> {
        let heap = self.heap()?;
        Ok(kernels::iamax(heap.buffer(ptr, len)?))
    }

    fn read_element(&self, ptr: DevicePtr, index: usize) -> Result<Scalar, VectorError> {
        let heap = self.heap()?;
        let len = index
            .checked_add(1)
            .ok_or_else(|| VectorError::device("element index overflow"))?;
        Ok(heap.buffer(ptr, len)?[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(capacity_bytes: usize) -> SimDevice {
        SimDevice::with_capacity(capacity_bytes).unwrap()
    }

    #[test]
    fn alloc_is_zeroed_and_accounted() {
        let dev = device(1024);
        let p = dev.alloc(16).unwrap();
        assert_eq!(p.len(), 16);
        assert_eq!(dev.used_bytes(), 128);
        assert_eq!(dev.live_allocations(), 1);

        let mut out = vec![1.0; 16];
        dev.copy_to_host(p, &mut out).unwrap();
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn free_releases_capacity() {
        let dev = device(1024);
        let p = dev.alloc(100).unwrap();
        dev.free(p).unwrap();
        assert_eq!(dev.used_bytes(), 0);
        assert_eq!(dev.live_allocations(), 0);
        assert!(!dev.is_live(p));
    }

    #[test]
    fn double_free_is_an_error() {
        let dev = device(1024);
        let p = dev.alloc(4).unwrap();
        dev.free(p).unwrap();
        assert!(matches!(
            dev.free(p),
            Err(VectorError::DeviceRuntimeFailure { .. })
        ));
    }

    #[test]
    fn capacity_exceeded() {
        let dev = device(64);
        let _a = dev.alloc(8).unwrap();
        assert_eq!(
            dev.alloc(1),
            Err(VectorError::AllocationFailure {
                space: MemType::Device,
                requested: 8,
            })
        );
    }

    #[test]
    fn ids_are_not_reused() {
        let dev = device(1024);
        let a = dev.alloc(4).unwrap();
        dev.free(a).unwrap();
        let b = dev.alloc(4).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn host_device_round_trip() {
        let dev = device(1024);
        let p = dev.alloc(4).unwrap();
        dev.copy_to_device(&[1.0, 2.0, 3.0, 4.0], p).unwrap();
        let q = dev.alloc(4).unwrap();
        dev.copy_device(p, q, 4).unwrap();
        let mut out = [0.0; 4];
        dev.copy_to_host(q, &mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn out_of_range_length_fails() {
        let dev = device(1024);
        let p = dev.alloc(2).unwrap();
        assert!(matches!(
            dev.copy_to_device(&[1.0, 2.0, 3.0], p),
            Err(VectorError::DeviceRuntimeFailure { .. })
        ));
        assert!(dev.read_element(p, 2).is_err());
    }

    #[test]
    fn kernels_operate_on_prefix() {
        let dev = device(1024);
        let p = dev.alloc(5).unwrap();
        dev.copy_to_device(&[1.0, -5.0, 3.0, 4.0, 100.0], p).unwrap();
        assert_eq!(dev.asum(p, 4).unwrap(), 13.0);
        assert_eq!(dev.iamax(p, 4).unwrap(), Some(3));
        assert_eq!(dev.read_element(p, 1).unwrap(), -5.0);
        assert_eq!(dev.nrm2(p, 0).unwrap(), 0.0);
        assert_eq!(dev.iamax(p, 0).unwrap(), None);

        dev.set_value(p, 2, 4.0).unwrap();
        dev.reciprocal(p, 3).unwrap();
        let mut out = [0.0; 5];
        dev.copy_to_host(p, &mut out).unwrap();
        assert_eq!(out, [0.25, 0.25, 1.0 / 3.0, 4.0, 100.0]);
    }

    #[test]
    fn injected_fault_fails_once() {
        let dev = device(1024);
        dev.inject_failure();
        assert!(matches!(
            dev.alloc(1),
            Err(VectorError::DeviceRuntimeFailure { .. })
        ));
        assert!(dev.alloc(1).is_ok());
    }

    #[test]
    fn shared_across_threads() {
        let dev = std::sync::Arc::new(device(1 << 20));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dev = std::sync::Arc::clone(&dev);
                std::thread::spawn(move || {
                    let p = dev.alloc(64).unwrap();
                    dev.set_value(p, 64, 2.0).unwrap();
                    let sum = dev.asum(p, 64).unwrap();
                    dev.free(p).unwrap();
                    sum
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 128.0);
        }
        assert_eq!(dev.live_allocations(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn used_bytes_tracks_live_allocations(
                lens in proptest::collection::vec(0usize..64, 1..20),
                free_mask in proptest::collection::vec(any::<bool>(), 20),
            ) {
                let dev = device(1 << 16);
                let ptrs: Vec<_> = lens.iter().map(|&n| dev.alloc(n).unwrap()).collect();
                let mut live_bytes = 0;
                let mut live = 0;
                for (p, &free) in ptrs.iter().zip(&free_mask) {
                    if free {
                        dev.free(*p).unwrap();
                    } else {
                        live_bytes += p.len() * SCALAR_BYTES;
                        live += 1;
                    }
                }
                prop_assert_eq!(dev.used_bytes(), live_bytes);
                prop_assert_eq!(dev.live_allocations(), live);
                for (p, &free) in ptrs.iter().zip(&free_mask) {
                    prop_assert_eq!(dev.is_live(*p), !free);
                }
            }

            #[test]
            fn capacity_is_never_exceeded(
                lens in proptest::collection::vec(1usize..32, 1..40),
            ) {
                let dev = device(512);
                for n in lens {
                    if let Err(err) = dev.alloc(n) {
                        prop_assert!(
                            matches!(err, VectorError::AllocationFailure { .. }),
                            "unexpected error {}",
                            err
                        );
                    }
                    prop_assert!(dev.used_bytes() <= 512);
                }
            }
        }
    }
}
