//! Per-vector memory and the coherence driver.
//!
//! [`Storage`] holds a vector's length, coherence state, and the two
//! optional memory regions. Its methods are the building blocks backends
//! compose: look up a transition, run the copy it asks for, materialize a
//! missing region, then commit the next state.

use std::sync::Arc;

use fevec_core::{Access, CoherenceState, CopyMode, MemType, Scalar, SyncCopy, VectorError};
use fevec_device::{DevicePtr, DeviceRuntime};

use crate::region::{alloc_host, Array, DeviceRegion, HostRegion};

/// Memory and coherence bookkeeping for one vector.
///
/// Regions are released exactly once: when replaced, when taken, on
/// [`release`](Storage::release), or on drop. Releasing an absent region is
/// a no-op.
pub struct Storage<'a> {
    len: usize,
    state: CoherenceState,
    host: Option<HostRegion<'a>>,
    device: Option<DeviceRegion>,
    /// `None` for backends without a device memory space.
    runtime: Option<Arc<dyn DeviceRuntime>>,
}

impl<'a> Storage<'a> {
    /// Create empty storage for `len` elements. No memory is allocated.
    pub fn new(len: usize, runtime: Option<Arc<dyn DeviceRuntime>>) -> Self {
        Self {
            len,
            state: CoherenceState::NoAuthority,
            host: None,
            device: None,
            runtime,
        }
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current coherence state.
    pub fn state(&self) -> CoherenceState {
        self.state
    }

    /// Overwrite the coherence state.
    ///
    /// For backends whose kernels write a space directly; the caller is
    /// responsible for the region contents matching the new state.
    pub fn set_state(&mut self, state: CoherenceState) {
        tracing::trace!(from = %self.state, to = %state, "coherence state set");
        self.state = state;
    }

    /// The host region, if attached.
    pub fn host(&self) -> Option<&HostRegion<'a>> {
        self.host.as_ref()
    }

    /// The device region, if attached.
    pub fn device(&self) -> Option<&DeviceRegion> {
        self.device.as_ref()
    }

    /// The first `len` host elements, if a host region is attached.
    pub fn host_slice(&self) -> Option<&[Scalar]> {
        let len = self.len;
        self.host.as_ref().map(|r| &r.as_slice()[..len])
    }

    /// The first `len` host elements, mutably.
    pub fn host_slice_mut(&mut self) -> Option<&mut [Scalar]> {
        let len = self.len;
        self.host.as_mut().map(|r| &mut r.as_mut_slice()[..len])
    }

    /// The device handle, if a device region is attached.
    pub fn device_ptr(&self) -> Option<DevicePtr> {
        self.device.map(|r| r.ptr())
    }

    /// The device runtime, or `InvalidArgument` if the backend has no device
    /// memory space.
    pub fn runtime(&self) -> Result<&Arc<dyn DeviceRuntime>, VectorError> {
        self.runtime.as_ref().ok_or_else(|| {
            VectorError::invalid_argument("device memory is not available on this backend")
        })
    }

    /// Host elements, allocating an owned zeroed region if none is attached.
    pub fn ensure_host(&mut self) -> Result<&mut [Scalar], VectorError> {
        let len = self.len;
        if self.host.is_none() {
            self.host = Some(HostRegion::Owned(alloc_host(len)?));
            tracing::debug!(len, "host alloc");
        }
        self.host_slice_mut()
            .ok_or_else(|| VectorError::invalid_state("host region missing after allocation"))
    }

    /// Device handle, allocating an owned region if none is attached.
    pub fn ensure_device(&mut self) -> Result<DevicePtr, VectorError> {
        if let Some(region) = self.device {
            return Ok(region.ptr());
        }
        let ptr = self.runtime()?.alloc(self.len)?;
        self.device = Some(DeviceRegion::Owned(ptr));
        Ok(ptr)
    }

    /// Drop the host region. Owned memory is freed, borrowed memory is
    /// returned to the caller's sole use.
    pub fn release_host(&mut self) {
        self.host = None;
    }

    /// Drop the device region, freeing it if owned.
    ///
    /// The region stays attached if the free fails, so the vector keeps its
    /// data and a later release can try again.
    pub fn release_device(&mut self) -> Result<(), VectorError> {
        if let Some(region) = self.device {
            region.release(self.runtime()?)?;
            self.device = None;
        }
        Ok(())
    }

    /// Release both regions. Idempotent.
    pub fn release(&mut self) -> Result<(), VectorError> {
        self.release_host();
        self.release_device()
    }

    /// Copy the whole vector across the host/device boundary, allocating
    /// the destination if needed. Does not change the state.
    pub fn sync_copy(&mut self, copy: SyncCopy) -> Result<(), VectorError> {
        let runtime = Arc::clone(self.runtime()?);
        match copy {
            SyncCopy::HostToDevice => {
                if self.host.is_none() {
                    return Err(VectorError::invalid_state(
                        "host data is current but the host array was taken",
                    ));
                }
                let dst = self.ensure_device()?;
                let src = self.host_slice().unwrap_or_default();
                runtime.copy_to_device(src, dst)?;
            }
            SyncCopy::DeviceToHost => {
                let src = self.device_ptr().ok_or_else(|| {
                    VectorError::invalid_state(
                        "device data is current but the device array was taken",
                    )
                })?;
                let dst = self.ensure_host()?;
                runtime.copy_to_host(src, dst)?;
            }
        }
        tracing::trace!(?copy, len = self.len, "sync copy");
        Ok(())
    }

    /// Prepare `mem` for `access`: run the copy the transition table asks
    /// for, materialize the region if absent, and commit the next state.
    pub fn access(&mut self, mem: MemType, access: Access) -> Result<(), VectorError> {
        if mem == MemType::Device {
            self.runtime()?;
        }
        let transition = self.state.transition(mem, access)?;
        match transition.copy {
            Some(copy) => self.sync_copy(copy)?,
            None => match mem {
                MemType::Host => {
                    self.ensure_host()?;
                }
                MemType::Device => {
                    self.ensure_device()?;
                }
            },
        }
        self.set_state(transition.next);
        Ok(())
    }

    /// Attach `array` to `mem` under `mode` and make `mem` the only current
    /// space.
    pub fn provide(
        &mut self,
        mem: MemType,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        if let Some(a) = &array {
            if a.mem_type() != mem {
                return Err(VectorError::invalid_argument(format!(
                    "{} array provided for {mem} memory",
                    a.mem_type()
                )));
            }
            if a.len() < self.len {
                return Err(VectorError::invalid_argument(format!(
                    "array of {} elements is shorter than vector length {}",
                    a.len(),
                    self.len
                )));
            }
        }
        match mem {
            MemType::Host => self.provide_host(mode, array)?,
            MemType::Device => self.provide_device(mode, array)?,
        }
        let next = self.state.transition(mem, Access::Provide)?.next;
        self.set_state(next);
        Ok(())
    }

    fn provide_host(
        &mut self,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        match (mode, array) {
            (CopyMode::CopyValues, array) => {
                if !self.host.as_ref().is_some_and(HostRegion::is_owned) {
                    self.release_host();
                }
                let dst = self.ensure_host()?;
                if let Some(src) = array.as_ref().and_then(Array::as_host) {
                    dst.copy_from_slice(&src[..dst.len()]);
                }
            }
            (CopyMode::TakeOwnership, None) | (CopyMode::Borrow, None) => self.release_host(),
            (CopyMode::TakeOwnership, Some(Array::Host(v))) => {
                self.host = Some(HostRegion::Owned(v));
            }
            (CopyMode::Borrow, Some(Array::HostSlice(s))) => {
                self.host = Some(HostRegion::Borrowed(s));
            }
            (mode, Some(_)) => {
                return Err(VectorError::ownership(format!(
                    "array cannot be attached to host memory with {mode}"
                )))
            }
        }
        Ok(())
    }

    fn provide_device(
        &mut self,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        let runtime = Arc::clone(self.runtime()?);
        let incoming = array.as_ref().and_then(Array::as_device);
        let current = self.device;
        match mode {
            CopyMode::CopyValues => {
                if !current.is_some_and(|r| r.is_owned()) {
                    // Borrowed handles are simply forgotten.
                    self.device = None;
                }
                let dst = self.ensure_device()?;
                if let Some(src) = incoming.filter(|p| *p != dst) {
                    runtime.copy_device(src, dst, self.len)?;
                }
            }
            CopyMode::TakeOwnership => {
                if current != incoming.map(DeviceRegion::Owned) {
                    self.release_device()?;
                    self.device = incoming.map(DeviceRegion::Owned);
                }
            }
            CopyMode::Borrow => {
                if let (Some(DeviceRegion::Owned(own)), Some(p)) = (current, incoming) {
                    if own == p {
                        return Err(VectorError::ownership(format!(
                            "cannot borrow {p}: the vector already owns it"
                        )));
                    }
                }
                self.release_device()?;
                self.device = incoming.map(DeviceRegion::Borrowed);
            }
        }
        Ok(())
    }

    /// Hand the `mem` array out of the vector.
    ///
    /// Syncs `mem` first if the other space is current, then detaches the
    /// region: the caller owns whatever comes back. Returns `Ok(None)` if the
    /// region was already taken.
    pub fn take(&mut self, mem: MemType) -> Result<Option<Array<'a>>, VectorError> {
        if mem == MemType::Device {
            self.runtime()?;
        }
        let transition = self.state.transition(mem, Access::Take)?;
        if let Some(copy) = transition.copy {
            self.sync_copy(copy)?;
        }
        self.set_state(transition.next);
        let taken = match mem {
            MemType::Host => self.host.take().map(HostRegion::into_array),
            MemType::Device => self.device.take().map(|r| Array::Device(r.ptr())),
        };
        tracing::debug!(%mem, taken = taken.is_some(), "array taken");
        Ok(taken)
    }
}

impl Drop for Storage<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release_device() {
            tracing::warn!(%err, "failed to free device memory on drop");
        }
    }
}

impl std::fmt::Debug for Storage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("len", &self.len)
            .field("state", &self.state)
            .field("host_owned", &self.host.as_ref().map(HostRegion::is_owned))
            .field("device", &self.device)
            .finish()
    }
}
