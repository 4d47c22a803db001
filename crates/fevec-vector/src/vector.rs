//! The [`Vector`] handle and its array access guards.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use fevec_core::{
    Access, CoherenceState, CopyMode, MemType, NormType, Scalar, VectorError, MAX_LENGTH,
};
use fevec_device::DevicePtr;

use crate::backend::Backend;
use crate::context::Context;
use crate::region::Array;
use crate::storage::Storage;

fn outstanding(op: &str) -> VectorError {
    VectorError::ownership(format!("{op}: an array access is still outstanding"))
}

/// A fixed-length numeric vector whose data may live in host memory,
/// device memory, or both.
///
/// Every operation dispatches through the backend of the [`Context`] the
/// vector was created on. Array accesses hand out guards that keep a
/// runtime borrow on the vector: several read guards may coexist, but
/// anything that would change the vector's memory while a guard is alive
/// fails with [`VectorError::OwnershipViolation`].
///
/// `'a` bounds caller-owned host buffers lent with [`CopyMode::Borrow`].
pub struct Vector<'a> {
    backend: Arc<dyn Backend>,
    storage: RefCell<Storage<'a>>,
    len: usize,
    /// Mirror of the storage state, readable while a guard is out.
    state: Cell<CoherenceState>,
}

impl<'a> Vector<'a> {
    /// Create a vector of `len` elements with no memory allocated.
    ///
    /// Fails with [`VectorError::InvalidArgument`] if `len` exceeds
    /// [`MAX_LENGTH`].
    pub fn create(ctx: &Context, len: usize) -> Result<Self, VectorError> {
        if len > MAX_LENGTH {
            return Err(VectorError::invalid_argument(format!(
                "vector length {len} exceeds maximum {MAX_LENGTH}"
            )));
        }
        let backend = Arc::clone(ctx.backend());
        let storage = Storage::new(len, backend.device());
        tracing::debug!(backend = backend.name(), len, "vector created");
        Ok(Self {
            backend,
            storage: RefCell::new(storage),
            len,
            state: Cell::new(CoherenceState::NoAuthority),
        })
    }

    /// [`create`](Self::create) for lengths that arrive signed.
    pub fn create_signed(ctx: &Context, len: i64) -> Result<Self, VectorError> {
        let len = usize::try_from(len).map_err(|_| {
            VectorError::invalid_argument(format!("vector length {len} is negative"))
        })?;
        Self::create(ctx, len)
    }

    /// Create a vector holding a copy of `values` in host memory.
    pub fn from_slice(ctx: &Context, values: &[Scalar]) -> Result<Self, VectorError> {
        let vec = Self::create(ctx, values.len())?;
        vec.set_slice(values)?;
        Ok(vec)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Which memory space(s) currently hold valid data.
    pub fn state(&self) -> CoherenceState {
        self.state.get()
    }

    /// Name of the backend the vector dispatches to.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn with_storage<R>(
        &self,
        op: &str,
        f: impl FnOnce(&dyn Backend, &mut Storage<'a>) -> Result<R, VectorError>,
    ) -> Result<R, VectorError> {
        let mut st = self.storage.try_borrow_mut().map_err(|_| outstanding(op))?;
        let out = f(self.backend.as_ref(), &mut st);
        self.state.set(st.state());
        out
    }

    /// Bring `mem` up to date for `access`. A read of a space that is
    /// already current is allowed alongside other readers.
    fn prepare(&self, mem: MemType, access: Access) -> Result<(), VectorError> {
        let op = "array access";
        if let Ok(mut st) = self.storage.try_borrow_mut() {
            let out = self.backend.get_array(&mut st, mem, access);
            self.state.set(st.state());
            return out;
        }
        let st = self.storage.try_borrow().map_err(|_| outstanding(op))?;
        if access == Access::Read && st.state().is_current(mem) {
            Ok(())
        } else {
            Err(outstanding(op))
        }
    }

    /// Attach `array` to `mem` and make `mem` the only current space.
    ///
    /// With `None`, [`CopyMode::CopyValues`] allocates `mem` without copying
    /// anything and the other modes detach the region. See [`Array`] for
    /// which arrays each mode accepts.
    pub fn set_array(
        &self,
        mem: MemType,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        self.with_storage("set_array", |b, st| b.set_array(st, mem, mode, array))
    }

    /// Take the `mem` array out of the vector, syncing it first if the other
    /// space is current.
    ///
    /// The caller becomes responsible for the returned memory. A second take
    /// returns `Ok(None)`. Taking from a vector that never held data fails
    /// with [`VectorError::InvalidState`].
    pub fn take_array(&self, mem: MemType) -> Result<Option<Array<'a>>, VectorError> {
        self.with_storage("take_array", |b, st| b.take_array(st, mem))
    }

    /// Read access to host memory.
    pub fn array_read(&self) -> Result<ArrayRead<'_>, VectorError> {
        self.prepare(MemType::Host, Access::Read)?;
        let st = self
            .storage
            .try_borrow()
            .map_err(|_| outstanding("array_read"))?;
        let data = Ref::filter_map(st, Storage::host_slice)
            .map_err(|_| VectorError::invalid_state("host array was taken"))?;
        Ok(ArrayRead { data })
    }

    /// Write access to host memory. The device copy becomes stale.
    pub fn array_write(&self) -> Result<ArrayWrite<'_>, VectorError> {
        self.prepare(MemType::Host, Access::Write)?;
        let st = self
            .storage
            .try_borrow_mut()
            .map_err(|_| outstanding("array_write"))?;
        let data = RefMut::filter_map(st, Storage::host_slice_mut)
            .map_err(|_| VectorError::invalid_state("host array was taken"))?;
        Ok(ArrayWrite { data })
    }

    /// Read access to device memory.
    pub fn device_array_read(&self) -> Result<DeviceArrayRead<'_, 'a>, VectorError> {
        self.prepare(MemType::Device, Access::Read)?;
        let st = self
            .storage
            .try_borrow()
            .map_err(|_| outstanding("device_array_read"))?;
        let ptr = st
            .device_ptr()
            .ok_or_else(|| VectorError::invalid_state("device array was taken"))?;
        Ok(DeviceArrayRead { _storage: st, ptr })
    }

    /// Write access to device memory. The host copy becomes stale.
    pub fn device_array_write(&self) -> Result<DeviceArrayWrite<'_, 'a>, VectorError> {
        self.prepare(MemType::Device, Access::Write)?;
        let st = self
            .storage
            .try_borrow_mut()
            .map_err(|_| outstanding("device_array_write"))?;
        let ptr = st
            .device_ptr()
            .ok_or_else(|| VectorError::invalid_state("device array was taken"))?;
        Ok(DeviceArrayWrite { _storage: st, ptr })
    }

    /// Make `mem` current without handing out an array.
    pub fn sync(&self, mem: MemType) -> Result<(), VectorError> {
        self.prepare(mem, Access::Read)
    }

    /// Copy `values` into host memory. `values` must have exactly `len`
    /// elements.
    pub fn set_slice(&self, values: &[Scalar]) -> Result<(), VectorError> {
        if values.len() != self.len {
            return Err(VectorError::invalid_argument(format!(
                "slice of {} elements does not match vector length {}",
                values.len(),
                self.len
            )));
        }
        self.set_array(MemType::Host, CopyMode::CopyValues, None)?;
        self.array_write()?.copy_from_slice(values);
        Ok(())
    }

    /// Host copy of the current data.
    pub fn to_vec(&self) -> Result<Vec<Scalar>, VectorError> {
        Ok(self.array_read()?.to_vec())
    }

    /// Set every element to `value`.
    pub fn set_value(&self, value: Scalar) -> Result<(), VectorError> {
        self.with_storage("set_value", |b, st| b.set_value(st, value))
    }

    /// Compute a norm. `Max` is the absolute value of the element holding
    /// the largest signed value.
    pub fn norm(&self, kind: NormType) -> Result<Scalar, VectorError> {
        self.with_storage("norm", |b, st| b.norm(st, kind))
    }

    /// Replace each element `x` with `1/x`, leaving elements with
    /// `|x| <= EPSILON` unchanged.
    pub fn reciprocal(&self) -> Result<(), VectorError> {
        self.with_storage("reciprocal", |b, st| b.reciprocal(st))
    }

    /// Release the vector's memory, reporting failures that `Drop` can only
    /// log.
    pub fn destroy(self) -> Result<(), VectorError> {
        let Self {
            backend, storage, ..
        } = self;
        let mut st = storage.into_inner();
        backend.destroy(&mut st)
    }
}

impl fmt::Debug for Vector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("backend", &self.backend.name())
            .field("len", &self.len)
            .field("state", &self.state.get())
            .finish()
    }
}

/// Read access to a vector's host memory. Restored on drop.
pub struct ArrayRead<'v> {
    data: Ref<'v, [Scalar]>,
}

impl ArrayRead<'_> {
    /// End the access.
    pub fn restore(self) {}
}

impl Deref for ArrayRead<'_> {
    type Target = [Scalar];

    fn deref(&self) -> &[Scalar] {
        &self.data
    }
}

impl fmt::Debug for ArrayRead<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayRead").field(&&*self.data).finish()
    }
}

/// Write access to a vector's host memory. Restored on drop.
pub struct ArrayWrite<'v> {
    data: RefMut<'v, [Scalar]>,
}

impl ArrayWrite<'_> {
    /// End the access.
    pub fn restore(self) {}
}

impl Deref for ArrayWrite<'_> {
    type Target = [Scalar];

    fn deref(&self) -> &[Scalar] {
        &self.data
    }
}

impl DerefMut for ArrayWrite<'_> {
    fn deref_mut(&mut self) -> &mut [Scalar] {
        &mut self.data
    }
}

impl fmt::Debug for ArrayWrite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayWrite").field(&&*self.data).finish()
    }
}

/// Read access to a vector's device memory. Restored on drop.
pub struct DeviceArrayRead<'v, 'a> {
    _storage: Ref<'v, Storage<'a>>,
    ptr: DevicePtr,
}

impl DeviceArrayRead<'_, '_> {
    /// The device handle, valid until the guard is restored.
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    /// End the access.
    pub fn restore(self) {}
}

impl fmt::Debug for DeviceArrayRead<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceArrayRead").field(&self.ptr).finish()
    }
}

/// Write access to a vector's device memory. Restored on drop.
pub struct DeviceArrayWrite<'v, 'a> {
    _storage: RefMut<'v, Storage<'a>>,
    ptr: DevicePtr,
}

impl DeviceArrayWrite<'_, '_> {
    /// The device handle, valid until the guard is restored.
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    /// End the access.
    pub fn restore(self) {}
}

impl fmt::Debug for DeviceArrayWrite<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceArrayWrite").field(&self.ptr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_oversized_and_negative_lengths() {
        let ctx = Context::host();
        assert!(matches!(
            Vector::create(&ctx, MAX_LENGTH + 1),
            Err(VectorError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Vector::create_signed(&ctx, -1),
            Err(VectorError::InvalidArgument { .. })
        ));
        assert_eq!(Vector::create_signed(&ctx, 7).unwrap().len(), 7);
    }

    #[test]
    fn readers_coexist_but_block_writers() {
        let ctx = Context::host();
        let v = Vector::from_slice(&ctx, &[1.0, 2.0]).unwrap();
        let a = v.array_read().unwrap();
        let b = v.array_read().unwrap();
        assert_eq!(&*a, &*b);
        assert!(matches!(
            v.set_value(0.0),
            Err(VectorError::OwnershipViolation { .. })
        ));
        assert!(matches!(
            v.array_write(),
            Err(VectorError::OwnershipViolation { .. })
        ));
        a.restore();
        b.restore();
        v.set_value(0.0).unwrap();
    }

    #[test]
    fn writer_blocks_everything() {
        let ctx = Context::host();
        let v = Vector::from_slice(&ctx, &[1.0]).unwrap();
        let mut w = v.array_write().unwrap();
        w[0] = 9.0;
        assert!(v.array_read().is_err());
        assert!(v.norm(NormType::One).is_err());
        assert_eq!(v.state(), CoherenceState::HostSynced);
        w.restore();
        assert_eq!(v.norm(NormType::One).unwrap(), 9.0);
    }

    #[test]
    fn set_slice_checks_length() {
        let ctx = Context::host();
        let v = Vector::create(&ctx, 3).unwrap();
        assert!(matches!(
            v.set_slice(&[1.0]),
            Err(VectorError::InvalidArgument { .. })
        ));
        assert_eq!(v.state(), CoherenceState::NoAuthority);
    }

    #[test]
    fn borrowed_buffer_sees_writes() {
        let ctx = Context::host();
        let mut buf = [0.0; 3];
        {
            let v = Vector::create(&ctx, 3).unwrap();
            v.set_array(MemType::Host, CopyMode::Borrow, Some(Array::HostSlice(&mut buf)))
                .unwrap();
            v.set_value(2.5).unwrap();
        }
        assert_eq!(buf, [2.5; 3]);
    }

    #[test]
    fn debug_shows_backend_and_state() {
        let v = Vector::create(&Context::host(), 2).unwrap();
        let s = format!("{v:?}");
        assert!(s.contains("host"));
        assert!(s.contains("NoAuthority"));
    }

    mod proptests {
        use super::*;
        use fevec_core::kernels;
        use fevec_device::{DeviceRuntime, SimDevice};
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Fill(Scalar),
            Reciprocal,
            SyncHost,
            SyncDevice,
            WriteHost(usize, Scalar),
            WriteDevice(usize, Scalar),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (-10.0f64..10.0).prop_map(Op::Fill),
                Just(Op::Reciprocal),
                Just(Op::SyncHost),
                Just(Op::SyncDevice),
                (0usize..8, -10.0f64..10.0).prop_map(|(i, x)| Op::WriteHost(i, x)),
                (0usize..8, -10.0f64..10.0).prop_map(|(i, x)| Op::WriteDevice(i, x)),
            ]
        }

        proptest! {
            #[test]
            fn accelerator_matches_host_model(
                init in prop::collection::vec(-10.0f64..10.0, 8),
                ops in prop::collection::vec(arb_op(), 0..24),
            ) {
                let dev = Arc::new(SimDevice::with_capacity(1 << 12).unwrap());
                let ctx = Context::accelerator(dev.clone());
                let v = Vector::from_slice(&ctx, &init).unwrap();
                let mut model = init.clone();
                for op in &ops {
                    match *op {
                        Op::Fill(x) => {
                            v.set_value(x).unwrap();
                            kernels::set_value(&mut model, x);
                        }
                        Op::Reciprocal => {
                            v.reciprocal().unwrap();
                            kernels::reciprocal(&mut model);
                        }
                        Op::SyncHost => v.sync(MemType::Host).unwrap(),
                        Op::SyncDevice => v.sync(MemType::Device).unwrap(),
                        Op::WriteHost(i, x) => {
                            v.array_write().unwrap()[i] = x;
                            model[i] = x;
                        }
                        Op::WriteDevice(i, x) => {
                            let w = v.device_array_write().unwrap();
                            let mut staged = [0.0; 8];
                            dev.copy_to_host(w.ptr(), &mut staged).unwrap();
                            staged[i] = x;
                            dev.copy_to_device(&staged, w.ptr()).unwrap();
                            w.restore();
                            prop_assert_eq!(v.state(), CoherenceState::DeviceSynced);
                            model[i] = x;
                        }
                    }
                }
                prop_assert_eq!(
                    v.norm(NormType::Max).unwrap(),
                    kernels::norm(&model, NormType::Max)
                );
                prop_assert_eq!(v.to_vec().unwrap(), model);
                drop(v);
                prop_assert_eq!(dev.live_allocations(), 0);
            }
        }
    }
}
