//! The per-backend capability trait.
//!
//! Every vector operation dispatches through a [`Backend`]. The trait's
//! default methods are the generic implementations, which run host kernels
//! against host memory. A backend overrides only the operations it can do
//! better; the rest fall through to the defaults. The same defaults are
//! available as free functions in [`generic`] so an override can delegate
//! for the cases it does not handle.

use std::fmt;
use std::sync::Arc;

use fevec_core::{Access, CopyMode, MemType, NormType, Scalar, VectorError};
use fevec_device::DeviceRuntime;

use crate::region::Array;
use crate::storage::Storage;

/// Vector capabilities of one backend.
///
/// # Contract
///
/// - Operations receive the vector's [`Storage`] exclusively and leave its
///   coherence state describing which spaces hold current data.
/// - `get_array` is only called with [`Access::Read`] or
///   [`Access::Write`].
/// - A backend whose [`device`](Backend::device) returns `None` has no
///   device memory space; device requests fail with
///   [`VectorError::InvalidArgument`].
///
/// # Object safety
///
/// Contexts hold backends as `Arc<dyn Backend>`.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short backend name, as reported by `Vector::backend_name`.
    fn name(&self) -> &str;

    /// Device runtime handed to each new vector's storage.
    fn device(&self) -> Option<Arc<dyn DeviceRuntime>> {
        None
    }

    /// Attach an array to `mem`. See [`Storage::provide`].
    fn set_array<'a>(
        &self,
        st: &mut Storage<'a>,
        mem: MemType,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        generic::set_array(st, mem, mode, array)
    }

    /// Hand the `mem` array out of the vector. See [`Storage::take`].
    fn take_array<'a>(
        &self,
        st: &mut Storage<'a>,
        mem: MemType,
    ) -> Result<Option<Array<'a>>, VectorError> {
        generic::take_array(st, mem)
    }

    /// Bring `mem` up to date for a read or write.
    fn get_array(
        &self,
        st: &mut Storage<'_>,
        mem: MemType,
        access: Access,
    ) -> Result<(), VectorError> {
        generic::get_array(st, mem, access)
    }

    /// Set every element to `value`.
    fn set_value(&self, st: &mut Storage<'_>, value: Scalar) -> Result<(), VectorError> {
        generic::set_value(st, value)
    }

    /// Compute a norm.
    fn norm(&self, st: &mut Storage<'_>, kind: NormType) -> Result<Scalar, VectorError> {
        generic::norm(st, kind)
    }

    /// Replace each element `x` with `1/x`, skipping `|x| <= EPSILON`.
    fn reciprocal(&self, st: &mut Storage<'_>) -> Result<(), VectorError> {
        generic::reciprocal(st)
    }

    /// Release the vector's memory.
    fn destroy(&self, st: &mut Storage<'_>) -> Result<(), VectorError> {
        generic::destroy(st)
    }
}

/// The default operation implementations.
pub mod generic {
    use fevec_core::{kernels, Access, CopyMode, MemType, NormType, Scalar, VectorError};

    use crate::region::Array;
    use crate::storage::Storage;

    fn require_data(st: &Storage<'_>, op: &str) -> Result<(), VectorError> {
        if st.state().has_data() {
            Ok(())
        } else {
            Err(VectorError::invalid_state(format!(
                "{op} of a vector with no data"
            )))
        }
    }

    /// Attach an array to `mem`.
    pub fn set_array<'a>(
        st: &mut Storage<'a>,
        mem: MemType,
        mode: CopyMode,
        array: Option<Array<'a>>,
    ) -> Result<(), VectorError> {
        st.provide(mem, mode, array)
    }

    /// Hand the `mem` array out of the vector.
    pub fn take_array<'a>(
        st: &mut Storage<'a>,
        mem: MemType,
    ) -> Result<Option<Array<'a>>, VectorError> {
        st.take(mem)
    }

    /// Bring `mem` up to date for a read or write.
    pub fn get_array(
        st: &mut Storage<'_>,
        mem: MemType,
        access: Access,
    ) -> Result<(), VectorError> {
        match access {
            Access::Read | Access::Write => st.access(mem, access),
            other => Err(VectorError::invalid_argument(format!(
                "{other:?} is not an array access"
            ))),
        }
    }

    /// Fill host memory with `value`.
    pub fn set_value(st: &mut Storage<'_>, value: Scalar) -> Result<(), VectorError> {
        st.access(MemType::Host, Access::Write)?;
        kernels::set_value(st.ensure_host()?, value);
        Ok(())
    }

    /// Norm of the host data, syncing from the device if needed.
    pub fn norm(st: &mut Storage<'_>, kind: NormType) -> Result<Scalar, VectorError> {
        require_data(st, "norm")?;
        st.access(MemType::Host, Access::Read)?;
        Ok(kernels::norm(st.host_slice().unwrap_or_default(), kind))
    }

    /// Reciprocal of the host data, syncing from the device if needed.
    pub fn reciprocal(st: &mut Storage<'_>) -> Result<(), VectorError> {
        require_data(st, "reciprocal")?;
        st.access(MemType::Host, Access::Write)?;
        kernels::reciprocal(st.ensure_host()?);
        Ok(())
    }

    /// Release both regions.
    pub fn destroy(st: &mut Storage<'_>) -> Result<(), VectorError> {
        st.release()
    }
}
