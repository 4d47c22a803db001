//! The [`DeviceRuntime`] trait.

use std::fmt;

use fevec_core::{Scalar, VectorError};

use crate::ptr::DevicePtr;

/// Allocation, transfer, and kernel primitives of one accelerator.
///
/// # Contract
///
/// - Every call is synchronous: when it returns `Ok`, the data is valid
///   for the next access. A runtime may queue work internally but must
///   complete it before returning.
/// - Lengths are element counts and never exceed the handle's
///   [`len`](DevicePtr::len); violations fail with
///   [`VectorError::DeviceRuntimeFailure`].
/// - Allocation exhaustion fails with [`VectorError::AllocationFailure`].
///
/// # Object safety
///
/// Backends hold runtimes as `Arc<dyn DeviceRuntime>`.
pub trait DeviceRuntime: Send + Sync + fmt::Debug {
    /// Human-readable runtime name.
    fn name(&self) -> &str;

    /// Allocate `len` zero-initialised elements.
    fn alloc(&self, len: usize) -> Result<DevicePtr, VectorError>;

    /// Release an allocation.
    fn free(&self, ptr: DevicePtr) -> Result<(), VectorError>;

    /// Copy `src` into the first `src.len()` elements of `dst`.
    fn copy_to_device(&self, src: &[Scalar], dst: DevicePtr) -> Result<(), VectorError>;

    /// Copy the first `dst.len()` elements of `src` into `dst`.
    fn copy_to_host(&self, src: DevicePtr, dst: &mut [Scalar]) -> Result<(), VectorError>;

    /// Copy `len` elements between two device allocations.
    fn copy_device(&self, src: DevicePtr, dst: DevicePtr, len: usize) -> Result<(), VectorError>;

    /// Set the first `len` elements to `value`.
    fn set_value(&self, ptr: DevicePtr, len: usize, value: Scalar) -> Result<(), VectorError>;

    /// Reciprocal of the first `len` elements, skipping `|x| <= EPSILON`.
    fn reciprocal(&self, ptr: DevicePtr, len: usize) -> Result<(), VectorError>;

    /// Sum of absolute values of the first `len` elements.
    fn asum(&self, ptr: DevicePtr, len: usize) -> Result<Scalar, VectorError>;

    /// Euclidean norm of the first `len` elements.
    fn nrm2(&self, ptr: DevicePtr, len: usize) -> Result<Scalar, VectorError>;

    /// First index of the largest signed value among the first `len`
    /// elements, or `None` when `len == 0`.
    fn iamax(&self, ptr: DevicePtr, len: usize) -> Result<Option<usize>, VectorError>;

    /// Fetch a single element to the host.
    fn read_element(&self, ptr: DevicePtr, index: usize) -> Result<Scalar, VectorError>;
}
