//! Ownership-tagged memory regions and the [`Array`] exchange type.
//!
//! Each memory space of a vector holds at most one region, and every region
//! says whether the vector owns it. Releasing a region is a `match` over
//! the tag, so a borrowed buffer can never be freed by the vector and an
//! owned one can never be leaked by forgetting a flag.

use std::sync::Arc;

use fevec_core::{MemType, Scalar, VectorError};
use fevec_device::{DevicePtr, DeviceRuntime};

/// An array handed into or out of a vector.
///
/// Which variants a call accepts depends on the memory space and
/// [`CopyMode`](fevec_core::CopyMode):
///
/// | variant | `CopyValues` | `TakeOwnership` | `Borrow` |
/// |---------|--------------|-----------------|----------|
/// | `Host` | host | host | ownership violation |
/// | `HostSlice` | host | ownership violation | host |
/// | `HostValues` | host | ownership violation | ownership violation |
/// | `Device` | device | device | device |
#[derive(Debug, PartialEq)]
pub enum Array<'a> {
    /// Host values passed by value.
    Host(Vec<Scalar>),
    /// Host buffer lent to the vector for `'a`; the caller keeps ownership.
    HostSlice(&'a mut [Scalar]),
    /// Host values that are only read.
    HostValues(&'a [Scalar]),
    /// A device allocation.
    Device(DevicePtr),
}

impl Array<'_> {
    /// The memory space the array lives in.
    pub fn mem_type(&self) -> MemType {
        match self {
            Self::Host(_) | Self::HostSlice(_) | Self::HostValues(_) => MemType::Host,
            Self::Device(_) => MemType::Device,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Host(v) => v.len(),
            Self::HostSlice(s) => s.len(),
            Self::HostValues(s) => s.len(),
            Self::Device(p) => p.len(),
        }
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Host values, if this is a host array.
    pub fn as_host(&self) -> Option<&[Scalar]> {
        match self {
            Self::Host(v) => Some(v),
            Self::HostSlice(s) => Some(s),
            Self::HostValues(s) => Some(s),
            Self::Device(_) => None,
        }
    }

    /// The device handle, if this is a device array.
    pub fn as_device(&self) -> Option<DevicePtr> {
        match self {
            Self::Device(p) => Some(*p),
            _ => None,
        }
    }

    /// Consume the array and return its values if it is an owned host `Vec`.
    pub fn into_vec(self) -> Option<Vec<Scalar>> {
        match self {
            Self::Host(v) => Some(v),
            _ => None,
        }
    }
}

/// Allocate `len` zeroed host elements, reporting exhaustion as an error.
pub(crate) fn alloc_host(len: usize) -> Result<Vec<Scalar>, VectorError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| VectorError::AllocationFailure {
            space: MemType::Host,
            requested: len.saturating_mul(std::mem::size_of::<Scalar>()),
        })?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// Host memory attached to a vector.
#[derive(Debug)]
pub enum HostRegion<'a> {
    /// Allocated by, or handed to, the vector. Dropped with the region.
    Owned(Vec<Scalar>),
    /// Lent by the caller for `'a`.
    Borrowed(&'a mut [Scalar]),
}

impl<'a> HostRegion<'a> {
    /// Whether the vector is responsible for this memory.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// The full region.
    pub fn as_slice(&self) -> &[Scalar] {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(s) => s,
        }
    }

    /// The full region, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [Scalar] {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(s) => s,
        }
    }

    /// Hand the region back to a caller.
    pub fn into_array(self) -> Array<'a> {
        match self {
            Self::Owned(v) => Array::Host(v),
            Self::Borrowed(s) => Array::HostSlice(s),
        }
    }
}

/// Device memory attached to a vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceRegion {
    /// Freed by the vector when released.
    Owned(DevicePtr),
    /// Belongs to the caller; never freed by the vector.
    Borrowed(DevicePtr),
}

impl DeviceRegion {
    /// The device handle.
    pub fn ptr(&self) -> DevicePtr {
        match self {
            Self::Owned(p) | Self::Borrowed(p) => *p,
        }
    }

    /// Whether the vector is responsible for this memory.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Free the memory if the vector owns it.
    pub fn release(self, runtime: &Arc<dyn DeviceRuntime>) -> Result<(), VectorError> {
        match self {
            Self::Owned(p) => runtime.free(p),
            Self::Borrowed(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fevec_device::SimDevice;

    #[test]
    fn array_reports_space_and_len() {
        let mut buf = [1.0, 2.0];
        assert_eq!(Array::Host(vec![0.0; 3]).mem_type(), MemType::Host);
        assert_eq!(Array::HostSlice(&mut buf).len(), 2);
        assert!(Array::HostValues(&[]).is_empty());
        let p = DevicePtr::new(9, 4);
        assert_eq!(Array::Device(p).mem_type(), MemType::Device);
        assert_eq!(Array::Device(p).as_device(), Some(p));
        assert_eq!(Array::Device(p).as_host(), None);
    }

    #[test]
    fn host_region_round_trips_through_array() {
        let region = HostRegion::Owned(vec![1.0, 2.0]);
        assert!(region.is_owned());
        assert_eq!(region.into_array().into_vec(), Some(vec![1.0, 2.0]));

        let mut buf = [3.0];
        let region = HostRegion::Borrowed(&mut buf);
        assert!(!region.is_owned());
        assert!(matches!(region.into_array(), Array::HostSlice(_)));
    }

    #[test]
    fn borrowed_device_region_is_not_freed() {
        let dev: Arc<dyn DeviceRuntime> = Arc::new(SimDevice::with_capacity(1024).unwrap());
        let p = dev.alloc(4).unwrap();
        DeviceRegion::Borrowed(p).release(&dev).unwrap();
        // Still live: the free below succeeds.
        DeviceRegion::Owned(p).release(&dev).unwrap();
        assert!(DeviceRegion::Owned(p).release(&dev).is_err());
    }

    #[test]
    fn alloc_host_is_zeroed() {
        let v = alloc_host(5).unwrap();
        assert_eq!(v, vec![0.0; 5]);
    }
}
