//! Device pointer handles.
//!
//! A [`DevicePtr`] names an allocation inside one device runtime. It carries
//! the allocation's element count so length checks need no lookup.

use std::fmt;

/// Handle to a device allocation.
///
/// Handles are plain values: copying one does not duplicate memory, and
/// dropping one does not free it. Whoever owns the allocation must hand the
/// handle back to [`DeviceRuntime::free`](crate::DeviceRuntime::free).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct DevicePtr {
    id: u64,
    len: usize,
}

impl DevicePtr {
    /// Create a handle. Runtimes call this when they hand out memory.
    pub fn new(id: u64, len: usize) -> Self {
        Self { id, len }
    }

    /// Runtime-specific allocation id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Length of the allocation in elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this is a zero-length allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePtr(id={}, len={})", self.id, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trip() {
        let p = DevicePtr::new(42, 256);
        assert_eq!(p.id(), 42);
        assert_eq!(p.len(), 256);
        assert!(!p.is_empty());
        assert_eq!(p.to_string(), "DevicePtr(id=42, len=256)");
    }

    #[test]
    fn empty_handle() {
        assert!(DevicePtr::new(1, 0).is_empty());
    }
}
