//! Emulated device configuration.

use fevec_core::VectorError;

/// Configuration for a [`SimDevice`](crate::SimDevice).
///
/// Validated at construction; all values are immutable afterwards.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Total device memory in bytes.
    ///
    /// Default: 1 GiB. Allocations that would push live usage past this
    /// fail with [`VectorError::AllocationFailure`].
    pub capacity_bytes: usize,

    /// Name reported by the runtime, e.g. in log lines.
    pub label: String,
}

impl DeviceConfig {
    /// Default capacity: 1 GiB.
    pub const DEFAULT_CAPACITY_BYTES: usize = 1 << 30;

    /// Default runtime label.
    pub const DEFAULT_LABEL: &'static str = "sim:0";

    /// Create a config with the given capacity and the default label.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            label: Self::DEFAULT_LABEL.to_string(),
        }
    }

    /// Capacity expressed in scalar elements.
    pub fn capacity_elements(&self) -> usize {
        self.capacity_bytes / std::mem::size_of::<fevec_core::Scalar>()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.label.is_empty() {
            return Err(VectorError::invalid_argument("device label is empty"));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY_BYTES)
    }
}
