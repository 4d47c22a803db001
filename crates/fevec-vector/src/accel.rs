//! The accelerator backend.
//!
//! Overrides fill, norm, and reciprocal to run on device memory through a
//! [`DeviceRuntime`]. Array management uses the generic implementations.

use std::sync::Arc;

use fevec_core::{Access, CoherenceState, MemType, NormType, Scalar, SyncCopy, VectorError};
use fevec_device::DeviceRuntime;

use crate::backend::{generic, Backend};
use crate::storage::Storage;

/// A backend whose kernels run on an accelerator.
#[derive(Clone, Debug)]
pub struct AcceleratorBackend {
    device: Arc<dyn DeviceRuntime>,
}

impl AcceleratorBackend {
    /// Backend name.
    pub const NAME: &'static str = "accelerator";

    /// Create a backend on `device`.
    pub fn new(device: Arc<dyn DeviceRuntime>) -> Self {
        Self { device }
    }

    /// The device runtime.
    pub fn runtime(&self) -> &Arc<dyn DeviceRuntime> {
        &self.device
    }
}

impl Backend for AcceleratorBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn device(&self) -> Option<Arc<dyn DeviceRuntime>> {
        Some(Arc::clone(&self.device))
    }

    /// Fills whichever spaces are current. An empty vector is filled on the
    /// device.
    fn set_value(&self, st: &mut Storage<'_>, value: Scalar) -> Result<(), VectorError> {
        let len = st.len();
        let state = st.state();
        if state.is_current(MemType::Host) {
            generic::set_value(st, value)?;
        }
        match state {
            CoherenceState::NoAuthority | CoherenceState::DeviceSynced => {
                let ptr = st.ensure_device()?;
                self.device.set_value(ptr, len, value)?;
                st.set_state(CoherenceState::DeviceSynced);
            }
            CoherenceState::BothSynced => {
                let ptr = st.ensure_device()?;
                self.device.set_value(ptr, len, value)?;
                st.set_state(CoherenceState::BothSynced);
            }
            CoherenceState::HostSynced => {}
        }
        Ok(())
    }

    fn norm(&self, st: &mut Storage<'_>, kind: NormType) -> Result<Scalar, VectorError> {
        if !st.state().has_data() {
            return Err(VectorError::invalid_state("norm of a vector with no data"));
        }
        st.access(MemType::Device, Access::Read)?;
        let len = st.len();
        let ptr = st.ensure_device()?;
        let value = match kind {
            NormType::One => self.device.asum(ptr, len)?,
            NormType::Two => self.device.nrm2(ptr, len)?,
            NormType::Max => match self.device.iamax(ptr, len)? {
                Some(index) => self.device.read_element(ptr, index)?.abs(),
                None => 0.0,
            },
        };
        Ok(value)
    }

    /// Runs on the device whenever device data is current. From
    /// [`BothSynced`](CoherenceState::BothSynced) the host copy is refreshed
    /// from the result so both spaces stay current.
    fn reciprocal(&self, st: &mut Storage<'_>) -> Result<(), VectorError> {
        let len = st.len();
        match st.state() {
            CoherenceState::NoAuthority => Err(VectorError::invalid_state(
                "reciprocal of a vector with no data",
            )),
            CoherenceState::HostSynced => generic::reciprocal(st),
            CoherenceState::DeviceSynced => {
                let ptr = st.ensure_device()?;
                self.device.reciprocal(ptr, len)
            }
            CoherenceState::BothSynced => {
                let ptr = st.ensure_device()?;
                self.device.reciprocal(ptr, len)?;
                // Host is stale until the copy back lands.
                st.set_state(CoherenceState::DeviceSynced);
                st.sync_copy(SyncCopy::DeviceToHost)?;
                st.set_state(CoherenceState::BothSynced);
                Ok(())
            }
        }
    }
}
