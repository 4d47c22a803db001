//! Backend selection.
//!
//! A [`Context`] pairs a resource string with the [`Backend`] chosen for
//! it. Every vector created from a context dispatches to that backend.

use std::fmt;
use std::sync::Arc;

use fevec_core::{Scalar, VectorError};
use fevec_device::{DeviceConfig, DeviceRuntime, SimDevice};

use crate::accel::AcceleratorBackend;
use crate::backend::Backend;
use crate::host::HostBackend;
use crate::vector::Vector;

/// A backend selection that vectors are created from.
///
/// Cloning is cheap and shares the backend.
#[derive(Clone)]
pub struct Context {
    resource: String,
    backend: Arc<dyn Backend>,
}

impl Context {
    /// Resource string of the host backend.
    pub const HOST_RESOURCE: &'static str = "/cpu/self";

    /// Resource string of the accelerator backend on an emulated device.
    pub const SIM_RESOURCE: &'static str = "/gpu/sim";

    /// Select a backend by resource string.
    ///
    /// `/cpu/self` and any `/cpu/self/...` variant select the host backend.
    /// `/gpu/sim` selects the accelerator backend on a fresh [`SimDevice`]
    /// with the default [`DeviceConfig`]. Anything else fails with
    /// [`VectorError::InvalidArgument`].
    pub fn init(resource: &str) -> Result<Self, VectorError> {
        let host_variant = resource
            .strip_prefix(Self::HOST_RESOURCE)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if host_variant {
            return Ok(Self::with_backend(resource, Arc::new(HostBackend)));
        }
        if resource == Self::SIM_RESOURCE {
            let device = SimDevice::new(DeviceConfig::default())?;
            let backend = AcceleratorBackend::new(Arc::new(device));
            return Ok(Self::with_backend(resource, Arc::new(backend)));
        }
        Err(VectorError::invalid_argument(format!(
            "unknown resource {resource:?}"
        )))
    }

    /// The host backend.
    pub fn host() -> Self {
        Self::with_backend(Self::HOST_RESOURCE, Arc::new(HostBackend))
    }

    /// The accelerator backend on `device`.
    pub fn accelerator(device: Arc<dyn DeviceRuntime>) -> Self {
        let resource = format!("/gpu/{}", device.name());
        Self::with_backend(resource, Arc::new(AcceleratorBackend::new(device)))
    }

    /// Any backend under a caller-chosen resource name.
    pub fn with_backend(resource: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        let resource = resource.into();
        tracing::debug!(%resource, backend = backend.name(), "context created");
        Self { resource, backend }
    }

    /// The resource string this context was created with.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The selected backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Create a vector of `len` elements. See [`Vector::create`].
    pub fn vector<'a>(&self, len: usize) -> Result<Vector<'a>, VectorError> {
        Vector::create(self, len)
    }

    /// Create a vector holding a copy of `values`.
    pub fn vector_from_slice<'a>(&self, values: &[Scalar]) -> Result<Vector<'a>, VectorError> {
        Vector::from_slice(self, values)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("resource", &self.resource)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_selection() {
        assert_eq!(Context::init("/cpu/self").unwrap().backend().name(), "host");
        assert_eq!(
            Context::init("/cpu/self/ref/serial").unwrap().backend().name(),
            "host"
        );
        let sim = Context::init("/gpu/sim").unwrap();
        assert_eq!(sim.backend().name(), "accelerator");
        assert!(sim.backend().device().is_some());
        assert_eq!(sim.to_string(), "/gpu/sim");
    }

    #[test]
    fn unknown_resources_are_rejected() {
        for r in ["", "/cpu/selfish", "/gpu/cuda", "cpu"] {
            assert!(
                matches!(Context::init(r), Err(VectorError::InvalidArgument { .. })),
                "{r}"
            );
        }
    }

    #[test]
    fn accelerator_resource_names_the_device() {
        let dev = Arc::new(SimDevice::new(DeviceConfig::default()).unwrap());
        let ctx = Context::accelerator(dev);
        assert_eq!(ctx.resource(), "/gpu/sim:0");
    }

    #[test]
    fn vectors_share_the_context_backend() {
        let ctx = Context::default();
        let v = ctx.vector(3).unwrap();
        assert_eq!(v.backend_name(), HostBackend::NAME);
        assert!(Arc::ptr_eq(ctx.backend(), &ctx.clone().backend));
    }
}
