//! The host-only reference backend.

use crate::backend::Backend;

/// Runs every operation with the generic host implementations.
///
/// Has no device memory space: device requests fail with
/// [`VectorError::InvalidArgument`](fevec_core::VectorError::InvalidArgument).
#[derive(Clone, Copy, Debug, Default)]
pub struct HostBackend;

impl HostBackend {
    /// Backend name.
    pub const NAME: &'static str = "host";
}

impl Backend for HostBackend {
    fn name(&self) -> &str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use fevec_core::{CoherenceState, CopyMode, MemType, NormType};

    #[test]
    fn fill_on_empty_vector_uses_host() {
        let b = HostBackend;
        assert!(b.device().is_none());
        let mut st = Storage::new(3, b.device());
        b.set_value(&mut st, 5.0).unwrap();
        assert_eq!(st.state(), CoherenceState::HostSynced);
        assert_eq!(st.host_slice().unwrap(), &[5.0; 3]);
    }

    #[test]
    fn max_norm_is_abs_of_largest_signed_value() {
        let b = HostBackend;
        let mut st = Storage::new(4, None);
        b.set_array(
            &mut st,
            MemType::Host,
            CopyMode::CopyValues,
            Some(crate::Array::HostValues(&[1.0, -5.0, 3.0, 4.0])),
        )
        .unwrap();
        assert_eq!(b.norm(&mut st, NormType::Max).unwrap(), 4.0);
    }
}
