//! Benchmark profiles for fevec.
//!
//! - [`bench_values`]: deterministic input data of a given length
//! - [`sim_context`]: accelerator context sized for a profile
//! - [`PROFILE_LENGTHS`]: vector lengths every benchmark sweeps

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use fevec_core::Scalar;
use fevec_device::{DeviceConfig, SimDevice};
use fevec_vector::Context;

/// Vector lengths swept by the benchmarks: 1K, 64K, 1M elements.
pub const PROFILE_LENGTHS: [usize; 3] = [1 << 10, 1 << 16, 1 << 20];

/// Deterministic values in `[-1, 1)` with no element small enough to be
/// skipped by the reciprocal kernel.
pub fn bench_values(len: usize) -> Vec<Scalar> {
    (0..len)
        .map(|i| {
            let x = ((i * 7919) % 2000) as Scalar / 1000.0 - 1.0;
            if x == 0.0 {
                0.5
            } else {
                x
            }
        })
        .collect()
}

/// Accelerator context with room for `vectors` vectors of `len` elements.
pub fn sim_context(len: usize, vectors: usize) -> Context {
    let bytes = len * vectors * std::mem::size_of::<Scalar>();
    let device = SimDevice::new(DeviceConfig {
        capacity_bytes: bytes,
        label: "sim:bench".to_string(),
    })
    .expect("bench device config is valid");
    Context::accelerator(Arc::new(device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_nonzero_and_bounded() {
        let v = bench_values(5000);
        assert_eq!(v.len(), 5000);
        assert!(v.iter().all(|&x| x != 0.0 && (-1.0..1.0).contains(&x)));
    }
}
