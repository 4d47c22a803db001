//! Host numeric kernels: fill, reciprocal, and reductions.
//!
//! These are the routines the host backend runs once data is current in
//! host memory. Device runtimes implement the same operations against their
//! own memory; the emulated device reuses these directly.

use crate::types::{NormType, Scalar, EPSILON};

/// Set every element to `value`.
pub fn set_value(data: &mut [Scalar], value: Scalar) {
    data.fill(value);
}

/// Replace each `x` with `1/x` where `|x| > EPSILON`; smaller elements are
/// left unchanged.
pub fn reciprocal(data: &mut [Scalar]) {
    for x in data.iter_mut() {
        if x.abs() > EPSILON {
            *x = 1.0 / *x;
        }
    }
}

/// Sum of absolute values.
pub fn asum(data: &[Scalar]) -> Scalar {
    data.iter().map(|x| x.abs()).sum()
}

/// Euclidean norm.
pub fn nrm2(data: &[Scalar]) -> Scalar {
    data.iter().map(|x| x * x).sum::<Scalar>().sqrt()
}

/// Index of the largest signed value; ties resolve to the first index.
///
/// Returns `None` for an empty slice.
pub fn iamax(data: &[Scalar]) -> Option<usize> {
    let mut best: Option<(usize, Scalar)> = None;
    for (i, &x) in data.iter().enumerate() {
        match best {
            Some((_, b)) if x <= b => {}
            _ => best = Some((i, x)),
        }
    }
    best.map(|(i, _)| i)
}

/// Compute a norm of `data`. The norm of an empty slice is zero.
pub fn norm(data: &[Scalar], kind: NormType) -> Scalar {
    match kind {
        NormType::One => asum(data),
        NormType::Two => nrm2(data),
        NormType::Max => iamax(data).map_or(0.0, |i| data[i].abs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn max_norm_takes_signed_argmax() {
        assert_eq!(norm(&[1.0, 2.0, 0.5, 4.0], NormType::Max), 4.0);
        assert_eq!(norm(&[1.0, -5.0, 3.0, 4.0], NormType::Max), 4.0);
        assert_eq!(norm(&[-2.0, -7.0], NormType::Max), 2.0);
    }

    #[test]
    fn iamax_first_occurrence_wins() {
        assert_eq!(iamax(&[3.0, 1.0, 3.0]), Some(0));
        assert_eq!(iamax(&[]), None);
    }

    #[test]
    fn empty_norms_are_zero() {
        for kind in [NormType::One, NormType::Two, NormType::Max] {
            assert_eq!(norm(&[], kind), 0.0);
        }
    }

    #[test]
    fn reciprocal_skips_tiny_values() {
        let mut data = [2.0, 0.0, 1e-17, -4.0, -1e-16];
        reciprocal(&mut data);
        assert_eq!(data, [0.5, 0.0, 1e-17, -0.25, -1e-16]);
    }

    #[test]
    fn set_value_fills_everything() {
        let mut data = [1.0; 7];
        set_value(&mut data, -3.5);
        assert!(data.iter().all(|&x| x == -3.5));
    }

    proptest! {
        #[test]
        fn filled_norms(n in 1usize..256, v in -1.0e3f64..1.0e3) {
            let mut data = vec![0.0; n];
            set_value(&mut data, v);
            let tol = 1e-9 * (1.0 + v.abs() * n as f64);
            prop_assert!((norm(&data, NormType::One) - n as f64 * v.abs()).abs() < tol);
            prop_assert!((norm(&data, NormType::Two) - (n as f64).sqrt() * v.abs()).abs() < tol);
            prop_assert_eq!(norm(&data, NormType::Max), v.abs());
        }

        #[test]
        fn reciprocal_twice_restores_large_values(x in prop_oneof![1e-3f64..1e3, -1e3f64..-1e-3]) {
            let mut data = [x];
            reciprocal(&mut data);
            reciprocal(&mut data);
            prop_assert!((data[0] - x).abs() <= 1e-12 * x.abs());
        }
    }
}
