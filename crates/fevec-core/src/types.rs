//! Scalar type, memory spaces, copy modes, and norm kinds.

use std::fmt;

use crate::error::VectorError;

/// Element type stored by every vector.
pub type Scalar = f64;

/// Threshold below which [`reciprocal`](crate::kernels::reciprocal) leaves
/// an element unchanged.
pub const EPSILON: Scalar = 1e-16;

/// Largest supported vector length in elements.
///
/// Lengths are exchanged with element-restriction and basis code as signed
/// 32-bit integers, so anything above `i32::MAX` is rejected at creation.
pub const MAX_LENGTH: usize = i32::MAX as usize;

/// One of the two independently addressable memory spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemType {
    /// Ordinary process memory.
    Host,
    /// Accelerator memory, reachable only through a device runtime.
    Device,
}

impl MemType {
    /// The opposite memory space.
    pub fn other(self) -> Self {
        match self {
            Self::Host => Self::Device,
            Self::Device => Self::Host,
        }
    }
}

impl fmt::Display for MemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Device => write!(f, "device"),
        }
    }
}

impl TryFrom<i32> for MemType {
    type Error = VectorError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Host),
            1 => Ok(Self::Device),
            _ => Err(VectorError::InvalidArgument {
                reason: format!("unsupported memory type {raw}"),
            }),
        }
    }
}

/// How an array handed to a vector is adopted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyMode {
    /// Copy the values into memory owned by the vector.
    CopyValues,
    /// The vector adopts the array and releases it when done.
    TakeOwnership,
    /// The vector uses the array but the caller keeps ownership.
    Borrow,
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CopyValues => write!(f, "copy-values"),
            Self::TakeOwnership => write!(f, "take-ownership"),
            Self::Borrow => write!(f, "borrow"),
        }
    }
}

impl TryFrom<i32> for CopyMode {
    type Error = VectorError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::CopyValues),
            1 => Ok(Self::TakeOwnership),
            2 => Ok(Self::Borrow),
            _ => Err(VectorError::InvalidArgument {
                reason: format!("unsupported copy mode {raw}"),
            }),
        }
    }
}

/// Vector norm kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NormType {
    /// Sum of absolute values.
    One,
    /// Euclidean norm.
    Two,
    /// Absolute value of the element at the first index of the largest
    /// signed value.
    ///
    /// This is *not* the maximum of absolute values: `[1, -5, 3, 4]` has a
    /// `Max` norm of `4`.
    Max,
}

impl fmt::Display for NormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "l1"),
            Self::Two => write!(f, "l2"),
            Self::Max => write!(f, "max"),
        }
    }
}

impl TryFrom<i32> for NormType {
    type Error = VectorError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::One),
            1 => Ok(Self::Two),
            2 => Ok(Self::Max),
            _ => Err(VectorError::InvalidArgument {
                reason: format!("unsupported norm type {raw}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_flips_space() {
        assert_eq!(MemType::Host.other(), MemType::Device);
        assert_eq!(MemType::Device.other(), MemType::Host);
    }

    #[test]
    fn raw_mem_type_conversion() {
        assert_eq!(MemType::try_from(0).unwrap(), MemType::Host);
        assert_eq!(MemType::try_from(1).unwrap(), MemType::Device);
        assert!(matches!(
            MemType::try_from(7),
            Err(VectorError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn raw_copy_mode_conversion() {
        assert_eq!(CopyMode::try_from(2).unwrap(), CopyMode::Borrow);
        assert!(CopyMode::try_from(-1).is_err());
    }

    #[test]
    fn raw_norm_conversion() {
        assert_eq!(NormType::try_from(2).unwrap(), NormType::Max);
        assert!(NormType::try_from(3).is_err());
    }

    #[test]
    fn max_length_matches_i32() {
        assert_eq!(MAX_LENGTH, 2_147_483_647);
    }
}
