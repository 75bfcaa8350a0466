//! Error type for the guest-physical MMIO layer.

use core::fmt;

/// MMIO registration and lookup error.
///
/// Nothing here is fatal to the VMM: the caller decides whether a failed
/// registration aborts device setup or is merely logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmioError {
    NoMemory,
    EmptyRange { start: u64 },
    RangeOverflow { start: u64, len: u64 },
    DuplicateStart { start: u64 },
    NotMapped { addr: u64 },
}

impl fmt::Display for MmioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMemory => write!(f, "out of memory for MMIO region"),
            Self::EmptyRange { start } => {
                write!(f, "empty MMIO range at {:#x}", start)
            }
            Self::RangeOverflow { start, len } => {
                write!(
                    f,
                    "MMIO range {:#x} + {:#x} wraps the address space",
                    start, len
                )
            }
            Self::DuplicateStart { start } => {
                write!(f, "an MMIO range already starts at {:#x}", start)
            }
            Self::NotMapped { addr } => {
                write!(f, "no MMIO range contains {:#x}", addr)
            }
        }
    }
}

/// Convenience result type for MMIO operations.
pub type MmioResult<T = ()> = Result<T, MmioError>;
