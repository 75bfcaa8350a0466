//! Device-layer error type.

use core::fmt;

use lkvm_mm::MmioError;

/// Errors from wiring devices into the port and memory buses.
///
/// Guest-triggered conditions never surface here; those are logged and
/// absorbed by the device models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    IoPortOverlap { base: u16, count: u16 },
    IoPortEmpty { base: u16 },
    IoPortNotRegistered { port: u16 },
    Mmio(MmioError),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoPortOverlap { base, count } => {
                write!(
                    f,
                    "I/O ports {:#06x}..{:#06x} overlap an existing range",
                    base,
                    *base as u32 + *count as u32
                )
            }
            Self::IoPortEmpty { base } => write!(f, "empty I/O port range at {:#06x}", base),
            Self::IoPortNotRegistered { port } => {
                write!(f, "no I/O port range starts at {:#06x}", port)
            }
            Self::Mmio(err) => write!(f, "mmio: {}", err),
        }
    }
}

impl From<MmioError> for DeviceError {
    fn from(err: MmioError) -> Self {
        Self::Mmio(err)
    }
}

pub type DeviceResult<T = ()> = Result<T, DeviceError>;
