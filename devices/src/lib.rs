#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod ioport;
pub mod irq;
pub mod platform;
pub mod ps2;

pub use config::{DeviceConfig, I8042Config, VesaConfig};
pub use error::{DeviceError, DeviceResult};
pub use ioport::{IoPortBus, IoPortOps};
pub use irq::{IrqLevels, IrqLine};
pub use platform::Platform;
pub use ps2::{NullSystemControl, Phase, Ps2Controller, SystemControl};
