//! Device configuration.
//!
//! Parsed from a `key=value` string in the same format the hypervisor
//! accepts on its command line, e.g.
//!
//! ```text
//! i8042=on i8042.mouse=off vesa.base=0xe0000000 vesa.width=1024 loglevel=debug
//! ```
//!
//! Unknown keys are skipped and malformed values leave the default in place,
//! so a typo never stops a VM from booting.

use lkvm_abi::{I8042_AUX_IRQ, I8042_KBD_IRQ, VESA_BPP, VESA_HEIGHT, VESA_MEM_ADDR, VESA_WIDTH};
use lkvm_lib::cmdline::{parse_bool, parse_u64, tokens};
use lkvm_lib::{LogLevel, vm_debug};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I8042Config {
    pub enabled: bool,
    pub kbd_irq: u8,
    pub aux_irq: u8,
    /// Model a mouse on the auxiliary port.
    pub mouse: bool,
}

impl Default for I8042Config {
    fn default() -> Self {
        Self {
            enabled: true,
            kbd_irq: I8042_KBD_IRQ,
            aux_irq: I8042_AUX_IRQ,
            mouse: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VesaConfig {
    pub enabled: bool,
    pub base: u64,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
}

impl Default for VesaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base: VESA_MEM_ADDR,
            width: VESA_WIDTH,
            height: VESA_HEIGHT,
            bpp: VESA_BPP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub i8042: I8042Config,
    pub vesa: VesaConfig,
    /// Logging threshold given on the command line. The threshold is
    /// process-wide, so the host applies it rather than each platform.
    pub log_level: Option<LogLevel>,
}

impl DeviceConfig {
    pub fn from_cmdline(cmdline: Option<&str>) -> Self {
        let mut config = Self::default();
        let Some(cmdline) = cmdline else {
            return config;
        };

        for (key, value) in tokens(cmdline) {
            if !config.apply(key, value) {
                vm_debug!("config: ignoring '{}={}'", key, value);
            }
        }
        config
    }

    /// Apply one token. Returns false for unknown keys and bad values.
    fn apply(&mut self, key: &str, value: &str) -> bool {
        match key {
            "i8042" => set(&mut self.i8042.enabled, parse_bool(value)),
            "i8042.mouse" => set(&mut self.i8042.mouse, parse_bool(value)),
            "i8042.kbd_irq" => set(&mut self.i8042.kbd_irq, parse_irq(value)),
            "i8042.aux_irq" => set(&mut self.i8042.aux_irq, parse_irq(value)),
            "vesa" => set(&mut self.vesa.enabled, parse_bool(value)),
            "vesa.base" => set(&mut self.vesa.base, parse_u64(value)),
            "vesa.width" => set(&mut self.vesa.width, parse_dim(value)),
            "vesa.height" => set(&mut self.vesa.height, parse_dim(value)),
            "vesa.bpp" => set(
                &mut self.vesa.bpp,
                parse_dim(value).filter(|bpp| matches!(bpp, 8 | 16 | 24 | 32)),
            ),
            "loglevel" => match LogLevel::parse(value) {
                Some(level) => {
                    self.log_level = Some(level);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn parse_irq(value: &str) -> Option<u8> {
    parse_u64(value)
        .filter(|&irq| irq < lkvm_abi::ports::ISA_IRQ_LINES as u64)
        .map(|irq| irq as u8)
}

fn parse_dim(value: &str) -> Option<u32> {
    parse_u64(value)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v != 0)
}
