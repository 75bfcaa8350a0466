//! Interrupt line signalling.
//!
//! Device models drive level-triggered ISA lines through [`IrqLine`]. The
//! hypervisor backs it with its interrupt-controller model (or the KVM
//! `irq_line` ioctl); [`IrqLevels`] is a self-contained latch for hosts that
//! poll levels instead.

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use lkvm_abi::ports::ISA_IRQ_LINES;
use lkvm_lib::vm_trace;

pub trait IrqLine: Send + Sync {
    /// Drive `line` high (`true`) or low. Repeating the current level is a no-op.
    fn set_irq_line(&self, line: u8, level: bool);
}

/// Levels of the 16 legacy lines plus a rising-edge count per line.
pub struct IrqLevels {
    levels: AtomicU16,
    asserts: [AtomicU32; ISA_IRQ_LINES],
}

impl Default for IrqLevels {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqLevels {
    pub const fn new() -> Self {
        Self {
            levels: AtomicU16::new(0),
            asserts: [const { AtomicU32::new(0) }; ISA_IRQ_LINES],
        }
    }

    /// Current level of `line`; lines past 15 always read low.
    pub fn level(&self, line: u8) -> bool {
        (line as usize) < ISA_IRQ_LINES && self.levels.load(Ordering::Acquire) & (1 << line) != 0
    }

    /// Number of low-to-high transitions seen on `line`.
    pub fn assert_count(&self, line: u8) -> u32 {
        self.asserts
            .get(line as usize)
            .map_or(0, |count| count.load(Ordering::Acquire))
    }

    /// Bitmask of every line currently high.
    pub fn raised(&self) -> u16 {
        self.levels.load(Ordering::Acquire)
    }
}

impl IrqLine for IrqLevels {
    fn set_irq_line(&self, line: u8, level: bool) {
        let Some(count) = self.asserts.get(line as usize) else {
            vm_trace!("irq: ignoring level change on line {}", line);
            return;
        };
        let bit = 1u16 << line;
        if level {
            let prev = self.levels.fetch_or(bit, Ordering::AcqRel);
            if prev & bit == 0 {
                count.fetch_add(1, Ordering::AcqRel);
            }
        } else {
            self.levels.fetch_and(!bit, Ordering::AcqRel);
        }
    }
}
