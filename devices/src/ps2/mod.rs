//! PS/2 controller emulation (Intel 8042 compatible).
//!
//! Emulates the 8042 keyboard controller with a keyboard on the first port
//! and an optional mouse on the auxiliary port, as seen by a guest through
//! ports 0x60 (data) and 0x64 (status/command).
//!
//! # Architecture
//!
//! ```text
//!   host key events          host pointer events
//!         │                          │
//!         ▼                          ▼
//! ┌───────────────┐          ┌───────────────┐
//! │  Ps2Keyboard  │          │   Ps2Mouse    │
//! └───────┬───────┘          └───────┬───────┘
//!         │ kbd queue (128)          │ aux queue (128)
//!         ▼                          ▼
//! ┌─────────────────────────────────────────┐
//! │        Ps2Controller (this module)      │──▶ IRQ 1 / IRQ 12
//! └────────────────────┬────────────────────┘
//!                      │
//!              0x60 data │ 0x64 cmd/status
//! ```
//!
//! # Status Register (Port 0x64 read)
//!
//! | Bit | Name     | Description |
//! |-----|----------|-------------|
//! | 0   | OBF      | Output buffer full (a byte is ready at 0x60) |
//! | 1   | IBF      | Input buffer full (never set, commands complete at once) |
//! | 2   | SELFTEST | System flag, set by a passed self test |
//! | 3   | CMD      | Last write went to 0x64 |
//! | 4   | UNLOCKED | Keyboard not inhibited |
//! | 5   | MOUSE_OBF| The pending byte came from the aux device |
//! | 6   | GTO      | General timeout |
//! | 7   | PERR     | Parity error |
//!
//! Keyboard data takes priority over mouse data whenever both are queued.

mod controller;
mod keyboard;
mod keymap;
mod mouse;
mod translate;

#[cfg(test)]
mod tests;

pub use controller::{NullSystemControl, Phase, Ps2Controller, SystemControl};
pub use keymap::{KeyCode, keysym_to_set2};

use bitflags::bitflags;
use lkvm_lib::RingBuffer;

/// Capacity of each output queue.
pub const QUEUE_SIZE: usize = 128;

/// Byte queue feeding the output buffer; full queues drop new bytes.
pub type ScancodeQueue = RingBuffer<u8, QUEUE_SIZE>;

// =============================================================================
// Controller Commands (written to port 0x64)
// =============================================================================

pub const CMD_READ_MODE: u8 = 0x20;
pub const CMD_WRITE_MODE: u8 = 0x60;
pub const CMD_DISABLE_AUX: u8 = 0xA7;
pub const CMD_ENABLE_AUX: u8 = 0xA8;
pub const CMD_TEST_AUX: u8 = 0xA9;
pub const CMD_SELF_TEST: u8 = 0xAA;
pub const CMD_TEST_KBD: u8 = 0xAB;
pub const CMD_DISABLE_KBD: u8 = 0xAD;
pub const CMD_ENABLE_KBD: u8 = 0xAE;
pub const CMD_READ_INPUT_PORT: u8 = 0xC0;
pub const CMD_READ_OUTPUT_PORT: u8 = 0xD0;
pub const CMD_WRITE_OUTPUT_PORT: u8 = 0xD1;
pub const CMD_WRITE_OUTPUT_BUFFER: u8 = 0xD2;
pub const CMD_WRITE_AUX_OUTPUT_BUFFER: u8 = 0xD3;
pub const CMD_WRITE_AUX: u8 = 0xD4;
pub const CMD_DISABLE_A20: u8 = 0xDD;
pub const CMD_ENABLE_A20: u8 = 0xDF;
pub const CMD_READ_TEST_INPUTS: u8 = 0xE0;
/// `0xF0..=0xFF` pulse output-port lines low; bit 0 clear pulses reset.
pub const CMD_PULSE_BASE: u8 = 0xF0;

// =============================================================================
// Device Commands and Responses (port 0x60)
// =============================================================================

pub const KBD_CMD_SET_LEDS: u8 = 0xED;
pub const KBD_CMD_ECHO: u8 = 0xEE;
pub const KBD_CMD_SCANCODE: u8 = 0xF0;
pub const KBD_CMD_GET_ID: u8 = 0xF2;
pub const KBD_CMD_SET_RATE: u8 = 0xF3;
pub const KBD_CMD_ENABLE: u8 = 0xF4;
pub const KBD_CMD_RESET_DISABLE: u8 = 0xF5;
pub const KBD_CMD_RESET_ENABLE: u8 = 0xF6;
pub const KBD_CMD_RESET: u8 = 0xFF;

pub const AUX_CMD_SET_SCALE11: u8 = 0xE6;
pub const AUX_CMD_SET_SCALE21: u8 = 0xE7;
pub const AUX_CMD_SET_RES: u8 = 0xE8;
pub const AUX_CMD_GET_SCALE: u8 = 0xE9;
pub const AUX_CMD_SET_STREAM: u8 = 0xEA;
pub const AUX_CMD_SET_REMOTE: u8 = 0xF0;
pub const AUX_CMD_GET_TYPE: u8 = 0xF2;
pub const AUX_CMD_SET_RATE: u8 = 0xF3;
pub const AUX_CMD_ENABLE_DEV: u8 = 0xF4;
pub const AUX_CMD_DISABLE_DEV: u8 = 0xF5;
pub const AUX_CMD_SET_DEFAULT: u8 = 0xF6;
pub const AUX_CMD_RESET: u8 = 0xFF;

pub const RESPONSE_ACK: u8 = 0xFA;
pub const RESPONSE_RESEND: u8 = 0xFE;
pub const RESPONSE_BAT_OK: u8 = 0xAA;
pub const RESPONSE_SELF_TEST_OK: u8 = 0x55;

/// Prefix of extended (two-byte) scancodes.
pub const SCANCODE_EXTENDED: u8 = 0xE0;
/// Set 2 / Set 3 break prefix.
pub const SCANCODE_BREAK: u8 = 0xF0;

bitflags! {
    /// Status register, read from port 0x64.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        const OBF       = 1 << 0;
        const IBF       = 1 << 1;
        const SELFTEST  = 1 << 2;
        const CMD       = 1 << 3;
        const UNLOCKED  = 1 << 4;
        const MOUSE_OBF = 1 << 5;
        const GTO       = 1 << 6;
        const PERR      = 1 << 7;
    }
}

bitflags! {
    /// Controller mode ("command byte"), commands 0x20 / 0x60.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Mode: u8 {
        /// Raise IRQ 1 for keyboard data.
        const KBD_INT       = 1 << 0;
        /// Raise IRQ 12 for aux data.
        const MOUSE_INT     = 1 << 1;
        const SYS           = 1 << 2;
        const NO_KEYLOCK    = 1 << 3;
        const DISABLE_KBD   = 1 << 4;
        const DISABLE_MOUSE = 1 << 5;
        /// Translate keyboard output to Set 1.
        const TRANSLATE     = 1 << 6;
    }
}

bitflags! {
    /// Controller output port, commands 0xD0 / 0xD1.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OutPort: u8 {
        /// Active low: clearing it resets the system.
        const RESET     = 1 << 0;
        const A20       = 1 << 1;
        const OBF       = 1 << 4;
        const MOUSE_OBF = 1 << 5;
    }
}

bitflags! {
    /// Devices with at least one byte queued.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Pending: u8 {
        const KBD = 1 << 0;
        const AUX = 1 << 1;
    }
}
