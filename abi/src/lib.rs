//! Plain data shared between the device layer and its collaborators.
//!
//! The trap handlers, the remote-display input path, and the framebuffer
//! consumer all agree on the definitions in this crate. There is no logic
//! here beyond small conversions, so every other crate can depend on it
//! without pulling in the emulation code.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod input;
pub mod keysym;
pub mod ports;
pub mod vesa;

pub use input::{HostInput, PointerButtons};
pub use keysym::KeySym;
pub use ports::{
    I8042_AUX_IRQ, I8042_COMMAND_PORT, I8042_DATA_PORT, I8042_KBD_IRQ, I8042_PORT_WIDTH,
};
pub use vesa::{VESA_BPP, VESA_HEIGHT, VESA_MEM_ADDR, VESA_MEM_SIZE, VESA_WIDTH};
