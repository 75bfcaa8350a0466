//! Default geometry of the linear VESA framebuffer.

pub const VESA_WIDTH: u32 = 640;
pub const VESA_HEIGHT: u32 = 480;
pub const VESA_BPP: u32 = 32;

/// Guest-physical base of the framebuffer aperture.
pub const VESA_MEM_ADDR: u64 = 0xD000_0000;
/// Size in bytes of the default framebuffer (four bytes per pixel).
pub const VESA_MEM_SIZE: usize = (VESA_WIDTH * VESA_HEIGHT * (VESA_BPP / 8)) as usize;
