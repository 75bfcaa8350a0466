//! Linear VESA framebuffer memory.
//!
//! The guest sees a plain linear framebuffer at a fixed guest-physical base.
//! Behind it sits an owned host buffer; every guest access goes through the
//! MMIO registry and is clamped to the buffer, so a stray offset can never
//! reach host memory outside it. A display consumer polls
//! [`Framebuffer::take_dirty`] and copies pixels out with
//! [`Framebuffer::read_pixels`] or [`Framebuffer::with_pixels`].

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use lkvm_abi::{VESA_BPP, VESA_HEIGHT, VESA_MEM_ADDR, VESA_WIDTH};
use lkvm_lib::vm_info;
use spin::RwLock;

use crate::error::{MmioError, MmioResult};
use crate::mmio::{MmioHandler, MmioRegistry};

pub struct Framebuffer {
    base: u64,
    width: u32,
    height: u32,
    bpp: u32,
    mem: RwLock<Vec<u8>>,
    dirty: AtomicBool,
}

impl Framebuffer {
    /// Allocate a zeroed `width` x `height` buffer at guest address `base`.
    ///
    /// Fails with [`MmioError::RangeOverflow`] when the size does not fit the
    /// host or the guest address space, and with [`MmioError::NoMemory`] when
    /// the host cannot back it.
    pub fn new(base: u64, width: u32, height: u32, bpp: u32) -> MmioResult<Self> {
        let bytes_per_pixel = bpp.div_ceil(8);
        let overflow = MmioError::RangeOverflow {
            start: base,
            len: u64::from(width)
                .saturating_mul(u64::from(height))
                .saturating_mul(u64::from(bytes_per_pixel)),
        };
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel as usize))
            .ok_or(overflow)?;
        if base.checked_add(len as u64).is_none() {
            return Err(overflow);
        }

        let mut mem = Vec::new();
        mem.try_reserve_exact(len).map_err(|_| MmioError::NoMemory)?;
        mem.resize(len, 0);

        Ok(Self {
            base,
            width,
            height,
            bpp,
            mem: RwLock::new(mem),
            dirty: AtomicBool::new(false),
        })
    }

    /// 640x480x32 at the conventional VESA aperture.
    pub fn vesa_default() -> MmioResult<Self> {
        Self::new(VESA_MEM_ADDR, VESA_WIDTH, VESA_HEIGHT, VESA_BPP)
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    /// Bytes per scanline.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.bpp.div_ceil(8) as usize
    }

    pub fn len(&self) -> usize {
        self.mem.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim `[base, base + len)` in `registry`.
    pub fn attach(self: &Arc<Self>, registry: &MmioRegistry) -> MmioResult {
        registry.register(self.base, self.len() as u64, self.clone())?;
        vm_info!(
            "vesa: {}x{}x{} framebuffer at {:#x}",
            self.width,
            self.height,
            self.bpp,
            self.base
        );
        Ok(())
    }

    /// Copy pixels starting at byte `offset` into `out`. Returns the number
    /// of bytes copied, short when the copy would run past the end.
    pub fn read_pixels(&self, offset: usize, out: &mut [u8]) -> usize {
        let mem = self.mem.read();
        let n = clamp_len(mem.len(), offset, out.len());
        if n > 0 {
            out[..n].copy_from_slice(&mem[offset..offset + n]);
        }
        n
    }

    /// Run `f` over the whole pixel buffer with guest writes held off.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.mem.read())
    }

    /// Whether the guest wrote since the last call; clears the flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

/// Bytes of an access of `want` at `offset` that fall inside `[0, len)`.
#[inline]
fn clamp_len(len: usize, offset: usize, want: usize) -> usize {
    len.saturating_sub(offset).min(want)
}

impl MmioHandler for Framebuffer {
    fn mmio(&self, addr: u64, data: &mut [u8], is_write: bool) {
        let offset = addr
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .unwrap_or(usize::MAX);

        if is_write {
            let mut mem = self.mem.write();
            let n = clamp_len(mem.len(), offset, data.len());
            if n > 0 {
                mem[offset..offset + n].copy_from_slice(&data[..n]);
                self.dirty.store(true, Ordering::Release);
            }
        } else {
            let mem = self.mem.read();
            let n = clamp_len(mem.len(), offset, data.len());
            if n > 0 {
                data[..n].copy_from_slice(&mem[offset..offset + n]);
            }
            data[n..].fill(0);
        }
    }
}
