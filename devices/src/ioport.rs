//! Port I/O dispatch.
//!
//! Maps contiguous port ranges to device handlers. The vCPU exit path calls
//! [`IoPortBus::io_in`] / [`IoPortBus::io_out`] for every `IN`/`OUT`; ports
//! nobody claimed behave like an empty ISA bus (reads float to all-ones,
//! writes vanish).
//!
//! Accesses are described the way the KVM exit reports them: `size` bytes
//! per transfer (1, 2 or 4), `count` transfers for string instructions,
//! packed back to back in `data`.

use alloc::sync::Arc;
use alloc::vec::Vec;

use lkvm_lib::{vm_debug, vm_info};
use spin::RwLock;

use crate::error::{DeviceError, DeviceResult};

pub trait IoPortOps: Send + Sync {
    /// Guest `IN`: fill `data` (`size * count` bytes). Returns true if handled.
    fn io_in(&self, port: u16, data: &mut [u8], size: usize, count: usize) -> bool;

    /// Guest `OUT`: consume `data` (`size * count` bytes). Returns true if handled.
    fn io_out(&self, port: u16, data: &[u8], size: usize, count: usize) -> bool;
}

struct IoRegion {
    base: u16,
    count: u16,
    ops: Arc<dyn IoPortOps>,
}

impl IoRegion {
    #[inline]
    fn end(&self) -> u32 {
        self.base as u32 + self.count as u32
    }

    #[inline]
    fn contains(&self, port: u16) -> bool {
        port >= self.base && (port as u32) < self.end()
    }
}

#[derive(Default)]
pub struct IoPortBus {
    regions: RwLock<Vec<IoRegion>>,
}

impl IoPortBus {
    pub const fn new() -> Self {
        Self {
            regions: RwLock::new(Vec::new()),
        }
    }

    /// Claim `[base, base + count)` for `ops`. Ranges may not overlap.
    pub fn register(&self, base: u16, count: u16, ops: Arc<dyn IoPortOps>) -> DeviceResult {
        if count == 0 {
            return Err(DeviceError::IoPortEmpty { base });
        }
        let end = base as u32 + count as u32;

        let mut regions = self.regions.write();
        if regions
            .iter()
            .any(|r| (base as u32) < r.end() && (r.base as u32) < end)
        {
            return Err(DeviceError::IoPortOverlap { base, count });
        }
        regions.push(IoRegion { base, count, ops });
        drop(regions);

        vm_info!("ioport: registered {:#06x}..{:#06x}", base, end);
        Ok(())
    }

    /// Release the range that starts at `base`.
    pub fn unregister(&self, base: u16) -> DeviceResult {
        let mut regions = self.regions.write();
        let idx = regions
            .iter()
            .position(|r| r.base == base)
            .ok_or(DeviceError::IoPortNotRegistered { port: base })?;
        let region = regions.swap_remove(idx);
        drop(regions);
        vm_debug!("ioport: unregistered {:#06x}..{:#06x}", region.base, region.end());
        Ok(())
    }

    pub fn is_registered(&self, port: u16) -> bool {
        self.lookup(port).is_some()
    }

    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }

    /// Handler for `port`, cloned so the call runs with the table unlocked.
    fn lookup(&self, port: u16) -> Option<Arc<dyn IoPortOps>> {
        self.regions
            .read()
            .iter()
            .find(|r| r.contains(port))
            .map(|r| r.ops.clone())
    }

    pub fn io_in(&self, port: u16, data: &mut [u8], size: usize, count: usize) -> bool {
        match self.lookup(port) {
            Some(ops) => ops.io_in(port, data, size, count),
            None => {
                vm_debug!("ioport: unhandled in {:#06x} (size {}, count {})", port, size, count);
                data.fill(0xFF);
                false
            }
        }
    }

    pub fn io_out(&self, port: u16, data: &[u8], size: usize, count: usize) -> bool {
        match self.lookup(port) {
            Some(ops) => ops.io_out(port, data, size, count),
            None => {
                vm_debug!("ioport: unhandled out {:#06x} (size {}, count {})", port, size, count);
                false
            }
        }
    }
}
