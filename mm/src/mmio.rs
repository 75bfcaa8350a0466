//! Guest-physical MMIO dispatch.
//!
//! Device models claim guest-physical ranges here; the memory-access trap
//! handler calls [`MmioRegistry::dispatch`] for every faulting access. The
//! whole tree sits behind one mutex, so a lookup never observes a tree that a
//! concurrent register or deregister is in the middle of rebalancing.

use alloc::sync::Arc;
use alloc::vec::Vec;

use lkvm_lib::{vm_debug, vm_warn};
use spin::Mutex;

use crate::error::{MmioError, MmioResult};
use crate::interval_tree::IntervalTree;

/// Callback for accesses that land inside a registered range.
///
/// `data` is the host-side access buffer: filled by the handler on reads,
/// holding the guest's bytes on writes. Its length is the access width.
pub trait MmioHandler: Send + Sync {
    fn mmio(&self, addr: u64, data: &mut [u8], is_write: bool);
}

impl<F> MmioHandler for F
where
    F: Fn(u64, &mut [u8], bool) + Send + Sync,
{
    #[inline]
    fn mmio(&self, addr: u64, data: &mut [u8], is_write: bool) {
        self(addr, data, is_write)
    }
}

pub struct MmioRegistry {
    tree: Mutex<IntervalTree<Arc<dyn MmioHandler>>>,
}

impl Default for MmioRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MmioRegistry {
    pub const fn new() -> Self {
        Self {
            tree: Mutex::new(IntervalTree::new()),
        }
    }

    /// Claim `[start, start + len)` for `handler`.
    ///
    /// Only an identical start is rejected; partial overlaps with other
    /// ranges are the caller's responsibility.
    pub fn register(&self, start: u64, len: u64, handler: Arc<dyn MmioHandler>) -> MmioResult {
        if len == 0 {
            return Err(MmioError::EmptyRange { start });
        }
        let end = start
            .checked_add(len)
            .ok_or(MmioError::RangeOverflow { start, len })?;

        self.tree.lock().insert(start, end, handler)?;
        vm_debug!("mmio: registered [{:#x}, {:#x})", start, end);
        Ok(())
    }

    /// Release the range containing `addr`.
    ///
    /// A handler already running on another vCPU keeps its own reference
    /// and finishes normally.
    pub fn deregister(&self, addr: u64) -> MmioResult {
        let mut tree = self.tree.lock();
        let (start, end) = tree.find_range(addr).ok_or(MmioError::NotMapped { addr })?;
        let handler = tree.remove(addr);
        drop(tree);
        drop(handler);
        vm_debug!("mmio: deregistered [{:#x}, {:#x})", start, end);
        Ok(())
    }

    /// Route one guest access. Returns false if no range contains `addr`.
    ///
    /// The handler runs with the registry unlocked, so it may register or
    /// deregister ranges itself. Unhandled reads see zeros; unhandled writes
    /// are dropped.
    pub fn dispatch(&self, addr: u64, data: &mut [u8], is_write: bool) -> bool {
        let handler = self.tree.lock().find(addr).cloned();
        match handler {
            Some(handler) => {
                handler.mmio(addr, data, is_write);
                true
            }
            None => {
                vm_warn!(
                    "Ignoring MMIO {} at {:#018x} (length {})",
                    if is_write { "write" } else { "read" },
                    addr,
                    data.len()
                );
                if !is_write {
                    data.fill(0);
                }
                false
            }
        }
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.tree.lock().find(addr).is_some()
    }

    pub fn len(&self) -> usize {
        self.tree.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.lock().is_empty()
    }

    /// In-order `(start, end)` of every registered range.
    pub fn regions(&self) -> Vec<(u64, u64)> {
        self.tree.lock().ranges()
    }
}
