//! Per-VM device context.
//!
//! A [`Platform`] owns everything the guest-facing trap paths touch: the
//! MMIO registry, the I/O-port bus and the devices attached to them. The
//! vCPU threads call [`Platform::mmio_access`], [`Platform::io_in`] and
//! [`Platform::io_out`]; the remote-display thread calls
//! [`Platform::handle_input`]. Several VMs in one process simply own
//! several platforms.

use alloc::sync::Arc;

use lkvm_abi::{HostInput, KeySym, PointerButtons};
use lkvm_lib::{vm_info, vm_warn};
use lkvm_mm::{Framebuffer, MmioHandler, MmioRegistry};

use crate::config::DeviceConfig;
use crate::error::DeviceResult;
use crate::ioport::IoPortBus;
use crate::irq::IrqLine;
use crate::ps2::{Ps2Controller, SystemControl};

pub struct Platform {
    config: DeviceConfig,
    mmio: MmioRegistry,
    ioports: IoPortBus,
    ps2: Option<Arc<Ps2Controller>>,
    framebuffer: Option<Arc<Framebuffer>>,
}

impl Platform {
    /// Build the device set described by `config`.
    ///
    /// `irq` receives every interrupt level change; `sysctl` is told about
    /// A20 and guest-requested resets. `config.log_level` is left for the
    /// embedding process to apply, since the log threshold is shared by
    /// every platform in it.
    pub fn new(
        config: DeviceConfig,
        irq: Arc<dyn IrqLine>,
        sysctl: Arc<dyn SystemControl>,
    ) -> DeviceResult<Self> {
        let mut platform = Self {
            config,
            mmio: MmioRegistry::new(),
            ioports: IoPortBus::new(),
            ps2: None,
            framebuffer: None,
        };

        if config.i8042.enabled {
            let ps2 = Arc::new(Ps2Controller::from_config(&config.i8042, irq, sysctl));
            if let Err(err) = ps2.attach(&platform.ioports) {
                vm_warn!("platform: i8042 attach failed: {}", err);
                return Err(err);
            }
            platform.ps2 = Some(ps2);
        }

        if config.vesa.enabled {
            let vesa = config.vesa;
            let fb = match Framebuffer::new(vesa.base, vesa.width, vesa.height, vesa.bpp) {
                Ok(fb) => Arc::new(fb),
                Err(err) => {
                    vm_warn!(
                        "platform: {}x{}x{} framebuffer rejected: {}",
                        vesa.width,
                        vesa.height,
                        vesa.bpp,
                        err
                    );
                    return Err(err.into());
                }
            };
            if let Err(err) = fb.attach(&platform.mmio) {
                vm_warn!("platform: framebuffer attach failed: {}", err);
                return Err(err.into());
            }
            platform.framebuffer = Some(fb);
        }

        vm_info!(
            "platform: {} mmio region(s), {} port range(s)",
            platform.mmio.len(),
            platform.ioports.len()
        );
        Ok(platform)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn mmio(&self) -> &MmioRegistry {
        &self.mmio
    }

    pub fn ioports(&self) -> &IoPortBus {
        &self.ioports
    }

    pub fn ps2(&self) -> Option<&Arc<Ps2Controller>> {
        self.ps2.as_ref()
    }

    pub fn framebuffer(&self) -> Option<&Arc<Framebuffer>> {
        self.framebuffer.as_ref()
    }

    /// Map `[start, start + len)` to `handler`.
    pub fn register_mmio(
        &self,
        start: u64,
        len: u64,
        handler: Arc<dyn MmioHandler>,
    ) -> DeviceResult {
        self.mmio.register(start, len, handler).map_err(|err| {
            vm_warn!("platform: mmio register at {:#x} failed: {}", start, err);
            err.into()
        })
    }

    /// Unmap the region containing `addr`.
    pub fn deregister_mmio(&self, addr: u64) -> DeviceResult {
        self.mmio.deregister(addr).map_err(|err| {
            vm_warn!("platform: mmio deregister at {:#x} failed: {}", addr, err);
            err.into()
        })
    }

    // =========================================================================
    // Trap entry points
    // =========================================================================

    pub fn mmio_access(&self, addr: u64, data: &mut [u8], is_write: bool) -> bool {
        self.mmio.dispatch(addr, data, is_write)
    }

    pub fn io_in(&self, port: u16, data: &mut [u8], size: usize, count: usize) -> bool {
        self.ioports.io_in(port, data, size, count)
    }

    pub fn io_out(&self, port: u16, data: &[u8], size: usize, count: usize) -> bool {
        self.ioports.io_out(port, data, size, count)
    }

    // =========================================================================
    // Host input
    // =========================================================================

    pub fn key_event(&self, pressed: bool, sym: KeySym) -> bool {
        self.ps2
            .as_ref()
            .is_some_and(|ps2| ps2.key_event(pressed, sym))
    }

    pub fn pointer_event(&self, buttons: PointerButtons, x: i32, y: i32) -> bool {
        self.ps2
            .as_ref()
            .is_some_and(|ps2| ps2.pointer_event(buttons, x, y))
    }

    /// Route one event from the remote-display collaborator.
    pub fn handle_input(&self, event: HostInput) -> bool {
        match event {
            HostInput::Key { pressed, sym } => self.key_event(pressed, sym),
            HostInput::Pointer { buttons, x, y } => self.pointer_event(buttons, x, y),
        }
    }
}
