use alloc::sync::Arc;

use lkvm_abi::{I8042_COMMAND_PORT, I8042_DATA_PORT, I8042_PORT_WIDTH, KeySym, PointerButtons};
use lkvm_lib::{vm_debug, vm_info, vm_trace};
use spin::Mutex;

use super::keyboard::Ps2Keyboard;
use super::keymap::keysym_to_set2;
use super::mouse::Ps2Mouse;
use super::*;
use crate::config::I8042Config;
use crate::error::DeviceResult;
use crate::ioport::{IoPortBus, IoPortOps};
use crate::irq::IrqLine;

/// Board-level lines the 8042 drives besides its interrupts.
///
/// Both hooks default to doing nothing, which suits hosts that neither gate
/// A20 nor support guest-initiated resets. They run after the controller
/// lock is released, so an implementation may call back into the
/// controller, e.g. [`Ps2Controller::reset`].
pub trait SystemControl: Send + Sync {
    fn set_a20(&self, _enabled: bool) {}
    fn request_reset(&self) {}
}

pub struct NullSystemControl;

impl SystemControl for NullSystemControl {}

/// What the controller does with the next byte written to port 0x60.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingModeData,
    AwaitingOutputBufferData,
    AwaitingAuxOutputBufferData,
    AwaitingOutputPortData,
    AwaitingAuxDeviceData,
    /// The keyboard acknowledged `cmd` and wants its parameter byte.
    AwaitingKeyboardSubcommandData(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingWrite {
    Mode,
    OutputBuffer,
    AuxOutputBuffer,
    OutputPort,
    AuxDevice,
}

/// Board-line changes made by one guest write, delivered once the state
/// lock is dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SysRequests {
    a20: Option<bool>,
    reset: bool,
}

struct ControllerState {
    status: Status,
    mode: Mode,
    outport: OutPort,
    pending_write: Option<PendingWrite>,
    kbd_queue: ScancodeQueue,
    aux_queue: ScancodeQueue,
    /// Queue that supplied the last byte read, replayed when both are empty.
    last_from_aux: bool,
    keyboard: Ps2Keyboard,
    mouse: Option<Ps2Mouse>,
}

impl ControllerState {
    fn new(mouse: bool) -> Self {
        Self {
            status: Status::CMD | Status::UNLOCKED,
            mode: Mode::KBD_INT | Mode::MOUSE_INT,
            outport: OutPort::RESET | OutPort::A20,
            pending_write: None,
            kbd_queue: ScancodeQueue::new(),
            aux_queue: ScancodeQueue::new(),
            last_from_aux: false,
            keyboard: Ps2Keyboard::new(),
            mouse: mouse.then(Ps2Mouse::new),
        }
    }

    #[inline]
    fn translate(&self) -> bool {
        self.mode.contains(Mode::TRANSLATE)
    }

    fn pending(&self) -> Pending {
        let mut pending = Pending::empty();
        pending.set(Pending::KBD, !self.kbd_queue.is_empty());
        pending.set(Pending::AUX, !self.aux_queue.is_empty());
        pending
    }

    /// Controller replies share the keyboard queue with scancodes.
    #[inline]
    fn reply(&mut self, byte: u8) {
        self.kbd_queue.push(byte);
    }
}

/// Intel 8042 keyboard controller with its keyboard and optional mouse.
///
/// All state sits behind one lock. Interrupt lines are driven while the
/// lock is held, so a vCPU that takes the interrupt and reads port 0x64
/// always sees a status consistent with the line it was woken by.
pub struct Ps2Controller {
    state: Mutex<ControllerState>,
    irq: Arc<dyn IrqLine>,
    sysctl: Arc<dyn SystemControl>,
    kbd_irq: u8,
    aux_irq: u8,
}

impl Ps2Controller {
    pub fn new(irq: Arc<dyn IrqLine>, sysctl: Arc<dyn SystemControl>) -> Self {
        Self::from_config(&I8042Config::default(), irq, sysctl)
    }

    pub fn from_config(
        config: &I8042Config,
        irq: Arc<dyn IrqLine>,
        sysctl: Arc<dyn SystemControl>,
    ) -> Self {
        Self {
            state: Mutex::new(ControllerState::new(config.mouse)),
            irq,
            sysctl,
            kbd_irq: config.kbd_irq,
            aux_irq: config.aux_irq,
        }
    }

    /// Claim ports 0x60 and 0x64 on `bus` and drive both lines low.
    pub fn attach(self: &Arc<Self>, bus: &IoPortBus) -> DeviceResult {
        let ops: Arc<dyn IoPortOps> = self.clone();
        bus.register(I8042_DATA_PORT, I8042_PORT_WIDTH, ops.clone())?;
        if let Err(err) = bus.register(I8042_COMMAND_PORT, I8042_PORT_WIDTH, ops) {
            let _ = bus.unregister(I8042_DATA_PORT);
            return Err(err);
        }

        let mut state = self.state.lock();
        self.update_irq(&mut state);
        drop(state);

        vm_info!(
            "i8042: attached (kbd irq {}, aux irq {}, mouse {})",
            self.kbd_irq,
            self.aux_irq,
            if self.has_mouse() { "on" } else { "off" }
        );
        Ok(())
    }

    /// Back to power-on state. Queued bytes are discarded.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let mouse = state.mouse.is_some();
        *state = ControllerState::new(mouse);
        self.update_irq(&mut state);
    }

    // =========================================================================
    // Guest register access
    // =========================================================================

    /// One guest byte read. Ports other than 0x60/0x64 float high.
    pub fn read_port(&self, port: u16) -> u8 {
        match port {
            I8042_DATA_PORT => {
                let mut state = self.state.lock();
                self.read_data(&mut state)
            }
            I8042_COMMAND_PORT => self.state.lock().status.bits(),
            _ => 0xFF,
        }
    }

    /// One guest byte write. Ports other than 0x60/0x64 are ignored.
    pub fn write_port(&self, port: u16, byte: u8) {
        match port {
            I8042_DATA_PORT => {
                let mut state = self.state.lock();
                let requests = self.write_data(&mut state, byte);
                drop(state);
                self.deliver(requests);
            }
            I8042_COMMAND_PORT => {
                let mut state = self.state.lock();
                let requests = self.write_command(&mut state, byte);
                drop(state);
                self.deliver(requests);
            }
            _ => vm_trace!("i8042: ignoring write {:#04x} to port {:#06x}", byte, port),
        }
    }

    fn deliver(&self, requests: SysRequests) {
        if let Some(enabled) = requests.a20 {
            self.sysctl.set_a20(enabled);
        }
        if requests.reset {
            self.sysctl.request_reset();
        }
    }

    // =========================================================================
    // Host input
    // =========================================================================

    /// Deliver a host key transition. Returns true if bytes were queued.
    pub fn key_event(&self, pressed: bool, sym: KeySym) -> bool {
        let Some(key) = keysym_to_set2(sym) else {
            vm_trace!("i8042: no scancode for keysym {:#x}", sym.0);
            return false;
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let translate = state.translate();
        let queued = state
            .keyboard
            .key_event(key, pressed, translate, &mut state.kbd_queue);
        if queued {
            self.update_irq(state);
        }
        queued
    }

    /// Deliver an absolute pointer position. Returns true if a packet was queued.
    pub fn pointer_event(&self, buttons: PointerButtons, x: i32, y: i32) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(mouse) = state.mouse.as_mut() else {
            return false;
        };
        let queued = mouse.pointer_event(buttons, x, y, &mut state.aux_queue);
        if queued {
            self.update_irq(state);
        }
        queued
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    pub fn outport(&self) -> OutPort {
        self.state.lock().outport
    }

    pub fn pending(&self) -> Pending {
        self.state.lock().pending()
    }

    pub fn phase(&self) -> Phase {
        let state = self.state.lock();
        match state.pending_write {
            Some(PendingWrite::Mode) => Phase::AwaitingModeData,
            Some(PendingWrite::OutputBuffer) => Phase::AwaitingOutputBufferData,
            Some(PendingWrite::AuxOutputBuffer) => Phase::AwaitingAuxOutputBufferData,
            Some(PendingWrite::OutputPort) => Phase::AwaitingOutputPortData,
            Some(PendingWrite::AuxDevice) => Phase::AwaitingAuxDeviceData,
            None => match state.keyboard.awaiting() {
                Some(cmd) => Phase::AwaitingKeyboardSubcommandData(cmd),
                None => Phase::Idle,
            },
        }
    }

    pub fn scancode_set(&self) -> u8 {
        self.state.lock().keyboard.scancode_set()
    }

    pub fn translate(&self) -> bool {
        self.state.lock().translate()
    }

    pub fn scan_enabled(&self) -> bool {
        self.state.lock().keyboard.scan_enabled()
    }

    pub fn keyboard_leds(&self) -> u8 {
        self.state.lock().keyboard.leds()
    }

    pub fn has_mouse(&self) -> bool {
        self.state.lock().mouse.is_some()
    }

    pub fn kbd_irq(&self) -> u8 {
        self.kbd_irq
    }

    pub fn aux_irq(&self) -> u8 {
        self.aux_irq
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Recompute OBF bits and both line levels from the queues.
    ///
    /// Keyboard data wins; the aux line is only raised once the keyboard
    /// queue is empty.
    fn update_irq(&self, state: &mut ControllerState) {
        state.status.remove(Status::OBF | Status::MOUSE_OBF);
        state.outport.remove(OutPort::OBF | OutPort::MOUSE_OBF);

        let mut kbd_level = false;
        let mut aux_level = false;
        if !state.kbd_queue.is_empty() {
            state.status.insert(Status::OBF);
            state.outport.insert(OutPort::OBF);
            kbd_level =
                state.mode.contains(Mode::KBD_INT) && !state.mode.contains(Mode::DISABLE_KBD);
        } else if !state.aux_queue.is_empty() {
            state.status.insert(Status::OBF | Status::MOUSE_OBF);
            state.outport.insert(OutPort::MOUSE_OBF);
            aux_level =
                state.mode.contains(Mode::MOUSE_INT) && !state.mode.contains(Mode::DISABLE_MOUSE);
        }

        if self.kbd_irq == self.aux_irq {
            self.irq.set_irq_line(self.kbd_irq, kbd_level || aux_level);
        } else {
            self.irq.set_irq_line(self.kbd_irq, kbd_level);
            self.irq.set_irq_line(self.aux_irq, aux_level);
        }
    }

    fn read_data(&self, state: &mut ControllerState) -> u8 {
        let byte = if !state.kbd_queue.is_empty() {
            self.irq.set_irq_line(self.kbd_irq, false);
            state.last_from_aux = false;
            state.kbd_queue.pop_or_last()
        } else if !state.aux_queue.is_empty() {
            self.irq.set_irq_line(self.aux_irq, false);
            state.last_from_aux = true;
            state.aux_queue.pop_or_last()
        } else if state.last_from_aux {
            state.aux_queue.pop_or_last()
        } else {
            state.kbd_queue.pop_or_last()
        };
        self.update_irq(state);
        byte
    }

    fn write_command(&self, state: &mut ControllerState, cmd: u8) -> SysRequests {
        let mut requests = SysRequests::default();
        state.status.insert(Status::CMD);

        match cmd {
            CMD_READ_MODE => {
                let mode = state.mode.bits();
                state.reply(mode);
            }
            CMD_WRITE_MODE => state.pending_write = Some(PendingWrite::Mode),
            CMD_DISABLE_AUX => state.mode.insert(Mode::DISABLE_MOUSE),
            CMD_ENABLE_AUX => state.mode.remove(Mode::DISABLE_MOUSE),
            CMD_TEST_AUX | CMD_TEST_KBD | CMD_READ_TEST_INPUTS => state.reply(0x00),
            CMD_SELF_TEST => {
                state.status.insert(Status::SELFTEST);
                state.reply(RESPONSE_SELF_TEST_OK);
            }
            CMD_DISABLE_KBD => state.mode.insert(Mode::DISABLE_KBD),
            CMD_ENABLE_KBD => state.mode.remove(Mode::DISABLE_KBD),
            CMD_READ_INPUT_PORT => state.reply(0x80),
            CMD_READ_OUTPUT_PORT => {
                let outport = state.outport.bits();
                state.reply(outport);
            }
            CMD_WRITE_OUTPUT_PORT => state.pending_write = Some(PendingWrite::OutputPort),
            CMD_WRITE_OUTPUT_BUFFER => state.pending_write = Some(PendingWrite::OutputBuffer),
            CMD_WRITE_AUX_OUTPUT_BUFFER => {
                state.pending_write = Some(PendingWrite::AuxOutputBuffer)
            }
            CMD_WRITE_AUX => state.pending_write = Some(PendingWrite::AuxDevice),
            CMD_DISABLE_A20 => drive_a20(state, false, &mut requests),
            CMD_ENABLE_A20 => drive_a20(state, true, &mut requests),
            CMD_PULSE_BASE..=0xFF => {
                if cmd & 1 == 0 {
                    vm_info!("i8042: guest pulsed reset line");
                    requests.reset = true;
                }
            }
            other => vm_debug!("i8042: ignoring unknown command {:#04x}", other),
        }

        self.update_irq(state);
        requests
    }

    fn write_data(&self, state: &mut ControllerState, byte: u8) -> SysRequests {
        let mut requests = SysRequests::default();
        state.status.remove(Status::CMD);

        match state.pending_write.take() {
            Some(PendingWrite::Mode) => state.mode = Mode::from_bits_retain(byte),
            Some(PendingWrite::OutputBuffer) => {
                state.kbd_queue.push(byte);
            }
            Some(PendingWrite::AuxOutputBuffer) => {
                state.aux_queue.push(byte);
            }
            Some(PendingWrite::OutputPort) => write_outport(state, byte, &mut requests),
            Some(PendingWrite::AuxDevice) => match state.mouse.as_mut() {
                Some(mouse) => mouse.write(byte, &mut state.aux_queue),
                None => vm_debug!("i8042: no aux device for byte {:#04x}", byte),
            },
            None => {
                let translate = state.translate();
                state.keyboard.write(byte, translate, &mut state.kbd_queue);
            }
        }

        self.update_irq(state);
        requests
    }
}

fn write_outport(state: &mut ControllerState, byte: u8, requests: &mut SysRequests) {
    let value = OutPort::from_bits_retain(byte);
    drive_a20(state, value.contains(OutPort::A20), requests);
    state.outport = value;
    if !value.contains(OutPort::RESET) {
        vm_info!("i8042: guest cleared reset line");
        requests.reset = true;
    }
}

fn drive_a20(state: &mut ControllerState, enabled: bool, requests: &mut SysRequests) {
    if state.outport.contains(OutPort::A20) == enabled {
        return;
    }
    state.outport.set(OutPort::A20, enabled);
    vm_info!("i8042: A20 {}", if enabled { "enabled" } else { "disabled" });
    requests.a20 = Some(enabled);
}

/// Port side of the controller: `size`-byte transfers, `count` times.
/// Reads zero-extend the 8-bit register; writes use the low byte.
impl IoPortOps for Ps2Controller {
    fn io_in(&self, port: u16, data: &mut [u8], size: usize, count: usize) -> bool {
        if port != I8042_DATA_PORT && port != I8042_COMMAND_PORT {
            data.fill(0xFF);
            return false;
        }
        for chunk in data.chunks_mut(size.max(1)).take(count) {
            let value = self.read_port(port);
            chunk.fill(0);
            chunk[0] = value;
        }
        true
    }

    fn io_out(&self, port: u16, data: &[u8], size: usize, count: usize) -> bool {
        if port != I8042_DATA_PORT && port != I8042_COMMAND_PORT {
            vm_trace!("i8042: ignoring out to port {:#06x}", port);
            return false;
        }
        for chunk in data.chunks(size.max(1)).take(count) {
            self.write_port(port, chunk[0]);
        }
        true
    }
}
