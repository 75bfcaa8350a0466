use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::vec::Vec;

use lkvm_abi::{KeySym, PointerButtons};
use spin::{Mutex, Once};

use super::*;
use crate::config::I8042Config;
use crate::ioport::IoPortBus;
use crate::irq::IrqLevels;

const KBD: u8 = 1;
const AUX: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SysEvent {
    A20(bool),
    Reset,
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<SysEvent>>,
}

impl SystemControl for Recorder {
    fn set_a20(&self, enabled: bool) {
        self.events.lock().push(SysEvent::A20(enabled));
    }

    fn request_reset(&self) {
        self.events.lock().push(SysEvent::Reset);
    }
}

/// Board that reads back and resets the controller from inside its hooks.
struct ResettingBoard {
    ps2: Once<Weak<Ps2Controller>>,
    a20: Mutex<Vec<(bool, OutPort)>>,
    resets: AtomicUsize,
}

impl ResettingBoard {
    fn new() -> Self {
        Self {
            ps2: Once::new(),
            a20: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
        }
    }

    fn controller(&self) -> Option<Arc<Ps2Controller>> {
        self.ps2.get().and_then(Weak::upgrade)
    }
}

impl SystemControl for ResettingBoard {
    fn set_a20(&self, enabled: bool) {
        if let Some(ps2) = self.controller() {
            self.a20.lock().push((enabled, ps2.outport()));
        }
    }

    fn request_reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if let Some(ps2) = self.controller() {
            ps2.reset();
        }
    }
}

struct Rig {
    ps2: Arc<Ps2Controller>,
    irq: Arc<IrqLevels>,
    sys: Arc<Recorder>,
    bus: IoPortBus,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(I8042Config::default())
    }

    fn with_config(config: I8042Config) -> Self {
        let irq = Arc::new(IrqLevels::new());
        let sys = Arc::new(Recorder::default());
        let ps2 = Arc::new(Ps2Controller::from_config(&config, irq.clone(), sys.clone()));
        let bus = IoPortBus::new();
        ps2.attach(&bus).unwrap();
        Self { ps2, irq, sys, bus }
    }

    fn cmd(&self, byte: u8) {
        assert!(self.bus.io_out(0x64, &[byte], 1, 1));
    }

    fn data(&self, byte: u8) {
        assert!(self.bus.io_out(0x60, &[byte], 1, 1));
    }

    fn read(&self) -> u8 {
        let mut b = [0u8; 1];
        assert!(self.bus.io_in(0x60, &mut b, 1, 1));
        b[0]
    }

    fn status(&self) -> u8 {
        let mut b = [0u8; 1];
        assert!(self.bus.io_in(0x64, &mut b, 1, 1));
        b[0]
    }

    fn drain(&self) -> Vec<u8> {
        let mut out = Vec::new();
        while self.status() & Status::OBF.bits() != 0 {
            out.push(self.read());
        }
        out
    }

    fn key(&self, pressed: bool, c: char) -> bool {
        self.ps2.key_event(pressed, KeySym::from_char(c))
    }

    fn events(&self) -> Vec<SysEvent> {
        core::mem::take(&mut *self.sys.events.lock())
    }
}

#[test]
fn test_power_on_state() {
    let rig = Rig::new();
    assert_eq!(rig.status(), 0x18);
    assert_eq!(rig.ps2.mode(), Mode::KBD_INT | Mode::MOUSE_INT);
    assert_eq!(rig.ps2.outport(), OutPort::RESET | OutPort::A20);
    assert_eq!(rig.ps2.phase(), Phase::Idle);
    assert_eq!(rig.ps2.pending(), Pending::empty());
    assert_eq!(rig.ps2.scancode_set(), 2);
    assert!(!rig.ps2.translate());
    assert!(rig.ps2.scan_enabled());
    assert!(!rig.irq.level(KBD));
    assert!(!rig.irq.level(AUX));
}

#[test]
fn test_key_a_make_then_break() {
    let rig = Rig::new();
    assert!(rig.key(true, 'a'));
    assert!(rig.key(false, 'a'));
    assert_eq!(rig.drain(), [0x1c, 0xf0, 0x1c]);
}

#[test]
fn test_digit_row_four_and_five() {
    let rig = Rig::new();
    for c in ['4', '5', '$', '%'] {
        assert!(rig.key(true, c));
        assert!(rig.key(false, c));
    }
    assert_eq!(
        rig.drain(),
        [
            0x25, 0xf0, 0x25, 0x2e, 0xf0, 0x2e, 0x25, 0xf0, 0x25, 0x2e, 0xf0, 0x2e
        ]
    );
}

#[test]
fn test_extended_and_unmapped_keys() {
    let rig = Rig::new();
    assert!(rig.ps2.key_event(true, KeySym::INSERT));
    assert!(rig.ps2.key_event(false, KeySym::INSERT));
    assert!(rig.ps2.key_event(false, KeySym::END));
    assert!(!rig.ps2.key_event(true, KeySym::PAUSE));
    assert_eq!(
        rig.drain(),
        [0xe0, 0x70, 0xe0, 0xf0, 0x70, 0xe0, 0xf0, 0x69]
    );
}

#[test]
fn test_read_mode_returns_mode_byte() {
    let rig = Rig::new();
    rig.cmd(CMD_READ_MODE);
    assert_eq!(rig.read(), 0x03);

    rig.cmd(CMD_WRITE_MODE);
    rig.data(0x47);
    rig.cmd(CMD_READ_MODE);
    assert_eq!(rig.read(), 0x47);
    assert!(rig.ps2.translate());
}

#[test]
fn test_self_test_sets_status_bit() {
    let rig = Rig::new();
    rig.cmd(CMD_SELF_TEST);
    assert_ne!(rig.status() & Status::SELFTEST.bits(), 0);
    assert_eq!(rig.read(), 0x55);
    assert_ne!(rig.status() & Status::SELFTEST.bits(), 0);
}

#[test]
fn test_interface_tests_and_ports() {
    let rig = Rig::new();
    for cmd in [
        CMD_TEST_KBD,
        CMD_TEST_AUX,
        CMD_READ_INPUT_PORT,
        CMD_READ_TEST_INPUTS,
        CMD_READ_OUTPUT_PORT,
    ] {
        rig.cmd(cmd);
    }
    // Earlier replies are still queued, so the port mirrors OBF (bit 4).
    assert_eq!(rig.drain(), [0x00, 0x00, 0x80, 0x00, 0x13]);
}

#[test]
fn test_queue_drops_overflow_and_replays_last_byte() {
    let rig = Rig::new();
    for i in 0..QUEUE_SIZE + 2 {
        rig.cmd(CMD_WRITE_OUTPUT_BUFFER);
        rig.data(i as u8);
    }
    let bytes = rig.drain();
    assert_eq!(bytes.len(), QUEUE_SIZE);
    assert!(bytes.iter().enumerate().all(|(i, &b)| b == i as u8));

    for _ in 0..3 {
        assert_eq!(rig.read(), (QUEUE_SIZE - 1) as u8);
    }
    assert_eq!(rig.status() & Status::OBF.bits(), 0);

    rig.cmd(CMD_WRITE_OUTPUT_BUFFER);
    rig.data(0x42);
    assert_eq!(rig.read(), 0x42);
    assert_eq!(rig.read(), 0x42);
}

#[test]
fn test_irq_level_follows_pending() {
    let rig = Rig::new();
    rig.key(true, 'a');
    assert_eq!(rig.ps2.pending(), Pending::KBD);
    assert!(rig.irq.level(KBD));
    assert_ne!(rig.status() & Status::OBF.bits(), 0);

    rig.read();
    assert_eq!(rig.ps2.pending(), Pending::empty());
    assert!(!rig.irq.level(KBD));
    assert_eq!(rig.status() & Status::OBF.bits(), 0);
}

#[test]
fn test_each_byte_raises_a_fresh_edge() {
    let rig = Rig::new();
    rig.key(true, 'a');
    rig.key(false, 'a');
    assert_eq!(rig.irq.assert_count(KBD), 1);
    rig.drain();
    assert_eq!(rig.irq.assert_count(KBD), 3);
    assert!(!rig.irq.level(KBD));
}

#[test]
fn test_keyboard_data_wins_over_mouse() {
    let rig = Rig::new();
    rig.cmd(CMD_WRITE_AUX);
    rig.data(AUX_CMD_ENABLE_DEV);
    assert_eq!(
        rig.status() & (Status::OBF | Status::MOUSE_OBF).bits(),
        (Status::OBF | Status::MOUSE_OBF).bits()
    );
    assert!(rig.irq.level(AUX));
    assert_eq!(rig.read(), RESPONSE_ACK);
    assert!(!rig.irq.level(AUX));

    assert!(!rig.ps2.pointer_event(PointerButtons::NONE, 0, 0));
    assert!(rig.ps2.pointer_event(PointerButtons::NONE, 1, 0));
    assert!(rig.irq.level(AUX));

    rig.key(true, 'a');
    assert_eq!(rig.ps2.pending(), Pending::KBD | Pending::AUX);
    assert!(rig.irq.level(KBD));
    assert!(!rig.irq.level(AUX));
    assert_eq!(rig.status() & Status::MOUSE_OBF.bits(), 0);
    assert_eq!(rig.read(), 0x1c);

    assert_ne!(rig.status() & Status::MOUSE_OBF.bits(), 0);
    assert!(rig.irq.level(AUX));
    assert_eq!(rig.drain(), [0x08, 0x01, 0x00]);
    assert!(!rig.irq.level(AUX));
}

#[test]
fn test_identify_with_and_without_translation() {
    let rig = Rig::new();
    rig.data(KBD_CMD_GET_ID);
    assert_eq!(rig.drain(), [0xFA, 0xAB, 0x83]);

    rig.cmd(CMD_WRITE_MODE);
    rig.data((Mode::KBD_INT | Mode::MOUSE_INT | Mode::TRANSLATE).bits());
    rig.data(KBD_CMD_GET_ID);
    assert_eq!(rig.drain(), [0xFA, 0xAB, 0x41]);

    rig.key(true, 'a');
    rig.key(false, 'a');
    assert_eq!(rig.drain(), [0x1e, 0x9e]);
}

#[test]
fn test_scancode_set_selection() {
    let rig = Rig::new();
    rig.data(KBD_CMD_SCANCODE);
    assert_eq!(
        rig.ps2.phase(),
        Phase::AwaitingKeyboardSubcommandData(KBD_CMD_SCANCODE)
    );
    rig.data(1);
    assert_eq!(rig.ps2.phase(), Phase::Idle);
    assert_eq!(rig.ps2.scancode_set(), 1);
    rig.key(false, 'a');
    assert_eq!(rig.drain(), [0xFA, 0xFA, 0x9e]);

    rig.data(KBD_CMD_SCANCODE);
    rig.data(0);
    rig.data(KBD_CMD_SCANCODE);
    rig.data(5);
    assert_eq!(rig.drain(), [0xFA, 0xFA, 0x01, 0xFA, 0xFE]);
    assert_eq!(rig.ps2.scancode_set(), 1);
}

#[test]
fn test_leds_consume_one_byte() {
    let rig = Rig::new();
    rig.data(KBD_CMD_SET_LEDS);
    rig.data(0x07);
    rig.data(KBD_CMD_SET_RATE);
    rig.data(0x00);
    rig.data(0x12);
    assert_eq!(rig.drain(), [0xFA, 0xFA, 0xFA, 0xFA, 0xFA]);
    assert_eq!(rig.ps2.keyboard_leds(), 0x07);
}

#[test]
fn test_scanning_disabled_drops_keys() {
    let rig = Rig::new();
    rig.data(KBD_CMD_RESET_DISABLE);
    assert!(!rig.key(true, 'q'));
    assert!(!rig.ps2.scan_enabled());
    rig.data(KBD_CMD_ENABLE);
    assert!(rig.key(true, 'q'));
    assert_eq!(rig.drain(), [0xFA, 0xFA, 0x15]);

    rig.data(KBD_CMD_RESET);
    rig.data(KBD_CMD_ECHO);
    assert_eq!(rig.drain(), [0xFA, 0xAA, 0xEE]);
}

#[test]
fn test_a20_and_reset_reach_system_control() {
    let rig = Rig::new();
    rig.cmd(CMD_DISABLE_A20);
    assert!(!rig.ps2.outport().contains(OutPort::A20));
    rig.cmd(CMD_ENABLE_A20);
    rig.cmd(CMD_ENABLE_A20);
    assert_eq!(rig.events(), [SysEvent::A20(false), SysEvent::A20(true)]);

    rig.cmd(CMD_WRITE_OUTPUT_PORT);
    assert_eq!(rig.ps2.phase(), Phase::AwaitingOutputPortData);
    rig.data(0x01);
    rig.cmd(CMD_READ_OUTPUT_PORT);
    assert_eq!(rig.read(), 0x01);
    rig.cmd(CMD_WRITE_OUTPUT_PORT);
    rig.data(0x02);
    assert_eq!(
        rig.events(),
        [SysEvent::A20(false), SysEvent::A20(true), SysEvent::Reset]
    );

    rig.cmd(0xFE);
    rig.cmd(0xFF);
    assert_eq!(rig.events(), [SysEvent::Reset]);
}

#[test]
fn test_system_control_may_reenter_controller() {
    let irq = Arc::new(IrqLevels::new());
    let board = Arc::new(ResettingBoard::new());
    let ps2 = Arc::new(Ps2Controller::new(irq.clone(), board.clone()));
    board.ps2.call_once(|| Arc::downgrade(&ps2));
    let bus = IoPortBus::new();
    ps2.attach(&bus).unwrap();

    assert!(bus.io_out(0x64, &[CMD_DISABLE_A20], 1, 1));
    assert_eq!(*board.a20.lock(), [(false, OutPort::RESET)]);

    assert!(bus.io_out(0x64, &[CMD_WRITE_MODE], 1, 1));
    assert!(bus.io_out(0x60, &[0x61], 1, 1));
    assert!(ps2.key_event(true, KeySym::from_char('a')));
    assert!(irq.level(KBD));

    assert!(bus.io_out(0x64, &[0xFE], 1, 1));
    assert_eq!(board.resets.load(Ordering::SeqCst), 1);
    assert_eq!(ps2.mode(), Mode::KBD_INT | Mode::MOUSE_INT);
    assert_eq!(ps2.outport(), OutPort::RESET | OutPort::A20);
    assert_eq!(ps2.pending(), Pending::empty());
    assert_eq!(ps2.status().bits(), 0x18);
    assert!(!irq.level(KBD));

    assert!(bus.io_out(0x64, &[CMD_WRITE_OUTPUT_PORT], 1, 1));
    assert!(bus.io_out(0x60, &[0x00], 1, 1));
    assert_eq!(board.resets.load(Ordering::SeqCst), 2);
    assert_eq!(ps2.outport(), OutPort::RESET | OutPort::A20);
    assert_eq!(board.a20.lock().last(), Some(&(false, OutPort::empty())));
}

#[test]
fn test_command_bit_and_phases() {
    let rig = Rig::new();
    let phases = [
        (CMD_WRITE_MODE, Phase::AwaitingModeData),
        (CMD_WRITE_OUTPUT_BUFFER, Phase::AwaitingOutputBufferData),
        (CMD_WRITE_AUX_OUTPUT_BUFFER, Phase::AwaitingAuxOutputBufferData),
        (CMD_WRITE_OUTPUT_PORT, Phase::AwaitingOutputPortData),
        (CMD_WRITE_AUX, Phase::AwaitingAuxDeviceData),
    ];
    for (cmd, phase) in phases {
        rig.cmd(cmd);
        assert_eq!(rig.ps2.phase(), phase);
        assert_ne!(rig.status() & Status::CMD.bits(), 0);
        let byte = match cmd {
            CMD_WRITE_MODE => 0x03,
            CMD_WRITE_OUTPUT_PORT => 0x03,
            CMD_WRITE_AUX => AUX_CMD_GET_TYPE,
            _ => 0x99,
        };
        rig.data(byte);
        assert_eq!(rig.ps2.phase(), Phase::Idle);
        assert_eq!(rig.status() & Status::CMD.bits(), 0);
    }
    assert_eq!(rig.drain(), [0x99, 0x99, 0xFA, 0x00]);
    assert!(rig.events().is_empty());
}

#[test]
fn test_aux_output_buffer_has_no_extra_ack() {
    let rig = Rig::new();
    rig.cmd(CMD_WRITE_AUX_OUTPUT_BUFFER);
    rig.data(0x77);
    assert_eq!(rig.ps2.pending(), Pending::AUX);
    assert!(rig.irq.level(AUX));
    assert_eq!(rig.drain(), [0x77]);
}

#[test]
fn test_unknown_command_is_ignored() {
    let rig = Rig::new();
    rig.cmd(0xC8);
    assert_eq!(rig.ps2.phase(), Phase::Idle);
    assert_eq!(rig.ps2.pending(), Pending::empty());
    assert_eq!(rig.status(), 0x18);
}

#[test]
fn test_disabled_keyboard_holds_irq_low() {
    let rig = Rig::new();
    rig.cmd(CMD_DISABLE_KBD);
    rig.key(true, 'a');
    assert!(!rig.irq.level(KBD));
    assert_ne!(rig.status() & Status::OBF.bits(), 0);
    rig.cmd(CMD_ENABLE_KBD);
    assert!(rig.irq.level(KBD));
    assert_eq!(rig.drain(), [0x1c]);
}

#[test]
fn test_aux_interrupt_masked_by_mode() {
    let rig = Rig::new();
    rig.cmd(CMD_DISABLE_AUX);
    rig.cmd(CMD_WRITE_AUX);
    rig.data(AUX_CMD_GET_TYPE);
    assert!(!rig.irq.level(AUX));
    assert_eq!(rig.ps2.pending(), Pending::AUX);
    rig.cmd(CMD_ENABLE_AUX);
    assert!(rig.irq.level(AUX));
    assert_eq!(rig.drain(), [0xFA, 0x00]);
}

#[test]
fn test_mouse_packets_with_clamping() {
    let rig = Rig::new();
    rig.cmd(CMD_WRITE_AUX);
    rig.data(AUX_CMD_ENABLE_DEV);
    rig.drain();

    rig.ps2.pointer_event(PointerButtons::NONE, 500, 500);
    assert!(rig.ps2.pointer_event(PointerButtons::LEFT, 100, 510));
    assert_eq!(rig.drain(), [0x08 | 0x01 | 0x10 | 0x20 | 0x40, 0x00, 0xF6]);
}

#[test]
fn test_mouse_absent_when_configured_off() {
    let rig = Rig::with_config(I8042Config {
        mouse: false,
        ..I8042Config::default()
    });
    assert!(!rig.ps2.has_mouse());
    rig.cmd(CMD_WRITE_AUX);
    rig.data(AUX_CMD_ENABLE_DEV);
    assert_eq!(rig.ps2.pending(), Pending::empty());
    assert!(!rig.ps2.pointer_event(PointerButtons::NONE, 0, 0));
    assert!(!rig.ps2.pointer_event(PointerButtons::NONE, 9, 9));
}

#[test]
fn test_wide_and_repeated_port_access() {
    let rig = Rig::new();
    let mut word = [0xAAu8; 2];
    assert!(rig.bus.io_in(0x64, &mut word, 2, 1));
    assert_eq!(word, [0x18, 0x00]);

    assert!(rig.bus.io_out(0x60, &[KBD_CMD_GET_ID, 0, KBD_CMD_ECHO, 0], 2, 2));
    let mut bytes = [0u8; 4];
    assert!(rig.bus.io_in(0x60, &mut bytes, 1, 4));
    assert_eq!(bytes, [0xFA, 0xAB, 0x83, 0xEE]);

    let mut stray = [0u8; 1];
    assert!(!rig.bus.io_in(0x61, &mut stray, 1, 1));
    assert_eq!(stray, [0xFF]);
    assert!(!rig.bus.io_out(0x65, &[0xFE], 1, 1));
    assert!(rig.events().is_empty());
}

#[test]
fn test_reset_restores_power_on_state() {
    let rig = Rig::new();
    rig.cmd(CMD_WRITE_MODE);
    rig.data(0x61);
    rig.data(KBD_CMD_SCANCODE);
    rig.key(true, 'a');
    assert!(rig.irq.level(KBD));

    rig.ps2.reset();
    assert_eq!(rig.ps2.mode(), Mode::KBD_INT | Mode::MOUSE_INT);
    assert_eq!(rig.ps2.phase(), Phase::Idle);
    assert_eq!(rig.ps2.pending(), Pending::empty());
    assert_eq!(rig.status(), 0x18);
    assert!(!rig.irq.level(KBD));
    assert!(rig.ps2.has_mouse());
}

#[test]
fn test_concurrent_key_events() {
    let rig = Rig::new();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let ps2 = rig.ps2.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    ps2.key_event(true, KeySym::from_char('a'));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let bytes = rig.drain();
    assert_eq!(bytes.len(), 40);
    assert!(bytes.iter().all(|&b| b == 0x1c));
    assert!(!rig.irq.level(KBD));
}
