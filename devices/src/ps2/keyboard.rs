use lkvm_lib::vm_trace;

use super::keymap::KeyCode;
use super::translate::queue_key;
use super::*;

/// Set 1 codes a translating controller reports for `F0 00` (index = set).
const TRANSLATED_SET_ID: [u8; 4] = [0x00, 0x43, 0x41, 0x3f];

/// The keyboard on the first PS/2 port.
///
/// Command bytes arrive from the controller when no controller command is
/// waiting for data. `F0`, `ED` and `F3` are acknowledged and then swallow
/// exactly one parameter byte.
#[derive(Debug, Clone)]
pub(super) struct Ps2Keyboard {
    scan_enabled: bool,
    scancode_set: u8,
    leds: u8,
    awaiting: Option<u8>,
}

impl Ps2Keyboard {
    pub(super) const fn new() -> Self {
        Self {
            scan_enabled: true,
            scancode_set: 2,
            leds: 0,
            awaiting: None,
        }
    }

    fn set_defaults(&mut self) {
        self.scancode_set = 2;
        self.leds = 0;
        self.awaiting = None;
    }

    #[inline]
    pub(super) fn scancode_set(&self) -> u8 {
        self.scancode_set
    }

    #[inline]
    pub(super) fn scan_enabled(&self) -> bool {
        self.scan_enabled
    }

    #[inline]
    pub(super) fn leds(&self) -> u8 {
        self.leds
    }

    /// Command byte waiting for its parameter, if any.
    #[inline]
    pub(super) fn awaiting(&self) -> Option<u8> {
        self.awaiting
    }

    /// A byte the guest wrote to the keyboard. Replies go to `queue`.
    pub(super) fn write(&mut self, byte: u8, translate: bool, queue: &mut ScancodeQueue) {
        if let Some(cmd) = self.awaiting.take() {
            self.write_param(cmd, byte, translate, queue);
            return;
        }

        match byte {
            KBD_CMD_SET_LEDS | KBD_CMD_SET_RATE | KBD_CMD_SCANCODE => {
                queue.push(RESPONSE_ACK);
                self.awaiting = Some(byte);
            }
            KBD_CMD_ECHO => {
                queue.push(KBD_CMD_ECHO);
            }
            KBD_CMD_GET_ID => {
                queue.push(RESPONSE_ACK);
                queue.push(0xAB);
                queue.push(if translate { 0x41 } else { 0x83 });
            }
            KBD_CMD_ENABLE => {
                self.scan_enabled = true;
                queue.push(RESPONSE_ACK);
            }
            KBD_CMD_RESET_DISABLE => {
                self.set_defaults();
                self.scan_enabled = false;
                queue.push(RESPONSE_ACK);
            }
            KBD_CMD_RESET_ENABLE => {
                self.set_defaults();
                self.scan_enabled = true;
                queue.push(RESPONSE_ACK);
            }
            KBD_CMD_RESET => {
                self.set_defaults();
                self.scan_enabled = true;
                queue.push(RESPONSE_ACK);
                queue.push(RESPONSE_BAT_OK);
            }
            other => {
                vm_trace!("ps2 kbd: acking unhandled command {:#04x}", other);
                queue.push(RESPONSE_ACK);
            }
        }
    }

    fn write_param(&mut self, cmd: u8, byte: u8, translate: bool, queue: &mut ScancodeQueue) {
        match cmd {
            KBD_CMD_SCANCODE => match byte {
                0 => {
                    queue.push(RESPONSE_ACK);
                    let set = self.scancode_set;
                    queue.push(if translate {
                        TRANSLATED_SET_ID[set as usize]
                    } else {
                        set
                    });
                }
                1..=3 => {
                    self.scancode_set = byte;
                    queue.push(RESPONSE_ACK);
                }
                _ => {
                    queue.push(RESPONSE_RESEND);
                }
            },
            KBD_CMD_SET_LEDS => {
                self.leds = byte;
                queue.push(RESPONSE_ACK);
            }
            // Typematic rate: accepted, autorepeat is left to the host.
            _ => {
                queue.push(RESPONSE_ACK);
            }
        }
    }

    /// Queue a host key transition. Dropped while scanning is disabled.
    pub(super) fn key_event(
        &self,
        key: KeyCode,
        pressed: bool,
        translate: bool,
        queue: &mut ScancodeQueue,
    ) -> bool {
        if !self.scan_enabled {
            return false;
        }
        queue_key(queue, key, pressed, self.scancode_set, translate);
        true
    }
}
