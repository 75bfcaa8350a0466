use lkvm_abi::PointerButtons;
use lkvm_lib::vm_trace;

use super::*;

const DEFAULT_RESOLUTION: u8 = 2;
const DEFAULT_SAMPLE_RATE: u8 = 100;

/// Status byte flags reported by `E9`.
const STATUS_SCALE21: u8 = 0x10;
const STATUS_REPORTING: u8 = 0x20;
const STATUS_REMOTE: u8 = 0x40;

/// Always-one bit of a packet's first byte.
const PACKET_SYNC: u8 = 0x08;
const PACKET_X_SIGN: u8 = 0x10;
const PACKET_Y_SIGN: u8 = 0x20;
const PACKET_X_OVERFLOW: u8 = 0x40;
const PACKET_Y_OVERFLOW: u8 = 0x80;

/// Standard three-button PS/2 mouse on the auxiliary port.
///
/// Host pointer events carry absolute coordinates; the mouse turns them into
/// relative stream-mode packets. Remote mode is acknowledged but never
/// produces data.
#[derive(Debug, Clone)]
pub(super) struct Ps2Mouse {
    flags: u8,
    resolution: u8,
    sample_rate: u8,
    buttons: PointerButtons,
    last: Option<(i32, i32)>,
    awaiting: Option<u8>,
}

/// Clamp a delta to the 9-bit two's complement range of a packet.
/// Returns the low byte, the sign bit and whether it was clamped.
fn clamp_delta(delta: i64) -> (u8, bool, bool) {
    let clamped = delta.clamp(-256, 255);
    (clamped as u8, clamped < 0, clamped != delta)
}

impl Ps2Mouse {
    pub(super) const fn new() -> Self {
        Self {
            flags: 0,
            resolution: DEFAULT_RESOLUTION,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buttons: PointerButtons::NONE,
            last: None,
            awaiting: None,
        }
    }

    fn set_defaults(&mut self) {
        self.flags = 0;
        self.resolution = DEFAULT_RESOLUTION;
        self.sample_rate = DEFAULT_SAMPLE_RATE;
        self.awaiting = None;
    }

    #[inline]
    pub(super) fn reporting(&self) -> bool {
        self.flags & STATUS_REPORTING != 0
    }

    /// A byte the guest sent through controller command `D4`.
    pub(super) fn write(&mut self, byte: u8, queue: &mut ScancodeQueue) {
        if let Some(cmd) = self.awaiting.take() {
            if cmd == AUX_CMD_SET_RES {
                self.resolution = byte;
            } else {
                self.sample_rate = byte;
            }
            queue.push(RESPONSE_ACK);
            return;
        }

        queue.push(RESPONSE_ACK);
        match byte {
            AUX_CMD_SET_SCALE11 => self.flags &= !STATUS_SCALE21,
            AUX_CMD_SET_SCALE21 => self.flags |= STATUS_SCALE21,
            AUX_CMD_SET_RES | AUX_CMD_SET_RATE => self.awaiting = Some(byte),
            AUX_CMD_GET_SCALE => {
                queue.push(self.flags | self.buttons.bits());
                queue.push(self.resolution);
                queue.push(self.sample_rate);
            }
            AUX_CMD_SET_STREAM => self.flags &= !STATUS_REMOTE,
            AUX_CMD_SET_REMOTE => self.flags |= STATUS_REMOTE,
            AUX_CMD_GET_TYPE => {
                queue.push(0x00);
            }
            AUX_CMD_ENABLE_DEV => self.flags |= STATUS_REPORTING,
            AUX_CMD_DISABLE_DEV => self.flags &= !STATUS_REPORTING,
            AUX_CMD_SET_DEFAULT => self.set_defaults(),
            AUX_CMD_RESET => {
                self.set_defaults();
                queue.push(RESPONSE_BAT_OK);
                queue.push(0x00);
            }
            other => vm_trace!("ps2 aux: acking unhandled command {:#04x}", other),
        }
    }

    /// Feed an absolute pointer position. Returns true if a packet was queued.
    ///
    /// The first event only latches the position. Packets are produced in
    /// stream mode with reporting enabled, and only when all three bytes fit.
    pub(super) fn pointer_event(
        &mut self,
        buttons: PointerButtons,
        x: i32,
        y: i32,
        queue: &mut ScancodeQueue,
    ) -> bool {
        let prev = self.last.replace((x, y));
        self.buttons = buttons;
        let Some((last_x, last_y)) = prev else {
            return false;
        };
        if !self.reporting() || self.flags & STATUS_REMOTE != 0 || queue.free() < 3 {
            return false;
        }

        // Screen y grows downwards, PS/2 y grows upwards.
        let (dx, x_sign, x_over) = clamp_delta(x as i64 - last_x as i64);
        let (dy, y_sign, y_over) = clamp_delta(last_y as i64 - y as i64);

        let mut head = PACKET_SYNC | buttons.bits();
        if x_sign {
            head |= PACKET_X_SIGN;
        }
        if y_sign {
            head |= PACKET_Y_SIGN;
        }
        if x_over {
            head |= PACKET_X_OVERFLOW;
        }
        if y_over {
            head |= PACKET_Y_OVERFLOW;
        }

        queue.push(head);
        queue.push(dx);
        queue.push(dy);
        true
    }
}
