//! Scancode set conversion.
//!
//! Keys are mapped to Set 2 first; these tables produce the bytes for the
//! set the guest selected, or Set 1 when the controller translates.

use super::keymap::KeyCode;
use super::{SCANCODE_BREAK, SCANCODE_EXTENDED, ScancodeQueue};

/// Set 2 make code to Set 1, as applied by the 8042 translation logic.
const SET2_TO_SET1: [u8; 128] = [
    0xff, 0x43, 0x41, 0x3f, 0x3d, 0x3b, 0x3c, 0x58, 0x64, 0x44, 0x42, 0x40, 0x3e, 0x0f, 0x29, 0x59,
    0x65, 0x38, 0x2a, 0x70, 0x1d, 0x10, 0x02, 0x5a, 0x66, 0x71, 0x2c, 0x1f, 0x1e, 0x11, 0x03, 0x5b,
    0x67, 0x2e, 0x2d, 0x20, 0x12, 0x05, 0x04, 0x5c, 0x68, 0x39, 0x2f, 0x21, 0x14, 0x13, 0x06, 0x5d,
    0x69, 0x31, 0x30, 0x23, 0x22, 0x15, 0x07, 0x5e, 0x6a, 0x72, 0x32, 0x24, 0x16, 0x08, 0x09, 0x5f,
    0x6b, 0x33, 0x25, 0x17, 0x18, 0x0b, 0x0a, 0x60, 0x6c, 0x34, 0x35, 0x26, 0x27, 0x19, 0x0c, 0x61,
    0x6d, 0x73, 0x28, 0x74, 0x1a, 0x0d, 0x62, 0x6e, 0x3a, 0x36, 0x1c, 0x1b, 0x75, 0x2b, 0x63, 0x76,
    0x55, 0x56, 0x77, 0x78, 0x79, 0x7a, 0x0e, 0x7b, 0x7c, 0x4f, 0x7d, 0x4b, 0x47, 0x7e, 0x7f, 0x6f,
    0x52, 0x53, 0x50, 0x4c, 0x4d, 0x48, 0x01, 0x45, 0x57, 0x4e, 0x51, 0x4a, 0x37, 0x49, 0x46, 0x54,
];

/// Set 2 make code to Set 3. Most keys keep their code; the function keys,
/// left modifiers, and a handful of others moved.
const SET2_TO_SET3: [u8; 128] = build_set3();

const fn build_set3() -> [u8; 128] {
    const MOVED: [(u8, u8); 21] = [
        (0x01, 0x47),
        (0x03, 0x27),
        (0x04, 0x17),
        (0x05, 0x07),
        (0x06, 0x0f),
        (0x07, 0x5e),
        (0x09, 0x4f),
        (0x0a, 0x3f),
        (0x0b, 0x2f),
        (0x0c, 0x1f),
        (0x11, 0x19),
        (0x14, 0x11),
        (0x58, 0x14),
        (0x5d, 0x5c),
        (0x76, 0x08),
        (0x77, 0x76),
        (0x78, 0x56),
        (0x79, 0x7c),
        (0x7b, 0x84),
        (0x7c, 0x7e),
        (0x7e, 0x5f),
    ];

    let mut table = [0u8; 128];
    let mut i = 0;
    while i < 128 {
        table[i] = i as u8;
        i += 1;
    }
    let mut j = 0;
    while j < MOVED.len() {
        table[MOVED[j].0 as usize] = MOVED[j].1;
        j += 1;
    }
    table
}

/// F7 is the only Set 2 code above 0x7f.
const SET2_F7: u8 = 0x83;

pub(super) fn set2_to_set1(code: u8) -> u8 {
    match code {
        SET2_F7 => 0x41,
        c if c < 0x80 => SET2_TO_SET1[c as usize],
        c => c,
    }
}

fn set2_to_set3(key: KeyCode) -> u8 {
    if key.extended {
        // Set 3 has no prefix; extended keys get codes of their own.
        return match key.code {
            0x11 => 0x39,
            0x14 => 0x58,
            0x1f => 0x8b,
            0x27 => 0x8c,
            0x2f => 0x8d,
            0x4a => 0x77,
            0x5a => 0x79,
            0x69 => 0x65,
            0x6b => 0x61,
            0x6c => 0x6e,
            0x70 => 0x67,
            0x71 => 0x64,
            0x72 => 0x60,
            0x74 => 0x6a,
            0x75 => 0x63,
            0x7a => 0x6d,
            0x7d => 0x6f,
            c => c,
        };
    }
    match key.code {
        SET2_F7 => 0x37,
        c if c < 0x80 => SET2_TO_SET3[c as usize],
        c => c,
    }
}

/// Queue the bytes for one key transition.
///
/// `translate` forces Set 1 output whatever set the keyboard is in, the way
/// the 8042 rewrites keyboard output when its translate bit is set.
pub(super) fn queue_key(
    queue: &mut ScancodeQueue,
    key: KeyCode,
    pressed: bool,
    set: u8,
    translate: bool,
) {
    if translate || set == 1 {
        let code = set2_to_set1(key.code);
        if key.extended {
            queue.push(SCANCODE_EXTENDED);
        }
        queue.push(if pressed { code } else { code | 0x80 });
    } else if set == 3 {
        if !pressed {
            queue.push(SCANCODE_BREAK);
        }
        queue.push(set2_to_set3(key));
    } else {
        if key.extended {
            queue.push(SCANCODE_EXTENDED);
        }
        if !pressed {
            queue.push(SCANCODE_BREAK);
        }
        queue.push(key.code);
    }
}
