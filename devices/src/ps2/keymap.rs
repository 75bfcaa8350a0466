//! Host keysym to PC/AT scancode Set 2.
//!
//! Shifted punctuation maps to the key that produces it; the guest tracks
//! shift state from the shift key's own make/break codes.

use lkvm_abi::KeySym;

/// A Set 2 make code and whether it needs the `0xE0` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCode {
    pub extended: bool,
    pub code: u8,
}

impl KeyCode {
    const fn plain(code: u8) -> Self {
        Self {
            extended: false,
            code,
        }
    }

    const fn ext(code: u8) -> Self {
        Self {
            extended: true,
            code,
        }
    }
}

const LETTERS: [u8; 26] = [
    0x1c, 0x32, 0x21, 0x23, 0x24, // a-e
    0x2b, 0x34, 0x33, 0x43, 0x3b, // f-j
    0x42, 0x4b, 0x3a, 0x31, 0x44, // k-o
    0x4d, 0x15, 0x2d, 0x1b, 0x2c, // p-t
    0x3c, 0x2a, 0x1d, 0x22, 0x35, // u-y
    0x1a, // z
];

const DIGITS: [u8; 10] = [0x45, 0x16, 0x1e, 0x26, 0x25, 0x2e, 0x36, 0x3d, 0x3e, 0x46];

/// F1..F12.
const FUNCTION: [u8; 12] = [
    0x05, 0x06, 0x04, 0x0c, 0x03, 0x0b, 0x83, 0x0a, 0x01, 0x09, 0x78, 0x07,
];

/// Keypad 0..9.
const KEYPAD: [u8; 10] = [0x70, 0x69, 0x72, 0x7a, 0x6b, 0x73, 0x74, 0x6c, 0x75, 0x7d];

fn printable(c: u8) -> Option<u8> {
    let code = match c {
        b'a'..=b'z' => LETTERS[(c - b'a') as usize],
        b'A'..=b'Z' => LETTERS[(c - b'A') as usize],
        b'0'..=b'9' => DIGITS[(c - b'0') as usize],
        b' ' => 0x29,
        b'`' | b'~' => 0x0e,
        b'!' => DIGITS[1],
        b'@' => DIGITS[2],
        b'#' => DIGITS[3],
        b'$' => DIGITS[4],
        b'%' => DIGITS[5],
        b'^' => DIGITS[6],
        b'&' => DIGITS[7],
        b'*' => DIGITS[8],
        b'(' => DIGITS[9],
        b')' => DIGITS[0],
        b'-' | b'_' => 0x4e,
        b'=' | b'+' => 0x55,
        b'[' | b'{' => 0x54,
        b']' | b'}' => 0x5b,
        b'\\' | b'|' => 0x5d,
        b';' | b':' => 0x4c,
        b'\'' | b'"' => 0x52,
        b',' | b'<' => 0x41,
        b'.' | b'>' => 0x49,
        b'/' | b'?' => 0x4a,
        _ => return None,
    };
    Some(code)
}

/// Set 2 code for `sym`, or `None` for keys with no PS/2 equivalent here.
pub fn keysym_to_set2(sym: KeySym) -> Option<KeyCode> {
    if let Some(c) = sym.as_ascii() {
        return printable(c).map(KeyCode::plain);
    }

    if (KeySym::F1.0..=KeySym::F12.0).contains(&sym.0) {
        return Some(KeyCode::plain(FUNCTION[(sym.0 - KeySym::F1.0) as usize]));
    }
    if (KeySym::KP_0.0..=KeySym::KP_9.0).contains(&sym.0) {
        return Some(KeyCode::plain(KEYPAD[(sym.0 - KeySym::KP_0.0) as usize]));
    }

    let key = match sym {
        KeySym::BACKSPACE => KeyCode::plain(0x66),
        KeySym::TAB => KeyCode::plain(0x0d),
        KeySym::RETURN => KeyCode::plain(0x5a),
        KeySym::ESCAPE => KeyCode::plain(0x76),
        KeySym::SHIFT_L => KeyCode::plain(0x12),
        KeySym::SHIFT_R => KeyCode::plain(0x59),
        KeySym::CONTROL_L => KeyCode::plain(0x14),
        KeySym::CONTROL_R => KeyCode::ext(0x14),
        KeySym::ALT_L => KeyCode::plain(0x11),
        KeySym::ALT_R => KeyCode::ext(0x11),
        KeySym::CAPS_LOCK => KeyCode::plain(0x58),
        KeySym::NUM_LOCK => KeyCode::plain(0x77),
        KeySym::SCROLL_LOCK => KeyCode::plain(0x7e),
        KeySym::SUPER_L => KeyCode::ext(0x1f),
        KeySym::SUPER_R => KeyCode::ext(0x27),
        KeySym::MENU => KeyCode::ext(0x2f),

        KeySym::INSERT => KeyCode::ext(0x70),
        KeySym::DELETE => KeyCode::ext(0x71),
        KeySym::HOME => KeyCode::ext(0x6c),
        KeySym::END => KeyCode::ext(0x69),
        KeySym::PAGE_UP => KeyCode::ext(0x7d),
        KeySym::PAGE_DOWN => KeyCode::ext(0x7a),
        KeySym::UP => KeyCode::ext(0x75),
        KeySym::DOWN => KeyCode::ext(0x72),
        KeySym::LEFT => KeyCode::ext(0x6b),
        KeySym::RIGHT => KeyCode::ext(0x74),

        KeySym::KP_DECIMAL => KeyCode::plain(0x71),
        KeySym::KP_MULTIPLY => KeyCode::plain(0x7c),
        KeySym::KP_SUBTRACT => KeyCode::plain(0x7b),
        KeySym::KP_ADD => KeyCode::plain(0x79),
        KeySym::KP_DIVIDE => KeyCode::ext(0x4a),
        KeySym::KP_ENTER => KeyCode::ext(0x5a),
        _ => return None,
    };
    Some(key)
}
