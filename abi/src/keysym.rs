//! Host key symbols.
//!
//! The remote-display collaborator reports keys as X11 keysyms (the RFB
//! protocol carries them unchanged). Printable Latin-1 keys use their
//! character code; everything else lives in the `0xFFxx` function block.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct KeySym(pub u32);

impl KeySym {
    pub const BACKSPACE: Self = Self(0xFF08);
    pub const TAB: Self = Self(0xFF09);
    pub const RETURN: Self = Self(0xFF0D);
    pub const PAUSE: Self = Self(0xFF13);
    pub const SCROLL_LOCK: Self = Self(0xFF14);
    pub const ESCAPE: Self = Self(0xFF1B);

    pub const HOME: Self = Self(0xFF50);
    pub const LEFT: Self = Self(0xFF51);
    pub const UP: Self = Self(0xFF52);
    pub const RIGHT: Self = Self(0xFF53);
    pub const DOWN: Self = Self(0xFF54);
    pub const PAGE_UP: Self = Self(0xFF55);
    pub const PAGE_DOWN: Self = Self(0xFF56);
    pub const END: Self = Self(0xFF57);
    pub const INSERT: Self = Self(0xFF63);
    pub const MENU: Self = Self(0xFF67);
    pub const NUM_LOCK: Self = Self(0xFF7F);

    pub const KP_ENTER: Self = Self(0xFF8D);
    pub const KP_MULTIPLY: Self = Self(0xFFAA);
    pub const KP_ADD: Self = Self(0xFFAB);
    pub const KP_SUBTRACT: Self = Self(0xFFAD);
    pub const KP_DECIMAL: Self = Self(0xFFAE);
    pub const KP_DIVIDE: Self = Self(0xFFAF);
    /// `KP_0` through `KP_9` are contiguous.
    pub const KP_0: Self = Self(0xFFB0);
    pub const KP_9: Self = Self(0xFFB9);

    /// `F1` through `F12` are contiguous.
    pub const F1: Self = Self(0xFFBE);
    pub const F12: Self = Self(0xFFC9);

    pub const SHIFT_L: Self = Self(0xFFE1);
    pub const SHIFT_R: Self = Self(0xFFE2);
    pub const CONTROL_L: Self = Self(0xFFE3);
    pub const CONTROL_R: Self = Self(0xFFE4);
    pub const CAPS_LOCK: Self = Self(0xFFE5);
    pub const ALT_L: Self = Self(0xFFE9);
    pub const ALT_R: Self = Self(0xFFEA);
    pub const SUPER_L: Self = Self(0xFFEB);
    pub const SUPER_R: Self = Self(0xFFEC);
    pub const DELETE: Self = Self(0xFFFF);

    /// Keysym of a printable ASCII character.
    #[inline]
    pub const fn from_char(c: char) -> Self {
        Self(c as u32)
    }

    /// The printable ASCII character this keysym stands for, if any.
    #[inline]
    pub fn as_ascii(self) -> Option<u8> {
        match self.0 {
            0x20..=0x7E => Some(self.0 as u8),
            _ => None,
        }
    }

    /// Returns the `n`th function key (1-based), or `None` past F12.
    #[inline]
    pub const fn function_key(n: u8) -> Option<Self> {
        if n >= 1 && n <= 12 {
            Some(Self(Self::F1.0 + n as u32 - 1))
        } else {
            None
        }
    }
}
