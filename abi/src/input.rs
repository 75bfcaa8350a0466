//! Host input events delivered by the remote-display collaborator.

use crate::keysym::KeySym;

/// Pointer button state in PS/2 bit order.
///
/// This is the order the mouse packet status byte uses, so the mask can be
/// copied into a packet unchanged. RFB clients report middle and right the
/// other way round; convert those with [`PointerButtons::from_rfb_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PointerButtons(u8);

impl PointerButtons {
    pub const NONE: Self = Self(0);
    pub const LEFT: Self = Self(1 << 0);
    pub const RIGHT: Self = Self(1 << 1);
    pub const MIDDLE: Self = Self(1 << 2);

    const MASK: u8 = 0x07;

    /// Build from a raw PS/2 ordered mask; bits above the three buttons are dropped.
    #[inline]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    /// Build from an RFB `buttonMask` (bit 0 left, bit 1 middle, bit 2 right).
    pub const fn from_rfb_mask(mask: u8) -> Self {
        let mut bits = mask & 0x01;
        if mask & 0x02 != 0 {
            bits |= Self::MIDDLE.0;
        }
        if mask & 0x04 != 0 {
            bits |= Self::RIGHT.0;
        }
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for PointerButtons {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One input event from the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostInput {
    /// A key went down (`pressed`) or came back up.
    Key { pressed: bool, sym: KeySym },
    /// Absolute pointer position plus the current button state.
    Pointer { buttons: PointerButtons, x: i32, y: i32 },
}

impl HostInput {
    #[inline]
    pub const fn key_down(sym: KeySym) -> Self {
        Self::Key { pressed: true, sym }
    }

    #[inline]
    pub const fn key_up(sym: KeySym) -> Self {
        Self::Key { pressed: false, sym }
    }
}
