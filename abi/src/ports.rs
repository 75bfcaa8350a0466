//! Legacy PC port and interrupt numbers.

/// 8042 data port (output buffer on read, input buffer on write).
pub const I8042_DATA_PORT: u16 = 0x60;
/// 8042 status register on read, command register on write.
pub const I8042_COMMAND_PORT: u16 = 0x64;
/// Number of consecutive ports claimed at each 8042 base.
pub const I8042_PORT_WIDTH: u16 = 2;

/// ISA interrupt of the keyboard (first PS/2 port).
pub const I8042_KBD_IRQ: u8 = 1;
/// ISA interrupt of the auxiliary device (second PS/2 port, mouse).
pub const I8042_AUX_IRQ: u8 = 12;

/// Number of legacy interrupt lines behind the dual 8259.
pub const ISA_IRQ_LINES: usize = 16;
