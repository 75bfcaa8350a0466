#![cfg_attr(not(test), no_std)]

pub mod cmdline;
pub mod ring_buffer;
pub mod vmlog;

pub use ring_buffer::RingBuffer;
pub use vmlog::{LogBackend, LogLevel, register_backend};
