#![cfg_attr(not(test), no_std)]
#![allow(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod error;
pub mod framebuffer;
pub mod interval_tree;
pub mod mmio;

#[cfg(test)]
mod interval_tree_tests;

pub use error::{MmioError, MmioResult};
pub use framebuffer::Framebuffer;
pub use interval_tree::IntervalTree;
pub use mmio::{MmioHandler, MmioRegistry};
