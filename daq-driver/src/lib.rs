//! CPU-side driver for a multi-stream DMA recorder IP core.
//!
//! The IP captures one or more independent sample streams into a ring of
//! fixed-size DMA windows, tags each window with a trigger marker and
//! timestamp, and raises a single shared interrupt whenever a window
//! finishes. This crate owns the register-level protocol and the interrupt
//! demultiplexing loop. It also owns the addressing math needed to
//! reconstruct a contiguous pre/post-trigger payload out of a (possibly
//! wrapped) window.
//!
//! It does not own the interrupt controller or the vector table, and it
//! does not own platform startup code. See [`access`] for the seam where
//! the integrator plugs in their own register access.

#![deny(
    unused_import_braces,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_qualifications
)]

pub mod bits;

pub mod access;
pub mod error;
pub mod ip;
pub mod irq;
pub mod regs;
pub mod stream;
pub mod window;

pub use access::{AccessFns, DataCopyFn, RegReadFn, RegWriteFn};
pub use error::{DaqError, DaqResult};
pub use ip::Ip;
pub use stream::{StreamConfig, StreamHandle, UserArg};
pub use window::WindowDescriptor;
