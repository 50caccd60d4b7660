//! Per-stream configuration and software-side bookkeeping.
//!
//! A [`Stream`] record is purely internal state, owned by [`crate::Ip`] in a
//! `Vec` indexed by stream number; integrators never see `Stream` directly,
//! only the opaque [`StreamHandle`] returned by [`crate::Ip::stream`]. This
//! keeps an out-of-range stream number unrepresentable once a handle has
//! been acquired (invariant I1), instead of re-checking it on every call.

use crate::regs::RecMode;
use crate::window::WindowDescriptor;

/// Window-based IRQ callback: invoked once per newly completed window, in
/// window order, with spurious re-deliveries suppressed by the driver.
///
/// Requires `win_overwrite == false` in the stream's [`StreamConfig`]; the
/// window is not released for reuse until [`crate::Ip::mark_as_free`] is
/// called. The second parameter is whatever [`UserArg`] was passed to
/// [`crate::Ip::set_irq_callback_win`].
pub type WinIrqFn = fn(WindowDescriptor, UserArg);

/// Stream-based IRQ callback: invoked once per IRQ that named this stream,
/// regardless of how many windows (if any) completed. The integrator is on
/// their own for figuring out what happened. The second parameter is
/// whatever [`UserArg`] was passed to [`crate::Ip::set_irq_callback_str`].
pub type StrIrqFn = fn(StreamHandle, UserArg);

/// Opaque context pointer threaded through to IRQ callbacks, unexamined by
/// the driver itself. Kept as a raw pointer instead of a closure so callback
/// dispatch stays a plain function pointer with no heap-allocated
/// environment.
///
/// Carries no type or lifetime information: it is the integrator's
/// responsibility that whatever it points to outlives every IRQ in which it
/// might be dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserArg(*mut ());

impl UserArg {
    /// The null argument, for callbacks that need no context.
    pub const fn null() -> Self {
        UserArg(std::ptr::null_mut())
    }

    /// Wraps a raw pointer for later retrieval via [`UserArg::as_ptr`].
    pub fn new<T>(ptr: *mut T) -> Self {
        UserArg(ptr as *mut ())
    }

    /// Recovers the wrapped pointer. The caller must request the same `T`
    /// the argument was constructed with; the driver itself never does this.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl Default for UserArg {
    fn default() -> Self {
        UserArg::null()
    }
}

/// Opaque handle to one stream of an [`crate::Ip`] instance.
///
/// Can only be constructed by [`crate::Ip::stream`], which validates the
/// stream number up front. Every other operation taking a `StreamHandle` is
/// therefore free to index without re-checking `IllegalStrNr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub(crate) u8);

impl StreamHandle {
    /// The stream number this handle refers to.
    pub fn nr(self) -> u8 {
        self.0
    }
}

/// Settings applied by [`crate::Ip::configure`].
///
/// See [`crate::regs::RecMode`] for the recording-mode semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Number of post-trigger samples to record, including the trigger
    /// sample itself.
    pub post_trig_samples: u32,
    pub rec_mode: RecMode,
    /// Treat each window as its own ring buffer (`true`) vs. linear,
    /// stop-at-end (`false`).
    pub win_as_ringbuf: bool,
    /// Allow the hardware to overwrite a window's data even if it has not
    /// been acknowledged via [`crate::Ip::mark_as_free`]. Window-based IRQ
    /// handling requires this to be `false`.
    pub win_overwrite: bool,
    /// Number of windows to use for this stream (`1..=max_windows`).
    pub win_cnt: u8,
    /// DMA start address of this stream's buffer, in the IP's address
    /// space.
    pub buf_start_addr: u32,
    /// Size of each window, in bytes. Must be a multiple of the sample
    /// width.
    pub win_size: u32,
    /// Width of one sample, in bits. Must be a positive multiple of 8.
    pub stream_width_bits: u16,
}

/// Internal per-stream record.
#[derive(Debug, Clone)]
pub(crate) struct Stream {
    pub(crate) nr: u8,
    pub(crate) configured: bool,
    pub(crate) width_bytes: u8,
    pub(crate) windows: u8,
    /// Last window a window-IRQ callback was invoked for. `None` means
    /// nothing has been processed yet.
    pub(crate) last_proc_win: Option<u8>,
    /// Bitmap of windows whose window-IRQ callback has fired but which have
    /// not yet been released via [`crate::Ip::mark_as_free`].
    pub(crate) irq_called_win: u32,
    pub(crate) irq_fct_win: Option<WinIrqFn>,
    pub(crate) irq_fct_str: Option<StrIrqFn>,
    pub(crate) irq_arg: UserArg,
    pub(crate) buf_start: u32,
    pub(crate) win_size: u32,
    pub(crate) post_trig: u32,
}

impl Stream {
    pub(crate) fn new(nr: u8) -> Self {
        Stream {
            nr,
            configured: false,
            width_bytes: 0,
            windows: 0,
            last_proc_win: None,
            irq_called_win: 0,
            irq_fct_win: None,
            irq_fct_str: None,
            irq_arg: UserArg::null(),
            buf_start: 0,
            win_size: 0,
            post_trig: 0,
        }
    }
}
