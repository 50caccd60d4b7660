//! Error kinds returned by fallible driver operations.
//!
//! Every fallible operation threads a single [`DaqError`] upward from the
//! first failing check and short-circuits; register primitives themselves
//! are infallible (the integrator's access callbacks return `void`/a value,
//! never a `Result`), so nothing below the register layer can fail.
//! Configuration is therefore not transactional: some registers may already
//! have been written by the time a later check in [`crate::Ip::configure`]
//! fails. Invariant I5 (a stream can only be configured while disabled)
//! makes this harmless until the caller explicitly re-enables the stream.

use thiserror::Error;

/// Discriminant returned by a failing driver operation, one variant per
/// distinct failure kind, carrying the specific values that failed the
/// check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum DaqError {
    /// Stream index `nr` is `>= max_streams` for this IP instance.
    #[error("stream index {nr} is out of range (max_streams = {max_streams})")]
    IllegalStrNr { nr: u8, max_streams: u8 },

    /// `stream_width_bits` was not a positive multiple of 8.
    #[error("stream width {width_bits} bits is not a positive multiple of 8")]
    IllegalStrWidth { width_bits: u16 },

    /// The operation requires the stream to be hardware-disabled first.
    #[error("stream {nr} must be disabled before this operation")]
    StrNotDisabled { nr: u8 },

    /// `win_cnt` exceeds the IP's configured maximum window count.
    #[error("window count {win_cnt} exceeds the maximum of {max_windows}")]
    IllegalWinCnt { win_cnt: u8, max_windows: u8 },

    /// A window index is `>=` the stream's configured window count.
    #[error("window index {win_nr} is out of range (configured windows = {windows})")]
    IllegalWinNr { win_nr: u8, windows: u8 },

    /// The window does not contain a trigger (`WINCNT` bit 31 is clear).
    #[error("window {win_nr} does not contain a trigger")]
    NoTrigInWin { win_nr: u8 },

    /// The caller's buffer is smaller than the requested unwrapped payload.
    #[error("buffer of {buffer_len} bytes is too small for {needed} bytes")]
    BufferTooSmall { buffer_len: usize, needed: usize },

    /// Requested more post-trigger samples than the stream was configured
    /// to record.
    #[error(
        "requested {requested} post-trigger samples but only {configured} were configured"
    )]
    MorePostTrigThanConfigured { requested: u32, configured: u32 },

    /// Requested more pre-trigger samples than are actually present in the
    /// window.
    #[error("requested {requested} pre-trigger samples but only {available} are available")]
    MorePreTrigThanAvailable { requested: u32, available: u32 },

    /// `win_size` is not a multiple of the configured sample width.
    #[error("window size {win_size} is not a multiple of the sample width ({width_bytes} bytes)")]
    WinSizeMustBeMultipleOfSamples { win_size: u32, width_bytes: u8 },

    /// Both the window-level and stream-level IRQ callback slots would be
    /// active at once for the same stream (invariant I1).
    #[error("stream {nr} already has the other IRQ callback scheme installed")]
    IrqSchemesWinAndStrAreExclusive { nr: u8 },
}

pub type DaqResult<T> = Result<T, DaqError>;
