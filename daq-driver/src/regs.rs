//! Register map.
//!
//! Offsets and bitfield layouts for the IP's four register blocks:
//!
//! - global (`GCFG`, `GSTAT`, `IRQVEC`, `IRQENA`, `STRENA`), fixed offsets
//! - per-stream status (`MAXLVL`, `POSTTRIG`, `MODE`, `LASTWIN`), `0x10`
//!   stride, indexed by stream number
//! - per-stream context (`SCFG`, `BUFSTART`, `WINSIZE`, `PTR`), `0x20`
//!   stride, indexed by stream number
//! - per-window (`WINCNT`, `LAST`, `TSLO`, `TSHI`), `0x10` stride within a
//!   stream, `strAddrOffs` stride between streams
//!
//! Field layouts use [`bit_wrappers!`]/[`bitfield_accessors!`] from
//! [`crate::bits`] so that each packed register reads and writes through a
//! typed wrapper rather than raw masks scattered through the driver.

use crate::{bit_enums, bit_wrappers, bitfield_accessors};

pub const GCFG: u32 = 0x000;
pub const GCFG_BIT_ENA: u32 = 1 << 0;
pub const GCFG_BIT_IRQENA: u32 = 1 << 8;

pub const GSTAT: u32 = 0x004;

pub const IRQVEC: u32 = 0x010;
pub const IRQENA: u32 = 0x014;
pub const STRENA: u32 = 0x020;

const STREAM_STATUS_STRIDE: u32 = 0x10;
const STREAM_CTX_STRIDE: u32 = 0x20;
const WINDOW_STRIDE: u32 = 0x10;

pub fn maxlvl(nr: u8) -> u32 {
    0x200 + STREAM_STATUS_STRIDE * nr as u32
}

pub fn posttrig(nr: u8) -> u32 {
    0x204 + STREAM_STATUS_STRIDE * nr as u32
}

pub fn mode(nr: u8) -> u32 {
    0x208 + STREAM_STATUS_STRIDE * nr as u32
}

pub const MODE_LSB_RECM: u8 = 0;
pub const MODE_MSB_RECM: u8 = 1;
pub const MODE_BIT_ARM: u32 = 1 << 8;
pub const MODE_BIT_REC: u32 = 1 << 16;

pub fn lastwin(nr: u8) -> u32 {
    0x20C + STREAM_STATUS_STRIDE * nr as u32
}

pub fn scfg(nr: u8) -> u32 {
    0x1000 + STREAM_CTX_STRIDE * nr as u32
}

pub const SCFG_BIT_RINGBUF: u32 = 1 << 0;
pub const SCFG_BIT_OVERWRITE: u32 = 1 << 8;
pub const SCFG_LSB_WINCNT: u8 = 16;
pub const SCFG_MSB_WINCNT: u8 = 20;
pub const SCFG_LSB_WINCUR: u8 = 24;
pub const SCFG_MSB_WINCUR: u8 = 28;

pub fn bufstart(nr: u8) -> u32 {
    0x1004 + STREAM_CTX_STRIDE * nr as u32
}

pub fn winsize(nr: u8) -> u32 {
    0x1008 + STREAM_CTX_STRIDE * nr as u32
}

pub fn ptr(nr: u8) -> u32 {
    0x100C + STREAM_CTX_STRIDE * nr as u32
}

/// Address of window `w`'s `WINCNT` register for stream `nr`, given the
/// IP-wide per-stream window-block stride `str_addr_offs`.
pub fn win_wincnt(nr: u8, w: u8, str_addr_offs: u32) -> u32 {
    0x4000 + str_addr_offs * nr as u32 + WINDOW_STRIDE * w as u32
}

pub const WIN_WINCNT_LSB_CNT: u8 = 0;
pub const WIN_WINCNT_MSB_CNT: u8 = 30;
pub const WIN_WINCNT_BIT_ISTRIG: u32 = 1 << 31;

pub fn win_last(nr: u8, w: u8, str_addr_offs: u32) -> u32 {
    0x4004 + str_addr_offs * nr as u32 + WINDOW_STRIDE * w as u32
}

pub fn win_tslo(nr: u8, w: u8, str_addr_offs: u32) -> u32 {
    0x4008 + str_addr_offs * nr as u32 + WINDOW_STRIDE * w as u32
}

pub fn win_tshi(nr: u8, w: u8, str_addr_offs: u32) -> u32 {
    0x400C + str_addr_offs * nr as u32 + WINDOW_STRIDE * w as u32
}

bit_enums! {
    /// `MODE.RECM`: how a stream's recorder reacts to triggers.
    pub bit_enum RecMode {
        /// Record continuously, detecting triggers without ever arming.
        Continuous = 0,
        /// Continuously record pre-trigger data, but only detect triggers
        /// once armed.
        TriggerMask = 1,
        /// Record pre-trigger data only once armed, and stop after one
        /// trigger.
        SingleShot = 2,
        /// Recording is controlled entirely by manually setting/clearing
        /// the arm bit.
        Manual = 3,
    }
}

bit_wrappers! {
    /// `SCFG`: per-stream ring-buffer configuration.
    pub struct Scfg(pub u32);
    /// `MODE`: per-stream recording mode and control bits.
    pub struct Mode(pub u32);
    /// Per-window `WINCNT`: sample count plus trigger marker.
    pub struct WinCnt(pub u32);
}

impl Scfg {
    bitfield_accessors! {
        /// Ring-buffer mode enabled (vs. linear, stop-at-end).
        pub total [0] ringbuf / with_ringbuf: bool,
        /// Overwrite-oldest-window-on-full enabled.
        pub total [8] overwrite / with_overwrite: bool,
        /// Configured window count for this stream.
        pub total [20:16] win_cnt / with_win_cnt: u8,
        /// Index of the window currently being written.
        pub total [28:24] win_cur / with_win_cur: u8,
    }
}

impl Mode {
    bitfield_accessors! {
        /// Recording mode (single-shot vs. continuous).
        pub [1:0] rec_mode / with_rec_mode: RecMode,
        /// Stream is armed (waiting for/running a capture).
        pub total [8] arm / with_arm: bool,
        /// Stream is actively recording.
        pub total [16] rec / with_rec: bool,
    }
}

impl WinCnt {
    bitfield_accessors! {
        /// Number of valid samples in this window.
        pub total [30:0] count / with_count: u32,
        /// This window contains the trigger sample.
        pub total [31] is_trig / with_is_trig: bool,
    }
}
