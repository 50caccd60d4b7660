//! Per-window metadata and the wrapped-to-linear data reader.
//!
//! Each window is a fixed-size DMA ring buffer; the IP marks it with the
//! number of valid bytes, a trigger flag, and a timestamp, and leaves
//! acknowledgement ("has software finished with this window?") entirely to
//! software via [`crate::Ip::mark_as_free`]. The one genuinely intricate
//! piece of this driver is [`Ip::get_data_unwrapped`], which walks backward
//! from the last sample address to reconstruct a contiguous pre/post
//! trigger payload out of a window that may have wrapped past its end.

use crate::error::{DaqError, DaqResult};
use crate::ip::Ip;
use crate::regs::{self, WinCnt};
use crate::stream::StreamHandle;

/// Identifies one window of one stream.
///
/// Cheap, `Copy`, and intentionally stack-only: a value is only meaningful
/// until the call it was passed to returns (a window can be recycled by the
/// hardware, or freed by [`Ip::mark_as_free`], at any later point).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub stream: StreamHandle,
    pub win_nr: u8,
}

impl Ip {
    fn check_win_nr(&self, win: WindowDescriptor) -> DaqResult<()> {
        let stream = self.stream_record(win.stream);
        if win.win_nr >= stream.windows {
            return Err(DaqError::IllegalWinNr {
                win_nr: win.win_nr,
                windows: stream.windows,
            });
        }
        Ok(())
    }

    fn wincnt_addr(&self, win: WindowDescriptor) -> u32 {
        regs::win_wincnt(win.stream.nr(), win.win_nr, self.str_addr_offs())
    }

    fn wincnt(&self, win: WindowDescriptor) -> WinCnt {
        WinCnt(self.access().read32(self.wincnt_addr(win)))
    }

    fn is_trig(&self, win: WindowDescriptor) -> bool {
        self.wincnt(win).is_trig()
    }

    /// Number of valid, unacknowledged samples recorded into this window.
    pub fn get_no_of_samples(&self, win: WindowDescriptor) -> DaqResult<u32> {
        self.check_win_nr(win)?;
        let width_bytes = self.stream_record(win.stream).width_bytes as u32;
        Ok(self.wincnt(win).count() / width_bytes)
    }

    /// Number of valid, unacknowledged bytes recorded into this window.
    pub fn get_no_of_bytes(&self, win: WindowDescriptor) -> DaqResult<u32> {
        let samples = self.get_no_of_samples(win)?;
        let width_bytes = self.stream_record(win.stream).width_bytes as u32;
        Ok(samples * width_bytes)
    }

    /// Number of pre-trigger samples available in this window. Fails with
    /// [`DaqError::NoTrigInWin`] unless the window actually contains a
    /// trigger.
    pub fn get_pre_trig_samples(&self, win: WindowDescriptor) -> DaqResult<u32> {
        self.check_win_nr(win)?;
        if !self.is_trig(win) {
            return Err(DaqError::NoTrigInWin { win_nr: win.win_nr });
        }
        let samples = self.get_no_of_samples(win)?;
        let post_trig = self.stream_record(win.stream).post_trig;
        Ok(samples - post_trig)
    }

    /// Timestamp of the trigger sample, in IP clock ticks. Fails with
    /// [`DaqError::NoTrigInWin`] unless the window actually contains a
    /// trigger.
    pub fn get_timestamp(&self, win: WindowDescriptor) -> DaqResult<u64> {
        self.check_win_nr(win)?;
        if !self.is_trig(win) {
            return Err(DaqError::NoTrigInWin { win_nr: win.win_nr });
        }
        let str_addr_offs = self.str_addr_offs();
        let ts_lo = self
            .access()
            .read32(regs::win_tslo(win.stream.nr(), win.win_nr, str_addr_offs));
        let ts_hi = self
            .access()
            .read32(regs::win_tshi(win.stream.nr(), win.win_nr, str_addr_offs));
        Ok(((ts_hi as u64) << 32) + ts_lo as u64)
    }

    /// Address of the last sample (not byte) written into this window, in
    /// the IP's address space.
    pub fn get_last_spl_addr(&self, win: WindowDescriptor) -> DaqResult<u32> {
        self.check_win_nr(win)?;
        let str_addr_offs = self.str_addr_offs();
        Ok(self
            .access()
            .read32(regs::win_last(win.stream.nr(), win.win_nr, str_addr_offs)))
    }

    /// Releases a window so the hardware may record into it again, and
    /// clears the window-IRQ scheme's re-delivery guard for it.
    pub fn mark_as_free(&mut self, win: WindowDescriptor) -> DaqResult<()> {
        self.check_win_nr(win)?;
        let addr = self.wincnt_addr(win);
        self.stream_record_mut(win.stream).irq_called_win &= !(1 << win.win_nr);
        self.access().write32(addr, 0);
        Ok(())
    }

    /// Copies a contiguous, trigger-relative payload out of a (possibly
    /// wrapped) window and into `buffer`.
    ///
    /// `pre_trig_samples` and `post_trig_samples` (the latter including the
    /// trigger sample itself) together determine how many bytes are copied;
    /// `buffer` must be at least that large. Does not acknowledge the
    /// window; call [`Ip::mark_as_free`] once done with it.
    pub fn get_data_unwrapped(
        &self,
        win: WindowDescriptor,
        pre_trig_samples: u32,
        post_trig_samples: u32,
        buffer: &mut [u8],
    ) -> DaqResult<()> {
        self.check_win_nr(win)?;
        let stream = self.stream_record(win.stream);
        let width_bytes = stream.width_bytes as u32;
        let configured_post_trig = stream.post_trig;
        let buf_start = stream.buf_start;
        let win_size = stream.win_size;

        let samples = pre_trig_samples + post_trig_samples;
        let bytes = samples * width_bytes;
        let available_pre_trig = self.get_pre_trig_samples(win)?;

        if buffer.len() < bytes as usize {
            return Err(DaqError::BufferTooSmall {
                buffer_len: buffer.len(),
                needed: bytes as usize,
            });
        }
        if post_trig_samples > configured_post_trig {
            return Err(DaqError::MorePostTrigThanConfigured {
                requested: post_trig_samples,
                configured: configured_post_trig,
            });
        }
        if pre_trig_samples > available_pre_trig {
            return Err(DaqError::MorePreTrigThanAvailable {
                requested: pre_trig_samples,
                available: available_pre_trig,
            });
        }

        let win_start = buf_start + win_size * win.win_nr as u32;
        let last_spl_addr = self.get_last_spl_addr(win)?;

        let plan = plan_unwrapped_read(ReadPlanInput {
            win_start,
            win_size,
            last_spl_addr,
            configured_post_trig,
            width_bytes,
            post_trig_samples,
            bytes,
        });

        // SAFETY: `buffer` was checked above to hold at least `bytes` bytes,
        // and every source address in `plan` lies within this window's
        // `[win_start, win_start + win_size)` range of the IP's DMA address
        // space.
        unsafe {
            match plan {
                ReadPlan::Linear { start } => {
                    self.access().data_copy(buffer.as_mut_ptr(), start, bytes as usize);
                }
                ReadPlan::Wrapped {
                    first_chunk_start,
                    first_chunk_size,
                    second_chunk_size,
                } => {
                    self.access()
                        .data_copy(buffer.as_mut_ptr(), first_chunk_start, first_chunk_size as usize);
                    self.access().data_copy(
                        buffer.as_mut_ptr().add(first_chunk_size as usize),
                        win_start,
                        second_chunk_size as usize,
                    );
                }
            }
        }
        Ok(())
    }
}

/// Inputs to [`plan_unwrapped_read`], gathered so the addressing math itself
/// has no dependency on register access and can be tested in isolation.
#[derive(Debug, Clone, Copy)]
struct ReadPlanInput {
    win_start: u32,
    win_size: u32,
    /// Address of the last sample (not byte) written into the window.
    last_spl_addr: u32,
    /// The stream's configured post-trigger sample count (not the caller's
    /// requested one).
    configured_post_trig: u32,
    width_bytes: u32,
    post_trig_samples: u32,
    /// `(pre_trig_samples + post_trig_samples) * width_bytes`.
    bytes: u32,
}

/// Where to copy a requested payload from, expressed as one or two linear
/// chunks of the window's backing memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPlan {
    /// The payload doesn't cross the window's wrap point.
    Linear { start: u32 },
    /// The payload wraps: `first_chunk_size` bytes starting at
    /// `first_chunk_start` (ending at the window's last byte), followed by
    /// `second_chunk_size` bytes starting at the window's first byte.
    Wrapped {
        first_chunk_start: u32,
        first_chunk_size: u32,
        second_chunk_size: u32,
    },
}

/// Reconstructs a contiguous, trigger-relative byte range out of a
/// (possibly wrapped) ring-buffer window.
///
/// The window holds its most recent `postTrig+1` samples (the configured
/// post-trigger count, plus the trigger sample) ending at `last_spl_addr`;
/// everything before that, back to the start of the window, is pre-trigger
/// data. This walks backward from `last_spl_addr` to find the trigger byte,
/// then forward by the caller's requested post-trigger count, to locate the
/// last byte of the requested payload. It then takes `bytes` back from
/// there, wrapping at the window boundary if needed.
fn plan_unwrapped_read(input: ReadPlanInput) -> ReadPlan {
    let ReadPlanInput {
        win_start,
        win_size,
        last_spl_addr,
        configured_post_trig,
        width_bytes,
        post_trig_samples,
        bytes,
    } = input;
    let win_last = win_start + win_size - 1;

    // +1 because the trigger sample itself is not counted in postTrig.
    let mut trig_byte_addr = last_spl_addr - (configured_post_trig + 1) * width_bytes;
    if trig_byte_addr < win_start {
        trig_byte_addr += win_size;
    }
    let mut last_byte_addr = trig_byte_addr + post_trig_samples * width_bytes + width_bytes - 1;
    if last_byte_addr > win_last {
        last_byte_addr -= win_size;
    }

    let first_byte_linear = last_byte_addr - bytes + 1;
    if first_byte_linear >= win_start {
        ReadPlan::Linear {
            start: first_byte_linear,
        }
    } else {
        let second_chunk_size = last_byte_addr - win_start + 1;
        let first_chunk_size = bytes - second_chunk_size;
        let first_chunk_start = win_last - first_chunk_size + 1;
        ReadPlan::Wrapped {
            first_chunk_start,
            first_chunk_size,
            second_chunk_size,
        }
    }
}
