//! IP-wide state: initialization, stream-handle acquisition, and the
//! software-side configuration/control surface for each stream.

use std::num::NonZeroU8;

use crate::access::{AccessFns, RegisterAccess};
use crate::error::{DaqError, DaqResult};
use crate::regs::{self, Mode, Scfg, WinCnt};
use crate::stream::{Stream, StreamConfig, StreamHandle, StrIrqFn, UserArg, WinIrqFn};

/// Driver instance for one IP core.
///
/// Owns the register access callbacks and every stream's software-side
/// bookkeeping in a single `Vec`; stream numbers are validated once, at
/// [`Ip::stream`], and carried afterward as an opaque [`StreamHandle`].
pub struct Ip {
    access: RegisterAccess,
    max_streams: u8,
    max_windows: NonZeroU8,
    str_addr_offs: u32,
    streams: Vec<Stream>,
}

impl Ip {
    /// Brings up the IP core: disables it, clears every stream's maximum
    /// fill level and window state, then re-enables the global enable and
    /// IRQ-forwarding bits (which are never touched again after this).
    ///
    /// `max_streams` and `max_windows` must match the values the IP core was
    /// built with. `access` selects the register/data-copy callbacks to use;
    /// `None` selects direct volatile memory-mapped access
    /// ([`AccessFns::default`]), appropriate for a bare-metal integrator.
    pub fn init(
        base_addr: u32,
        max_streams: u8,
        max_windows: NonZeroU8,
        access: Option<AccessFns>,
    ) -> Ip {
        let access = RegisterAccess::new(base_addr, access.unwrap_or_default());
        let str_addr_offs = next_pow2_ceil(max_windows.get()) * 0x10;

        access.write32(regs::GCFG, 0);
        access.write32(regs::STRENA, 0);
        access.write32(regs::IRQENA, 0);
        access.write32(regs::IRQVEC, 0xFFFF_FFFF);

        let mut streams = Vec::with_capacity(max_streams as usize);
        for nr in 0..max_streams {
            access.write32(regs::maxlvl(nr), 0);
            for win in 0..max_windows.get() {
                access.write32(regs::win_wincnt(nr, win, str_addr_offs), 0);
            }
            streams.push(Stream::new(nr));
        }

        access.write32(regs::GCFG, regs::GCFG_BIT_ENA | regs::GCFG_BIT_IRQENA);

        log::debug!(
            "daq-driver: init base={:#x} max_streams={} max_windows={} str_addr_offs={:#x}",
            base_addr,
            max_streams,
            max_windows.get(),
            str_addr_offs
        );

        Ip {
            access,
            max_streams,
            max_windows,
            str_addr_offs,
            streams,
        }
    }

    /// Disables the IP core (global enable, IRQ forwarding, and every
    /// stream's enable bit) and releases the software-side stream state.
    /// This is the defined way to cleanly give up an IP instance.
    pub fn teardown(mut self) {
        self.access.write32(regs::GCFG, 0);
        self.access.write32(regs::IRQENA, 0);
        self.access.write32(regs::STRENA, 0);
        self.streams.clear();
        log::debug!("daq-driver: teardown complete");
    }

    /// Acquires a handle to stream `nr`, validating it up front.
    pub fn stream(&self, nr: u8) -> DaqResult<StreamHandle> {
        if nr >= self.max_streams {
            return Err(DaqError::IllegalStrNr {
                nr,
                max_streams: self.max_streams,
            });
        }
        Ok(StreamHandle(nr))
    }

    pub fn max_streams(&self) -> u8 {
        self.max_streams
    }

    /// The per-stream window-block address stride (`strAddrOffs`): the
    /// smallest power of two at least as large as `max_windows`, times the
    /// per-window register block size.
    pub(crate) fn str_addr_offs(&self) -> u32 {
        self.str_addr_offs
    }

    pub(crate) fn access(&self) -> &RegisterAccess {
        &self.access
    }

    pub(crate) fn stream_record(&self, handle: StreamHandle) -> &Stream {
        &self.streams[handle.nr() as usize]
    }

    pub(crate) fn stream_record_mut(&mut self, handle: StreamHandle) -> &mut Stream {
        &mut self.streams[handle.nr() as usize]
    }

    /// Configures a stream. Only allowed while the stream is disabled
    /// (invariant I5): some registers may already have been written by the
    /// time a later check fails, since nothing below this layer can roll
    /// back a partial write.
    pub fn configure(&mut self, handle: StreamHandle, cfg: &StreamConfig) -> DaqResult<()> {
        if cfg.stream_width_bits % 8 != 0 {
            return Err(DaqError::IllegalStrWidth {
                width_bits: cfg.stream_width_bits,
            });
        }
        let max_windows = self.max_windows();
        if cfg.win_cnt == 0 || cfg.win_cnt > max_windows {
            return Err(DaqError::IllegalWinCnt {
                win_cnt: cfg.win_cnt,
                max_windows,
            });
        }
        let width_bytes = (cfg.stream_width_bits / 8) as u8;
        if cfg.win_size % width_bytes as u32 != 0 {
            return Err(DaqError::WinSizeMustBeMultipleOfSamples {
                win_size: cfg.win_size,
                width_bytes,
            });
        }
        self.check_str_disabled(handle)?;

        let nr = handle.nr();
        self.access.write32(regs::posttrig(nr), cfg.post_trig_samples);
        self.access.set_field(
            regs::mode(nr),
            regs::MODE_LSB_RECM,
            regs::MODE_MSB_RECM,
            cfg.rec_mode as u32,
        );
        self.access
            .set_bit(regs::scfg(nr), regs::SCFG_BIT_RINGBUF, cfg.win_as_ringbuf);
        self.access
            .set_bit(regs::scfg(nr), regs::SCFG_BIT_OVERWRITE, cfg.win_overwrite);
        self.access.write32(regs::bufstart(nr), cfg.buf_start_addr);
        self.access.write32(regs::winsize(nr), cfg.win_size);
        self.access.set_field(
            regs::scfg(nr),
            regs::SCFG_LSB_WINCNT,
            regs::SCFG_MSB_WINCNT,
            (cfg.win_cnt - 1) as u32,
        );

        let stream = self.stream_record_mut(handle);
        stream.configured = true;
        stream.width_bytes = width_bytes;
        stream.windows = cfg.win_cnt;
        stream.buf_start = cfg.buf_start_addr;
        stream.win_size = cfg.win_size;
        stream.post_trig = cfg.post_trig_samples;

        log::debug!(
            "daq-driver: stream {} configured: {} windows of {} bytes at {:#x}, {} bytes/sample, {} post-trig",
            nr,
            cfg.win_cnt,
            cfg.win_size,
            cfg.buf_start_addr,
            width_bytes,
            cfg.post_trig_samples
        );
        Ok(())
    }

    fn check_str_disabled(&self, handle: StreamHandle) -> DaqResult<()> {
        if self.access.get_bit(regs::STRENA, 1 << handle.nr()) {
            return Err(DaqError::StrNotDisabled { nr: handle.nr() });
        }
        Ok(())
    }

    /// Enables or disables recording for a stream.
    pub fn set_enable(&mut self, handle: StreamHandle, enable: bool) {
        self.access.set_bit(regs::STRENA, 1 << handle.nr(), enable);
        log::trace!("daq-driver: stream {} enable={}", handle.nr(), enable);
    }

    /// Enables or disables IRQ generation for a stream.
    pub fn set_irq_enable(&mut self, handle: StreamHandle, irq_enable: bool) {
        self.access.set_bit(regs::IRQENA, 1 << handle.nr(), irq_enable);
        log::trace!("daq-driver: stream {} irq_enable={}", handle.nr(), irq_enable);
    }

    /// Arms the recorder for a stream (see [`crate::regs::RecMode`] for how
    /// arming interacts with recording mode).
    pub fn arm(&mut self, handle: StreamHandle) {
        self.access.set_bit(regs::mode(handle.nr()), regs::MODE_BIT_ARM, true);
        log::trace!("daq-driver: stream {} armed", handle.nr());
    }

    /// Installs the window-based IRQ callback for a stream, along with the
    /// opaque argument it will be invoked with on every delivery.
    ///
    /// Fails with [`DaqError::IrqSchemesWinAndStrAreExclusive`] if the
    /// stream-based scheme is currently installed on this stream; passing
    /// `None` always succeeds and uninstalls the callback (the argument is
    /// still updated either way).
    pub fn set_irq_callback_win(
        &mut self,
        handle: StreamHandle,
        cb: Option<WinIrqFn>,
        arg: UserArg,
    ) -> DaqResult<()> {
        if self.stream_record(handle).irq_fct_str.is_some() {
            return Err(DaqError::IrqSchemesWinAndStrAreExclusive { nr: handle.nr() });
        }
        let stream = self.stream_record_mut(handle);
        stream.irq_fct_win = cb;
        stream.irq_arg = arg;
        log::debug!(
            "daq-driver: stream {} window-irq callback {}",
            handle.nr(),
            if cb.is_some() { "installed" } else { "cleared" }
        );
        Ok(())
    }

    /// Installs the stream-based IRQ callback for a stream, along with the
    /// opaque argument it will be invoked with on every delivery. See
    /// [`Ip::set_irq_callback_win`] for the usual, more convenient scheme.
    pub fn set_irq_callback_str(
        &mut self,
        handle: StreamHandle,
        cb: Option<StrIrqFn>,
        arg: UserArg,
    ) -> DaqResult<()> {
        if self.stream_record(handle).irq_fct_win.is_some() {
            return Err(DaqError::IrqSchemesWinAndStrAreExclusive { nr: handle.nr() });
        }
        let stream = self.stream_record_mut(handle);
        stream.irq_fct_str = cb;
        stream.irq_arg = arg;
        log::debug!(
            "daq-driver: stream {} stream-irq callback {}",
            handle.nr(),
            if cb.is_some() { "installed" } else { "cleared" }
        );
        Ok(())
    }

    /// Maximum input buffer fill level observed since the last
    /// [`Ip::clear_max_level`].
    pub fn max_level(&self, handle: StreamHandle) -> u32 {
        self.access.read32(regs::maxlvl(handle.nr()))
    }

    /// Clears the maximum input buffer fill level. Does not otherwise
    /// disturb the stream's configuration, current window, or IRQ
    /// bookkeeping (invariant I6).
    pub fn clear_max_level(&mut self, handle: StreamHandle) {
        self.access.write32(regs::maxlvl(handle.nr()), 0);
    }

    /// Number of free (fully acknowledged) windows for a stream.
    ///
    /// Implemented by scanning every window's fill count, so it's slow;
    /// avoid calling this in a hot path. Window 0 is never counted; see
    /// [`Ip::free_windows_including_zero`] if window 0 matters to you.
    pub fn free_windows(&self, handle: StreamHandle) -> u8 {
        let windows = self.stream_record(handle).windows;
        let mut free = 0;
        for win in (1..windows).rev() {
            if self.window_is_free(handle, win) {
                free += 1;
            }
        }
        free
    }

    /// Like [`Ip::free_windows`], but also counts window 0.
    pub fn free_windows_including_zero(&self, handle: StreamHandle) -> u8 {
        let windows = self.stream_record(handle).windows;
        let mut free = 0;
        for win in (0..windows).rev() {
            if self.window_is_free(handle, win) {
                free += 1;
            }
        }
        free
    }

    fn window_is_free(&self, handle: StreamHandle, win: u8) -> bool {
        let addr = regs::win_wincnt(handle.nr(), win, self.str_addr_offs);
        WinCnt(self.access.read32(addr)).count() == 0
    }

    /// Number of windows currently holding unacknowledged data.
    pub fn used_windows(&self, handle: StreamHandle) -> u8 {
        self.stream_record(handle).windows - self.free_windows(handle)
    }

    /// Number of windows configured for this stream.
    pub fn total_windows(&self, handle: StreamHandle) -> u8 {
        self.stream_record(handle).windows
    }

    /// Whether the stream is currently recording.
    pub fn is_recording(&self, handle: StreamHandle) -> bool {
        Mode(self.access.read32(regs::mode(handle.nr()))).rec()
    }

    /// Window the recorder is currently writing into.
    pub fn current_win(&self, handle: StreamHandle) -> u8 {
        Scfg(self.access.read32(regs::scfg(handle.nr()))).win_cur()
    }

    /// Current DMA write pointer, in the IP's address space.
    pub fn current_ptr(&self, handle: StreamHandle) -> u32 {
        self.access.read32(regs::ptr(handle.nr()))
    }

    /// Number of the last window that was written to memory completely.
    pub fn get_last_written_win(&self, handle: StreamHandle) -> u8 {
        self.access.read32(regs::lastwin(handle.nr())) as u8
    }

    /// The IP's configured maximum window count, as passed to [`Ip::init`].
    fn max_windows(&self) -> u8 {
        self.max_windows.get()
    }

    /// Writes a raw register, bypassing the software record entirely
    /// (invariant I7). For debugging only: using this instead of the
    /// typed API can leave the driver's software state out of sync with the
    /// hardware.
    pub fn debug_write32(&self, offset: u32, value: u32) {
        self.access.write32(offset, value);
    }

    /// Reads a raw register, bypassing the software record.
    pub fn debug_read32(&self, offset: u32) -> u32 {
        self.access.read32(offset)
    }

    /// Read-modify-writes a raw bitfield, bypassing the software record.
    pub fn debug_set_field(&self, offset: u32, lsb: u8, msb: u8, value: u32) {
        self.access.set_field(offset, lsb, msb, value);
    }

    /// Reads a raw bitfield, bypassing the software record.
    pub fn debug_get_field(&self, offset: u32, lsb: u8, msb: u8) -> u32 {
        self.access.get_field(offset, lsb, msb)
    }

    /// Read-modify-writes raw bits under `mask`, bypassing the software
    /// record.
    pub fn debug_set_bit(&self, offset: u32, mask: u32, value: bool) {
        self.access.set_bit(offset, mask, value);
    }

    /// Reads whether any raw bit under `mask` is set, bypassing the software
    /// record.
    pub fn debug_get_bit(&self, offset: u32, mask: u32) -> bool {
        self.access.get_bit(offset, mask)
    }
}

/// Smallest power of two `>= x`, for `x >= 1`.
fn next_pow2_ceil(x: u8) -> u32 {
    let mut p: u32 = 1;
    while p < x as u32 {
        p *= 2;
    }
    p
}
