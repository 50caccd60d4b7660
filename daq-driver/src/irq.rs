//! Interrupt demultiplexing.
//!
//! The IP raises a single shared, level-sensitive, active-high interrupt
//! line for every stream; [`Ip::handle_irq`] is the integrator's one
//! required hook into it. How the platform routes that interrupt to this
//! function is not this driver's concern.

use crate::ip::Ip;
use crate::regs;
use crate::stream::StreamHandle;
use crate::window::WindowDescriptor;

impl Ip {
    /// Services a pending IRQ: acknowledges every stream that contributed to
    /// it, then, per contributing stream, invokes whichever IRQ scheme is
    /// installed.
    ///
    /// For the window-based scheme this walks forward from the last window
    /// processed to the most recently completed one, re-reading the
    /// "last written" register on every step so that a window completing
    /// while the callback runs is not missed. A window whose callback
    /// already fired and has not been released via [`Ip::mark_as_free`]
    /// stops the walk rather than re-delivering it.
    pub fn handle_irq(&mut self) {
        let str_with_irq = self.access().read32(regs::IRQVEC);
        self.access().write32(regs::IRQVEC, str_with_irq);

        for nr in 0..self.max_streams() {
            if str_with_irq & (1 << nr) == 0 {
                continue;
            }
            let handle = StreamHandle(nr);

            if let Some(cb) = self.stream_record(handle).irq_fct_str {
                cb(handle, self.stream_record(handle).irq_arg);
            }

            if self.stream_record(handle).irq_fct_win.is_some() {
                self.drain_window_irqs(handle);
            }
        }
    }

    fn drain_window_irqs(&mut self, handle: StreamHandle) {
        let nr = handle.nr();
        let windows = self.stream_record(handle).windows;
        let mut win = self.stream_record(handle).last_proc_win;
        loop {
            // Re-acknowledge and re-read: a window can complete while the
            // previous iteration's callback was running.
            self.access().write32(regs::IRQVEC, 1 << nr);
            let last_win = self.get_last_written_win(handle);

            let next = match win {
                Some(w) => (w + 1) % windows,
                None => 0,
            };

            if self.stream_record(handle).irq_called_win & (1 << next) != 0 {
                break;
            }
            self.stream_record_mut(handle).irq_called_win |= 1 << next;
            self.stream_record_mut(handle).last_proc_win = Some(next);
            win = Some(next);

            if let Some(cb) = self.stream_record(handle).irq_fct_win {
                cb(
                    WindowDescriptor {
                        stream: handle,
                        win_nr: next,
                    },
                    self.stream_record(handle).irq_arg,
                );
            }

            if next == last_win {
                break;
            }
        }
    }
}
