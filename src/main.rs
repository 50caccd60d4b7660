//! Demo integrator for the DMA recorder driver.
//!
//! Walks through the lifecycle a real integrator follows: bring up the IP,
//! configure one stream for window-based IRQ handling, arm it, and drive a
//! couple of simulated interrupts through [`Ip::handle_irq`]. Backed by an
//! in-process fake register/DMA space instead of real hardware so this runs
//! anywhere `cargo run` does.

use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU8;

use daq_driver::regs::RecMode;
use daq_driver::{AccessFns, Ip, StreamConfig, UserArg, WindowDescriptor};

thread_local! {
    static REGS: RefCell<HashMap<u32, u32>> = RefCell::new(HashMap::new());
    static MEM: RefCell<HashMap<u32, u8>> = RefCell::new(HashMap::new());
}

fn fake_reg_write(addr: u32, value: u32) {
    REGS.with(|r| {
        r.borrow_mut().insert(addr, value);
    });
}

fn fake_reg_read(addr: u32) -> u32 {
    REGS.with(|r| *r.borrow().get(&addr).unwrap_or(&0))
}

/// SAFETY: `src`/`dst` are only ever addresses this demo itself populated via
/// [`MEM`]; there's no real DMA engine behind them.
unsafe fn fake_data_copy(dst: *mut u8, src: *const u8, n: usize) {
    let src_addr = src as usize as u32;
    MEM.with(|m| {
        let m = m.borrow();
        for i in 0..n {
            let byte = *m.get(&(src_addr + i as u32)).unwrap_or(&0);
            dst.add(i).write(byte);
        }
    });
}

const BASE_ADDR: u32 = 0x4000_0000;
const STREAM_WIDTH_BITS: u16 = 32;
const WIN_SIZE: u32 = 256;
const BUF_START: u32 = 0x1000;

/// System ISR: whatever the platform's interrupt dispatcher looks like, it
/// ends up calling this on every assertion of the IP's shared IRQ line.
fn on_daq_irq(ip: &mut Ip) {
    ip.handle_irq();
}

fn main() {
    env_logger::init();

    let access = AccessFns {
        reg_write: fake_reg_write,
        reg_read: fake_reg_read,
        data_copy: fake_data_copy,
    };
    let mut ip = Ip::init(BASE_ADDR, 1, NonZeroU8::new(4).unwrap(), Some(access));
    let stream = ip.stream(0).expect("stream 0 exists on a 1-stream IP");

    let cfg = StreamConfig {
        post_trig_samples: 4,
        rec_mode: RecMode::TriggerMask,
        win_as_ringbuf: false,
        win_overwrite: false,
        win_cnt: 4,
        buf_start_addr: BUF_START,
        win_size: WIN_SIZE,
        stream_width_bits: STREAM_WIDTH_BITS,
    };
    ip.configure(stream, &cfg).expect("configuration is valid");
    ip.set_irq_callback_win(stream, Some(log_window_callback_shim), UserArg::null())
        .expect("no stream-based callback is installed on this stream");
    ip.set_enable(stream, true);
    ip.set_irq_enable(stream, true);
    ip.arm(stream);

    log::info!("stream 0 armed, waiting for triggers");

    // Simulate the hardware completing window 0: 21 samples recorded, the
    // trigger at sample 15 (4 post-trigger samples recorded after it, as
    // configured), comfortably clear of the window's wrap boundary.
    let width_bytes = STREAM_WIDTH_BITS as u32 / 8;
    let win0_start = BUF_START;
    let recorded_samples = 21;
    let last_spl_addr = win0_start + (recorded_samples - 1) * width_bytes;
    ip.debug_write32(0x4000, (recorded_samples * width_bytes) | (1 << 31));
    ip.debug_write32(0x4004, last_spl_addr);
    ip.debug_write32(0x20C, 0); // LASTWIN
    ip.debug_write32(0x010, 1); // IRQVEC: stream 0 pending

    on_daq_irq(&mut ip);

    // `WinIrqFn` is a plain `fn` pointer with no capture slot, so the
    // callback above can only log that a window arrived; a real integrator
    // typically has it reach a fixed global/singleton driver instance to do
    // the actual read. This demo does that read here instead.
    let win = WindowDescriptor {
        stream,
        win_nr: 0,
    };
    let available_pre_trig = ip
        .get_pre_trig_samples(win)
        .expect("window contains a trigger");
    log::info!("{} pre-trigger samples available", available_pre_trig);

    let pre_trig = 3;
    let post_trig = 1;
    let mut buffer = vec![0u8; ((pre_trig + post_trig) * width_bytes) as usize];
    ip.get_data_unwrapped(win, pre_trig, post_trig, &mut buffer)
        .expect("unwrap the requested payload");
    log::info!("read {} bytes of trigger-relative payload", buffer.len());
    ip.mark_as_free(win).expect("window index is in range");
}

/// Window-based IRQ callback: fired once per completed window, in order.
fn log_window_callback_shim(win: WindowDescriptor, _arg: UserArg) {
    log::info!(
        "window IRQ fired for stream {} window {}",
        win.stream.nr(),
        win.win_nr
    );
}
