//! End-to-end scenarios against a simulated register/DMA address space.
//!
//! [`AccessFns`] callbacks are plain `fn` pointers (no closure captures, so
//! they can cross an FFI-like boundary untouched), which means the fake
//! hardware backing them has to live in thread-local storage rather than
//! being captured directly. [`reset`] clears it between tests since the test
//! harness may reuse threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU8;

use daq_driver::{AccessFns, DaqError, Ip, StreamConfig, UserArg};

thread_local! {
    static REGS: RefCell<HashMap<u32, u32>> = RefCell::new(HashMap::new());
    static MEM: RefCell<HashMap<u32, u8>> = RefCell::new(HashMap::new());
}

fn reset() {
    REGS.with(|r| r.borrow_mut().clear());
    MEM.with(|m| m.borrow_mut().clear());
}

fn fake_reg_write(addr: u32, value: u32) {
    REGS.with(|r| {
        r.borrow_mut().insert(addr, value);
    });
}

fn fake_reg_read(addr: u32) -> u32 {
    REGS.with(|r| *r.borrow().get(&addr).unwrap_or(&0))
}

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

fn fake_mem_write(addr: u32, bytes: &[u8]) {
    MEM.with(|m| {
        let mut m = m.borrow_mut();
        for (i, b) in bytes.iter().enumerate() {
            m.insert(addr + i as u32, *b);
        }
    });
}

fn fake_access() -> AccessFns {
    AccessFns {
        reg_write: fake_reg_write,
        reg_read: fake_reg_read,
        data_copy: fake_data_copy,
    }
}

const BASE: u32 = 0x4000_0000;

fn default_config() -> StreamConfig {
    StreamConfig {
        post_trig_samples: 2,
        rec_mode: daq_driver::regs::RecMode::Continuous,
        win_as_ringbuf: false,
        win_overwrite: false,
        win_cnt: 4,
        buf_start_addr: 0x1000,
        win_size: 64,
        stream_width_bits: 32,
    }
}

/// Directly pokes a window's `WINCNT` register and `LAST`/fill state the way
/// the hardware would after finishing a capture, without needing a real DMA
/// engine in the loop.
fn simulate_window_fill(
    ip: &Ip,
    str_nr: u8,
    win_nr: u8,
    str_addr_offs: u32,
    buf_start: u32,
    win_size: u32,
    width_bytes: u32,
    samples: u32,
    trig_sample_index: u32,
) {
    let win_start = buf_start + win_size * win_nr as u32;
    let last_spl_addr = win_start + trig_sample_index * width_bytes;
    let wincnt_addr = 0x4000 + str_addr_offs * str_nr as u32 + 0x10 * win_nr as u32;
    let last_addr = wincnt_addr + 0x4;
    let wincnt_value = (samples * width_bytes) | (1 << 31); // is_trig set
    ip.debug_write32(wincnt_addr, wincnt_value);
    ip.debug_write32(last_addr, last_spl_addr);
}

#[test]
fn configuring_and_arming_a_stream_programs_the_expected_registers() {
    reset();
    let mut ip = Ip::init(BASE, 2, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();

    let cfg = default_config();
    ip.configure(handle, &cfg).unwrap();
    ip.set_enable(handle, true);
    ip.set_irq_enable(handle, true);
    ip.arm(handle);

    assert_eq!(ip.total_windows(handle), 4);
    assert!(!ip.is_recording(handle));
}

#[test]
fn configuring_an_enabled_stream_is_rejected() {
    reset();
    let mut ip = Ip::init(BASE, 2, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let cfg = default_config();
    ip.configure(handle, &cfg).unwrap();
    ip.set_enable(handle, true);

    let err = ip.configure(handle, &cfg).unwrap_err();
    assert_eq!(err, DaqError::StrNotDisabled { nr: 0 });
}

#[test]
fn configuring_more_windows_than_the_ip_supports_is_rejected() {
    reset();
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let mut cfg = default_config();
    cfg.win_cnt = 5;

    let err = ip.configure(handle, &cfg).unwrap_err();
    assert_eq!(
        err,
        DaqError::IllegalWinCnt {
            win_cnt: 5,
            max_windows: 4
        }
    );
}

#[test]
fn configuring_a_non_byte_aligned_width_is_rejected() {
    reset();
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let mut cfg = default_config();
    cfg.stream_width_bits = 12;

    let err = ip.configure(handle, &cfg).unwrap_err();
    assert_eq!(err, DaqError::IllegalStrWidth { width_bits: 12 });
}

#[test]
fn configuring_a_window_size_not_a_multiple_of_the_sample_width_is_rejected() {
    reset();
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let mut cfg = default_config();
    cfg.stream_width_bits = 16;
    cfg.win_size = 31;

    let err = ip.configure(handle, &cfg).unwrap_err();
    assert_eq!(
        err,
        DaqError::WinSizeMustBeMultipleOfSamples {
            win_size: 31,
            width_bytes: 2
        }
    );
}

#[test]
fn reading_an_untriggered_window_is_rejected() {
    reset();
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let cfg = default_config();
    ip.configure(handle, &cfg).unwrap();

    let win = daq_driver::WindowDescriptor {
        stream: handle,
        win_nr: 0,
    };
    let err = ip.get_pre_trig_samples(win).unwrap_err();
    assert_eq!(err, DaqError::NoTrigInWin { win_nr: 0 });

    let mut buf = [0u8; 16];
    let err = ip.get_data_unwrapped(win, 2, 2, &mut buf).unwrap_err();
    assert_eq!(err, DaqError::NoTrigInWin { win_nr: 0 });
}

#[test]
fn unwraps_a_payload_that_does_not_cross_the_window_boundary() {
    reset();
    let str_addr_offs = 0x40; // next_pow2_ceil(4) * 0x10
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let mut cfg = default_config();
    cfg.win_size = 64;
    cfg.stream_width_bits = 32;
    cfg.post_trig_samples = 2;
    ip.configure(handle, &cfg).unwrap();

    // 16 samples fit in a 64-byte window at 4 bytes each; trigger at sample
    // 8, with 2 post-trigger samples recorded after it (10 total recorded).
    let win_start = cfg.buf_start_addr;
    let mut samples = [0u8; 64];
    for i in 0..16u32 {
        samples[(i * 4) as usize..(i * 4 + 4) as usize].copy_from_slice(&i.to_le_bytes());
    }
    fake_mem_write(win_start, &samples);
    simulate_window_fill(&ip, 0, 0, str_addr_offs, win_start, 64, 4, 11, 10);

    let win = daq_driver::WindowDescriptor {
        stream: handle,
        win_nr: 0,
    };
    assert_eq!(ip.get_pre_trig_samples(win).unwrap(), 9);

    let mut buf = [0u8; 4 * 5]; // 3 pre + 2 post
    ip.get_data_unwrapped(win, 3, 2, &mut buf).unwrap();
    let got: Vec<u32> = buf
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(got, vec![5, 6, 7, 8, 9]);
}

#[test]
fn unwraps_a_payload_that_wraps_across_the_window_boundary() {
    reset();
    let str_addr_offs = 0x40;
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let mut cfg = default_config();
    cfg.win_size = 64; // 16 samples of 4 bytes
    cfg.stream_width_bits = 32;
    cfg.post_trig_samples = 2;
    ip.configure(handle, &cfg).unwrap();

    let win_start = cfg.buf_start_addr;
    // Last sample written sits at byte offset 8 (slot 2); with 2
    // post-trigger samples configured, the trigger byte is 3 samples
    // earlier, which underflows the window start and wraps to slot 15.
    let trigger_value = 0xAAAA_AAAAu32;
    let post_trig_0_value = 0xBBBB_BBBBu32;
    let post_trig_1_value = 0xCCCC_CCCCu32;
    fake_mem_write(win_start + 60, &trigger_value.to_le_bytes()); // slot 15
    fake_mem_write(win_start, &post_trig_0_value.to_le_bytes()); // slot 0
    fake_mem_write(win_start + 4, &post_trig_1_value.to_le_bytes()); // slot 1

    // WINCNT's recorded-sample count only gates the pre-trigger-availability
    // check; it's independent of the physical layout above.
    simulate_window_fill(&ip, 0, 0, str_addr_offs, win_start, 64, 4, 10, 2);

    let win = daq_driver::WindowDescriptor {
        stream: handle,
        win_nr: 0,
    };

    let mut buf = [0u8; 4 * 3]; // 1 pre-trigger + 2 post-trigger samples
    ip.get_data_unwrapped(win, 1, 2, &mut buf).unwrap();
    let got: Vec<u32> = buf
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(got, vec![trigger_value, post_trig_0_value, post_trig_1_value]);
}

#[test]
fn requesting_more_post_trigger_samples_than_configured_is_rejected() {
    reset();
    let str_addr_offs = 0x40;
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let cfg = default_config(); // post_trig_samples: 2
    ip.configure(handle, &cfg).unwrap();
    simulate_window_fill(&ip, 0, 0, str_addr_offs, cfg.buf_start_addr, 64, 4, 11, 10);

    let win = daq_driver::WindowDescriptor {
        stream: handle,
        win_nr: 0,
    };
    let mut buf = [0u8; 4 * 10];
    let err = ip.get_data_unwrapped(win, 0, 3, &mut buf).unwrap_err();
    assert_eq!(
        err,
        DaqError::MorePostTrigThanConfigured {
            requested: 3,
            configured: 2
        }
    );
}

#[test]
fn window_based_irq_delivers_completed_windows_in_order_and_stops_at_a_gap() {
    reset();
    let str_addr_offs = 0x40;
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let cfg = default_config();
    ip.configure(handle, &cfg).unwrap();
    ip.set_irq_callback_win(handle, Some(record_window), UserArg::null()).unwrap();

    // Windows 0 and 1 have completed; the hardware reports window 1 as the
    // last one fully written.
    simulate_window_fill(&ip, 0, 0, str_addr_offs, cfg.buf_start_addr, 64, 4, 11, 10);
    simulate_window_fill(&ip, 0, 1, str_addr_offs, cfg.buf_start_addr, 64, 4, 11, 10);
    ip.debug_write32(regs_lastwin(0), 1);
    ip.debug_write32(regs_irqvec(), 1); // stream 0 raised the shared IRQ

    DELIVERED.with(|d| d.borrow_mut().clear());
    ip.handle_irq();

    DELIVERED.with(|d| {
        assert_eq!(*d.borrow(), vec![0, 1]);
    });
}

#[test]
fn mark_as_free_allows_a_window_to_be_redelivered() {
    reset();
    let str_addr_offs = 0x40;
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    let cfg = default_config(); // win_cnt: 4
    ip.configure(handle, &cfg).unwrap();
    ip.set_irq_callback_win(handle, Some(record_window), UserArg::null()).unwrap();
    DELIVERED.with(|d| d.borrow_mut().clear());

    // Windows 0..3 each complete once, in order; all four get delivered.
    for w in 0..4u8 {
        simulate_window_fill(&ip, 0, w, str_addr_offs, cfg.buf_start_addr, 64, 4, 11, 10);
        ip.debug_write32(regs_lastwin(0), w);
        ip.debug_write32(regs_irqvec(), 1);
        ip.handle_irq();
    }
    DELIVERED.with(|d| assert_eq!(*d.borrow(), vec![0, 1, 2, 3]));

    // The ring wraps: window 0 fills again, but its callback has not been
    // acknowledged via mark_as_free, so it must not be redelivered.
    simulate_window_fill(&ip, 0, 0, str_addr_offs, cfg.buf_start_addr, 64, 4, 11, 10);
    ip.debug_write32(regs_lastwin(0), 0);
    ip.debug_write32(regs_irqvec(), 1);
    ip.handle_irq();
    DELIVERED.with(|d| assert_eq!(*d.borrow(), vec![0, 1, 2, 3]));

    let win0 = daq_driver::WindowDescriptor {
        stream: handle,
        win_nr: 0,
    };
    ip.mark_as_free(win0).unwrap();

    ip.debug_write32(regs_irqvec(), 1);
    ip.handle_irq();
    DELIVERED.with(|d| assert_eq!(*d.borrow(), vec![0, 1, 2, 3, 0]));
}

#[test]
fn installing_both_irq_schemes_on_one_stream_is_rejected() {
    reset();
    let mut ip = Ip::init(BASE, 1, NonZeroU8::new(4).unwrap(), Some(fake_access()));
    let handle = ip.stream(0).unwrap();
    ip.set_irq_callback_win(handle, Some(record_window), UserArg::null()).unwrap();

    let err = ip.set_irq_callback_str(handle, Some(record_stream), UserArg::null()).unwrap_err();
    assert_eq!(err, DaqError::IrqSchemesWinAndStrAreExclusive { nr: 0 });
}

thread_local! {
    static DELIVERED: RefCell<Vec<u8>> = RefCell::new(Vec::new());
}

fn record_window(win: daq_driver::WindowDescriptor, _arg: UserArg) {
    DELIVERED.with(|d| d.borrow_mut().push(win.win_nr));
}

fn record_stream(_handle: daq_driver::StreamHandle, _arg: UserArg) {}

fn regs_lastwin(nr: u8) -> u32 {
    0x20C + 0x10 * nr as u32
}

fn regs_irqvec() -> u32 {
    0x010
}
