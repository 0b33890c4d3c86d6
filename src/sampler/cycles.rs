use std::time::Duration;

use crate::ffi::syscall::clock_monotonic_ns;

pub const MIN_CYCLE_HZ: u64 = 1_000_000;
pub const MAX_CYCLE_HZ: u64 = 10_000_000_000;

const PROBE_WINDOW: Duration = Duration::from_millis(10);

/// Reads the high-resolution cycle register. Returns 0 on architectures
/// without one, which disqualifies the refinement in [`probe`].
#[inline]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe { core::arch::x86_64::_rdtsc() }
    }
    #[cfg(target_arch = "aarch64")]
    {
        let value: u64;
        unsafe { core::arch::asm!("mrs {}, cntvct_el0", out(reg) value) };
        value
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        0
    }
}

/// Qualifies the cycle register for the timer refinement: it must
/// increment across two consecutive reads and tick at a plausible rate.
/// Returns the measured frequency in Hz.
pub fn probe() -> Option<u64> {
    let first = read_cycles();
    let second = read_cycles();
    if second <= first {
        return None;
    }

    let t0 = clock_monotonic_ns();
    let c0 = read_cycles();
    std::thread::sleep(PROBE_WINDOW);
    let t1 = clock_monotonic_ns();
    let c1 = read_cycles();

    let elapsed_ns = t1.saturating_sub(t0);
    if elapsed_ns == 0 || c1 <= c0 {
        return None;
    }
    let hz = (c1 - c0).saturating_mul(1_000_000_000) / elapsed_ns;
    if (MIN_CYCLE_HZ..=MAX_CYCLE_HZ).contains(&hz) {
        Some(hz)
    } else {
        None
    }
}
