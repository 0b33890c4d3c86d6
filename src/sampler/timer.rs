use std::fs::File;
use std::io;
use std::sync::atomic::Ordering;

use super::{cycles, handler};
use crate::config::TimerMethod;
use crate::error::SamplerError;
use crate::ffi::syscall::{
    fcntl_arg, fcntl_owner_tid, gettid, ioctl_arg, perf_event_open, timer_create, timer_delete,
    timer_settime, F_SETSIG,
};
use crate::ffi::{
    Attr, ATTR_FLAG_DISABLED, ATTR_FLAG_EXCLUDE_HV, ATTR_FLAG_EXCLUDE_KERNEL, ATTR_FLAG_FREQ,
    PERF_COUNT_HW_CPU_CYCLES, PERF_EVENT_IOC_DISABLE, PERF_EVENT_IOC_ENABLE, PERF_EVENT_IOC_RESET,
    PERF_FLAG_FD_CLOEXEC, PERF_TYPE_HARDWARE,
};

/// The interrupt source behind the sampling signal. Dispatch is static;
/// the variant is fixed at init.
pub(super) enum TimerSource {
    HardwareCounter(PerfCounterTimer),
    MonotonicClock(ClockTimer),
}

impl TimerSource {
    pub(super) fn open(method: TimerMethod, frequency_hz: u64) -> Result<Self, SamplerError> {
        match method {
            TimerMethod::HardwareCounter => {
                PerfCounterTimer::open(frequency_hz).map(Self::HardwareCounter)
            }
            TimerMethod::MonotonicClock => {
                ClockTimer::open(frequency_hz, false).map(Self::MonotonicClock)
            }
            TimerMethod::Auto => match PerfCounterTimer::open(frequency_hz) {
                Ok(timer) => Ok(Self::HardwareCounter(timer)),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "hardware counter unavailable, falling back to monotonic clock timer"
                    );
                    ClockTimer::open(frequency_hz, true).map(Self::MonotonicClock)
                }
            },
        }
    }

    pub(super) fn arm(&mut self) -> Result<(), SamplerError> {
        match self {
            Self::HardwareCounter(timer) => timer.arm(),
            Self::MonotonicClock(timer) => timer.arm(),
        }
    }

    pub(super) fn disarm(&mut self) -> Result<(), SamplerError> {
        match self {
            Self::HardwareCounter(timer) => timer.disarm(),
            Self::MonotonicClock(timer) => timer.disarm(),
        }
    }

    pub(super) fn describe(&self) -> &'static str {
        match self {
            Self::HardwareCounter(_) => "hardware cycle counter",
            Self::MonotonicClock(timer) if timer.cycle_budget > 0 => {
                "monotonic clock timer with cycle refinement"
            }
            Self::MonotonicClock(_) => "monotonic clock timer",
        }
    }
}

/// Overflow-sampling cycle counter delivering SIGPROF to the arming
/// thread.
pub(super) struct PerfCounterTimer {
    perf: File,
}

impl PerfCounterTimer {
    fn open(frequency_hz: u64) -> Result<Self, SamplerError> {
        let mut attr = Attr::zeroed();
        attr.type_ = PERF_TYPE_HARDWARE;
        attr.size = std::mem::size_of::<Attr>() as u32;
        attr.config = PERF_COUNT_HW_CPU_CYCLES;
        attr.sample = frequency_hz;
        attr.flags = ATTR_FLAG_DISABLED | ATTR_FLAG_FREQ | ATTR_FLAG_EXCLUDE_KERNEL
            | ATTR_FLAG_EXCLUDE_HV;
        attr.wakeup = 1;

        let perf = perf_event_open(&attr, 0, -1, -1, PERF_FLAG_FD_CLOEXEC).map_err(map_open_err)?;
        let flags = fcntl_arg(&perf, libc::F_GETFL, 0).map_err(SamplerError::InitFailure)?;
        fcntl_arg(&perf, libc::F_SETFL, flags | libc::O_ASYNC | libc::O_NONBLOCK)
            .map_err(SamplerError::InitFailure)?;
        fcntl_arg(&perf, F_SETSIG, libc::SIGPROF).map_err(SamplerError::InitFailure)?;
        fcntl_owner_tid(&perf, gettid()).map_err(SamplerError::InitFailure)?;

        Ok(PerfCounterTimer { perf })
    }

    fn arm(&mut self) -> Result<(), SamplerError> {
        ioctl_arg(&self.perf, PERF_EVENT_IOC_RESET, 0).map_err(SamplerError::InitFailure)?;
        ioctl_arg(&self.perf, PERF_EVENT_IOC_ENABLE, 0).map_err(SamplerError::InitFailure)?;
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), SamplerError> {
        ioctl_arg(&self.perf, PERF_EVENT_IOC_DISABLE, 0).map_err(SamplerError::InitFailure)?;
        Ok(())
    }
}

fn map_open_err(err: io::Error) -> SamplerError {
    match err.raw_os_error() {
        Some(libc::EPERM) | Some(libc::EACCES) => SamplerError::Permission(err),
        Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::EOPNOTSUPP) | Some(libc::ENOSYS) => {
            SamplerError::NotSupported(format!("perf_event_open: {err}"))
        }
        _ => SamplerError::InitFailure(err),
    }
}

/// Periodic `CLOCK_MONOTONIC` timer delivering SIGPROF, optionally gated
/// by the cycle register so sampling never exceeds the requested rate.
pub(super) struct ClockTimer {
    timer: libc::timer_t,
    interval_ns: u64,
    cycle_budget: u64,
}

// timer_t is an opaque kernel timer id.
unsafe impl Send for ClockTimer {}

impl ClockTimer {
    fn open(frequency_hz: u64, refine: bool) -> Result<Self, SamplerError> {
        let period_ns = 1_000_000_000 / frequency_hz.max(1);
        let cycle_budget = if refine {
            match cycles::probe() {
                Some(cycle_hz) => {
                    tracing::debug!(cycle_hz, "cycle register qualified for refinement");
                    cycle_hz / frequency_hz.max(1)
                }
                None => 0,
            }
        } else {
            0
        };
        // With the gate in place the timer oversamples and the register
        // decides which ticks count.
        let interval_ns = if cycle_budget > 0 {
            (period_ns / 2).max(1)
        } else {
            period_ns.max(1)
        };
        let timer = timer_create(libc::CLOCK_MONOTONIC, libc::SIGPROF)
            .map_err(SamplerError::InitFailure)?;
        Ok(ClockTimer {
            timer,
            interval_ns,
            cycle_budget,
        })
    }

    fn arm(&mut self) -> Result<(), SamplerError> {
        handler::LAST_SAMPLE_CYCLES.store(cycles::read_cycles(), Ordering::Release);
        handler::CYCLE_BUDGET.store(self.cycle_budget, Ordering::Release);
        timer_settime(self.timer, self.interval_ns).map_err(SamplerError::InitFailure)
    }

    fn disarm(&mut self) -> Result<(), SamplerError> {
        handler::CYCLE_BUDGET.store(0, Ordering::Release);
        timer_settime(self.timer, 0).map_err(SamplerError::InitFailure)
    }
}

impl Drop for ClockTimer {
    fn drop(&mut self) {
        let _ = timer_delete(self.timer);
    }
}
