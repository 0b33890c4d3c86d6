use std::fs::File;
use std::io::{Error, Result};
use std::os::fd::{AsRawFd, FromRawFd};

use libc::{c_int, c_void, pid_t, itimerspec, sigevent, siginfo_t, timespec};

use super::Attr;

pub type SignalHandler = extern "C" fn(c_int, *mut siginfo_t, *mut c_void);

// Not exposed by the vendored `libc` crate; values match the kernel's
// generic `fcntl.h` ABI, which is uniform across Linux architectures.
pub const F_SETSIG: c_int = 10;
pub const F_SETOWN_EX: c_int = 15;
pub const F_OWNER_TID: c_int = 0;

#[repr(C)]
struct FOwnerEx {
    type_: c_int,
    pid: pid_t,
}

pub fn perf_event_open(attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64) -> Result<File> {
    let num = libc::SYS_perf_event_open;
    let fd = unsafe { libc::syscall(num, attr, pid, cpu, group_fd, flags) };
    if fd != -1 {
        Ok(unsafe { File::from_raw_fd(fd as _) })
    } else {
        Err(Error::last_os_error())
    }
}

pub fn ioctl_arg(file: &File, op: u64, arg: u64) -> Result<i32> {
    let fd = file.as_raw_fd();
    let result = unsafe { libc::ioctl(fd, op as _, arg) };
    if result != -1 {
        Ok(result)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn fcntl_arg(file: &File, op: i32, arg: i32) -> Result<i32> {
    let fd = file.as_raw_fd();
    let result = unsafe { libc::fcntl(fd, op, arg) };
    if result != -1 {
        Ok(result)
    } else {
        Err(Error::last_os_error())
    }
}

/// Routes async fd notifications to one thread.
pub fn fcntl_owner_tid(file: &File, tid: libc::pid_t) -> Result<()> {
    let owner = FOwnerEx {
        type_: F_OWNER_TID,
        pid: tid,
    };
    let fd = file.as_raw_fd();
    let result = unsafe { libc::fcntl(fd, F_SETOWN_EX, &owner) };
    if result != -1 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn gettid() -> libc::pid_t {
    unsafe { libc::syscall(libc::SYS_gettid) as libc::pid_t }
}

pub fn timer_create(clock: libc::clockid_t, signo: c_int) -> Result<libc::timer_t> {
    let mut sev: sigevent = unsafe { std::mem::zeroed() };
    sev.sigev_notify = libc::SIGEV_SIGNAL;
    sev.sigev_signo = signo;
    let mut timer: libc::timer_t = std::ptr::null_mut();
    let result = unsafe { libc::timer_create(clock, &mut sev, &mut timer) };
    if result == 0 {
        Ok(timer)
    } else {
        Err(Error::last_os_error())
    }
}

/// Arms `timer` periodically; an interval of zero disarms it.
pub fn timer_settime(timer: libc::timer_t, interval_ns: u64) -> Result<()> {
    let tick = timespec {
        tv_sec: (interval_ns / 1_000_000_000) as _,
        tv_nsec: (interval_ns % 1_000_000_000) as _,
    };
    let spec = itimerspec {
        it_interval: tick,
        it_value: tick,
    };
    let result = unsafe { libc::timer_settime(timer, 0, &spec, std::ptr::null_mut()) };
    if result == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn timer_delete(timer: libc::timer_t) -> Result<()> {
    let result = unsafe { libc::timer_delete(timer) };
    if result == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

/// Installs `handler` for `signo` with `SA_SIGINFO | SA_RESTART`; the
/// signal is masked while the handler runs.
pub fn install_handler(signo: c_int, handler: SignalHandler) -> Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler as usize;
    action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    let result = unsafe { libc::sigaction(signo, &action, std::ptr::null_mut()) };
    if result == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

/// Discards `signo` until the disposition is changed again. Used to
/// drain stragglers between disarming a timer and restoring `SIG_DFL`.
pub fn ignore_handler(signo: c_int) -> Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = libc::SIG_IGN;
    let result = unsafe { libc::sigaction(signo, &action, std::ptr::null_mut()) };
    if result == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn restore_default_handler(signo: c_int) -> Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = libc::SIG_DFL;
    let result = unsafe { libc::sigaction(signo, &action, std::ptr::null_mut()) };
    if result == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn clock_monotonic_ns() -> u64 {
    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}
