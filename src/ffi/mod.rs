pub mod syscall;

/// Hand-laid subset of `struct perf_event_attr` (`PERF_ATTR_SIZE_VER5`,
/// 112 bytes). The kernel honors `size` and ignores fields beyond it, so
/// newer attr tails are not needed for a cycle counter.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Attr {
    pub type_: u32,
    pub size: u32,
    pub config: u64,
    /// `sample_period` or `sample_freq`, selected by the freq flag bit.
    pub sample: u64,
    pub sample_type: u64,
    pub read_format: u64,
    pub flags: u64,
    /// `wakeup_events` or `wakeup_watermark`.
    pub wakeup: u32,
    pub bp_type: u32,
    pub config1: u64,
    pub config2: u64,
    pub branch_sample_type: u64,
    pub sample_regs_user: u64,
    pub sample_stack_user: u32,
    pub clockid: i32,
    pub sample_regs_intr: u64,
    pub aux_watermark: u32,
    pub sample_max_stack: u16,
    pub __reserved_2: u16,
}

impl Attr {
    pub fn zeroed() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;

// perf_event_attr flag bits.
pub const ATTR_FLAG_DISABLED: u64 = 1 << 0;
pub const ATTR_FLAG_EXCLUDE_KERNEL: u64 = 1 << 5;
pub const ATTR_FLAG_EXCLUDE_HV: u64 = 1 << 6;
pub const ATTR_FLAG_FREQ: u64 = 1 << 10;

// _IO('$', 0..) ioctls of the perf fd.
pub const PERF_EVENT_IOC_ENABLE: u64 = 0x2400;
pub const PERF_EVENT_IOC_DISABLE: u64 = 0x2401;
pub const PERF_EVENT_IOC_RESET: u64 = 0x2403;

pub const PERF_FLAG_FD_CLOEXEC: u64 = 8;
