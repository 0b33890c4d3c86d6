use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{LazyLock, Mutex};

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::SamplerError;
use crate::sampler::Sampler;

#[cfg(test)]
mod test;

/// Opt-in switch for the automatic process hooks; without it a loaded
/// library stays dormant.
pub const ENV_ENABLE: &str = "PERFLOW_ENABLE";

pub const PERFLOW_OK: i32 = 0;
pub const PERFLOW_ERR_HANDLE: i32 = -1;
pub const PERFLOW_ERR_STATE: i32 = -2;
pub const PERFLOW_ERR_NOT_SUPPORTED: i32 = -3;
pub const PERFLOW_ERR_PERMISSION: i32 = -4;
pub const PERFLOW_ERR_INIT: i32 = -5;
pub const PERFLOW_ERR_IO: i32 = -6;

// Written once by the rank-identification hook, read at finalize.
static RANK_ID: AtomicI32 = AtomicI32::new(-1);

static GLOBAL: LazyLock<Mutex<Sampler>> = LazyLock::new(|| Mutex::new(Sampler::new()));

pub fn rank_id() -> i32 {
    RANK_ID.load(Ordering::Relaxed)
}

pub fn set_rank_id(rank: i32) {
    RANK_ID.store(rank, Ordering::Relaxed);
}

fn sampler_code(err: &SamplerError) -> i32 {
    match err {
        SamplerError::NotSupported(_) => PERFLOW_ERR_NOT_SUPPORTED,
        SamplerError::Permission(_) => PERFLOW_ERR_PERMISSION,
        SamplerError::InitFailure(_) => PERFLOW_ERR_INIT,
        SamplerError::StateError { .. } => PERFLOW_ERR_STATE,
    }
}

/// Allocates a sampler handle for the C API.
#[no_mangle]
pub extern "C" fn perflow_create() -> *mut Sampler {
    Box::into_raw(Box::new(Sampler::new()))
}

/// Initializes `handle` from the environment, overridden by a non-zero
/// `frequency_hz` and a non-null `output_dir`.
///
/// # Safety
///
/// `handle` must come from [`perflow_create`] and `output_dir` must be
/// null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn perflow_init(
    handle: *mut Sampler,
    frequency_hz: u64,
    output_dir: *const c_char,
) -> i32 {
    let Some(sampler) = handle.as_mut() else {
        return PERFLOW_ERR_HANDLE;
    };
    let mut config = Config::from_env();
    if frequency_hz > 0 {
        config.frequency_hz = frequency_hz;
    }
    if !output_dir.is_null() {
        match CStr::from_ptr(output_dir).to_str() {
            Ok(dir) => config.output_dir = PathBuf::from(dir),
            Err(_) => return PERFLOW_ERR_INIT,
        }
    }
    match sampler.init(config) {
        Ok(()) => PERFLOW_OK,
        Err(err) => sampler_code(&err),
    }
}

/// # Safety
///
/// `handle` must come from [`perflow_create`].
#[no_mangle]
pub unsafe extern "C" fn perflow_start(handle: *mut Sampler) -> i32 {
    let Some(sampler) = handle.as_mut() else {
        return PERFLOW_ERR_HANDLE;
    };
    match sampler.start() {
        Ok(()) => PERFLOW_OK,
        Err(err) => sampler_code(&err),
    }
}

/// # Safety
///
/// `handle` must come from [`perflow_create`].
#[no_mangle]
pub unsafe extern "C" fn perflow_stop(handle: *mut Sampler) -> i32 {
    let Some(sampler) = handle.as_mut() else {
        return PERFLOW_ERR_HANDLE;
    };
    match sampler.stop() {
        Ok(()) => PERFLOW_OK,
        Err(err) => sampler_code(&err),
    }
}

/// Writes the per-rank artifacts using the process-wide rank id.
///
/// # Safety
///
/// `handle` must come from [`perflow_create`].
#[no_mangle]
pub unsafe extern "C" fn perflow_write_output(handle: *mut Sampler) -> i32 {
    let Some(sampler) = handle.as_ref() else {
        return PERFLOW_ERR_HANDLE;
    };
    match sampler.write_output(rank_id()) {
        Ok(_) => PERFLOW_OK,
        Err(_) => PERFLOW_ERR_IO,
    }
}

/// # Safety
///
/// `handle` must come from [`perflow_create`].
#[no_mangle]
pub unsafe extern "C" fn perflow_get_sample_count(handle: *const Sampler) -> usize {
    handle.as_ref().map_or(0, |s| s.sample_count() as usize)
}

/// # Safety
///
/// `handle` must come from [`perflow_create`].
#[no_mangle]
pub unsafe extern "C" fn perflow_get_dropped_count(handle: *const Sampler) -> usize {
    handle.as_ref().map_or(0, |s| s.dropped_count() as usize)
}

/// Finalizes and frees `handle`.
///
/// # Safety
///
/// `handle` must come from [`perflow_create`] and not be used again.
#[no_mangle]
pub unsafe extern "C" fn perflow_destroy(handle: *mut Sampler) -> i32 {
    if handle.is_null() {
        return PERFLOW_ERR_HANDLE;
    }
    let mut sampler = Box::from_raw(handle);
    match sampler.finalize(rank_id()) {
        Ok(()) => PERFLOW_OK,
        Err(_) => PERFLOW_ERR_IO,
    }
}

/// Rank-identification callback for external interceptors.
#[no_mangle]
pub extern "C" fn perflow_set_rank(rank: i32) {
    set_rank_id(rank);
}

fn hooks_enabled() -> bool {
    std::env::var(ENV_ENABLE).map_or(false, |v| v == "1")
}

extern "C" fn process_entry() {
    if !hooks_enabled() {
        return;
    }
    let config = Config::from_env();
    if config.debug {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perflow=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
    let Ok(mut sampler) = GLOBAL.lock() else {
        return;
    };
    if let Err(err) = sampler.init(config).and_then(|()| sampler.start()) {
        eprintln!("perflow: failed to start sampling: {err}");
    }
}

extern "C" fn process_exit() {
    let Ok(mut sampler) = GLOBAL.lock() else {
        return;
    };
    if let Err(err) = sampler.finalize(rank_id()) {
        eprintln!("perflow: failed to write artifacts: {err}");
    }
}

// Loader-driven process hooks; dormant unless PERFLOW_ENABLE=1.
#[used]
#[link_section = ".init_array"]
static PERFLOW_CONSTRUCTOR: extern "C" fn() = process_entry;

#[used]
#[link_section = ".fini_array"]
static PERFLOW_DESTRUCTOR: extern "C" fn() = process_exit;
