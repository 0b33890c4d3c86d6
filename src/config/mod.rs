use std::env;
use std::path::PathBuf;

use crate::stack::MAX_STACK_DEPTH;

#[cfg(test)]
mod test;

pub const ENV_FREQUENCY: &str = "PERFLOW_FREQUENCY";
pub const ENV_OUTPUT_DIR: &str = "PERFLOW_OUTPUT_DIR";
pub const ENV_MAX_STACK_DEPTH: &str = "PERFLOW_MAX_STACK_DEPTH";
pub const ENV_ENABLE_COMPRESSION: &str = "PERFLOW_ENABLE_COMPRESSION";
pub const ENV_TIMER_METHOD: &str = "PERFLOW_TIMER_METHOD";
pub const ENV_DEBUG: &str = "PERFLOW_DEBUG";

/// Interrupt source selection.
///
/// `Auto` prefers the hardware counter and silently falls back to the
/// monotonic clock timer (with the cycle-register refinement when the
/// register qualifies), reporting the fallback once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerMethod {
    #[default]
    Auto,
    /// Overflow-triggered hardware cycle counter.
    HardwareCounter,
    /// Periodic `CLOCK_MONOTONIC` timer.
    MonotonicClock,
}

/// Sampler configuration. Every field has a default; environment
/// overrides are applied exactly once at init via [`Config::from_env`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Desired samples per second.
    pub frequency_hz: u64,
    /// Cap on unwound frames per sample.
    pub max_stack_depth: usize,
    /// Directory the per-rank artifacts are written to.
    pub output_dir: PathBuf,
    /// Base artifact filename; the rank is appended.
    pub output_stem: String,
    /// Gzip the artifact body.
    pub compress_output: bool,
    pub timer_method: TimerMethod,
    /// When false, only the interrupted PC is captured.
    pub enable_unwinding: bool,
    /// Emit verbose diagnostics.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            frequency_hz: 1000,
            max_stack_depth: MAX_STACK_DEPTH,
            output_dir: PathBuf::from("."),
            output_stem: "perflow".to_owned(),
            compress_output: false,
            timer_method: TimerMethod::Auto,
            enable_unwinding: true,
            debug: false,
        }
    }
}

impl Config {
    /// Defaults with `PERFLOW_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    /// Applies overrides from `get`. Malformed values keep the default,
    /// silently unless the debug override is set.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        self.debug = get(ENV_DEBUG).map_or(self.debug, |v| truthy(&v));

        if let Some(raw) = get(ENV_FREQUENCY) {
            match raw.parse::<u64>() {
                Ok(hz) if hz > 0 => self.frequency_hz = hz,
                _ => self.reject(ENV_FREQUENCY, &raw),
            }
        }
        if let Some(raw) = get(ENV_OUTPUT_DIR) {
            if raw.is_empty() {
                self.reject(ENV_OUTPUT_DIR, &raw);
            } else {
                self.output_dir = PathBuf::from(raw);
            }
        }
        if let Some(raw) = get(ENV_MAX_STACK_DEPTH) {
            match raw.parse::<usize>() {
                Ok(depth) if depth > 0 => {
                    self.max_stack_depth = depth.min(MAX_STACK_DEPTH);
                }
                _ => self.reject(ENV_MAX_STACK_DEPTH, &raw),
            }
        }
        if let Some(raw) = get(ENV_ENABLE_COMPRESSION) {
            self.compress_output = truthy(&raw);
        }
        if let Some(raw) = get(ENV_TIMER_METHOD) {
            match raw.to_ascii_lowercase().as_str() {
                "auto" => self.timer_method = TimerMethod::Auto,
                "cycle" => self.timer_method = TimerMethod::HardwareCounter,
                "timer" => self.timer_method = TimerMethod::MonotonicClock,
                _ => self.reject(ENV_TIMER_METHOD, &raw),
            }
        }
    }

    /// Interval between samples in nanoseconds.
    pub fn sample_interval_ns(&self) -> u64 {
        1_000_000_000 / self.frequency_hz.max(1)
    }

    fn reject(&self, name: &str, raw: &str) {
        if self.debug {
            tracing::warn!(%name, %raw, "ignoring malformed override");
        }
    }
}

fn truthy(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
