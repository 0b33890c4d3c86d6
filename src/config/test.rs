use std::collections::HashMap;
use std::path::Path;

use super::{Config, TimerMethod};
use crate::stack::MAX_STACK_DEPTH;

fn overridden(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut config = Config::default();
    config.apply_overrides(|name| vars.get(name).cloned());
    config
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.frequency_hz, 1000);
    assert_eq!(config.max_stack_depth, MAX_STACK_DEPTH);
    assert_eq!(config.timer_method, TimerMethod::Auto);
    assert!(config.enable_unwinding);
    assert!(!config.compress_output);
    assert_eq!(config.sample_interval_ns(), 1_000_000);
}

#[test]
fn overrides_apply() {
    let config = overridden(&[
        ("PERFLOW_FREQUENCY", "250"),
        ("PERFLOW_OUTPUT_DIR", "/tmp/prof"),
        ("PERFLOW_MAX_STACK_DEPTH", "32"),
        ("PERFLOW_ENABLE_COMPRESSION", "true"),
        ("PERFLOW_TIMER_METHOD", "timer"),
    ]);
    assert_eq!(config.frequency_hz, 250);
    assert_eq!(config.output_dir, Path::new("/tmp/prof"));
    assert_eq!(config.max_stack_depth, 32);
    assert!(config.compress_output);
    assert_eq!(config.timer_method, TimerMethod::MonotonicClock);
    assert_eq!(config.sample_interval_ns(), 4_000_000);
}

#[test]
fn timer_method_spellings() {
    assert_eq!(
        overridden(&[("PERFLOW_TIMER_METHOD", "cycle")]).timer_method,
        TimerMethod::HardwareCounter
    );
    assert_eq!(
        overridden(&[("PERFLOW_TIMER_METHOD", "AUTO")]).timer_method,
        TimerMethod::Auto
    );
}

#[test]
fn malformed_overrides_keep_defaults() {
    let config = overridden(&[
        ("PERFLOW_FREQUENCY", "fast"),
        ("PERFLOW_MAX_STACK_DEPTH", "0"),
        ("PERFLOW_TIMER_METHOD", "sundial"),
    ]);
    assert_eq!(config.frequency_hz, 1000);
    assert_eq!(config.max_stack_depth, MAX_STACK_DEPTH);
    assert_eq!(config.timer_method, TimerMethod::Auto);
}

#[test]
fn stack_depth_is_clamped() {
    let config = overridden(&[("PERFLOW_MAX_STACK_DEPTH", "4096")]);
    assert_eq!(config.max_stack_depth, MAX_STACK_DEPTH);
}
