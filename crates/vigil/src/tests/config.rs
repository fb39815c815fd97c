use std::collections::HashMap;
use std::time::Duration;

use crate::Config;

fn overlay(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    Config::default().overlay(|name| vars.get(name).cloned())
}

#[test]
fn defaults_match_reference_values() {
    let config = Config::default();
    assert_eq!(config.dispatch_window, Duration::from_millis(100));
    assert_eq!(config.grace_period, Duration::from_millis(50));
    assert_eq!(config.history_capacity, 10);
    assert_eq!(config.max_depth, 12);
    assert_eq!(config.trail_capacity, 10);
    assert_eq!(config.wait_tick, Duration::from_millis(16));
}

#[test]
fn overrides_apply_when_they_parse() {
    let config = overlay(&[
        ("VIGIL_DISPATCH_WINDOW_MS", "250"),
        ("VIGIL_GRACE_MS", " 10 "),
        ("VIGIL_HISTORY_CAPACITY", "3"),
        ("VIGIL_TRAIL_CAPACITY", "0"),
    ]);
    assert_eq!(config.dispatch_window, Duration::from_millis(250));
    assert_eq!(config.grace_period, Duration::from_millis(10));
    assert_eq!(config.history_capacity, 3);
    assert_eq!(config.trail_capacity, 0);
}

#[test]
fn unparseable_or_empty_overrides_are_ignored() {
    let config = overlay(&[("VIGIL_MAX_DEPTH", "deep"), ("VIGIL_WAIT_TICK_MS", "")]);
    assert_eq!(config, Config::default());
}

#[test]
fn zero_tick_is_clamped() {
    let config = overlay(&[("VIGIL_WAIT_TICK_MS", "0")]);
    assert_eq!(config.wait_tick, Duration::from_millis(1));
}
