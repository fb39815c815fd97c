use std::time::Duration;

use tracing::warn;

/// Every tunable constant in one place. `Default` gives the reference values;
/// `from_env` overlays `VIGIL_*` variables on top of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long identical dispatches are folded together before emitting.
    pub dispatch_window: Duration,
    /// How long a failed informer/guard may stay unobserved before warning.
    pub grace_period: Duration,
    /// Entries kept per target in the rolling snapshot history.
    pub history_capacity: usize,
    /// Depth past which captured subtrees become their string form.
    pub max_depth: usize,
    /// Operation names kept in the breadcrumb trail.
    pub trail_capacity: usize,
    /// Failures kept in the unhandled-outcome registry.
    pub unhandled_capacity: usize,
    /// Sleep between `wait_until` condition checks.
    pub wait_tick: Duration,
    pub wait_timeout: Duration,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    pub must_return_timeout: Duration,
    pub retry_limit: u32,
    pub retry_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch_window: Duration::from_millis(100),
            grace_period: Duration::from_millis(50),
            history_capacity: 10,
            max_depth: 12,
            trail_capacity: 10,
            unhandled_capacity: 256,
            wait_tick: Duration::from_millis(16),
            wait_timeout: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            must_return_timeout: Duration::from_secs(5),
            retry_limit: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Defaults, overridden by any `VIGIL_*` variable that parses.
    pub fn from_env() -> Self {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its raw
    /// value. Unparseable values are logged and ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |name: &str| parse_var::<u64>(name, lookup(name)).map(Duration::from_millis);
        let count = |name: &str| parse_var::<usize>(name, lookup(name));

        if let Some(v) = millis("VIGIL_DISPATCH_WINDOW_MS") {
            self.dispatch_window = v;
        }
        if let Some(v) = millis("VIGIL_GRACE_MS") {
            self.grace_period = v;
        }
        if let Some(v) = count("VIGIL_HISTORY_CAPACITY") {
            self.history_capacity = v.max(1);
        }
        if let Some(v) = count("VIGIL_MAX_DEPTH") {
            self.max_depth = v;
        }
        if let Some(v) = count("VIGIL_TRAIL_CAPACITY") {
            self.trail_capacity = v;
        }
        if let Some(v) = millis("VIGIL_WAIT_TICK_MS") {
            self.wait_tick = v.max(Duration::from_millis(1));
        }
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %trimmed, "ignoring unparseable config override");
            None
        }
    }
}
