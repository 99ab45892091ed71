//! Inspector configuration.
//!
//! By default the supervisor probes liveness every 100 ms and live watch
//! surfaces check for edits every 10 ms.
//!
//! ## Environment Variables
//!
//! - `MEMSCOPE_SUPERVISOR_INTERVAL_MS`: supervisor tick in milliseconds
//! - `MEMSCOPE_POLL_INTERVAL_MS`: live watch tick in milliseconds
//! - `MEMSCOPE_PLACEHOLDER`: text shown in place of an unreadable value

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default supervisor liveness interval
pub const DEFAULT_SUPERVISOR_INTERVAL: Duration = Duration::from_millis(100);
/// Default live watch poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Default display text for a value that could not be read
pub const DEFAULT_PLACEHOLDER: &str = "??";

/// Timing and display settings shared by the inspector's components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig
{
    /// How often the supervisor checks that the target is alive
    pub supervisor_interval: Duration,
    /// How often a live watch surface checks its edit flag
    pub poll_interval: Duration,
    /// Display text substituted for failed reads
    pub placeholder: String,
}

impl Default for InspectorConfig
{
    fn default() -> Self
    {
        Self {
            supervisor_interval: DEFAULT_SUPERVISOR_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl InspectorConfig
{
    /// Defaults overridden by `MEMSCOPE_*` environment variables
    ///
    /// Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let mut config = Self::default();
        if let Some(interval) = millis(&lookup, "MEMSCOPE_SUPERVISOR_INTERVAL_MS") {
            config.supervisor_interval = interval;
        }
        if let Some(interval) = millis(&lookup, "MEMSCOPE_POLL_INTERVAL_MS") {
            config.poll_interval = interval;
        }
        if let Some(placeholder) = lookup("MEMSCOPE_PLACEHOLDER") {
            config.placeholder = placeholder;
        }
        config
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration>
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid interval; expected milliseconds > 0");
            None
        }
    }
}
