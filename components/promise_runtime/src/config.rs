//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grace period before an unobserved rejection is reported.
pub const DEFAULT_UNHANDLED_GRACE_MS: u64 = 10;

/// Stale-task ceiling used by schedulers that were never configured.
pub const DEFAULT_STALE_TIMEOUT_MS: u64 = 600_000;

/// The deferral strategy a promise is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlavorKind {
    /// Continuations run in the same turn as settlement.
    Sync,
    /// Continuations run from a host timer.
    Async,
    /// Continuations run when the host is idle.
    Idle,
    /// Continuations run on the host's native job queue.
    Native,
}

impl FlavorKind {
    /// Lower-case name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            FlavorKind::Sync => "sync",
            FlavorKind::Async => "async",
            FlavorKind::Idle => "idle",
            FlavorKind::Native => "native",
        }
    }
}

impl fmt::Display for FlavorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlavorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(FlavorKind::Sync),
            "async" => Ok(FlavorKind::Async),
            "idle" => Ok(FlavorKind::Idle),
            "native" => Ok(FlavorKind::Native),
            other => Err(format!("unknown promise flavor '{}'", other)),
        }
    }
}

/// Settings a [`Runtime`](crate::Runtime) starts from.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use promise_runtime::{FlavorKind, RuntimeConfig};
///
/// let config: RuntimeConfig = serde_json::from_str(r#"{ "default_flavor": "idle" }"#).unwrap();
/// assert_eq!(config.default_flavor, FlavorKind::Idle);
/// assert_eq!(config.unhandled_grace_ms, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Flavor used by the generic `create_*_promise` helpers
    pub default_flavor: FlavorKind,
    /// Timer delay of the async flavor when none is given
    pub async_delay_ms: u64,
    /// Deadline hint of the idle flavor when none is given
    pub idle_timeout_ms: Option<u64>,
    /// Grace period before an unhandled rejection is reported
    pub unhandled_grace_ms: u64,
    /// Stale-task ceiling for new task schedulers; 0 disables the sweep
    pub stale_timeout_ms: u64,
    /// Start with promise debugging enabled
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_flavor: FlavorKind::Native,
            async_delay_ms: 0,
            idle_timeout_ms: None,
            unhandled_grace_ms: DEFAULT_UNHANDLED_GRACE_MS,
            stale_timeout_ms: DEFAULT_STALE_TIMEOUT_MS,
            debug: false,
        }
    }
}
