//! Bridge configuration.

use crate::codec::DEFAULT_MAX_DEPTH;

/// Identifier of the foreign object that resolves classes by name.
pub const DEFAULT_ENTRY_POINT: &str = "t";

/// Settings shared by every invocation through one bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Handle id of the foreign entry point.
    pub entry_point: String,
    /// Maximum nesting of values on the wire, in either direction.
    pub max_depth: usize,
}

impl BridgeConfig {
    pub fn standard() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Standard settings, overridden by `TETHER_ENTRY_POINT` and
    /// `TETHER_MAX_DEPTH` when they are set. An unparsable depth is ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::standard();
        if let Some(entry_point) = lookup("TETHER_ENTRY_POINT").filter(|s| !s.is_empty()) {
            config.entry_point = entry_point;
        }
        match lookup("TETHER_MAX_DEPTH").map(|raw| raw.parse::<usize>()) {
            Some(Ok(depth)) => config.max_depth = depth,
            Some(Err(e)) => tracing::warn!(error = %e, "ignoring TETHER_MAX_DEPTH"),
            None => {}
        }
        config
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::standard()
    }
}
