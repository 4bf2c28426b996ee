//! Runtime configuration for the RPC layer.
//!
//! Values come from the environment; unset, empty or unparsable variables
//! fall back to defaults.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;
use vobjgraph_core::{default_db_path, resolve_db_path, DEFAULT_MAX_NODES};

pub use vobjgraph_core::DB_PATH_ENV;
pub const TIMEOUT_MS_ENV: &str = "VOBJGRAPH_RPC_TIMEOUT_MS";
pub const MAX_NODES_ENV: &str = "VOBJGRAPH_MAX_NODES";

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Settings shared by every dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub db_path: PathBuf,
    /// Deadline applied to each call.
    pub timeout: Duration,
    /// Node budget for traversal and deep clone when a call omits one.
    pub max_nodes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl RpcConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        config.db_path = resolve_db_path(None, lookup(DB_PATH_ENV));
        if let Some(timeout_ms) = parse_positive::<u64>(TIMEOUT_MS_ENV, lookup(TIMEOUT_MS_ENV)) {
            config.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(max_nodes) = parse_positive::<usize>(MAX_NODES_ENV, lookup(MAX_NODES_ENV)) {
            config.max_nodes = max_nodes;
        }
        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_positive<T>(key: &str, value: Option<String>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = non_empty(value)?;
    match raw.parse::<T>() {
        Ok(parsed) if parsed > T::default() => Some(parsed),
        _ => {
            warn!("event=config_load module=rpc status=fallback key={key} value={raw}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RpcConfig, DB_PATH_ENV, MAX_NODES_ENV, TIMEOUT_MS_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> RpcConfig {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        RpcConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = config_from(&[]);
        assert_eq!(config, RpcConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_nodes, 256);
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            (DB_PATH_ENV, " /tmp/graph.db "),
            (TIMEOUT_MS_ENV, "250"),
            (MAX_NODES_ENV, "32"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/graph.db"));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.max_nodes, 32);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            (DB_PATH_ENV, "   "),
            (TIMEOUT_MS_ENV, "soon"),
            (MAX_NODES_ENV, "0"),
        ]);
        assert_eq!(config, RpcConfig::default());
    }
}
