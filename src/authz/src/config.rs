//! Engine configuration
//!
//! Can be built in code, deserialized from JSON (camelCase keys), or read from
//! the environment:
//!
//! - `AUTHZ_ENABLE_AUDIT_LOG` - record role mutations (default: true)
//! - `AUTHZ_ENABLE_POLICY_ENGINE` - consult organization policies (default: false)
//! - `AUTHZ_CACHE_TTL` - cache time-to-live in seconds (accepted, not used yet)
//! - `AUTHZ_DENY_MISSING_IP` - deny IP-restricted grants when the request has no IP (default: false)
//! - `AUTHZ_ENABLE_METRICS` - collect evaluation counters (default: true)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::conditions::MissingIpPolicy;
use crate::error::{AuthzError, Result};

/// Permission engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Write audit entries for role assignment changes
    pub enable_audit_log: bool,

    /// Let active organization policies override role grants
    pub enable_policy_engine: bool,

    /// Cache time-to-live in seconds. Accepted for forward compatibility;
    /// evaluation does not cache between calls.
    #[serde(rename = "cacheTTL")]
    pub cache_ttl: Option<u64>,

    /// Deny IP-restricted grants when the request carries no IP address
    pub deny_missing_ip: bool,

    /// Enable in-process evaluation counters
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_audit_log: true,
            enable_policy_engine: false,
            cache_ttl: None,
            deny_missing_ip: false,
            enable_metrics: true,
        }
    }
}

impl EngineConfig {
    /// Load from `AUTHZ_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let flag = |key: &str, default: bool| -> Result<bool> {
            match lookup(key) {
                None => Ok(default),
                Some(value) => parse_bool(&value)
                    .ok_or_else(|| AuthzError::Config(format!("{} must be a boolean, got {:?}", key, value))),
            }
        };

        let cache_ttl = match lookup("AUTHZ_CACHE_TTL") {
            None => None,
            Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                AuthzError::Config(format!("AUTHZ_CACHE_TTL must be seconds, got {:?}", value))
            })?),
        };

        Ok(Self {
            enable_audit_log: flag("AUTHZ_ENABLE_AUDIT_LOG", defaults.enable_audit_log)?,
            enable_policy_engine: flag("AUTHZ_ENABLE_POLICY_ENGINE", defaults.enable_policy_engine)?,
            cache_ttl,
            deny_missing_ip: flag("AUTHZ_DENY_MISSING_IP", defaults.deny_missing_ip)?,
            enable_metrics: flag("AUTHZ_ENABLE_METRICS", defaults.enable_metrics)?,
        })
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl.map(Duration::from_secs)
    }

    pub fn missing_ip_policy(&self) -> MissingIpPolicy {
        if self.deny_missing_ip {
            MissingIpPolicy::Deny
        } else {
            MissingIpPolicy::Skip
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
