//! Contextual restrictions attached to role grants
//!
//! A grant may carry a serialized restriction set such as
//!
//! ```json
//! {
//!   "timeRestricted": true,
//!   "allowedHours": "09:00-17:30",
//!   "allowedDays": ["monday", "tuesday"],
//!   "ipWhitelist": ["10.0.0.0/24", "192.168.1.10"],
//!   "requireMFA": true
//! }
//! ```
//!
//! Every recognized restriction that is present must pass. Absent ones impose
//! nothing and unknown keys are ignored. A payload that does not parse denies.
//!
//! Known limitation: time windows are compared as plain `HHMM` numbers, so a
//! window that crosses midnight (`22:00-02:00`) never matches.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::PermissionContext;

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Parsed restriction set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restricted: Option<bool>,
    /// `"HH:MM-HH:MM"`, inclusive on both ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_hours: Option<String>,
    /// Lowercase full weekday names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_days: Option<Vec<String>>,
    /// Literal addresses or `a.b.c.d/n` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_whitelist: Option<Vec<String>>,
    #[serde(default, rename = "requireMFA", skip_serializing_if = "Option::is_none")]
    pub require_mfa: Option<bool>,
}

impl GrantConditions {
    /// Parse a serialized restriction set
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// What to do with an IP allowlist when the request carries no address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingIpPolicy {
    /// Skip the allowlist entirely
    #[default]
    Skip,
    /// Treat the request as outside the allowlist
    Deny,
}

/// Evaluates restriction sets against a request
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator {
    missing_ip: MissingIpPolicy,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_ip_policy(missing_ip: MissingIpPolicy) -> Self {
        Self { missing_ip }
    }

    pub fn missing_ip_policy(&self) -> MissingIpPolicy {
        self.missing_ip
    }

    /// Evaluate against the local wall clock
    pub fn evaluate(&self, raw: &str, context: &PermissionContext) -> bool {
        self.evaluate_at(raw, context, Local::now().naive_local())
    }

    /// Evaluate with an explicit current time
    pub fn evaluate_at(&self, raw: &str, context: &PermissionContext, now: NaiveDateTime) -> bool {
        match GrantConditions::parse(raw) {
            Ok(conditions) => self.check(&conditions, context, now),
            Err(e) => {
                debug!("Malformed grant conditions, denying: {}", e);
                false
            }
        }
    }

    /// Check an already parsed restriction set
    pub fn check(
        &self,
        conditions: &GrantConditions,
        context: &PermissionContext,
        now: NaiveDateTime,
    ) -> bool {
        if conditions.time_restricted == Some(true) {
            if let Some(window) = &conditions.allowed_hours {
                if !within_hours(window, now) {
                    debug!("Outside allowed hours {}", window);
                    return false;
                }
            }
        }

        if let Some(days) = &conditions.allowed_days {
            let today = WEEKDAYS[now.weekday().num_days_from_sunday() as usize];
            if !days.iter().any(|day| day == today) {
                debug!("{} is not an allowed day", today);
                return false;
            }
        }

        if let Some(whitelist) = &conditions.ip_whitelist {
            match context.conditions.ip_address.as_deref() {
                Some(ip) => {
                    if !ip_allowed(whitelist, ip) {
                        debug!("IP {} is not whitelisted", ip);
                        return false;
                    }
                }
                None if self.missing_ip == MissingIpPolicy::Deny => {
                    debug!("IP whitelist present but request has no IP address");
                    return false;
                }
                None => {}
            }
        }

        if conditions.require_mfa == Some(true) && context.conditions.mfa_verified != Some(true) {
            debug!("MFA required but not verified");
            return false;
        }

        true
    }
}

/// Parse `"HH:MM"` into `HHMM`. Out-of-range clock readings are rejected.
fn clock_value(text: &str) -> Option<u32> {
    let (hour, minute) = text.trim().split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 100 + minute)
}

/// Inclusive `HH:MM-HH:MM` check. An unparseable window never matches.
fn within_hours(window: &str, now: NaiveDateTime) -> bool {
    let Some((start, end)) = window.split_once('-') else {
        return false;
    };
    let (Some(start), Some(end)) = (clock_value(start), clock_value(end)) else {
        return false;
    };

    let current = now.hour() * 100 + now.minute();
    current >= start && current <= end
}

/// Slash entries compare the first three octets of the network part only.
/// This is a /24-style prefix check regardless of the stated mask length.
fn ip_allowed(whitelist: &[String], ip: &str) -> bool {
    whitelist.iter().any(|entry| match entry.split_once('/') {
        Some((network, _)) => first_three_octets(network) == first_three_octets(ip),
        None => entry == ip,
    })
}

fn first_three_octets(address: &str) -> Vec<&str> {
    address.split('.').take(3).collect()
}
