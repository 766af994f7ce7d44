//! Core entity records and the evaluation request
//!
//! Every record serializes with camelCase field names, which is the shape the
//! persistence gateway stores and filters on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Unique permission identifier
pub type PermissionId = String;

/// Unique role identifier
pub type RoleId = String;

/// Unique policy identifier
pub type PolicyId = String;

/// Permission definition. `name` has the form `resource:action`; any segment
/// may be the wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Organization scoped role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub organization_id: String,
    /// Hierarchy order. Used for sorting only; never propagates grants.
    #[serde(default)]
    pub level: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Grant linking a role to a permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermission {
    pub id: String,
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    /// `false` is an explicit deny
    pub granted: bool,
    /// Serialized restriction set, see [`crate::conditions`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

/// Assignment of a role to a user within an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRole {
    pub id: String,
    pub user_id: String,
    pub role_id: RoleId,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Domain object a permission may target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub organization_id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Subject of a per-resource grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    User(String),
    Role(RoleId),
}

/// Per-resource override, independent of role grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePermission {
    pub id: String,
    pub resource_id: String,
    pub subject: Subject,
    pub permission_id: PermissionId,
    pub granted: bool,
}

/// Organization scoped, prioritized policy. `rules` holds the serialized,
/// ordered rule list (see [`crate::policy::PolicyRule`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: PolicyId,
    pub organization_id: String,
    pub name: String,
    pub rules: String,
    /// Higher is evaluated first
    #[serde(default)]
    pub priority: i32,
    pub is_active: bool,
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Serialized JSON detail payload
    pub details: String,
    /// Stored as integer microseconds so the gateway orders entries by time
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Caller supplied request facts (IP, MFA state, anything else the transport
/// layer attaches)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_verified: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Evaluation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Requested action, e.g. `docs:read`
    pub action: String,
    pub resource_type: String,
    #[serde(default)]
    pub conditions: RequestConditions,
}

impl PermissionContext {
    /// Create a request without organization scope or request facts
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            conditions: RequestConditions::default(),
        }
    }

    /// Build a request from a permission name alone. The resource type is the
    /// text before the first `:`, or `"unknown"` when there is none.
    pub fn for_permission(user_id: impl Into<String>, permission_name: &str) -> Self {
        let resource_type = match permission_name.split_once(':') {
            Some((resource, _)) => resource,
            None => "unknown",
        };
        Self::new(user_id, permission_name, resource_type)
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.conditions.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_mfa(mut self, verified: bool) -> Self {
        self.conditions.mfa_verified = Some(verified);
        self
    }

    /// Attach an arbitrary request fact
    pub fn with_condition(mut self, key: impl Into<String>, value: Value) -> Self {
        self.conditions.extra.insert(key.into(), value);
        self
    }
}
