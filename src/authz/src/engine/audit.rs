//! Audit recording for role mutations
//!
//! Builds [`AuditLog`] entries and hands them to the gateway. The write is
//! awaited inline: if it fails, the error reaches the caller of the mutating
//! operation even though the mutation itself already went through.

use chrono::{SubsecRound, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::gateway::{from_records, to_record, Collection, Filter, FindOptions, Gateway, SortDirection};
use crate::types::AuditLog;

/// Action name recorded when a role is assigned
pub const ROLE_ASSIGNED: &str = "role.assigned";

/// Action name recorded when a role assignment is removed
pub const ROLE_REMOVED: &str = "role.removed";

/// Action name recorded when a role is deleted along with its assignments and grants
pub const ROLE_DELETED: &str = "role.deleted";

/// What happened, before it is stamped and stored
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    /// Acting user
    pub user_id: String,
    pub organization_id: Option<String>,
    pub details: Value,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        resource: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            user_id: user_id.into(),
            organization_id: None,
            details: Value::Object(Default::default()),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_organization(mut self, organization_id: Option<impl Into<String>>) -> Self {
        self.organization_id = organization_id.map(Into::into);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Audit trail writer, gated by configuration
#[derive(Clone)]
pub struct AuditRecorder {
    gateway: Arc<dyn Gateway>,
    enabled: bool,
}

impl AuditRecorder {
    pub fn new(gateway: Arc<dyn Gateway>, enabled: bool) -> Self {
        Self { gateway, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Store `event`. Returns `None` without writing when recording is disabled.
    pub async fn record(&self, event: AuditEvent) -> Result<Option<AuditLog>> {
        if !self.enabled {
            return Ok(None);
        }

        let entry = AuditLog {
            id: Uuid::new_v4().to_string(),
            action: event.action,
            resource: event.resource,
            resource_id: event.resource_id,
            user_id: event.user_id,
            organization_id: event.organization_id,
            details: serde_json::to_string(&event.details)?,
            timestamp: Utc::now().trunc_subsecs(6),
        };

        self.gateway
            .create(Collection::AuditLogs, to_record(&entry)?)
            .await?;

        debug!("Audit entry {} recorded: {}", entry.id, entry.action);
        Ok(Some(entry))
    }

    /// Most recent entries first, optionally restricted to one organization
    pub async fn query(
        &self,
        organization_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditLog>> {
        let filter = Filter::new().eq_opt("organizationId", organization_id);
        let options = FindOptions::sorted("timestamp", SortDirection::Desc)
            .with_limit(limit)
            .with_offset(offset);

        from_records(
            self.gateway
                .find_many(Collection::AuditLogs, &filter, &options)
                .await?,
        )
    }
}
