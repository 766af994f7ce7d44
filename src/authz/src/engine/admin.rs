//! Administrative operations
//!
//! Create/read/update/delete for the entities evaluation reads. Updating or
//! deleting by id fails with [`AuthzError::NotFound`] when the entity does not
//! exist. Delete-by-relationship operations (`revoke_permission`,
//! `remove_role`) succeed whether or not anything matched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use super::audit::{AuditEvent, ROLE_ASSIGNED, ROLE_DELETED, ROLE_REMOVED};
use super::PermissionEngine;
use crate::conditions::GrantConditions;
use crate::error::{AuthzError, EntityKind, Result};
use crate::gateway::{
    from_record, from_records, to_record, Collection, Filter, FindOptions, Record, SortDirection,
};
use crate::policy::{serialize_rules, PolicyRule};
use crate::types::{
    AuditLog, MemberRole, Permission, Policy, Resource, ResourcePermission, Role, RolePermission,
    Subject,
};

/// Input for [`PermissionEngine::create_role`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    pub organization_id: String,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial role update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input for [`PermissionEngine::assign_role`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRole {
    pub user_id: String,
    pub role_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    pub assigned_by: String,
}

/// Input for [`PermissionEngine::create_policy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicy {
    pub organization_id: String,
    pub name: String,
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial policy update. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<PolicyRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn by_id(id: &str) -> Filter {
    Filter::new().eq("id", id)
}

impl PermissionEngine {
    async fn insert<T: Serialize>(&self, collection: Collection, entity: &T) -> Result<()> {
        self.gateway.create(collection, to_record(entity)?).await?;
        Ok(())
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<T>> {
        self.gateway
            .find_one(collection, filter)
            .await?
            .map(from_record)
            .transpose()
    }

    async fn fetch_all<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<T>> {
        from_records(self.gateway.find_many(collection, filter, options).await?)
    }

    /// Patch an entity by id, failing when it does not exist
    async fn patch<T: serde::de::DeserializeOwned>(
        &self,
        collection: Collection,
        kind: EntityKind,
        id: &str,
        patch: Record,
    ) -> Result<T> {
        match self.gateway.update(collection, &by_id(id), patch).await? {
            Some(record) => from_record(record),
            None => Err(AuthzError::not_found(kind, id)),
        }
    }

    /// Delete an entity by id, failing when it does not exist
    async fn remove(&self, collection: Collection, kind: EntityKind, id: &str) -> Result<()> {
        let filter = by_id(id);
        if self.gateway.find_one(collection, &filter).await?.is_none() {
            return Err(AuthzError::not_found(kind, id));
        }
        self.gateway.delete(collection, &filter).await
    }

    // Permissions

    pub async fn create_permission(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Permission> {
        if name.is_empty() || name.split(':').any(str::is_empty) {
            return Err(AuthzError::InvalidInput(format!(
                "permission name {:?} has an empty segment",
                name
            )));
        }

        let permission = Permission {
            id: new_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        self.insert(Collection::Permissions, &permission).await?;
        Ok(permission)
    }

    pub async fn get_permission(&self, id: &str) -> Result<Option<Permission>> {
        self.fetch(Collection::Permissions, &by_id(id)).await
    }

    pub async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        self.fetch(Collection::Permissions, &Filter::new().eq("name", name))
            .await
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.fetch_all(
            Collection::Permissions,
            &Filter::new(),
            &FindOptions::sorted("name", SortDirection::Asc),
        )
        .await
    }

    pub async fn delete_permission(&self, id: &str) -> Result<()> {
        self.remove(Collection::Permissions, EntityKind::Permission, id)
            .await
    }

    // Roles

    pub async fn create_role(&self, input: NewRole) -> Result<Role> {
        let role = Role {
            id: new_id(),
            name: input.name,
            organization_id: input.organization_id,
            level: input.level,
            description: input.description,
        };
        self.insert(Collection::Roles, &role).await?;
        info!("Role {} ({}) created in {}", role.name, role.id, role.organization_id);
        Ok(role)
    }

    pub async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        self.fetch(Collection::Roles, &by_id(id)).await
    }

    /// Roles of an organization, highest level first
    pub async fn list_roles(&self, organization_id: &str) -> Result<Vec<Role>> {
        self.fetch_all(
            Collection::Roles,
            &Filter::new().eq("organizationId", organization_id),
            &FindOptions::sorted("level", SortDirection::Desc),
        )
        .await
    }

    pub async fn update_role(&self, id: &str, update: RoleUpdate) -> Result<Role> {
        self.patch(Collection::Roles, EntityKind::Role, id, to_record(&update)?)
            .await
    }

    /// Delete a role together with its assignments and grants, and record
    /// `role.deleted`
    pub async fn delete_role(&self, id: &str, deleted_by: &str) -> Result<()> {
        let Some(role) = self.get_role(id).await? else {
            return Err(AuthzError::not_found(EntityKind::Role, id));
        };

        let by_role = Filter::new().eq("roleId", id);
        self.gateway.delete(Collection::MemberRoles, &by_role).await?;
        self.gateway
            .delete(Collection::RolePermissions, &by_role)
            .await?;
        self.gateway.delete(Collection::Roles, &by_id(id)).await?;

        info!("Role {} ({}) deleted from {}", role.name, role.id, role.organization_id);

        self.auditor
            .record(
                AuditEvent::new(ROLE_DELETED, "role", deleted_by)
                    .with_resource_id(role.id.as_str())
                    .with_organization(Some(role.organization_id.as_str()))
                    .with_details(json!({"name": role.name})),
            )
            .await?;

        Ok(())
    }

    // Grants

    /// Attach a permission to a role. `conditions`, when given, must be a
    /// restriction set object; it is stored serialized.
    pub async fn grant_permission(
        &self,
        role_id: &str,
        permission_id: &str,
        granted: bool,
        conditions: Option<Value>,
    ) -> Result<RolePermission> {
        let conditions = match conditions {
            Some(value) => {
                serde_json::from_value::<GrantConditions>(value.clone()).map_err(|e| {
                    AuthzError::InvalidInput(format!("invalid grant conditions: {}", e))
                })?;
                Some(serde_json::to_string(&value)?)
            }
            None => None,
        };

        let grant = RolePermission {
            id: new_id(),
            role_id: role_id.to_string(),
            permission_id: permission_id.to_string(),
            granted,
            conditions,
        };
        self.insert(Collection::RolePermissions, &grant).await?;
        Ok(grant)
    }

    pub async fn revoke_permission(&self, role_id: &str, permission_id: &str) -> Result<()> {
        let filter = Filter::new()
            .eq("roleId", role_id)
            .eq("permissionId", permission_id);
        self.gateway
            .delete(Collection::RolePermissions, &filter)
            .await
    }

    pub async fn list_role_permissions(&self, role_id: &str) -> Result<Vec<RolePermission>> {
        self.fetch_all(
            Collection::RolePermissions,
            &Filter::new().eq("roleId", role_id),
            &FindOptions::default(),
        )
        .await
    }

    // Member roles

    /// Assign a role and record `role.assigned`. An audit write failure is
    /// returned even though the assignment was stored.
    pub async fn assign_role(&self, input: AssignRole) -> Result<MemberRole> {
        let assignment = MemberRole {
            id: new_id(),
            user_id: input.user_id,
            role_id: input.role_id,
            organization_id: input.organization_id,
            team_id: input.team_id,
            assigned_by: input.assigned_by,
            assigned_at: Utc::now(),
        };
        self.insert(Collection::MemberRoles, &assignment).await?;

        info!(
            "Role {} assigned to user {} in {}",
            assignment.role_id, assignment.user_id, assignment.organization_id
        );

        self.auditor
            .record(
                AuditEvent::new(ROLE_ASSIGNED, "member_role", assignment.assigned_by.as_str())
                    .with_resource_id(assignment.role_id.as_str())
                    .with_organization(Some(assignment.organization_id.as_str()))
                    .with_details(json!({
                        "assignmentId": assignment.id,
                        "userId": assignment.user_id,
                        "roleId": assignment.role_id,
                        "teamId": assignment.team_id,
                    })),
            )
            .await?;

        Ok(assignment)
    }

    /// Remove every assignment of `role_id` to `user_id` in scope and record
    /// `role.removed`. Removing an assignment that does not exist succeeds.
    pub async fn remove_role(
        &self,
        user_id: &str,
        role_id: &str,
        organization_id: Option<&str>,
        removed_by: &str,
    ) -> Result<()> {
        let filter = Filter::new()
            .eq("userId", user_id)
            .eq("roleId", role_id)
            .eq_opt("organizationId", organization_id);
        self.gateway.delete(Collection::MemberRoles, &filter).await?;

        info!("Role {} removed from user {}", role_id, user_id);

        self.auditor
            .record(
                AuditEvent::new(ROLE_REMOVED, "member_role", removed_by)
                    .with_resource_id(role_id)
                    .with_organization(organization_id)
                    .with_details(json!({"userId": user_id, "roleId": role_id})),
            )
            .await?;

        Ok(())
    }

    pub async fn get_user_roles(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Vec<MemberRole>> {
        let filter = Filter::new()
            .eq("userId", user_id)
            .eq_opt("organizationId", organization_id);
        self.fetch_all(Collection::MemberRoles, &filter, &FindOptions::default())
            .await
    }

    // Resources

    pub async fn create_resource(
        &self,
        organization_id: &str,
        resource_type: &str,
        attributes: Map<String, Value>,
    ) -> Result<Resource> {
        let resource = Resource {
            id: new_id(),
            organization_id: organization_id.to_string(),
            resource_type: resource_type.to_string(),
            attributes,
        };
        self.insert(Collection::Resources, &resource).await?;
        Ok(resource)
    }

    pub async fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        self.fetch(Collection::Resources, &by_id(id)).await
    }

    /// Set a per-resource grant, replacing any earlier grant of the same
    /// permission to the same subject
    pub async fn set_resource_permission(
        &self,
        resource_id: &str,
        subject: Subject,
        permission_id: &str,
        granted: bool,
    ) -> Result<ResourcePermission> {
        if self.get_resource(resource_id).await?.is_none() {
            return Err(AuthzError::not_found(EntityKind::Resource, resource_id));
        }

        let existing = Filter::new()
            .eq("resourceId", resource_id)
            .eq("subject", serde_json::to_value(&subject)?)
            .eq("permissionId", permission_id);
        self.gateway
            .delete(Collection::ResourcePermissions, &existing)
            .await?;

        let grant = ResourcePermission {
            id: new_id(),
            resource_id: resource_id.to_string(),
            subject,
            permission_id: permission_id.to_string(),
            granted,
        };
        self.insert(Collection::ResourcePermissions, &grant).await?;
        Ok(grant)
    }

    pub async fn list_resource_permissions(
        &self,
        resource_id: &str,
    ) -> Result<Vec<ResourcePermission>> {
        self.fetch_all(
            Collection::ResourcePermissions,
            &Filter::new().eq("resourceId", resource_id),
            &FindOptions::default(),
        )
        .await
    }

    // Policies

    pub async fn create_policy(&self, input: NewPolicy) -> Result<Policy> {
        let policy = Policy {
            id: new_id(),
            organization_id: input.organization_id,
            name: input.name,
            rules: serialize_rules(&input.rules)?,
            priority: input.priority,
            is_active: input.is_active,
        };
        self.insert(Collection::Policies, &policy).await?;
        info!(
            "Policy {} ({}) created with {} rules, priority {}",
            policy.name,
            policy.id,
            input.rules.len(),
            policy.priority
        );
        Ok(policy)
    }

    pub async fn get_policy(&self, id: &str) -> Result<Option<Policy>> {
        self.fetch(Collection::Policies, &by_id(id)).await
    }

    /// Policies of an organization, highest priority first
    pub async fn list_policies(&self, organization_id: &str) -> Result<Vec<Policy>> {
        self.fetch_all(
            Collection::Policies,
            &Filter::new().eq("organizationId", organization_id),
            &FindOptions::sorted("priority", SortDirection::Desc),
        )
        .await
    }

    pub async fn update_policy(&self, id: &str, update: PolicyUpdate) -> Result<Policy> {
        let mut patch = Record::new();
        if let Some(name) = update.name {
            patch.insert("name".to_string(), Value::String(name));
        }
        if let Some(rules) = update.rules {
            patch.insert("rules".to_string(), Value::String(serialize_rules(&rules)?));
        }
        if let Some(priority) = update.priority {
            patch.insert("priority".to_string(), Value::from(priority));
        }
        if let Some(is_active) = update.is_active {
            patch.insert("isActive".to_string(), Value::Bool(is_active));
        }

        self.patch(Collection::Policies, EntityKind::Policy, id, patch)
            .await
    }

    pub async fn set_policy_active(&self, id: &str, is_active: bool) -> Result<Policy> {
        self.update_policy(
            id,
            PolicyUpdate {
                is_active: Some(is_active),
                ..PolicyUpdate::default()
            },
        )
        .await
    }

    pub async fn delete_policy(&self, id: &str) -> Result<()> {
        self.remove(Collection::Policies, EntityKind::Policy, id).await
    }

    // Audit

    /// Stored audit entries, newest first
    pub async fn audit_logs(
        &self,
        organization_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditLog>> {
        self.auditor.query(organization_id, limit, offset).await
    }
}
