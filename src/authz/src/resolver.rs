//! Bulk grant resolution
//!
//! Collects everything needed to evaluate a user's role grants:
//!
//! ```text
//! member_roles (1 query) ──► role_permissions (1 per role, concurrent)
//!                                   │
//!                                   ▼
//!                      permissions (1 per distinct id, concurrent)
//! ```
//!
//! The gateway only offers equality filters, so a single `IN` query is not
//! available. Requests are fanned out and awaited together instead.

use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::gateway::{from_record, from_records, Collection, Filter, FindOptions, Gateway};
use crate::types::{MemberRole, Permission, PermissionId, RolePermission};

/// A user's effective grants and the permission definitions they reference
#[derive(Debug, Clone, Default)]
pub struct ResolvedGrants {
    pub assignments: Vec<MemberRole>,
    pub grants: Vec<RolePermission>,
    pub permissions: HashMap<PermissionId, Permission>,
}

impl ResolvedGrants {
    /// Whether the user holds any role in scope
    pub fn has_assignments(&self) -> bool {
        !self.assignments.is_empty()
    }

    /// Grants paired with their permission definition. Grants whose
    /// definition could not be resolved are left out.
    pub fn resolved(&self) -> impl Iterator<Item = (&Permission, &RolePermission)> {
        self.grants.iter().filter_map(|grant| {
            self.permissions
                .get(&grant.permission_id)
                .map(|permission| (permission, grant))
        })
    }
}

/// Fetches role assignments, grants and permission definitions
#[derive(Clone)]
pub struct GrantResolver {
    gateway: Arc<dyn Gateway>,
}

impl GrantResolver {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Resolve `user_id`'s grants, optionally scoped to one organization.
    /// Any gateway failure propagates.
    pub async fn resolve_grants(
        &self,
        user_id: &str,
        organization_id: Option<&str>,
    ) -> Result<ResolvedGrants> {
        let filter = Filter::new()
            .eq("userId", user_id)
            .eq_opt("organizationId", organization_id);
        let assignments: Vec<MemberRole> = from_records(
            self.gateway
                .find_many(Collection::MemberRoles, &filter, &FindOptions::default())
                .await?,
        )?;

        if assignments.is_empty() {
            debug!("User {} has no role assignments", user_id);
            return Ok(ResolvedGrants::default());
        }

        let grants = self.fetch_grants(&assignments).await?;
        let permissions = self.fetch_permissions(&grants).await?;

        debug!(
            "Resolved {} assignments, {} grants, {} permissions for user {}",
            assignments.len(),
            grants.len(),
            permissions.len(),
            user_id
        );

        Ok(ResolvedGrants {
            assignments,
            grants,
            permissions,
        })
    }

    /// One request per distinct role, awaited together
    async fn fetch_grants(&self, assignments: &[MemberRole]) -> Result<Vec<RolePermission>> {
        let mut seen = HashSet::new();
        let role_ids: Vec<&str> = assignments
            .iter()
            .map(|a| a.role_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();

        let requests = role_ids.into_iter().map(|role_id| async move {
            let filter = Filter::new().eq("roleId", role_id);
            let records = self
                .gateway
                .find_many(Collection::RolePermissions, &filter, &FindOptions::default())
                .await?;
            from_records::<RolePermission>(records)
        });

        let per_role = try_join_all(requests).await?;
        Ok(per_role.into_iter().flatten().collect())
    }

    /// One request per distinct permission id, awaited together. Ids with no
    /// stored definition are dropped.
    async fn fetch_permissions(
        &self,
        grants: &[RolePermission],
    ) -> Result<HashMap<PermissionId, Permission>> {
        let mut seen = HashSet::new();
        let ids: Vec<&str> = grants
            .iter()
            .map(|g| g.permission_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();

        let requested = ids.len();

        let requests = ids.into_iter().map(|id| async move {
            let record = self
                .gateway
                .find_one(Collection::Permissions, &Filter::new().eq("id", id))
                .await?;
            record.map(from_record::<Permission>).transpose()
        });

        let permissions: HashMap<PermissionId, Permission> = try_join_all(requests)
            .await?
            .into_iter()
            .flatten()
            .map(|p| (p.id.clone(), p))
            .collect();

        if permissions.len() < requested {
            debug!(
                "{} permission(s) referenced by grants do not exist",
                requested - permissions.len()
            );
        }

        Ok(permissions)
    }
}
