//! Permission matching
//!
//! Permission names and requested actions are colon separated (`docs:read`,
//! `billing:invoice:void`). Matching is per segment: equal text or a `*` in the
//! permission. No substring or regex semantics.

use chrono::NaiveDateTime;

use crate::conditions::ConditionEvaluator;
use crate::types::{Permission, PermissionContext, RolePermission};

/// Wildcard segment
pub const WILDCARD: &str = "*";

/// Whether `pattern` (a permission name) covers `action`
pub fn action_matches(pattern: &str, action: &str) -> bool {
    let pattern: Vec<&str> = pattern.split(':').collect();
    let action: Vec<&str> = action.split(':').collect();

    if pattern.len() != action.len() {
        return false;
    }

    pattern
        .iter()
        .zip(action.iter())
        .all(|(p, a)| *p == WILDCARD || p == a)
}

/// Decides whether a single grant satisfies a request
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionMatcher {
    conditions: ConditionEvaluator,
}

impl PermissionMatcher {
    pub fn new(conditions: ConditionEvaluator) -> Self {
        Self { conditions }
    }

    pub fn condition_evaluator(&self) -> &ConditionEvaluator {
        &self.conditions
    }

    /// Match against the local wall clock
    pub fn matches(
        &self,
        permission: &Permission,
        grant: &RolePermission,
        context: &PermissionContext,
    ) -> bool {
        if !action_matches(&permission.name, &context.action) {
            return false;
        }

        match &grant.conditions {
            Some(raw) => grant.granted && self.conditions.evaluate(raw, context),
            None => grant.granted,
        }
    }

    /// Match with an explicit current time for time dependent restrictions
    pub fn matches_at(
        &self,
        permission: &Permission,
        grant: &RolePermission,
        context: &PermissionContext,
        now: NaiveDateTime,
    ) -> bool {
        if !action_matches(&permission.name, &context.action) {
            return false;
        }

        match &grant.conditions {
            Some(raw) => grant.granted && self.conditions.evaluate_at(raw, context, now),
            None => grant.granted,
        }
    }
}
