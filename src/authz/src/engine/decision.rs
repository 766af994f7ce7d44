//! Evaluation outcome types

use serde::{Deserialize, Serialize};

use crate::policy::PolicyVerdict;

/// Why an evaluation ended the way it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DecisionReason {
    /// The user holds no role in scope. Policies are not consulted.
    NoRoleAssignments,

    /// A role grant covers the request
    RoleGrant { permission: String },

    /// The user has roles but none of their grants cover the request
    NoMatchingGrant,

    /// An organization policy rule decided, overriding the role verdict
    PolicyOverride {
        policy_id: String,
        rule_index: usize,
        role_verdict: bool,
    },
}

/// Result of evaluating a [`crate::types::PermissionContext`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl EvaluationOutcome {
    pub fn no_role_assignments() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::NoRoleAssignments,
        }
    }

    /// Role based verdict. `permission` is the name of the first grant that
    /// matched, if any.
    pub fn from_roles(permission: Option<String>) -> Self {
        match permission {
            Some(permission) => Self {
                allowed: true,
                reason: DecisionReason::RoleGrant { permission },
            },
            None => Self {
                allowed: false,
                reason: DecisionReason::NoMatchingGrant,
            },
        }
    }

    pub fn from_policy(verdict: PolicyVerdict, role_verdict: bool) -> Self {
        Self {
            allowed: verdict.allowed(),
            reason: DecisionReason::PolicyOverride {
                policy_id: verdict.policy_id,
                rule_index: verdict.rule_index,
                role_verdict,
            },
        }
    }

    pub fn is_policy_override(&self) -> bool {
        matches!(self.reason, DecisionReason::PolicyOverride { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyEffect;

    #[test]
    fn test_role_outcomes() {
        let allowed = EvaluationOutcome::from_roles(Some("docs:*".to_string()));
        assert!(allowed.allowed);
        assert_eq!(
            allowed.reason,
            DecisionReason::RoleGrant {
                permission: "docs:*".to_string()
            }
        );

        let denied = EvaluationOutcome::from_roles(None);
        assert!(!denied.allowed);
        assert_eq!(denied.reason, DecisionReason::NoMatchingGrant);
    }

    #[test]
    fn test_policy_outcome_overrides() {
        let verdict = PolicyVerdict {
            policy_id: "p1".to_string(),
            rule_index: 2,
            effect: PolicyEffect::Deny,
        };
        let outcome = EvaluationOutcome::from_policy(verdict, true);

        assert!(!outcome.allowed);
        assert!(outcome.is_policy_override());
    }

    #[test]
    fn test_reason_is_tagged() {
        let value = serde_json::to_value(EvaluationOutcome::no_role_assignments()).unwrap();
        assert_eq!(value["reason"]["type"], "noRoleAssignments");
    }
}
