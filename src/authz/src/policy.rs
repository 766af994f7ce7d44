//! Organization policies and rule resolution
//!
//! A policy stores an ordered rule list as serialized JSON:
//!
//! ```json
//! [
//!   {"resource": "docs", "action": "docs:delete", "effect": "deny"},
//!   {"resource": "docs", "effect": "allow"}
//! ]
//! ```
//!
//! Policies are scanned in descending priority and rules in stored order. The
//! first matching rule anywhere in that scan decides. When nothing matches the
//! resolver returns no decision so the caller can fall back to role grants.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{Policy, PolicyId, PermissionContext};

/// Rule effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

impl PolicyEffect {
    pub fn is_allow(self) -> bool {
        self == PolicyEffect::Allow
    }
}

/// Rule condition. No expression language is evaluated; any condition
/// present on a rule is carried as `Unsupported` and treated as satisfied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<Value>", into = "Option<Value>")]
pub enum RuleCondition {
    #[default]
    None,
    Unsupported(Value),
}

impl From<Option<Value>> for RuleCondition {
    fn from(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => RuleCondition::None,
            Some(raw) => RuleCondition::Unsupported(raw),
        }
    }
}

impl From<RuleCondition> for Option<Value> {
    fn from(condition: RuleCondition) -> Self {
        match condition {
            RuleCondition::None => None,
            RuleCondition::Unsupported(raw) => Some(raw),
        }
    }
}

/// One entry of a policy's rule list. Unset `resource`/`action` match anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub effect: PolicyEffect,
    #[serde(default, skip_serializing_if = "RuleCondition::is_none")]
    pub condition: RuleCondition,
}

impl RuleCondition {
    pub fn is_none(&self) -> bool {
        matches!(self, RuleCondition::None)
    }
}

impl PolicyRule {
    pub fn allow() -> Self {
        Self {
            resource: None,
            action: None,
            effect: PolicyEffect::Allow,
            condition: RuleCondition::None,
        }
    }

    pub fn deny() -> Self {
        Self {
            effect: PolicyEffect::Deny,
            ..Self::allow()
        }
    }

    pub fn on_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn on_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = RuleCondition::from(Some(condition));
        self
    }

    /// Whether this rule applies to the request
    pub fn matches(&self, context: &PermissionContext) -> bool {
        let resource_ok = self
            .resource
            .as_deref()
            .map_or(true, |resource| resource == context.resource_type);
        let action_ok = self
            .action
            .as_deref()
            .map_or(true, |action| action == context.action);

        if !(resource_ok && action_ok) {
            return false;
        }

        match &self.condition {
            RuleCondition::None => true,
            RuleCondition::Unsupported(raw) => {
                debug!("Rule condition {} is not evaluated, passing through", raw);
                true
            }
        }
    }
}

/// Parse a serialized rule list
pub fn parse_rules(raw: &str) -> serde_json::Result<Vec<PolicyRule>> {
    serde_json::from_str(raw)
}

/// Serialize a rule list for storage
pub fn serialize_rules(rules: &[PolicyRule]) -> serde_json::Result<String> {
    serde_json::to_string(rules)
}

/// Decisive outcome of policy resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub policy_id: PolicyId,
    /// Position of the matching rule within its policy
    pub rule_index: usize,
    pub effect: PolicyEffect,
}

impl PolicyVerdict {
    pub fn allowed(&self) -> bool {
        self.effect.is_allow()
    }
}

/// First-match-wins resolver over prioritized policies
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyResolver;

impl PolicyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `policies`, which must already be in descending priority order.
    /// A policy whose rules do not parse is skipped.
    pub fn resolve(&self, policies: &[Policy], context: &PermissionContext) -> Option<PolicyVerdict> {
        for policy in policies {
            let rules = match parse_rules(&policy.rules) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!("Skipping policy {} with malformed rules: {}", policy.id, e);
                    continue;
                }
            };

            debug!(
                "Evaluating policy: {} (priority={}, rules={})",
                policy.id,
                policy.priority,
                rules.len()
            );

            if let Some(rule_index) = rules.iter().position(|rule| rule.matches(context)) {
                return Some(PolicyVerdict {
                    policy_id: policy.id.clone(),
                    rule_index,
                    effect: rules[rule_index].effect,
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(id: &str, priority: i32, rules: &str) -> Policy {
        Policy {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            name: id.to_string(),
            rules: rules.to_string(),
            priority,
            is_active: true,
        }
    }

    fn ctx(action: &str) -> PermissionContext {
        PermissionContext::for_permission("user-1", action).with_organization("org-1")
    }

    #[test]
    fn test_rule_matching() {
        let context = ctx("docs:delete");

        assert!(PolicyRule::allow().matches(&context));
        assert!(PolicyRule::deny().on_resource("docs").matches(&context));
        assert!(PolicyRule::deny().on_action("docs:delete").matches(&context));
        assert!(!PolicyRule::deny().on_resource("billing").matches(&context));
        assert!(!PolicyRule::deny().on_resource("docs").on_action("docs:read").matches(&context));
    }

    #[test]
    fn test_rule_condition_passes_through() {
        let rule = PolicyRule::deny().with_condition(json!("request.time > 17"));
        assert!(matches!(rule.condition, RuleCondition::Unsupported(_)));
        assert!(rule.matches(&ctx("docs:read")));
    }

    #[test]
    fn test_rule_wire_format() {
        let rules = parse_rules(
            r#"[{"resource": "docs", "effect": "deny", "condition": {"expr": "x"}},
                {"effect": "allow", "condition": null}]"#,
        )
        .unwrap();

        assert_eq!(rules[0].resource.as_deref(), Some("docs"));
        assert_eq!(rules[0].condition, RuleCondition::Unsupported(json!({"expr": "x"})));
        assert_eq!(rules[1].condition, RuleCondition::None);

        let encoded = serialize_rules(&[PolicyRule::allow().on_action("docs:read")]).unwrap();
        assert_eq!(encoded, r#"[{"action":"docs:read","effect":"allow"}]"#);
    }

    #[test]
    fn test_unknown_effect_is_malformed() {
        assert!(parse_rules(r#"[{"effect": "maybe"}]"#).is_err());
    }

    #[test]
    fn test_first_match_in_stored_order() {
        let resolver = PolicyResolver::new();
        let policies = vec![policy(
            "p1",
            10,
            r#"[{"resource": "docs", "effect": "deny"}, {"resource": "docs", "effect": "allow"}]"#,
        )];

        let verdict = resolver.resolve(&policies, &ctx("docs:read")).unwrap();
        assert_eq!(verdict.effect, PolicyEffect::Deny);
        assert_eq!(verdict.rule_index, 0);
    }

    #[test]
    fn test_first_policy_with_match_wins() {
        let resolver = PolicyResolver::new();
        let policies = vec![
            policy("high", 100, r#"[{"resource": "billing", "effect": "deny"}]"#),
            policy("mid", 50, r#"[{"resource": "docs", "effect": "allow"}]"#),
            policy("low", 10, r#"[{"effect": "deny"}]"#),
        ];

        let verdict = resolver.resolve(&policies, &ctx("docs:read")).unwrap();
        assert_eq!(verdict.policy_id, "mid");
        assert!(verdict.allowed());
    }

    #[test]
    fn test_malformed_policy_is_skipped() {
        let resolver = PolicyResolver::new();
        let policies = vec![
            policy("broken", 100, "{not a list"),
            policy("ok", 10, r#"[{"effect": "deny"}]"#),
        ];

        let verdict = resolver.resolve(&policies, &ctx("docs:read")).unwrap();
        assert_eq!(verdict.policy_id, "ok");
    }

    #[test]
    fn test_no_match_is_no_decision() {
        let resolver = PolicyResolver::new();
        let policies = vec![policy("p1", 10, r#"[{"resource": "billing", "effect": "deny"}]"#)];

        assert!(resolver.resolve(&policies, &ctx("docs:read")).is_none());
        assert!(resolver.resolve(&[], &ctx("docs:read")).is_none());
    }
}
