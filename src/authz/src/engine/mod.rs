//! Permission evaluation engine
//!
//! Combines role grants with optional organization policies.
//!
//! # Pipeline
//!
//! ```text
//! PermissionContext
//!      │
//!      ▼
//! GrantResolver ── no assignments ──► deny (policies not consulted)
//!      │
//!      ▼
//! PermissionMatcher (any grant) ──► role verdict
//!      │
//!      ▼  policy engine enabled + organization scope
//! PolicyResolver ── verdict ──► overrides role verdict
//!      │
//!      └── no decision ──► role verdict
//! ```
//!
//! Evaluation reads only. Writes happen through the administrative operations
//! in [`admin`], which also feed the [`AuditRecorder`].

pub mod admin;
pub mod audit;
pub mod decision;
pub mod metrics;

pub use admin::{AssignRole, NewPolicy, NewRole, PolicyUpdate, RoleUpdate};
pub use audit::{AuditEvent, AuditRecorder};
pub use decision::{DecisionReason, EvaluationOutcome};
pub use metrics::{EngineMetrics, MetricsCollector};

use std::sync::Arc;
use tracing::{debug, info};

use crate::conditions::ConditionEvaluator;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::gateway::{from_records, Collection, Filter, FindOptions, Gateway, SortDirection};
use crate::matcher::PermissionMatcher;
use crate::policy::PolicyResolver;
use crate::resolver::{GrantResolver, ResolvedGrants};
use crate::types::{Policy, PermissionContext};

/// Top-level permission engine
pub struct PermissionEngine {
    gateway: Arc<dyn Gateway>,
    grant_resolver: GrantResolver,
    matcher: PermissionMatcher,
    policy_resolver: PolicyResolver,
    auditor: AuditRecorder,
    metrics: Option<MetricsCollector>,
    config: EngineConfig,
}

impl PermissionEngine {
    /// Create an engine with the default collaborators for `config`
    pub fn new(config: EngineConfig, gateway: Arc<dyn Gateway>) -> Self {
        let matcher =
            PermissionMatcher::new(ConditionEvaluator::with_missing_ip_policy(config.missing_ip_policy()));

        Self::from_parts(
            config.clone(),
            gateway.clone(),
            GrantResolver::new(gateway.clone()),
            matcher,
            PolicyResolver::new(),
            AuditRecorder::new(gateway, config.enable_audit_log),
        )
    }

    /// Create an engine from explicitly supplied collaborators
    pub fn from_parts(
        config: EngineConfig,
        gateway: Arc<dyn Gateway>,
        grant_resolver: GrantResolver,
        matcher: PermissionMatcher,
        policy_resolver: PolicyResolver,
        auditor: AuditRecorder,
    ) -> Self {
        let metrics = config.enable_metrics.then(MetricsCollector::new);

        info!(
            "PermissionEngine initialized with audit={}, policies={}, metrics={}, cache_ttl={:?}",
            auditor.is_enabled(),
            config.enable_policy_engine,
            config.enable_metrics,
            config.cache_ttl()
        );

        Self {
            gateway,
            grant_resolver,
            matcher,
            policy_resolver,
            auditor,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn auditor(&self) -> &AuditRecorder {
        &self.auditor
    }

    /// Decide whether the request is allowed. "No access" is `Ok(false)`;
    /// only gateway faults produce an error.
    pub async fn evaluate(&self, context: &PermissionContext) -> Result<bool> {
        Ok(self.evaluate_detailed(context).await?.allowed)
    }

    /// Decide and report why
    pub async fn evaluate_detailed(&self, context: &PermissionContext) -> Result<EvaluationOutcome> {
        match self.decide(context).await {
            Ok(outcome) => {
                debug!(
                    "Decision for user={} action={} org={:?}: {} ({:?})",
                    context.user_id,
                    context.action,
                    context.organization_id,
                    if outcome.allowed { "ALLOW" } else { "DENY" },
                    outcome.reason
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_outcome(&outcome).await;
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_error().await;
                }
                Err(e)
            }
        }
    }

    /// Check a single permission name. Without an explicit context one is
    /// synthesized from the name (see [`PermissionContext::for_permission`]).
    pub async fn check_permission(
        &self,
        user_id: &str,
        permission_name: &str,
        organization_id: Option<&str>,
        context: Option<PermissionContext>,
    ) -> Result<bool> {
        let context = match context {
            Some(context) => context,
            None => {
                let mut context = PermissionContext::for_permission(user_id, permission_name);
                context.organization_id = organization_id.map(str::to_string);
                context
            }
        };

        self.evaluate(&context).await
    }

    /// Evaluation counters, when metrics are enabled
    pub async fn metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.snapshot().await),
            None => None,
        }
    }

    async fn decide(&self, context: &PermissionContext) -> Result<EvaluationOutcome> {
        let resolved = self
            .grant_resolver
            .resolve_grants(&context.user_id, context.organization_id.as_deref())
            .await?;

        if !resolved.has_assignments() {
            return Ok(EvaluationOutcome::no_role_assignments());
        }

        let role_outcome = EvaluationOutcome::from_roles(self.matching_permission(&resolved, context));

        if !self.config.enable_policy_engine {
            return Ok(role_outcome);
        }
        let Some(organization_id) = context.organization_id.as_deref() else {
            return Ok(role_outcome);
        };

        let policies = self.active_policies(organization_id).await?;
        match self.policy_resolver.resolve(&policies, context) {
            Some(verdict) => Ok(EvaluationOutcome::from_policy(verdict, role_outcome.allowed)),
            None => Ok(role_outcome),
        }
    }

    /// Name of the first grant that satisfies the request
    fn matching_permission(
        &self,
        resolved: &ResolvedGrants,
        context: &PermissionContext,
    ) -> Option<String> {
        resolved
            .resolved()
            .find(|(permission, grant)| self.matcher.matches(permission, grant, context))
            .map(|(permission, _)| permission.name.clone())
    }

    /// Active policies of an organization, highest priority first
    async fn active_policies(&self, organization_id: &str) -> Result<Vec<Policy>> {
        let filter = Filter::new()
            .eq("organizationId", organization_id)
            .eq("isActive", true);
        let options = FindOptions::sorted("priority", SortDirection::Desc);

        from_records(
            self.gateway
                .find_many(Collection::Policies, &filter, &options)
                .await?,
        )
    }
}
