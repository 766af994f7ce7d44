//! In-process evaluation counters

use std::sync::Arc;
use tokio::sync::RwLock;

use super::decision::{DecisionReason, EvaluationOutcome};

/// Snapshot of evaluation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    /// Completed evaluations
    pub evaluations: u64,

    pub allowed: u64,
    pub denied: u64,

    /// Denials caused by the user holding no role in scope
    pub no_role_denials: u64,

    /// Decisions taken by a policy rule
    pub policy_overrides: u64,

    /// Evaluations aborted by a gateway fault
    pub errors: u64,
}

impl EngineMetrics {
    /// Share of completed evaluations that were allowed
    pub fn allow_rate(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.allowed as f64 / self.evaluations as f64
        }
    }
}

/// Shared counter store
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_outcome(&self, outcome: &EvaluationOutcome) {
        let mut metrics = self.metrics.write().await;
        metrics.evaluations += 1;

        if outcome.allowed {
            metrics.allowed += 1;
        } else {
            metrics.denied += 1;
        }

        match outcome.reason {
            DecisionReason::NoRoleAssignments => metrics.no_role_denials += 1,
            DecisionReason::PolicyOverride { .. } => metrics.policy_overrides += 1,
            _ => {}
        }
    }

    pub async fn record_error(&self) {
        self.metrics.write().await.errors += 1;
    }

    pub async fn snapshot(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn reset(&self) {
        *self.metrics.write().await = EngineMetrics::default();
    }
}
