//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use orgauth_authz::engine::{AssignRole, NewPolicy, NewRole};
use orgauth_authz::{
    EngineConfig, InMemoryGateway, Permission, PermissionEngine, Policy, PolicyRule, Role,
};
use serde_json::Value;
use std::sync::{Arc, Once};

pub const ORG: &str = "acme";
pub const ADMIN: &str = "admin-1";

static TRACING: Once = Once::new();

/// Route engine logs through the test writer. Set `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Engine plus direct access to its gateway
pub struct Fixture {
    pub gateway: Arc<InMemoryGateway>,
    pub engine: PermissionEngine,
}

impl Fixture {
    pub fn new(config: EngineConfig) -> Self {
        init_tracing();
        let gateway = Arc::new(InMemoryGateway::new());
        let engine = PermissionEngine::new(config, gateway.clone());
        Self { gateway, engine }
    }

    pub fn with_policies() -> Self {
        Self::new(EngineConfig {
            enable_policy_engine: true,
            ..EngineConfig::default()
        })
    }

    pub async fn role(&self, name: &str) -> Role {
        self.engine
            .create_role(NewRole {
                name: name.to_string(),
                organization_id: ORG.to_string(),
                level: 0,
                description: None,
            })
            .await
            .unwrap()
    }

    pub async fn permission(&self, name: &str) -> Permission {
        self.engine.create_permission(name, None).await.unwrap()
    }

    /// Grant `permission_name` to `role`, creating the permission
    pub async fn grant(
        &self,
        role: &Role,
        permission_name: &str,
        granted: bool,
        conditions: Option<Value>,
    ) -> Permission {
        let permission = self.permission(permission_name).await;
        self.engine
            .grant_permission(&role.id, &permission.id, granted, conditions)
            .await
            .unwrap();
        permission
    }

    pub async fn assign(&self, user_id: &str, role: &Role) {
        self.engine
            .assign_role(AssignRole {
                user_id: user_id.to_string(),
                role_id: role.id.clone(),
                organization_id: role.organization_id.clone(),
                team_id: None,
                assigned_by: ADMIN.to_string(),
            })
            .await
            .unwrap();
    }

    /// Create a user holding a fresh role with one unconditional grant
    pub async fn user_with(&self, user_id: &str, permission_name: &str) -> Role {
        let role = self.role(&format!("{}-role", user_id)).await;
        self.grant(&role, permission_name, true, None).await;
        self.assign(user_id, &role).await;
        role
    }

    pub async fn policy(&self, name: &str, priority: i32, rules: Vec<PolicyRule>) -> Policy {
        self.engine
            .create_policy(NewPolicy {
                organization_id: ORG.to_string(),
                name: name.to_string(),
                rules,
                priority,
                is_active: true,
            })
            .await
            .unwrap()
    }
}
