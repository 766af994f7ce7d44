//! # Organization Permission Engine
//!
//! Decides whether a user may perform an action on a resource type within an
//! organization. Role grants (with wildcard permission names and contextual
//! restrictions) produce a verdict; active organization policies may then
//! override it.
//!
//! ## Features
//!
//! - **Wildcard permissions** (`docs:*`, `*:read`) matched per segment
//! - **Conditional grants** restricted by time window, weekday, IP allowlist and MFA
//! - **Prioritized policies** with first-match-wins rule lists
//! - **Concurrent grant resolution** over an equality-only persistence gateway
//! - **Audited role mutations**
//!
//! ## Example
//!
//! ```rust
//! use orgauth_authz::{EngineConfig, InMemoryGateway, PermissionContext, PermissionEngine};
//! use orgauth_authz::engine::{AssignRole, NewRole};
//! use std::sync::Arc;
//!
//! # async fn example() -> orgauth_authz::Result<()> {
//! let engine = PermissionEngine::new(EngineConfig::default(), Arc::new(InMemoryGateway::new()));
//!
//! let role = engine
//!     .create_role(NewRole {
//!         name: "editor".to_string(),
//!         organization_id: "acme".to_string(),
//!         level: 1,
//!         description: None,
//!     })
//!     .await?;
//! let permission = engine.create_permission("docs:*", None).await?;
//! engine.grant_permission(&role.id, &permission.id, true, None).await?;
//! engine
//!     .assign_role(AssignRole {
//!         user_id: "alice".to_string(),
//!         role_id: role.id.clone(),
//!         organization_id: "acme".to_string(),
//!         team_id: None,
//!         assigned_by: "admin".to_string(),
//!     })
//!     .await?;
//!
//! let context = PermissionContext::new("alice", "docs:delete", "docs").with_organization("acme");
//! assert!(engine.evaluate(&context).await?);
//! # Ok(())
//! # }
//! ```

pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod matcher;
pub mod policy;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use conditions::{ConditionEvaluator, GrantConditions, MissingIpPolicy};
pub use config::EngineConfig;
pub use engine::{DecisionReason, EvaluationOutcome, PermissionEngine};
pub use error::{AuthzError, EntityKind, Result};
pub use gateway::{Collection, Filter, FindOptions, Gateway, InMemoryGateway};
pub use matcher::{action_matches, PermissionMatcher};
pub use policy::{PolicyEffect, PolicyResolver, PolicyRule, PolicyVerdict, RuleCondition};
pub use resolver::{GrantResolver, ResolvedGrants};
pub use types::{
    AuditLog, MemberRole, Permission, PermissionContext, Policy, RequestConditions, Resource,
    ResourcePermission, Role, RolePermission, Subject,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
