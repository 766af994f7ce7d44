//! Audit trail tests
//!
//! Role mutations leave entries behind; evaluation never does.

mod common;

use common::{Fixture, ADMIN, ORG};
use orgauth_authz::engine::AssignRole;
use orgauth_authz::{AuthzError, Collection, EngineConfig};
use std::collections::HashSet;

fn assignment(user_id: &str, role_id: &str) -> AssignRole {
    AssignRole {
        user_id: user_id.to_string(),
        role_id: role_id.to_string(),
        organization_id: ORG.to_string(),
        team_id: Some("team-7".to_string()),
        assigned_by: ADMIN.to_string(),
    }
}

// ============================================================================
// ROLE MUTATIONS
// ============================================================================

#[tokio::test]
async fn test_assign_role_is_audited() {
    let fx = Fixture::new(EngineConfig::default());
    let role = fx.role("editor").await;

    let assigned = fx.engine.assign_role(assignment("alice", &role.id)).await.unwrap();

    let logs = fx.engine.audit_logs(Some(ORG), 10, 0).await.unwrap();
    assert_eq!(logs.len(), 1);

    let entry = &logs[0];
    assert_eq!(entry.action, "role.assigned");
    assert_eq!(entry.user_id, ADMIN);
    assert_eq!(entry.resource_id.as_deref(), Some(role.id.as_str()));
    assert_eq!(entry.organization_id.as_deref(), Some(ORG));

    let details: serde_json::Value = serde_json::from_str(&entry.details).unwrap();
    assert_eq!(details["userId"], "alice");
    assert_eq!(details["roleId"], role.id.as_str());
    assert_eq!(details["teamId"], "team-7");
    assert_eq!(details["assignmentId"], assigned.id.as_str());
}

#[tokio::test]
async fn test_remove_role_is_audited() {
    let fx = Fixture::new(EngineConfig::default());
    let role = fx.role("editor").await;
    fx.assign("alice", &role).await;

    fx.engine
        .remove_role("alice", &role.id, Some(ORG), "admin-2")
        .await
        .unwrap();

    assert!(fx.engine.get_user_roles("alice", Some(ORG)).await.unwrap().is_empty());

    let logs = fx.engine.audit_logs(Some(ORG), 10, 0).await.unwrap();
    let actions: HashSet<&str> = logs.iter().map(|l| l.action.as_str()).collect();
    assert_eq!(actions, HashSet::from(["role.assigned", "role.removed"]));

    let removal = logs.iter().find(|l| l.action == "role.removed").unwrap();
    assert_eq!(removal.user_id, "admin-2");

    // Assignment and removal share the role id so they can be correlated
    assert!(logs
        .iter()
        .all(|l| l.resource_id.as_deref() == Some(role.id.as_str())));
}

#[tokio::test]
async fn test_delete_role_is_audited() {
    let fx = Fixture::new(EngineConfig::default());
    let role = fx.user_with("alice", "docs:read").await;

    fx.engine.delete_role(&role.id, "admin-2").await.unwrap();

    let logs = fx.engine.audit_logs(Some(ORG), 10, 0).await.unwrap();
    let deletion = logs.iter().find(|l| l.action == "role.deleted").unwrap();
    assert_eq!(deletion.user_id, "admin-2");
    assert_eq!(deletion.resource_id.as_deref(), Some(role.id.as_str()));
}

#[tokio::test]
async fn test_remove_missing_assignment_succeeds() {
    let fx = Fixture::new(EngineConfig::default());

    fx.engine
        .remove_role("ghost", "no-such-role", Some(ORG), ADMIN)
        .await
        .unwrap();

    assert_eq!(fx.gateway.len(Collection::AuditLogs).await, 1);
}

#[tokio::test]
async fn test_removed_role_no_longer_grants() {
    let fx = Fixture::new(EngineConfig::default());
    let role = fx.user_with("alice", "docs:read").await;

    assert!(fx
        .engine
        .check_permission("alice", "docs:read", Some(ORG), None)
        .await
        .unwrap());

    fx.engine
        .remove_role("alice", &role.id, Some(ORG), ADMIN)
        .await
        .unwrap();

    assert!(!fx
        .engine
        .check_permission("alice", "docs:read", Some(ORG), None)
        .await
        .unwrap());
}

// ============================================================================
// CONFIGURATION AND FAULTS
// ============================================================================

#[tokio::test]
async fn test_disabled_audit_writes_nothing() {
    let fx = Fixture::new(EngineConfig {
        enable_audit_log: false,
        ..EngineConfig::default()
    });
    let role = fx.role("editor").await;

    fx.assign("alice", &role).await;
    fx.engine
        .remove_role("alice", &role.id, Some(ORG), ADMIN)
        .await
        .unwrap();

    assert_eq!(fx.gateway.len(Collection::AuditLogs).await, 0);
}

#[tokio::test]
async fn test_audit_failure_surfaces_after_assignment_is_stored() {
    let fx = Fixture::new(EngineConfig::default());
    let role = fx.role("editor").await;
    fx.gateway.fail_collection(Collection::AuditLogs, "disk full");

    let err = fx
        .engine
        .assign_role(assignment("alice", &role.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::Gateway(_)));

    let roles = fx.engine.get_user_roles("alice", Some(ORG)).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].role_id, role.id);
}

#[tokio::test]
async fn test_audit_logs_filter_and_paginate() {
    let fx = Fixture::new(EngineConfig::default());
    let role = fx.role("editor").await;
    for user in ["u1", "u2", "u3"] {
        fx.assign(user, &role).await;
    }
    fx.engine
        .remove_role("u9", "other", Some("globex"), ADMIN)
        .await
        .unwrap();

    assert_eq!(fx.engine.audit_logs(None, 100, 0).await.unwrap().len(), 4);
    assert_eq!(fx.engine.audit_logs(Some(ORG), 100, 0).await.unwrap().len(), 3);
    assert_eq!(fx.engine.audit_logs(Some(ORG), 2, 0).await.unwrap().len(), 2);
    assert_eq!(fx.engine.audit_logs(Some(ORG), 2, 2).await.unwrap().len(), 1);
    assert_eq!(fx.engine.audit_logs(Some("globex"), 10, 0).await.unwrap().len(), 1);
}
