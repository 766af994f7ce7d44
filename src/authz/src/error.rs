//! Error types for the permission engine

use std::fmt;
use thiserror::Error;

/// Kind of entity addressed by an administrative operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Permission,
    Role,
    RolePermission,
    MemberRole,
    Resource,
    Policy,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Permission => "permission",
            EntityKind::Role => "role",
            EntityKind::RolePermission => "role permission",
            EntityKind::MemberRole => "member role",
            EntityKind::Resource => "resource",
            EntityKind::Policy => "policy",
        };
        f.write_str(name)
    }
}

/// Permission engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Update or delete addressed an entity that does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence gateway fault (connectivity, constraint violation, ...)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthzError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Result type for permission engine operations
pub type Result<T> = std::result::Result<T, AuthzError>;
