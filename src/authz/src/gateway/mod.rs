//! Persistence gateway boundary
//!
//! The engine never talks to storage directly. Everything it reads or writes
//! goes through a [`Gateway`]: a small record store over named collections with
//! conjunctive equality filters, limit/offset and single-field sorting. There
//! is no `IN`, disjunction or range operator, which is why the grant resolver
//! fans out one request per key instead of batching.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{AuthzError, Result};

pub mod memory;

pub use memory::InMemoryGateway;

/// Stored record: a JSON object
pub type Record = Map<String, Value>;

/// Named record collections used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Permissions,
    Roles,
    RolePermissions,
    MemberRoles,
    Resources,
    ResourcePermissions,
    Policies,
    AuditLogs,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Permissions => "permissions",
            Collection::Roles => "roles",
            Collection::RolePermissions => "role_permissions",
            Collection::MemberRoles => "member_roles",
            Collection::Resources => "resources",
            Collection::ResourcePermissions => "resource_permissions",
            Collection::Policies => "policies",
            Collection::AuditLogs => "audit_logs",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunction of `field == value` predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((field.into(), value.into()));
        self
    }

    /// Add an equality predicate only when `value` is present
    pub fn eq_opt(self, field: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    /// Whether `record` satisfies every predicate. An empty filter matches all.
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Paging and ordering for [`Gateway::find_many`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<SortBy>,
}

impl FindOptions {
    pub fn sorted(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort: Some(SortBy {
                field: field.into(),
                direction,
            }),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Record store consumed by the engine
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Insert a record and return it as stored
    async fn create(&self, collection: Collection, record: Record) -> Result<Record>;

    /// First record matching the filter
    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>>;

    /// All records matching the filter, ordered and paged per `options`
    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Record>>;

    /// Merge `patch` into the first matching record. `None` when nothing matched.
    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<Option<Record>>;

    /// Remove every matching record. Removing nothing is not an error.
    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<()>;
}

/// Encode a typed entity as a gateway record
pub fn to_record<T: Serialize>(entity: &T) -> Result<Record> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        other => Err(AuthzError::InvalidInput(format!(
            "entity must encode as an object, got {}",
            other
        ))),
    }
}

/// Decode a gateway record into a typed entity
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Decode every record of a result set
pub fn from_records<T: DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>> {
    records.into_iter().map(from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_filter_matches_all_predicates() {
        let rec = record(json!({"userId": "u1", "organizationId": "o1", "level": 3}));

        assert!(Filter::new().matches(&rec));
        assert!(Filter::new().eq("userId", "u1").matches(&rec));
        assert!(Filter::new().eq("userId", "u1").eq("level", 3).matches(&rec));
        assert!(!Filter::new().eq("userId", "u1").eq("organizationId", "o2").matches(&rec));
        assert!(!Filter::new().eq("teamId", "t1").matches(&rec));
    }

    #[test]
    fn test_filter_eq_opt() {
        let filter = Filter::new().eq("userId", "u1").eq_opt("organizationId", None::<&str>);
        assert_eq!(filter.predicates().len(), 1);

        let filter = Filter::new().eq_opt("organizationId", Some("o1"));
        assert_eq!(filter.predicates()[0].1, json!("o1"));
    }

    #[test]
    fn test_to_record_rejects_non_objects() {
        assert!(to_record(&"just a string").is_err());
        assert!(to_record(&json!({"a": 1})).is_ok());
    }
}
