//! In-memory gateway
//!
//! Reference [`Gateway`] backend. Keeps one table per collection behind a
//! `tokio::sync::RwLock`, counts read queries per collection, and can simulate
//! an outage on a collection so callers can exercise their fault paths.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Collection, Filter, FindOptions, Gateway, Record, SortDirection};
use crate::error::{AuthzError, Result};

/// Thread-safe in-memory record store
#[derive(Clone, Default)]
pub struct InMemoryGateway {
    tables: Arc<RwLock<HashMap<Collection, Vec<Record>>>>,
    queries: Arc<DashMap<Collection, usize>>,
    outages: Arc<DashMap<Collection, String>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_one`/`find_many` calls issued against `collection`
    pub fn query_count(&self, collection: Collection) -> usize {
        self.queries.get(&collection).map(|c| *c).unwrap_or(0)
    }

    /// Total read queries across all collections
    pub fn total_queries(&self) -> usize {
        self.queries.iter().map(|entry| *entry.value()).sum()
    }

    pub fn reset_query_counts(&self) {
        self.queries.clear();
    }

    /// Make every operation on `collection` fail with `message`
    pub fn fail_collection(&self, collection: Collection, message: impl Into<String>) {
        self.outages.insert(collection, message.into());
    }

    pub fn restore_collection(&self, collection: Collection) {
        self.outages.remove(&collection);
    }

    /// Number of records stored in `collection`
    pub async fn len(&self, collection: Collection) -> usize {
        let tables = self.tables.read().await;
        tables.get(&collection).map_or(0, Vec::len)
    }

    fn check_available(&self, collection: Collection) -> Result<()> {
        match self.outages.get(&collection) {
            Some(message) => Err(AuthzError::Gateway(format!(
                "{}: {}",
                collection,
                message.value()
            ))),
            None => Ok(()),
        }
    }

    fn count_query(&self, collection: Collection) {
        *self.queries.entry(collection).or_insert(0) += 1;
    }
}

/// Ordering used for sort-by-field. Missing fields sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn create(&self, collection: Collection, record: Record) -> Result<Record> {
        self.check_available(collection)?;

        let mut tables = self.tables.write().await;
        tables.entry(collection).or_default().push(record.clone());
        Ok(record)
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>> {
        self.check_available(collection)?;
        self.count_query(collection);

        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|rows| rows.iter().find(|row| filter.matches(row)).cloned()))
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Record>> {
        self.check_available(collection)?;
        self.count_query(collection);

        let tables = self.tables.read().await;
        let mut rows: Vec<Record> = tables
            .get(&collection)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some(sort) = &options.sort {
            // Stable sort keeps insertion order among equal keys
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let offset = options.offset.unwrap_or(0);
        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<Option<Record>> {
        self.check_available(collection)?;

        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|row| filter.matches(row)))
        else {
            return Ok(None);
        };

        for (key, value) in patch {
            row.insert(key, value);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<()> {
        self.check_available(collection)?;

        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&collection) {
            rows.retain(|row| !filter.matches(row));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SortDirection;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn seeded() -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        for (id, priority) in [("p1", 10), ("p2", 50), ("p3", 30)] {
            gateway
                .create(
                    Collection::Policies,
                    record(json!({"id": id, "organizationId": "org-1", "priority": priority})),
                )
                .await
                .unwrap();
        }
        gateway
    }

    #[tokio::test]
    async fn test_find_many_sorts_and_pages() {
        let gateway = seeded().await;

        let rows = gateway
            .find_many(
                Collection::Policies,
                &Filter::new().eq("organizationId", "org-1"),
                &FindOptions::sorted("priority", SortDirection::Desc),
            )
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("p2"), json!("p3"), json!("p1")]);

        let rows = gateway
            .find_many(
                Collection::Policies,
                &Filter::new(),
                &FindOptions::sorted("priority", SortDirection::Asc)
                    .with_offset(1)
                    .with_limit(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("p3"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let gateway = seeded().await;

        let updated = gateway
            .update(
                Collection::Policies,
                &Filter::new().eq("id", "p1"),
                record(json!({"priority": 99})),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["priority"], json!(99));
        assert_eq!(updated["organizationId"], json!("org-1"));

        let missing = gateway
            .update(
                Collection::Policies,
                &Filter::new().eq("id", "nope"),
                record(json!({"priority": 1})),
            )
            .await
            .unwrap();
        assert!(missing.is_none());

        gateway
            .delete(Collection::Policies, &Filter::new().eq("id", "p1"))
            .await
            .unwrap();
        gateway
            .delete(Collection::Policies, &Filter::new().eq("id", "p1"))
            .await
            .unwrap();
        assert_eq!(gateway.len(Collection::Policies).await, 2);
    }

    #[tokio::test]
    async fn test_query_counts_and_outages() {
        let gateway = seeded().await;

        gateway
            .find_one(Collection::Policies, &Filter::new().eq("id", "p2"))
            .await
            .unwrap();
        gateway
            .find_many(Collection::Roles, &Filter::new(), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(gateway.query_count(Collection::Policies), 1);
        assert_eq!(gateway.query_count(Collection::Roles), 1);
        assert_eq!(gateway.total_queries(), 2);

        gateway.fail_collection(Collection::Roles, "connection refused");
        let err = gateway
            .find_many(Collection::Roles, &Filter::new(), &FindOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Gateway(msg) if msg.contains("connection refused")));

        gateway.restore_collection(Collection::Roles);
        assert!(gateway
            .find_many(Collection::Roles, &Filter::new(), &FindOptions::default())
            .await
            .is_ok());
    }
}
