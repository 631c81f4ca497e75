use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::db::{RecordStore, Table, columns};
use crate::error::StoreError;

/// Postgres SQLSTATE for a foreign key violation.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Clone, Copy)]
struct ForeignKey {
    table: Table,
    column: &'static str,
    references: Table,
}

/// In-process row store with the same observable behavior as the hosted one:
/// generated `id` / `created_at`, foreign key checks, filter by equality.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<Table, Vec<Value>>,
    foreign_keys: Vec<ForeignKey>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with `Listings.search_id -> Busquedas.id`.
    pub fn with_schema() -> Self {
        Self::new().with_foreign_key(Table::Listings, columns::SEARCH_ID, Table::Searches)
    }

    pub fn with_foreign_key(
        mut self,
        table: Table,
        column: &'static str,
        references: Table,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            table,
            column,
            references,
        });
        self
    }

    /// While offline every call fails as if the datastore were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.tables.get(&table).map(|rows| rows.len()).unwrap_or(0)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("datastore is unreachable"));
        }
        Ok(())
    }

    fn contains(&self, table: Table, column: &str, value: &str) -> bool {
        self.tables
            .get(&table)
            .map(|rows| rows.iter().any(|row| column_matches(row, column, value)))
            .unwrap_or(false)
    }

    fn check_foreign_keys(&self, table: Table, row: &Value) -> Result<(), StoreError> {
        for fk in self.foreign_keys.iter().filter(|fk| fk.table == table) {
            let satisfied = match row.get(fk.column) {
                Some(Value::String(parent)) => self.contains(fk.references, columns::ID, parent),
                _ => false,
            };
            if !satisfied {
                return Err(StoreError::Rejected {
                    status: 409,
                    code: Some(FOREIGN_KEY_VIOLATION.to_string()),
                    message: format!(
                        "insert or update on table \"{}\" violates foreign key constraint \"{}_{}_fkey\"",
                        table, table, fk.column
                    ),
                });
            }
        }
        Ok(())
    }
}

fn column_matches(row: &Value, column: &str, value: &str) -> bool {
    match row.get(column) {
        Some(Value::String(s)) => s == value,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == value,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: Table, row: Value) -> Result<Vec<Value>, StoreError> {
        self.ensure_online()?;

        let Value::Object(mut fields) = row else {
            return Err(StoreError::Rejected {
                status: 400,
                code: Some("PGRST102".to_string()),
                message: "row must be a JSON object".to_string(),
            });
        };

        fields.insert(
            columns::ID.to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );
        fields.insert(
            columns::CREATED_AT.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        let row = Value::Object(fields);

        self.check_foreign_keys(table, &row)?;

        self.tables.entry(table).or_default().push(row.clone());
        tracing::debug!("Inserted row into {}", table);
        Ok(vec![row])
    }

    async fn select_eq(
        &self,
        table: Table,
        column: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.ensure_online()?;

        Ok(self
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| column_matches(row, column, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
