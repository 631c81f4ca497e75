use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SupabaseConfig;
use crate::data_models::{Listing, NewListing, NewSearch, Search};
use crate::error::{ErrorKind, StoreError};
use crate::memory_store::MemoryStore;
use crate::supabase::SupabaseStore;

/// Column names shared by both tables.
pub mod columns {
    pub const ID: &str = "id";
    pub const SEARCH_ID: &str = "search_id";
    pub const CREATED_AT: &str = "created_at";
}

/// Tables owned by the remote datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Searches,
    Listings,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Table::Searches => "Busquedas",
            Table::Listings => "Listings",
        }
    }

    /// How a failed insert into this table is reported to callers.
    ///
    /// Listing inserts mostly fail on a bad `search_id`, so they are treated as
    /// client errors. Searches have no foreign key; any failure is ours.
    pub const fn write_failure(self) -> ErrorKind {
        match self {
            Table::Searches => ErrorKind::TransportFailure,
            Table::Listings => ErrorKind::ConstraintViolation,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Single-table operations against a row store.
///
/// Both calls return every materialized row; an empty vector is a valid answer.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one row and return it as stored, including generated columns.
    async fn insert(&self, table: Table, row: Value) -> Result<Vec<Value>, StoreError>;

    /// Select all rows whose `column` equals `value`.
    async fn select_eq(
        &self,
        table: Table,
        column: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError>;
}

/// Process-wide datastore handle. Clones share the same underlying store.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn RecordStore>,
}

impl Database {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Connect to the hosted datastore.
    pub fn supabase(config: &SupabaseConfig) -> Result<Self, StoreError> {
        let store = SupabaseStore::new(config)?;
        tracing::info!("Using Supabase datastore at {}", store.base_url());
        Ok(Self::new(Arc::new(store)))
    }

    /// An in-process datastore with the production foreign keys.
    pub fn in_memory() -> Self {
        tracing::info!("Using in-memory datastore");
        Self::new(Arc::new(MemoryStore::with_schema()))
    }

    pub fn searches_repo(&self) -> SearchRepo {
        SearchRepo::new(self)
    }

    pub fn listings_repo(&self) -> ListingRepo {
        ListingRepo::new(self)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

// =============================================================================
// Typed access
// =============================================================================

/// Decodes rows of one table into `T`.
pub struct Repository<T> {
    store: Arc<dyn RecordStore>,
    table: Table,
    _row: PhantomData<fn() -> T>,
}

impl<T> Repository<T>
where
    T: DeserializeOwned,
{
    pub fn new(db: &Database, table: Table) -> Self {
        Self {
            store: Arc::clone(&db.store),
            table,
            _row: PhantomData,
        }
    }

    /// Insert a payload and decode the first returned row, if any.
    pub async fn insert<P>(&self, payload: &P) -> Result<Option<T>, StoreError>
    where
        P: Serialize + Sync,
    {
        let row = serde_json::to_value(payload)?;
        let rows = self.store.insert(self.table, row).await?;
        Ok(decode_rows::<T>(rows)?.into_iter().next())
    }

    /// Find the first row matching `column = value`.
    pub async fn find_one(&self, column: &str, value: &str) -> Result<Option<T>, StoreError> {
        Ok(self.find(column, value).await?.into_iter().next())
    }

    /// Find all rows matching `column = value`.
    pub async fn find(&self, column: &str, value: &str) -> Result<Vec<T>, StoreError> {
        let rows = self.store.select_eq(self.table, column, value).await?;
        decode_rows(rows)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}

// =============================================================================
// Search-specific operations
// =============================================================================

pub struct SearchRepo {
    repo: Repository<Search>,
}

impl SearchRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db, Table::Searches),
        }
    }

    /// Insert a search. `None` means the store accepted the write but returned no row.
    pub async fn create(&self, search: &NewSearch) -> Result<Option<Search>, StoreError> {
        self.repo.insert(search).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Search>, StoreError> {
        self.repo.find_one(columns::ID, &id.to_string()).await
    }
}

// =============================================================================
// Listing-specific operations
// =============================================================================

pub struct ListingRepo {
    repo: Repository<Listing>,
}

impl ListingRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db, Table::Listings),
        }
    }

    pub async fn create(&self, listing: &NewListing) -> Result<Option<Listing>, StoreError> {
        self.repo.insert(listing).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, StoreError> {
        self.repo.find_one(columns::ID, &id.to_string()).await
    }

    /// All listings that reference `search_id`. No rows is not an error.
    pub async fn find_by_search(&self, search_id: Uuid) -> Result<Vec<Listing>, StoreError> {
        self.repo
            .find(columns::SEARCH_ID, &search_id.to_string())
            .await
    }
}
