//! Entity storage
//!
//! Rows are kept as JSON objects keyed by `(EntityKind, id)`. The [`Store`]
//! trait is the backend seam (volatile [`MemoryStore`] here, embedded redb in
//! [`crate::database`]); [`Repository`] layers typed access on top of it so
//! handlers never touch raw rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The five stored kinds, each with its own id sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    User,
    Business,
    QrCode,
    Link,
    AnalyticEvent,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::User,
        EntityKind::Business,
        EntityKind::QrCode,
        EntityKind::Link,
        EntityKind::AnalyticEvent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Business => "businesses",
            EntityKind::QrCode => "qr_codes",
            EntityKind::Link => "links",
            EntityKind::AnalyticEvent => "analytics",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("storage table unavailable: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage read/write failed: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("storage commit failed: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("malformed {kind} row: {source}")]
    Codec {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} row is not a JSON object")]
    NotAnObject(&'static str),
}

/// Raw row storage
///
/// Implementations must make `insert` atomic: the id handed out is never
/// reused and the row is visible under it once the call returns.
pub trait Store: Send + Sync {
    fn get(&self, kind: EntityKind, id: u64) -> Result<Option<Value>, StoreError>;

    /// All rows of a kind in ascending id order
    fn scan(&self, kind: EntityKind) -> Result<Vec<Value>, StoreError>;

    /// Assigns the next id of `kind`, writes it into the row's `id` field and
    /// stores the row
    fn insert(&self, kind: EntityKind, row: Map<String, Value>) -> Result<Value, StoreError>;

    /// Rewrites an existing row in place
    ///
    /// `edit` runs under the backend's write lock (or inside its write
    /// transaction), so no other write lands between the row it reads and
    /// the row it writes. When `edit` returns `false` nothing is written.
    /// Returns the stored row, or `None` when the id is absent or `edit`
    /// declined.
    fn modify(
        &self,
        kind: EntityKind,
        id: u64,
        edit: &mut dyn FnMut(&mut Value) -> Result<bool, StoreError>,
    ) -> Result<Option<Value>, StoreError>;
}

/// A stored record type
///
/// `New` carries the create-time fields with their defaults already applied;
/// `Patch` serializes only the fields to overwrite.
pub trait Entity: Serialize + DeserializeOwned + Send {
    const KIND: EntityKind;
    type New: Serialize;
    type Patch: Serialize;
}

/// Typed access to a [`Store`]
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Repository over a fresh volatile store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    pub fn get<E: Entity>(&self, id: u64) -> Result<Option<E>, StoreError> {
        self.store
            .get(E::KIND, id)?
            .map(decode::<E>)
            .transpose()
    }

    pub fn all<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.store
            .scan(E::KIND)?
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    /// First row (lowest id) whose `field` equals `value`
    pub fn get_by_foreign_key<E: Entity>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Option<E>, StoreError> {
        let value = value.into();
        self.store
            .scan(E::KIND)?
            .into_iter()
            .find(|row| row.get(field) == Some(&value))
            .map(decode::<E>)
            .transpose()
    }

    /// Every row whose `field` equals `value`, in id order
    pub fn filter_by_foreign_key<E: Entity>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<E>, StoreError> {
        let value = value.into();
        self.store
            .scan(E::KIND)?
            .into_iter()
            .filter(|row| row.get(field) == Some(&value))
            .map(decode::<E>)
            .collect()
    }

    pub fn create<E: Entity>(&self, new: E::New) -> Result<E, StoreError> {
        let row = match encode(E::KIND, &new)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::NotAnObject(E::KIND.as_str())),
        };
        decode(self.store.insert(E::KIND, row)?)
    }

    /// Shallow-merges the patch's fields over the stored row
    ///
    /// Returns `Ok(None)` when no row has this id.
    pub fn update<E: Entity>(&self, id: u64, patch: &E::Patch) -> Result<Option<E>, StoreError> {
        self.update_if::<E>(id, |_| true, patch)
    }

    /// Like [`update`](Self::update), but only when the stored record passes
    /// `guard`
    ///
    /// The check and the write are one atomic step of the backend. Returns
    /// `Ok(None)` when no row has this id or `guard` rejected it.
    pub fn update_if<E: Entity>(
        &self,
        id: u64,
        guard: impl Fn(&E) -> bool,
        patch: &E::Patch,
    ) -> Result<Option<E>, StoreError> {
        let Value::Object(changes) = encode(E::KIND, patch)? else {
            return Err(StoreError::NotAnObject(E::KIND.as_str()));
        };

        let mut updated = None;
        let mut edit = |row: &mut Value| -> Result<bool, StoreError> {
            if !guard(&decode::<E>(row.clone())?) {
                return Ok(false);
            }
            let Value::Object(fields) = row else {
                return Err(StoreError::NotAnObject(E::KIND.as_str()));
            };
            for (field, value) in &changes {
                if field != "id" {
                    fields.insert(field.clone(), value.clone());
                }
            }
            updated = Some(decode::<E>(row.clone())?);
            Ok(true)
        };

        let stored = self.store.modify(E::KIND, id, &mut edit)?;
        Ok(stored.and(updated))
    }
}

fn encode<T: Serialize>(kind: EntityKind, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Codec {
        kind: kind.as_str(),
        source,
    })
}

fn decode<E: Entity>(row: Value) -> Result<E, StoreError> {
    serde_json::from_value(row).map_err(|source| StoreError::Codec {
        kind: E::KIND.as_str(),
        source,
    })
}

#[derive(Default)]
struct Table {
    next_id: u64,
    rows: BTreeMap<u64, Value>,
}

/// Volatile process-local store; contents are lost on restart
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<EntityKind, Table>>,
}

impl Store for MemoryStore {
    fn get(&self, kind: EntityKind, id: u64) -> Result<Option<Value>, StoreError> {
        Ok(self
            .tables
            .read()
            .get(&kind)
            .and_then(|table| table.rows.get(&id).cloned()))
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .tables
            .read()
            .get(&kind)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn insert(&self, kind: EntityKind, mut row: Map<String, Value>) -> Result<Value, StoreError> {
        let mut tables = self.tables.write();
        let table = tables.entry(kind).or_default();
        table.next_id += 1;
        let id = table.next_id;
        row.insert("id".to_string(), Value::from(id));
        let row = Value::Object(row);
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    fn modify(
        &self,
        kind: EntityKind,
        id: u64,
        edit: &mut dyn FnMut(&mut Value) -> Result<bool, StoreError>,
    ) -> Result<Option<Value>, StoreError> {
        let mut tables = self.tables.write();
        let Some(row) = tables.get_mut(&kind).and_then(|table| table.rows.get_mut(&id)) else {
            return Ok(None);
        };

        let mut next = row.clone();
        if !edit(&mut next)? {
            return Ok(None);
        }
        *row = next.clone();
        Ok(Some(next))
    }
}
