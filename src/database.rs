//! Database initialization, the redb-backed store and shared handler state
//!
//! The embedded redb file keeps one table per entity kind plus a table of id
//! sequences. Rows are JSON-serialized entities, as they are in the
//! in-memory store.

use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::{Map, Value};

use crate::auth::SessionStore;
use crate::store::{EntityKind, Repository, Store, StoreError};

/// Entity tables
///
/// Key: entity id. Value: JSON-serialized entity row.
const TABLE_USERS: TableDefinition<u64, &str> = TableDefinition::new("users_v1");
const TABLE_BUSINESSES: TableDefinition<u64, &str> = TableDefinition::new("businesses_v1");
const TABLE_QR_CODES: TableDefinition<u64, &str> = TableDefinition::new("qr_codes_v1");
const TABLE_LINKS: TableDefinition<u64, &str> = TableDefinition::new("links_v1");
const TABLE_ANALYTICS: TableDefinition<u64, &str> = TableDefinition::new("analytics_v1");

/// Last id handed out per kind
///
/// Key: table name from [`EntityKind::as_str`]. Value: last assigned id.
const TABLE_SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences_v1");

fn table_for(kind: EntityKind) -> TableDefinition<'static, u64, &'static str> {
    match kind {
        EntityKind::User => TABLE_USERS,
        EntityKind::Business => TABLE_BUSINESSES,
        EntityKind::QrCode => TABLE_QR_CODES,
        EntityKind::Link => TABLE_LINKS,
        EntityKind::AnalyticEvent => TABLE_ANALYTICS,
    }
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Typed access to whichever store backend was configured
    pub db: Repository,

    /// Live login sessions
    pub sessions: Arc<SessionStore>,

    /// Trailing window, in days, of the dashboard's scans-over-time chart
    pub analytics_window_days: u32,
}

impl AppState {
    pub fn new(db: Repository, sessions: SessionStore, analytics_window_days: u32) -> Self {
        Self {
            db,
            sessions: Arc::new(sessions),
            analytics_window_days,
        }
    }
}

/// Initializes the embedded database and creates required tables
///
/// Creates or opens the file at `db_path`, opens every entity table and the
/// sequence table inside one write transaction and commits it so the tables
/// exist before the first read.
///
/// # Example
///
/// ```no_run
/// # use rateflow::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        for kind in EntityKind::ALL {
            write_txn.open_table(table_for(kind))?;
        }
        write_txn.open_table(TABLE_SEQUENCES)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// [`Store`] over an embedded redb file
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Opens (or creates) the file and its tables
    pub fn open(db_path: &str) -> Result<Self, redb::Error> {
        init_db(db_path).map(Self::new)
    }
}

fn parse_row(kind: EntityKind, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Codec {
        kind: kind.as_str(),
        source,
    })
}

fn render_row(kind: EntityKind, row: &Value) -> Result<String, StoreError> {
    serde_json::to_string(row).map_err(|source| StoreError::Codec {
        kind: kind.as_str(),
        source,
    })
}

impl Store for RedbStore {
    fn get(&self, kind: EntityKind, id: u64) -> Result<Option<Value>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;
        let row = table.get(id)?;
        row.map(|guard| parse_row(kind, guard.value())).transpose()
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Value>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;

        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            rows.push(parse_row(kind, value.value())?);
        }
        Ok(rows)
    }

    fn insert(&self, kind: EntityKind, mut row: Map<String, Value>) -> Result<Value, StoreError> {
        // Sequence bump and row write share one transaction so an id is never
        // handed out twice.
        let write_txn = self.db.begin_write()?;
        let row = {
            let mut sequences = write_txn.open_table(TABLE_SEQUENCES)?;
            let last = sequences
                .get(kind.as_str())?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let id = last + 1;
            sequences.insert(kind.as_str(), id)?;

            row.insert("id".to_string(), Value::from(id));
            let row = Value::Object(row);
            let encoded = render_row(kind, &row)?;

            let mut table = write_txn.open_table(table_for(kind))?;
            table.insert(id, encoded.as_str())?;
            row
        };
        write_txn.commit()?;

        Ok(row)
    }

    fn modify(
        &self,
        kind: EntityKind,
        id: u64,
        edit: &mut dyn FnMut(&mut Value) -> Result<bool, StoreError>,
    ) -> Result<Option<Value>, StoreError> {
        // redb admits one write transaction at a time, so reading the row
        // inside it serializes this edit against every other write.
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(table_for(kind))?;
            let current = table
                .get(id)?
                .map(|guard| parse_row(kind, guard.value()))
                .transpose()?;

            match current {
                Some(mut row) => {
                    if edit(&mut row)? {
                        let encoded = render_row(kind, &row)?;
                        table.insert(id, encoded.as_str())?;
                        Some(row)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if updated.is_some() {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnalyticEvent, Business, BusinessInput, BusinessPatch, NewAnalyticEvent, NewBusiness,
    };
    use tempfile::NamedTempFile;

    fn temp_repo() -> (Repository, NamedTempFile) {
        let file = NamedTempFile::new().expect("Failed to create temp file");
        let store = RedbStore::open(file.path().to_str().unwrap()).expect("open redb store");
        (Repository::new(Arc::new(store)), file)
    }

    #[test]
    fn redb_store_round_trips_rows_and_sequences() {
        let (repo, _file) = temp_repo();

        let first = repo
            .create::<Business>(NewBusiness {
                user_id: 1,
                fields: BusinessInput {
                    name: "Cafe".into(),
                    ..Default::default()
                },
            })
            .unwrap();
        let second = repo
            .create::<Business>(NewBusiness {
                user_id: 2,
                fields: BusinessInput {
                    name: "Bakery".into(),
                    ..Default::default()
                },
            })
            .unwrap();

        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(repo.get::<Business>(2).unwrap(), Some(second));

        let event = repo
            .create::<AnalyticEvent>(NewAnalyticEvent::scan(first.id, 1))
            .unwrap();
        assert_eq!(event.id, 1);
    }

    #[test]
    fn redb_store_survives_reopen() {
        let file = NamedTempFile::new().expect("Failed to create temp file");
        let path = file.path().to_str().unwrap().to_string();

        {
            let repo = Repository::new(Arc::new(RedbStore::open(&path).unwrap()));
            repo.create::<Business>(NewBusiness {
                user_id: 5,
                fields: BusinessInput {
                    name: "Kept".into(),
                    ..Default::default()
                },
            })
            .unwrap();
        }

        let repo = Repository::new(Arc::new(RedbStore::open(&path).unwrap()));
        let found: Business = repo.get_by_foreign_key("userId", 5u64).unwrap().unwrap();
        assert_eq!(found.name, "Kept");

        let next = repo
            .create::<Business>(NewBusiness {
                user_id: 6,
                fields: BusinessInput::default(),
            })
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn redb_update_merges_and_guarded_update_can_decline() {
        let (repo, _file) = temp_repo();
        let cafe = repo
            .create::<Business>(NewBusiness {
                user_id: 1,
                fields: BusinessInput {
                    name: "Cafe".into(),
                    phone: Some("555-0100".into()),
                    ..Default::default()
                },
            })
            .unwrap();

        let patch = BusinessPatch {
            name: "Cafe 2".into(),
            ..Default::default()
        };
        assert!(repo
            .update_if::<Business>(cafe.id, |b| b.name == "Other", &patch)
            .unwrap()
            .is_none());
        assert_eq!(repo.get::<Business>(cafe.id).unwrap(), Some(cafe.clone()));

        let updated = repo.update::<Business>(cafe.id, &patch).unwrap().unwrap();
        assert_eq!(updated.name, "Cafe 2");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(repo.get::<Business>(cafe.id).unwrap(), Some(updated));

        assert!(repo.update::<Business>(99, &patch).unwrap().is_none());
    }
}
