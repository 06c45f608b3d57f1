//! Persistent object catalog
//!
//! The catalog is the source of truth for which databases, schemas, tables,
//! and views exist and what their column layout is, independent of the
//! engine's own bookkeeping. It is a single JSON document per data
//! directory (`catalog.json`), rewritten after every mutation.
//!
//! Dropped objects are not erased: DROP moves the full definition into a
//! parallel `dropped` partition keyed by fully-qualified name, where UNDROP
//! can later find it. An object is either live or in exactly one dropped
//! slot, never both. Cascading drops give every contained object its own
//! dropped slot, so each shows up in the dropped-object listings; restoring
//! the parent pulls every object keyed under it back in.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One column of a table descriptor. `data_type` keeps the dialect type
/// text as written (upper-cased), e.g. `NUMBER(10, 2)` or `VARCHAR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub created_at: DateTime<Utc>,
    pub columns: Vec<ColumnDef>,
    /// Cached row count, maintained on INSERT / TRUNCATE. Advisory only.
    #[serde(default)]
    pub row_count: i64,
}

impl TableEntry {
    fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            created_at: Utc::now(),
            columns,
            row_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewEntry {
    pub created_at: DateTime<Utc>,
    /// Stored definition text (the SELECT body as written).
    pub definition: String,
}

impl ViewEntry {
    fn new(definition: String) -> Self {
        Self {
            created_at: Utc::now(),
            definition,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableEntry>,
    #[serde(default)]
    pub views: BTreeMap<String, ViewEntry>,
}

impl SchemaEntry {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            tables: BTreeMap::new(),
            views: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.views.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaEntry>,
}

impl DatabaseEntry {
    fn new() -> Self {
        let mut schemas = BTreeMap::new();
        // Every database comes with an implicit PUBLIC schema.
        schemas.insert("PUBLIC".to_string(), SchemaEntry::new());
        Self {
            created_at: Utc::now(),
            schemas,
        }
    }
}

/// A soft-deleted object: the retained definition plus when it was dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropped<T> {
    #[serde(flatten)]
    pub entry: T,
    pub dropped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DroppedPartition {
    #[serde(default)]
    pub databases: BTreeMap<String, Dropped<DatabaseEntry>>,
    #[serde(default)]
    pub schemas: BTreeMap<String, Dropped<SchemaEntry>>,
    #[serde(default)]
    pub tables: BTreeMap<String, Dropped<TableEntry>>,
    #[serde(default)]
    pub views: BTreeMap<String, Dropped<ViewEntry>>,
}

/// The persisted document: `databases[name].schemas[name].{tables,views}`
/// plus the parallel dropped partition keyed by fully-qualified name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,
    #[serde(default)]
    pub dropped: DroppedPartition,
}

/// `{name, created_at}` record returned by the listing accessors.
#[derive(Debug, Clone)]
pub struct NamedRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub columns: Vec<ColumnDef>,
    pub row_count: i64,
}

#[derive(Debug, Clone)]
pub struct ViewInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub definition: String,
}

/// Dropped-object record; `name` is the fully-qualified name the object
/// was dropped under.
#[derive(Debug, Clone)]
pub struct DroppedRecord {
    pub name: String,
    pub dropped_at: DateTime<Utc>,
}

fn qualified(parts: &[&str]) -> String {
    parts.join(".")
}

fn database_mut<'a>(doc: &'a mut CatalogDocument, db: &str) -> Result<&'a mut DatabaseEntry> {
    doc.databases
        .get_mut(db)
        .ok_or_else(|| Error::DatabaseNotFound(db.to_string()))
}

fn schema_mut<'a>(
    doc: &'a mut CatalogDocument,
    db: &str,
    sc: &str,
) -> Result<&'a mut SchemaEntry> {
    database_mut(doc, db)?
        .schemas
        .get_mut(sc)
        .ok_or_else(|| Error::SchemaNotFound(qualified(&[db, sc])))
}

fn schema_ref<'a>(doc: &'a CatalogDocument, db: &str, sc: &str) -> Result<&'a SchemaEntry> {
    doc.databases
        .get(db)
        .ok_or_else(|| Error::DatabaseNotFound(db.to_string()))?
        .schemas
        .get(sc)
        .ok_or_else(|| Error::SchemaNotFound(qualified(&[db, sc])))
}

/// Move a schema's tables and views into their own dropped slots, keyed by
/// fully-qualified name.
fn detach_schema_objects(
    dropped: &mut DroppedPartition,
    schema_fqn: &str,
    schema: &mut SchemaEntry,
    dropped_at: DateTime<Utc>,
) {
    for (table, entry) in std::mem::take(&mut schema.tables) {
        dropped
            .tables
            .insert(format!("{schema_fqn}.{table}"), Dropped { entry, dropped_at });
    }
    for (view, entry) in std::mem::take(&mut schema.views) {
        dropped
            .views
            .insert(format!("{schema_fqn}.{view}"), Dropped { entry, dropped_at });
    }
}

/// Inverse of [`detach_schema_objects`]: pull every dropped table and view
/// keyed under the schema back in. Restored tables start with zero rows.
fn restore_schema_objects(
    dropped: &mut DroppedPartition,
    schema_fqn: &str,
    schema: &mut SchemaEntry,
) {
    let prefix = format!("{schema_fqn}.");
    let table_keys: Vec<String> = dropped
        .tables
        .keys()
        .filter(|k| k.starts_with(&prefix))
        .cloned()
        .collect();
    for key in table_keys {
        if let Some(d) = dropped.tables.remove(&key) {
            let mut entry = d.entry;
            entry.row_count = 0;
            schema.tables.insert(key[prefix.len()..].to_string(), entry);
        }
    }
    let view_keys: Vec<String> = dropped
        .views
        .keys()
        .filter(|k| k.starts_with(&prefix))
        .cloned()
        .collect();
    for key in view_keys {
        if let Some(d) = dropped.views.remove(&key) {
            schema.views.insert(key[prefix.len()..].to_string(), d.entry);
        }
    }
}

/// File-backed catalog store.
///
/// Mutations take the write lock, update the in-memory document, and rewrite
/// the backing file before returning; readers always see the latest
/// committed state. Independent processes sharing one data directory race
/// last-writer-wins, an accepted limitation for a local tool.
pub struct CatalogStore {
    path: PathBuf,
    doc: RwLock<CatalogDocument>,
}

impl CatalogStore {
    /// Open (or initialize) the catalog under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("catalog.json");
        let doc = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?)?
        } else {
            CatalogDocument::default()
        };
        let store = Self {
            path,
            doc: RwLock::new(doc),
        };
        tracing::debug!(path = %store.path.display(), "opened catalog");
        Ok(store)
    }

    fn persist(&self, doc: &CatalogDocument) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Full snapshot, used to rebuild engine-side objects on open.
    pub fn snapshot(&self) -> CatalogDocument {
        self.doc.read().clone()
    }

    // ------------------------------------------------------------------
    // Databases
    // ------------------------------------------------------------------

    pub fn create_database(&self, name: &str, if_not_exists: bool) -> Result<bool> {
        let name = name.to_uppercase();
        let mut doc = self.doc.write();
        if doc.databases.contains_key(&name) {
            if if_not_exists {
                return Ok(false);
            }
            return Err(Error::AlreadyExists(name));
        }
        doc.databases.insert(name.clone(), DatabaseEntry::new());
        self.persist(&doc)?;
        tracing::debug!(database = %name, "created database");
        Ok(true)
    }

    pub fn drop_database(&self, name: &str, if_exists: bool, cascade: bool) -> Result<bool> {
        let name = name.to_uppercase();
        let mut doc = self.doc.write();
        let mut entry = match doc.databases.remove(&name) {
            Some(entry) => entry,
            None => {
                if if_exists {
                    return Ok(false);
                }
                return Err(Error::DatabaseNotFound(name));
            }
        };
        if !cascade && entry.schemas.values().any(|s| !s.is_empty()) {
            doc.databases.insert(name.clone(), entry);
            return Err(Error::DatabaseNotEmpty(name));
        }
        let dropped_at = Utc::now();
        for (sc, mut schema) in std::mem::take(&mut entry.schemas) {
            let schema_fqn = qualified(&[&name, &sc]);
            detach_schema_objects(&mut doc.dropped, &schema_fqn, &mut schema, dropped_at);
            doc.dropped.schemas.insert(
                schema_fqn,
                Dropped {
                    entry: schema,
                    dropped_at,
                },
            );
        }
        doc.dropped
            .databases
            .insert(name.clone(), Dropped { entry, dropped_at });
        self.persist(&doc)?;
        tracing::debug!(database = %name, "dropped database");
        Ok(true)
    }

    /// Restore a dropped database, pulling back every dropped schema, table,
    /// and view keyed under it. The returned entry is what the dispatcher
    /// uses to recreate the engine-side objects.
    pub fn undrop_database(&self, name: &str) -> Result<DatabaseEntry> {
        let name = name.to_uppercase();
        let mut doc = self.doc.write();
        if doc.databases.contains_key(&name) {
            return Err(Error::NameCollision(name));
        }
        let dropped = doc
            .dropped
            .databases
            .remove(&name)
            .ok_or_else(|| Error::DatabaseNotFound(name.clone()))?;
        let mut entry = dropped.entry;
        let prefix = format!("{name}.");
        let schema_keys: Vec<String> = doc
            .dropped
            .schemas
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in schema_keys {
            if let Some(d) = doc.dropped.schemas.remove(&key) {
                let mut schema = d.entry;
                restore_schema_objects(&mut doc.dropped, &key, &mut schema);
                entry.schemas.insert(key[prefix.len()..].to_string(), schema);
            }
        }
        doc.databases.insert(name.clone(), entry.clone());
        self.persist(&doc)?;
        tracing::debug!(database = %name, "restored database");
        Ok(entry)
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.doc.read().databases.contains_key(&name.to_uppercase())
    }

    pub fn list_databases(&self) -> Vec<NamedRecord> {
        self.doc
            .read()
            .databases
            .iter()
            .map(|(name, entry)| NamedRecord {
                name: name.clone(),
                created_at: entry.created_at,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------

    pub fn create_schema(&self, db: &str, name: &str, if_not_exists: bool) -> Result<bool> {
        let (db, name) = (db.to_uppercase(), name.to_uppercase());
        let mut doc = self.doc.write();
        let database = database_mut(&mut doc, &db)?;
        if database.schemas.contains_key(&name) {
            if if_not_exists {
                return Ok(false);
            }
            return Err(Error::AlreadyExists(qualified(&[&db, &name])));
        }
        database.schemas.insert(name.clone(), SchemaEntry::new());
        self.persist(&doc)?;
        tracing::debug!(database = %db, schema = %name, "created schema");
        Ok(true)
    }

    pub fn drop_schema(
        &self,
        db: &str,
        name: &str,
        if_exists: bool,
        cascade: bool,
    ) -> Result<bool> {
        let (db, name) = (db.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &name]);
        let mut doc = self.doc.write();
        let database = database_mut(&mut doc, &db)?;
        let mut entry = match database.schemas.remove(&name) {
            Some(entry) => entry,
            None => {
                if if_exists {
                    return Ok(false);
                }
                return Err(Error::SchemaNotFound(fqn));
            }
        };
        if !cascade && !entry.is_empty() {
            database.schemas.insert(name, entry);
            return Err(Error::SchemaNotEmpty(fqn));
        }
        let dropped_at = Utc::now();
        detach_schema_objects(&mut doc.dropped, &fqn, &mut entry, dropped_at);
        doc.dropped
            .schemas
            .insert(fqn.clone(), Dropped { entry, dropped_at });
        self.persist(&doc)?;
        tracing::debug!(schema = %fqn, "dropped schema");
        Ok(true)
    }

    pub fn undrop_schema(&self, db: &str, name: &str) -> Result<SchemaEntry> {
        let (db, name) = (db.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &name]);
        let mut doc = self.doc.write();
        let database = database_mut(&mut doc, &db)?;
        if database.schemas.contains_key(&name) {
            return Err(Error::NameCollision(fqn));
        }
        let dropped = doc
            .dropped
            .schemas
            .remove(&fqn)
            .ok_or_else(|| Error::SchemaNotFound(fqn.clone()))?;
        let mut entry = dropped.entry;
        restore_schema_objects(&mut doc.dropped, &fqn, &mut entry);
        database_mut(&mut doc, &db)?
            .schemas
            .insert(name, entry.clone());
        self.persist(&doc)?;
        tracing::debug!(schema = %fqn, "restored schema");
        Ok(entry)
    }

    pub fn schema_exists(&self, db: &str, name: &str) -> bool {
        schema_ref(&self.doc.read(), &db.to_uppercase(), &name.to_uppercase()).is_ok()
    }

    pub fn list_schemas(&self, db: &str) -> Result<Vec<NamedRecord>> {
        let db = db.to_uppercase();
        let doc = self.doc.read();
        let database = doc
            .databases
            .get(&db)
            .ok_or_else(|| Error::DatabaseNotFound(db))?;
        Ok(database
            .schemas
            .iter()
            .map(|(name, entry)| NamedRecord {
                name: name.clone(),
                created_at: entry.created_at,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    pub fn create_table(
        &self,
        db: &str,
        sc: &str,
        name: &str,
        columns: Vec<ColumnDef>,
        or_replace: bool,
        if_not_exists: bool,
    ) -> Result<bool> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &sc, &name]);
        let mut doc = self.doc.write();
        let schema = schema_mut(&mut doc, &db, &sc)?;
        if schema.views.contains_key(&name) {
            return Err(Error::AlreadyExists(fqn));
        }
        if schema.tables.contains_key(&name) && !or_replace {
            if if_not_exists {
                return Ok(false);
            }
            return Err(Error::AlreadyExists(fqn));
        }
        schema.tables.insert(name, TableEntry::new(columns));
        self.persist(&doc)?;
        tracing::debug!(table = %fqn, "created table");
        Ok(true)
    }

    pub fn drop_table(&self, db: &str, sc: &str, name: &str, if_exists: bool) -> Result<bool> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &sc, &name]);
        let mut doc = self.doc.write();
        let schema = schema_mut(&mut doc, &db, &sc)?;
        let entry = match schema.tables.remove(&name) {
            Some(entry) => entry,
            None => {
                if if_exists {
                    return Ok(false);
                }
                return Err(Error::TableNotFound(fqn));
            }
        };
        doc.dropped.tables.insert(
            fqn.clone(),
            Dropped {
                entry,
                dropped_at: Utc::now(),
            },
        );
        self.persist(&doc)?;
        tracing::debug!(table = %fqn, "dropped table");
        Ok(true)
    }

    /// Restore a dropped table descriptor. Only the definition is retained:
    /// the restored table starts with zero rows and a reset statistics
    /// cache. The caller recreates the engine-side object from the returned
    /// entry before this fact becomes observable.
    pub fn undrop_table(&self, db: &str, sc: &str, name: &str) -> Result<TableEntry> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &sc, &name]);
        let mut doc = self.doc.write();
        {
            let schema = schema_ref(&doc, &db, &sc)?;
            if schema.tables.contains_key(&name) || schema.views.contains_key(&name) {
                return Err(Error::NameCollision(fqn));
            }
        }
        let dropped = doc
            .dropped
            .tables
            .remove(&fqn)
            .ok_or_else(|| Error::TableNotFound(fqn.clone()))?;
        let mut entry = dropped.entry;
        entry.row_count = 0;
        schema_mut(&mut doc, &db, &sc)?
            .tables
            .insert(name, entry.clone());
        self.persist(&doc)?;
        tracing::debug!(table = %fqn, "restored table");
        Ok(entry)
    }

    pub fn rename_table(&self, db: &str, sc: &str, old: &str, new: &str) -> Result<()> {
        let (db, sc) = (db.to_uppercase(), sc.to_uppercase());
        let (old, new) = (old.to_uppercase(), new.to_uppercase());
        let mut doc = self.doc.write();
        let schema = schema_mut(&mut doc, &db, &sc)?;
        if schema.tables.contains_key(&new) || schema.views.contains_key(&new) {
            return Err(Error::AlreadyExists(qualified(&[&db, &sc, &new])));
        }
        let entry = schema
            .tables
            .remove(&old)
            .ok_or_else(|| Error::TableNotFound(qualified(&[&db, &sc, &old])))?;
        schema.tables.insert(new, entry);
        self.persist(&doc)?;
        Ok(())
    }

    pub fn table_exists(&self, db: &str, sc: &str, name: &str) -> bool {
        schema_ref(&self.doc.read(), &db.to_uppercase(), &sc.to_uppercase())
            .map(|s| s.tables.contains_key(&name.to_uppercase()))
            .unwrap_or(false)
    }

    pub fn get_table_info(&self, db: &str, sc: &str, name: &str) -> Result<TableInfo> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let doc = self.doc.read();
        let schema = schema_ref(&doc, &db, &sc)?;
        let entry = schema
            .tables
            .get(&name)
            .ok_or_else(|| Error::TableNotFound(qualified(&[&db, &sc, &name])))?;
        Ok(TableInfo {
            name,
            created_at: entry.created_at,
            columns: entry.columns.clone(),
            row_count: entry.row_count,
        })
    }

    pub fn list_tables(&self, db: &str, sc: &str) -> Result<Vec<TableInfo>> {
        let doc = self.doc.read();
        let schema = schema_ref(&doc, &db.to_uppercase(), &sc.to_uppercase())?;
        Ok(schema
            .tables
            .iter()
            .map(|(name, entry)| TableInfo {
                name: name.clone(),
                created_at: entry.created_at,
                columns: entry.columns.clone(),
                row_count: entry.row_count,
            })
            .collect())
    }

    /// Adjust the cached row count after DML; advisory, clamped at zero.
    pub fn bump_row_count(&self, db: &str, sc: &str, name: &str, delta: i64) -> Result<()> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let mut doc = self.doc.write();
        let schema = schema_mut(&mut doc, &db, &sc)?;
        let entry = schema
            .tables
            .get_mut(&name)
            .ok_or_else(|| Error::TableNotFound(qualified(&[&db, &sc, &name])))?;
        entry.row_count = (entry.row_count + delta).max(0);
        self.persist(&doc)?;
        Ok(())
    }

    pub fn reset_row_count(&self, db: &str, sc: &str, name: &str) -> Result<()> {
        let current = self.get_table_info(db, sc, name)?.row_count;
        self.bump_row_count(db, sc, name, -current)
    }

    /// Zero every cached row count. Table data lives only in the engine's
    /// memory, so a fresh dispatcher starts from empty tables.
    pub fn reset_all_row_counts(&self) -> Result<()> {
        let mut doc = self.doc.write();
        for database in doc.databases.values_mut() {
            for schema in database.schemas.values_mut() {
                for table in schema.tables.values_mut() {
                    table.row_count = 0;
                }
            }
        }
        self.persist(&doc)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn create_view(
        &self,
        db: &str,
        sc: &str,
        name: &str,
        definition: &str,
        or_replace: bool,
    ) -> Result<bool> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &sc, &name]);
        let mut doc = self.doc.write();
        let schema = schema_mut(&mut doc, &db, &sc)?;
        if schema.tables.contains_key(&name) {
            return Err(Error::AlreadyExists(fqn));
        }
        if schema.views.contains_key(&name) && !or_replace {
            return Err(Error::AlreadyExists(fqn));
        }
        schema
            .views
            .insert(name, ViewEntry::new(definition.to_string()));
        self.persist(&doc)?;
        tracing::debug!(view = %fqn, "created view");
        Ok(true)
    }

    pub fn drop_view(&self, db: &str, sc: &str, name: &str, if_exists: bool) -> Result<bool> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &sc, &name]);
        let mut doc = self.doc.write();
        let schema = schema_mut(&mut doc, &db, &sc)?;
        let entry = match schema.views.remove(&name) {
            Some(entry) => entry,
            None => {
                if if_exists {
                    return Ok(false);
                }
                return Err(Error::ViewNotFound(fqn));
            }
        };
        doc.dropped.views.insert(
            fqn.clone(),
            Dropped {
                entry,
                dropped_at: Utc::now(),
            },
        );
        self.persist(&doc)?;
        tracing::debug!(view = %fqn, "dropped view");
        Ok(true)
    }

    pub fn undrop_view(&self, db: &str, sc: &str, name: &str) -> Result<ViewEntry> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let fqn = qualified(&[&db, &sc, &name]);
        let mut doc = self.doc.write();
        {
            let schema = schema_ref(&doc, &db, &sc)?;
            if schema.tables.contains_key(&name) || schema.views.contains_key(&name) {
                return Err(Error::NameCollision(fqn));
            }
        }
        let dropped = doc
            .dropped
            .views
            .remove(&fqn)
            .ok_or_else(|| Error::ViewNotFound(fqn.clone()))?;
        schema_mut(&mut doc, &db, &sc)?
            .views
            .insert(name, dropped.entry.clone());
        self.persist(&doc)?;
        Ok(dropped.entry)
    }

    pub fn get_view(&self, db: &str, sc: &str, name: &str) -> Result<ViewInfo> {
        let (db, sc, name) = (db.to_uppercase(), sc.to_uppercase(), name.to_uppercase());
        let doc = self.doc.read();
        let schema = schema_ref(&doc, &db, &sc)?;
        let entry = schema
            .views
            .get(&name)
            .ok_or_else(|| Error::ViewNotFound(qualified(&[&db, &sc, &name])))?;
        Ok(ViewInfo {
            name,
            created_at: entry.created_at,
            definition: entry.definition.clone(),
        })
    }

    pub fn list_views(&self, db: &str, sc: &str) -> Result<Vec<ViewInfo>> {
        let doc = self.doc.read();
        let schema = schema_ref(&doc, &db.to_uppercase(), &sc.to_uppercase())?;
        Ok(schema
            .views
            .iter()
            .map(|(name, entry)| ViewInfo {
                name: name.clone(),
                created_at: entry.created_at,
                definition: entry.definition.clone(),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Dropped-object listings
    // ------------------------------------------------------------------

    pub fn list_dropped_databases(&self) -> Vec<DroppedRecord> {
        self.doc
            .read()
            .dropped
            .databases
            .iter()
            .map(|(name, d)| DroppedRecord {
                name: name.clone(),
                dropped_at: d.dropped_at,
            })
            .collect()
    }

    pub fn list_dropped_schemas(&self, db: Option<&str>) -> Vec<DroppedRecord> {
        let prefix = db.map(|d| format!("{}.", d.to_uppercase()));
        self.doc
            .read()
            .dropped
            .schemas
            .iter()
            .filter(|(name, _)| match &prefix {
                Some(p) => name.starts_with(p.as_str()),
                None => true,
            })
            .map(|(name, d)| DroppedRecord {
                name: name.clone(),
                dropped_at: d.dropped_at,
            })
            .collect()
    }

    pub fn list_dropped_tables(&self, db: Option<&str>, sc: Option<&str>) -> Vec<DroppedRecord> {
        let prefix = match (db, sc) {
            (Some(d), Some(s)) => Some(format!("{}.{}.", d.to_uppercase(), s.to_uppercase())),
            (Some(d), None) => Some(format!("{}.", d.to_uppercase())),
            _ => None,
        };
        self.doc
            .read()
            .dropped
            .tables
            .iter()
            .filter(|(name, _)| match &prefix {
                Some(p) => name.starts_with(p.as_str()),
                None => true,
            })
            .map(|(name, d)| DroppedRecord {
                name: name.clone(),
                dropped_at: d.dropped_at,
            })
            .collect()
    }

    pub fn list_dropped_views(&self, db: Option<&str>, sc: Option<&str>) -> Vec<DroppedRecord> {
        let prefix = match (db, sc) {
            (Some(d), Some(s)) => Some(format!("{}.{}.", d.to_uppercase(), s.to_uppercase())),
            (Some(d), None) => Some(format!("{}.", d.to_uppercase())),
            _ => None,
        };
        self.doc
            .read()
            .dropped
            .views
            .iter()
            .filter(|(name, _)| match &prefix {
                Some(p) => name.starts_with(p.as_str()),
                None => true,
            })
            .map(|(name, d)| DroppedRecord {
                name: name.clone(),
                dropped_at: d.dropped_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef {
                name: "ID".to_string(),
                data_type: "INT".to_string(),
                nullable: true,
            },
            ColumnDef {
                name: "NAME".to_string(),
                data_type: "VARCHAR".to_string(),
                nullable: true,
            },
        ]
    }

    fn store() -> (tempfile::TempDir, CatalogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn create_database_adds_public_schema() {
        let (_dir, store) = store();
        store.create_database("testdb", false).unwrap();
        assert!(store.database_exists("TESTDB"));
        assert!(store.schema_exists("testdb", "public"));
    }

    #[test]
    fn create_existing_database_errors_without_if_not_exists() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        assert!(matches!(
            store.create_database("db1", false),
            Err(Error::AlreadyExists(_))
        ));
        // if_not_exists converts the error into a no-op
        assert!(!store.create_database("db1", true).unwrap());
    }

    #[test]
    fn drop_missing_table_respects_if_exists() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        assert!(matches!(
            store.drop_table("db1", "public", "nope", false),
            Err(Error::TableNotFound(_))
        ));
        assert!(!store.drop_table("db1", "public", "nope", true).unwrap());
    }

    #[test]
    fn undrop_table_restores_column_list() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        let before = store.get_table_info("db1", "public", "t").unwrap();

        store.drop_table("db1", "public", "t", false).unwrap();
        assert!(!store.table_exists("db1", "public", "t"));
        assert_eq!(store.list_dropped_tables(Some("db1"), None).len(), 1);

        store.undrop_table("db1", "public", "t").unwrap();
        let after = store.get_table_info("db1", "public", "t").unwrap();
        assert_eq!(before.columns, after.columns);
        assert!(store.list_dropped_tables(Some("db1"), None).is_empty());
    }

    #[test]
    fn undrop_into_occupied_slot_is_a_collision() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        store.drop_table("db1", "public", "t", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        assert!(matches!(
            store.undrop_table("db1", "public", "t"),
            Err(Error::NameCollision(_))
        ));
    }

    #[test]
    fn drop_non_empty_schema_requires_cascade() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        assert!(matches!(
            store.drop_schema("db1", "public", false, false),
            Err(Error::SchemaNotEmpty(_))
        ));
        // still live after the failed drop
        assert!(store.table_exists("db1", "public", "t"));

        store.drop_schema("db1", "public", false, true).unwrap();
        assert!(!store.schema_exists("db1", "public"));

        // restoring the schema pulls the cascade-dropped table back in
        let restored = store.undrop_schema("db1", "public").unwrap();
        assert!(restored.tables.contains_key("T"));
        assert!(store.table_exists("db1", "public", "t"));
    }

    #[test]
    fn cascade_gives_each_contained_object_its_own_dropped_slot() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store.create_schema("db1", "staging", false).unwrap();
        store
            .create_table("db1", "staging", "t", columns(), false, false)
            .unwrap();
        store
            .create_view("db1", "staging", "v", "SELECT 1", false)
            .unwrap();

        store.drop_schema("db1", "staging", false, true).unwrap();
        let dropped = store.list_dropped_tables(Some("db1"), Some("staging"));
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name, "DB1.STAGING.T");
        assert_eq!(store.list_dropped_views(Some("db1"), Some("staging")).len(), 1);
        assert_eq!(store.list_dropped_schemas(Some("db1")).len(), 1);

        let restored = store.undrop_schema("db1", "staging").unwrap();
        assert!(restored.tables.contains_key("T"));
        assert!(restored.views.contains_key("V"));
        assert!(store.list_dropped_tables(Some("db1"), None).is_empty());
        assert!(store.list_dropped_views(Some("db1"), None).is_empty());
    }

    #[test]
    fn database_cascade_flattens_into_individual_slots() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();

        store.drop_database("db1", false, true).unwrap();
        assert_eq!(store.list_dropped_schemas(Some("db1")).len(), 1);
        assert_eq!(
            store.list_dropped_tables(Some("db1"), Some("public")).len(),
            1
        );

        let restored = store.undrop_database("db1").unwrap();
        assert!(restored.schemas["PUBLIC"].tables.contains_key("T"));
        assert!(store.list_dropped_schemas(Some("db1")).is_empty());
        assert!(store.list_dropped_tables(Some("db1"), None).is_empty());
    }

    #[test]
    fn drop_non_empty_database_requires_cascade() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        assert!(matches!(
            store.drop_database("db1", false, false),
            Err(Error::DatabaseNotEmpty(_))
        ));
        store.drop_database("db1", false, true).unwrap();
        let restored = store.undrop_database("db1").unwrap();
        assert!(restored.schemas["PUBLIC"].tables.contains_key("T"));
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CatalogStore::open(dir.path()).unwrap();
            store.create_database("db1", false).unwrap();
            store
                .create_table("db1", "public", "t", columns(), false, false)
                .unwrap();
            store.drop_table("db1", "public", "t", false).unwrap();
        }
        let store = CatalogStore::open(dir.path()).unwrap();
        assert!(store.database_exists("db1"));
        assert_eq!(store.list_dropped_tables(None, None).len(), 1);
        store.undrop_table("db1", "public", "t").unwrap();
        assert_eq!(
            store.get_table_info("db1", "public", "t").unwrap().columns,
            columns()
        );
    }

    #[test]
    fn rename_preserves_definition() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        store.rename_table("db1", "public", "t", "t2").unwrap();
        assert!(!store.table_exists("db1", "public", "t"));
        assert_eq!(
            store.get_table_info("db1", "public", "t2").unwrap().columns,
            columns()
        );
    }

    #[test]
    fn row_count_cache_is_clamped_and_reset_on_undrop() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "t", columns(), false, false)
            .unwrap();
        store.bump_row_count("db1", "public", "t", 5).unwrap();
        assert_eq!(store.get_table_info("db1", "public", "t").unwrap().row_count, 5);
        store.bump_row_count("db1", "public", "t", -10).unwrap();
        assert_eq!(store.get_table_info("db1", "public", "t").unwrap().row_count, 0);

        store.bump_row_count("db1", "public", "t", 2).unwrap();
        store.drop_table("db1", "public", "t", false).unwrap();
        let entry = store.undrop_table("db1", "public", "t").unwrap();
        assert_eq!(entry.row_count, 0);
    }

    #[test]
    fn view_and_table_names_share_one_namespace() {
        let (_dir, store) = store();
        store.create_database("db1", false).unwrap();
        store
            .create_table("db1", "public", "x", columns(), false, false)
            .unwrap();
        assert!(matches!(
            store.create_view("db1", "public", "x", "SELECT 1", false),
            Err(Error::AlreadyExists(_))
        ));
    }
}
