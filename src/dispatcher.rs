//! Statement dispatcher
//!
//! One dispatcher is one connection: it owns the engine, the catalog store,
//! and the session, and turns every statement into a `ResultEnvelope`.
//! Classification is ordered: session and introspection commands are
//! answered from local state, the DDL the emulator manages goes through the
//! catalog store first and the engine second, and everything else is
//! translated, qualified, and handed to the engine.

use std::path::Path;

use datafusion::common::ScalarValue;

use crate::catalog::{CatalogStore, DatabaseEntry, SchemaEntry};
use crate::engine::{self, Engine};
use crate::envelope::ResultEnvelope;
use crate::error::{Error, Result};
use crate::info_schema;
use crate::qualify::qualify;
use crate::session::Session;
use crate::statement::{
    classify, CreateTableBody, DdlCommand, Probe, SessionCommand, ShowCommand, Statement,
};
use crate::translator::translate;

pub struct Dispatcher {
    engine: Engine,
    catalog: CatalogStore,
    session: Session,
}

impl Dispatcher {
    /// Open a dispatcher over a data directory, rebuilding engine-side
    /// objects from the catalog. Table definitions survive a restart;
    /// table data does not, so row-count statistics restart at zero.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let catalog = CatalogStore::open(data_dir.as_ref())?;
        catalog.reset_all_row_counts()?;
        let engine = Engine::new();

        let snapshot = catalog.snapshot();
        for (db, database) in &snapshot.databases {
            engine.create_database(db)?;
            hydrate_database(&engine, db, database).await;
        }

        Ok(Self {
            engine,
            catalog,
            session: Session::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Programmatic equivalent of the USE statements; `None` leaves a field
    /// unchanged. Setting the database resets the schema to PUBLIC first,
    /// so a schema passed alongside it wins.
    pub fn set_context(
        &mut self,
        database: Option<&str>,
        schema: Option<&str>,
        warehouse: Option<&str>,
        role: Option<&str>,
    ) {
        if let Some(db) = database {
            self.session.use_database(db);
        }
        if let Some(sc) = schema {
            self.session.use_schema(sc);
        }
        if let Some(wh) = warehouse {
            self.session.use_warehouse(wh);
        }
        if let Some(r) = role {
            self.session.use_role(r);
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// Execute one statement. Never fails: every error comes back as an
    /// envelope with `success = false`.
    pub async fn execute(&mut self, sql: &str) -> ResultEnvelope {
        self.execute_with_params(sql, &[]).await
    }

    /// Execute with positional parameters bound to `$1`-style placeholders.
    /// Only the generic path consults them; session and DDL statements have
    /// no placeholder positions.
    pub async fn execute_with_params(
        &mut self,
        sql: &str,
        params: &[ScalarValue],
    ) -> ResultEnvelope {
        match self.run(sql, params).await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(error = %err, "statement failed");
                ResultEnvelope::error(err)
            }
        }
    }

    async fn run(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultEnvelope> {
        match classify(sql)? {
            Statement::Session(cmd) => self.handle_session(cmd),
            Statement::Ddl(cmd) => self.handle_ddl(cmd).await,
            Statement::Generic(sql) => self.handle_generic(&sql, params).await,
        }
    }

    // ------------------------------------------------------------------
    // Session and introspection
    // ------------------------------------------------------------------

    fn handle_session(&mut self, cmd: SessionCommand) -> Result<ResultEnvelope> {
        match cmd {
            SessionCommand::UseDatabase(name) => {
                if !self.catalog.database_exists(&name) {
                    return Err(Error::DatabaseNotFound(name));
                }
                self.session.use_database(&name);
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            SessionCommand::UseSchema(name) => {
                let (db, sc) = name.resolve(&self.session, "USE SCHEMA")?;
                if !self.catalog.schema_exists(&db, &sc) {
                    return Err(Error::SchemaNotFound(format!("{db}.{sc}")));
                }
                self.session.use_database(&db);
                self.session.use_schema(&sc);
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            SessionCommand::UseWarehouse(name) => {
                self.session.use_warehouse(&name);
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            SessionCommand::UseRole(name) => {
                self.session.use_role(&name);
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            SessionCommand::SetVariable { name, value } => {
                self.session.set_variable(&name, &value);
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            SessionCommand::UnsetVariable { name } => {
                self.session.unset_variable(&name);
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            SessionCommand::Show(show) => self.handle_show(show),
            SessionCommand::Describe(name) => {
                let (db, sc, object) = name.resolve(&self.session, "DESCRIBE")?;
                let info = match self.catalog.get_table_info(&db, &sc, &object) {
                    Ok(info) => info,
                    // not a table: describe the view's stored definition
                    Err(Error::TableNotFound(fqn)) => {
                        return match self.catalog.get_view(&db, &sc, &object) {
                            Ok(view) => Ok(ResultEnvelope::rows(
                                str_columns(&["name", "kind", "text"]),
                                vec![vec![
                                    Some(view.name),
                                    Some("VIEW".to_string()),
                                    Some(view.definition),
                                ]],
                            )),
                            Err(_) => Err(Error::TableNotFound(fqn)),
                        };
                    }
                    Err(err) => return Err(err),
                };
                let rows = info
                    .columns
                    .into_iter()
                    .map(|c| {
                        vec![
                            Some(c.name),
                            Some(c.data_type),
                            Some("COLUMN".to_string()),
                            Some(if c.nullable { "Y" } else { "N" }.to_string()),
                        ]
                    })
                    .collect();
                Ok(ResultEnvelope::rows(
                    str_columns(&["name", "type", "kind", "null?"]),
                    rows,
                ))
            }
            SessionCommand::SelectProbes(probes) => {
                let columns = probes
                    .iter()
                    .map(|p| p.column_name().to_string())
                    .collect();
                let row = probes
                    .iter()
                    .map(|p| match p {
                        Probe::CurrentDatabase => self.session.database.clone(),
                        Probe::CurrentSchema => self.session.schema.clone(),
                        Probe::CurrentWarehouse => self.session.warehouse.clone(),
                        Probe::CurrentRole => self.session.role.clone(),
                        Probe::CurrentVersion => Some(env!("CARGO_PKG_VERSION").to_string()),
                    })
                    .collect();
                Ok(ResultEnvelope::rows(columns, vec![row]))
            }
        }
    }

    fn handle_show(&self, show: ShowCommand) -> Result<ResultEnvelope> {
        match show {
            ShowCommand::Databases { history } => {
                let mut rows: Vec<Vec<Option<String>>> = self
                    .catalog
                    .list_databases()
                    .into_iter()
                    .map(|db| vec![Some(db.created_at.to_rfc3339()), Some(db.name), None])
                    .collect();
                if history {
                    for dropped in self.catalog.list_dropped_databases() {
                        rows.push(vec![
                            None,
                            Some(dropped.name),
                            Some(dropped.dropped_at.to_rfc3339()),
                        ]);
                    }
                }
                Ok(ResultEnvelope::rows(
                    str_columns(&["created_on", "name", "dropped_on"]),
                    rows,
                ))
            }
            ShowCommand::Schemas { database, history } => {
                let db = match database {
                    Some(db) => db,
                    None => self
                        .session
                        .database
                        .clone()
                        .ok_or_else(|| Error::NoCurrentDatabase("SHOW SCHEMAS".to_string()))?,
                };
                let mut rows: Vec<Vec<Option<String>>> = self
                    .catalog
                    .list_schemas(&db)?
                    .into_iter()
                    .map(|sc| {
                        vec![
                            Some(sc.created_at.to_rfc3339()),
                            Some(sc.name),
                            Some(db.clone()),
                            None,
                        ]
                    })
                    .collect();
                if history {
                    for dropped in self.catalog.list_dropped_schemas(Some(&db)) {
                        rows.push(vec![
                            None,
                            Some(last_name_part(&dropped.name)),
                            Some(db.clone()),
                            Some(dropped.dropped_at.to_rfc3339()),
                        ]);
                    }
                }
                Ok(ResultEnvelope::rows(
                    str_columns(&["created_on", "name", "database_name", "dropped_on"]),
                    rows,
                ))
            }
            ShowCommand::Tables { scope, history } => {
                let db_wide = matches!(&scope, Some(name) if name.schema.is_empty());
                let (db, schemas) = self.show_scope(scope, "SHOW TABLES")?;
                let mut rows = Vec::new();
                for sc in &schemas {
                    for table in self.catalog.list_tables(&db, sc)? {
                        rows.push(vec![
                            Some(table.created_at.to_rfc3339()),
                            Some(table.name),
                            Some(db.clone()),
                            Some(sc.clone()),
                            Some("TABLE".to_string()),
                            Some(table.row_count.to_string()),
                            None,
                        ]);
                    }
                }
                if history {
                    // a database-wide scope lists dropped objects from every
                    // schema, including schemas that are themselves dropped
                    let filter = (!db_wide && schemas.len() == 1).then(|| schemas[0].as_str());
                    for dropped in self.catalog.list_dropped_tables(Some(&db), filter) {
                        let mut parts = dropped.name.splitn(3, '.');
                        let (_, sc, name) = (
                            parts.next().unwrap_or_default().to_string(),
                            parts.next().unwrap_or_default().to_string(),
                            parts.next().unwrap_or_default().to_string(),
                        );
                        rows.push(vec![
                            None,
                            Some(name),
                            Some(db.clone()),
                            Some(sc),
                            Some("TABLE".to_string()),
                            None,
                            Some(dropped.dropped_at.to_rfc3339()),
                        ]);
                    }
                }
                Ok(ResultEnvelope::rows(
                    str_columns(&[
                        "created_on",
                        "name",
                        "database_name",
                        "schema_name",
                        "kind",
                        "rows",
                        "dropped_on",
                    ]),
                    rows,
                ))
            }
            ShowCommand::Views { scope, history } => {
                let db_wide = matches!(&scope, Some(name) if name.schema.is_empty());
                let (db, schemas) = self.show_scope(scope, "SHOW VIEWS")?;
                let mut rows = Vec::new();
                for sc in &schemas {
                    for view in self.catalog.list_views(&db, sc)? {
                        rows.push(vec![
                            Some(view.created_at.to_rfc3339()),
                            Some(view.name),
                            Some(db.clone()),
                            Some(sc.clone()),
                            Some(view.definition),
                            None,
                        ]);
                    }
                }
                if history {
                    let filter = (!db_wide && schemas.len() == 1).then(|| schemas[0].as_str());
                    for dropped in self.catalog.list_dropped_views(Some(&db), filter) {
                        let mut parts = dropped.name.splitn(3, '.');
                        let (_, sc, name) = (
                            parts.next().unwrap_or_default().to_string(),
                            parts.next().unwrap_or_default().to_string(),
                            parts.next().unwrap_or_default().to_string(),
                        );
                        rows.push(vec![
                            None,
                            Some(name),
                            Some(db.clone()),
                            Some(sc),
                            None,
                            Some(dropped.dropped_at.to_rfc3339()),
                        ]);
                    }
                }
                Ok(ResultEnvelope::rows(
                    str_columns(&[
                        "created_on",
                        "name",
                        "database_name",
                        "schema_name",
                        "text",
                        "dropped_on",
                    ]),
                    rows,
                ))
            }
            ShowCommand::Variables => {
                let mut names: Vec<&String> = self.session.variables.keys().collect();
                names.sort();
                let rows = names
                    .into_iter()
                    .map(|name| {
                        vec![
                            Some(name.clone()),
                            self.session.variables.get(name).cloned(),
                        ]
                    })
                    .collect();
                Ok(ResultEnvelope::rows(str_columns(&["name", "value"]), rows))
            }
        }
    }

    /// Resolve a SHOW scope to a database and the schemas to list.
    fn show_scope(
        &self,
        scope: Option<crate::statement::SchemaName>,
        operation: &str,
    ) -> Result<(String, Vec<String>)> {
        match scope {
            None => {
                let db = self
                    .session
                    .database
                    .clone()
                    .ok_or_else(|| Error::NoCurrentDatabase(operation.to_string()))?;
                let sc = self
                    .session
                    .schema
                    .clone()
                    .ok_or_else(|| Error::NoCurrentSchema(operation.to_string()))?;
                Ok((db, vec![sc]))
            }
            // IN DATABASE db: every schema of that database
            Some(name) if name.schema.is_empty() => {
                let db = name
                    .database
                    .ok_or_else(|| Error::NoCurrentDatabase(operation.to_string()))?;
                let schemas = self
                    .catalog
                    .list_schemas(&db)?
                    .into_iter()
                    .map(|s| s.name)
                    .collect();
                Ok((db, schemas))
            }
            Some(name) => {
                let (db, sc) = name.resolve(&self.session, operation)?;
                Ok((db, vec![sc]))
            }
        }
    }

    // ------------------------------------------------------------------
    // DDL
    // ------------------------------------------------------------------

    async fn handle_ddl(&mut self, cmd: DdlCommand) -> Result<ResultEnvelope> {
        match cmd {
            DdlCommand::CreateDatabase {
                name,
                if_not_exists,
            } => {
                if self.catalog.create_database(&name, if_not_exists)? {
                    self.engine.create_database(&name)?;
                    Ok(ResultEnvelope::status(format!(
                        "Database {name} successfully created."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "{name} already exists, statement succeeded."
                    )))
                }
            }
            DdlCommand::DropDatabase {
                name,
                if_exists,
                cascade,
            } => {
                if self.catalog.drop_database(&name, if_exists, cascade)? {
                    self.engine.drop_database(&name);
                    if self.session.database.as_deref() == Some(name.as_str()) {
                        self.session.database = None;
                        self.session.schema = None;
                    }
                    Ok(ResultEnvelope::status(format!(
                        "{name} successfully dropped."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "Drop statement executed successfully ({name} already dropped)."
                    )))
                }
            }
            DdlCommand::UndropDatabase { name } => {
                let entry = self.catalog.undrop_database(&name)?;
                self.engine.create_database(&name)?;
                hydrate_database(&self.engine, &name, &entry).await;
                Ok(ResultEnvelope::status(format!(
                    "Database {name} successfully restored."
                )))
            }
            DdlCommand::CreateSchema {
                name,
                if_not_exists,
            } => {
                let (db, sc) = name.resolve(&self.session, "CREATE SCHEMA")?;
                if self.catalog.create_schema(&db, &sc, if_not_exists)? {
                    self.engine.create_schema(&db, &sc)?;
                    Ok(ResultEnvelope::status(format!(
                        "Schema {sc} successfully created."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "{sc} already exists, statement succeeded."
                    )))
                }
            }
            DdlCommand::DropSchema {
                name,
                if_exists,
                cascade,
            } => {
                let (db, sc) = name.resolve(&self.session, "DROP SCHEMA")?;
                if self.catalog.drop_schema(&db, &sc, if_exists, cascade)? {
                    self.engine.drop_schema(&db, &sc)?;
                    if self.session.database.as_deref() == Some(db.as_str())
                        && self.session.schema.as_deref() == Some(sc.as_str())
                    {
                        self.session.schema = None;
                    }
                    Ok(ResultEnvelope::status(format!(
                        "{sc} successfully dropped."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "Drop statement executed successfully ({sc} already dropped)."
                    )))
                }
            }
            DdlCommand::UndropSchema { name } => {
                let (db, sc) = name.resolve(&self.session, "UNDROP SCHEMA")?;
                let entry = self.catalog.undrop_schema(&db, &sc)?;
                self.engine.create_schema(&db, &sc)?;
                hydrate_schema(&self.engine, &db, &sc, &entry).await;
                Ok(ResultEnvelope::status(format!(
                    "Schema {sc} successfully restored."
                )))
            }
            DdlCommand::CreateTable {
                name,
                body,
                or_replace,
                if_not_exists,
            } => {
                let (db, sc, table) = name.resolve(&self.session, "CREATE TABLE")?;
                self.create_table(&db, &sc, &table, body, or_replace, if_not_exists)
                    .await
            }
            DdlCommand::DropTable { name, if_exists } => {
                let (db, sc, table) = name.resolve(&self.session, "DROP TABLE")?;
                if self.catalog.drop_table(&db, &sc, &table, if_exists)? {
                    self.engine.drop_table(&db, &sc, &table)?;
                    Ok(ResultEnvelope::status(format!(
                        "{table} successfully dropped."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "Drop statement executed successfully ({table} already dropped)."
                    )))
                }
            }
            DdlCommand::UndropTable { name } => {
                let (db, sc, table) = name.resolve(&self.session, "UNDROP TABLE")?;
                let entry = self.catalog.undrop_table(&db, &sc, &table)?;
                self.engine.create_table(&db, &sc, &table, &entry.columns)?;
                Ok(ResultEnvelope::status(format!(
                    "Table {table} successfully restored."
                )))
            }
            DdlCommand::RenameTable { name, new_name } => {
                let (db, sc, old) = name.resolve(&self.session, "ALTER TABLE")?;
                let (new_db, new_sc, new) = new_name.resolve(&self.session, "ALTER TABLE")?;
                if new_db != db || new_sc != sc {
                    return Err(Error::Parse(
                        "RENAME TO cannot move a table to another schema".to_string(),
                    ));
                }
                self.catalog.rename_table(&db, &sc, &old, &new)?;
                self.engine.rename_table(&db, &sc, &old, &new)?;
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            DdlCommand::TruncateTable { name } => {
                let (db, sc, table) = name.resolve(&self.session, "TRUNCATE TABLE")?;
                let info = self.catalog.get_table_info(&db, &sc, &table)?;
                // re-registering an empty table under the same name drops the rows
                self.engine.create_table(&db, &sc, &table, &info.columns)?;
                self.catalog.reset_row_count(&db, &sc, &table)?;
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
            DdlCommand::CreateView {
                name,
                definition,
                or_replace,
            } => {
                let (db, sc, view) = name.resolve(&self.session, "CREATE VIEW")?;
                let prepared = qualify(&translate(&definition), Some(&db), Some(&sc))?;
                self.catalog
                    .create_view(&db, &sc, &view, &definition, or_replace)?;
                self.engine
                    .create_view(&db, &sc, &view, &prepared, or_replace)
                    .await?;
                Ok(ResultEnvelope::status(format!(
                    "View {view} successfully created."
                )))
            }
            DdlCommand::DropView { name, if_exists } => {
                let (db, sc, view) = name.resolve(&self.session, "DROP VIEW")?;
                if self.catalog.drop_view(&db, &sc, &view, if_exists)? {
                    self.engine.drop_view(&db, &sc, &view)?;
                    Ok(ResultEnvelope::status(format!(
                        "{view} successfully dropped."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "Drop statement executed successfully ({view} already dropped)."
                    )))
                }
            }
            DdlCommand::UndropView { name } => {
                let (db, sc, view) = name.resolve(&self.session, "UNDROP VIEW")?;
                let entry = self.catalog.undrop_view(&db, &sc, &view)?;
                let prepared = qualify(&translate(&entry.definition), Some(&db), Some(&sc))?;
                self.engine
                    .create_view(&db, &sc, &view, &prepared, false)
                    .await?;
                Ok(ResultEnvelope::status(format!(
                    "View {view} successfully restored."
                )))
            }
            DdlCommand::Accepted { summary } => {
                tracing::debug!(statement = %summary, "accepted without effect");
                Ok(ResultEnvelope::status("Statement executed successfully."))
            }
        }
    }

    async fn create_table(
        &mut self,
        db: &str,
        sc: &str,
        table: &str,
        body: CreateTableBody,
        or_replace: bool,
        if_not_exists: bool,
    ) -> Result<ResultEnvelope> {
        match body {
            CreateTableBody::Columns(columns) => {
                if self
                    .catalog
                    .create_table(db, sc, table, columns.clone(), or_replace, if_not_exists)?
                {
                    self.engine.create_table(db, sc, table, &columns)?;
                    Ok(ResultEnvelope::status(format!(
                        "Table {table} successfully created."
                    )))
                } else {
                    Ok(ResultEnvelope::status(format!(
                        "{table} already exists, statement succeeded."
                    )))
                }
            }
            CreateTableBody::AsSelect(query) => {
                let prepared = self.prepare(&query)?;
                let (schema, batches) = self.engine.query(&prepared).await?;
                let count = engine::row_count(&batches);
                let columns = engine::schema_to_column_defs(&schema);
                if !self
                    .catalog
                    .create_table(db, sc, table, columns, or_replace, if_not_exists)?
                {
                    return Ok(ResultEnvelope::status(format!(
                        "{table} already exists, statement succeeded."
                    )));
                }
                self.engine
                    .create_table_with_data(db, sc, table, schema, batches)?;
                self.catalog.bump_row_count(db, sc, table, count)?;
                Ok(ResultEnvelope::status(format!(
                    "Table {table} successfully created."
                )))
            }
            CreateTableBody::Clone(source) => {
                let (src_db, src_sc, src) = source.resolve(&self.session, "CREATE TABLE")?;
                let info = self.catalog.get_table_info(&src_db, &src_sc, &src)?;
                let (schema, batches) = self.engine.scan_table(&src_db, &src_sc, &src).await?;
                let count = engine::row_count(&batches);
                if !self
                    .catalog
                    .create_table(db, sc, table, info.columns, or_replace, if_not_exists)?
                {
                    return Ok(ResultEnvelope::status(format!(
                        "{table} already exists, statement succeeded."
                    )));
                }
                self.engine
                    .create_table_with_data(db, sc, table, schema, batches)?;
                self.catalog.bump_row_count(db, sc, table, count)?;
                Ok(ResultEnvelope::status(format!(
                    "Table {table} successfully created."
                )))
            }
        }
    }

    // ------------------------------------------------------------------
    // Generic path
    // ------------------------------------------------------------------

    /// Variable substitution, dialect translation, and name qualification.
    fn prepare(&self, sql: &str) -> Result<String> {
        let substituted = self.session.substitute_variables(sql);
        let translated = translate(&substituted);
        qualify(
            &translated,
            self.session.database.as_deref(),
            self.session.schema.as_deref(),
        )
    }

    async fn handle_generic(
        &mut self,
        sql: &str,
        params: &[ScalarValue],
    ) -> Result<ResultEnvelope> {
        let substituted = self.session.substitute_variables(sql);
        if let Some(query) = info_schema::parse_query(&substituted) {
            let (columns, rows) = info_schema::project(&self.catalog, &self.session, &query)?;
            return Ok(ResultEnvelope::rows(columns, rows));
        }

        let prepared = qualify(
            &translate(&substituted),
            self.session.database.as_deref(),
            self.session.schema.as_deref(),
        )?;

        let verb = prepared
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();
        match verb.as_str() {
            "INSERT" => {
                let batches = self.engine.sql_with_params(&prepared, params).await?;
                let affected = dml_count(&batches);
                self.adjust_row_stats(&prepared, affected);
                Ok(ResultEnvelope::count(affected))
            }
            "DELETE" => self.run_delete(&prepared, params).await,
            "UPDATE" => self.run_update(&prepared, params).await,
            _ => {
                let (schema, batches) = self.engine.query_with_params(&prepared, params).await?;
                let columns = schema
                    .fields()
                    .iter()
                    .map(|f| f.name().to_uppercase())
                    .collect();
                let mut rows = Vec::new();
                for batch in &batches {
                    for row in 0..batch.num_rows() {
                        let mut cells = Vec::with_capacity(batch.num_columns());
                        for col in batch.columns() {
                            cells.push(engine::format_value(col, row)?);
                        }
                        rows.push(cells);
                    }
                }
                Ok(ResultEnvelope::rows(columns, rows))
            }
        }
    }

    /// DELETE is not executable against an in-memory table, so it is
    /// rewritten: the rows that survive the predicate are materialized and
    /// re-registered under the table's name. A row is deleted only when the
    /// predicate is true, so NULL predicates keep their rows.
    async fn run_delete(
        &mut self,
        prepared: &str,
        params: &[ScalarValue],
    ) -> Result<ResultEnvelope> {
        let pattern = regex::Regex::new(
            r"(?is)^DELETE\s+FROM\s+([\w$]+)\.([\w$]+)\.([\w$]+)(?:\s+WHERE\s+(.+))?$",
        )
        .unwrap();
        let cap = pattern
            .captures(prepared)
            .ok_or_else(|| Error::Parse(format!("unsupported DELETE statement: {prepared}")))?;
        let (db, sc, table) = (cap[1].to_string(), cap[2].to_string(), cap[3].to_string());
        let target = format!("{db}.{sc}.{table}");
        let predicate = cap.get(4).map(|m| m.as_str().trim().to_string());

        let (schema, all) = self.engine.scan_table(&db, &sc, &table).await?;
        let before = engine::row_count(&all);
        let (schema, kept) = match &predicate {
            Some(cond) => {
                self.engine
                    .query_with_params(
                        &format!("SELECT * FROM {target} WHERE ({cond}) IS DISTINCT FROM true"),
                        params,
                    )
                    .await?
            }
            None => (schema, Vec::new()),
        };
        let affected = before - engine::row_count(&kept);
        self.engine
            .create_table_with_data(&db, &sc, &table, schema, kept)?;
        if let Err(err) = self.catalog.bump_row_count(&db, &sc, &table, -affected) {
            tracing::warn!(error = %err, "row count adjustment skipped");
        }
        Ok(ResultEnvelope::count(affected))
    }

    /// UPDATE follows the same rewrite: every assignment becomes a CASE
    /// projection over the predicate, cast back to the column's declared
    /// type, and the projected rows replace the table.
    async fn run_update(
        &mut self,
        prepared: &str,
        params: &[ScalarValue],
    ) -> Result<ResultEnvelope> {
        let pattern = regex::Regex::new(
            r"(?is)^UPDATE\s+([\w$]+)\.([\w$]+)\.([\w$]+)\s+SET\s+(.+?)(?:\s+WHERE\s+(.+))?$",
        )
        .unwrap();
        let cap = pattern
            .captures(prepared)
            .ok_or_else(|| Error::Parse(format!("unsupported UPDATE statement: {prepared}")))?;
        let (db, sc, table) = (cap[1].to_string(), cap[2].to_string(), cap[3].to_string());
        let target = format!("{db}.{sc}.{table}");
        let predicate = cap
            .get(5)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| "true".to_string());

        let mut assignments = std::collections::HashMap::new();
        for item in crate::translator::split_top_level_args(&cap[4]) {
            let (column, expr) = item
                .split_once('=')
                .ok_or_else(|| Error::Parse(format!("malformed SET clause: {item}")))?;
            assignments.insert(column.trim().to_lowercase(), expr.trim().to_string());
        }

        let count_batches = self
            .engine
            .sql_with_params(
                &format!("SELECT COUNT(*) FROM {target} WHERE {predicate}"),
                params,
            )
            .await?;
        let affected = dml_count(&count_batches);

        let info = self.catalog.get_table_info(&db, &sc, &table)?;
        let projection = info
            .columns
            .iter()
            .map(|c| {
                let column = c.name.to_lowercase();
                match assignments.get(&column) {
                    Some(expr) => {
                        let cast =
                            engine::arrow_type_to_sql(&engine::dialect_type_to_arrow(&c.data_type));
                        format!(
                            "CASE WHEN {predicate} THEN CAST(({expr}) AS {cast}) \
                             ELSE {column} END AS {column}"
                        )
                    }
                    None => column,
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        let (schema, batches) = self
            .engine
            .query_with_params(&format!("SELECT {projection} FROM {target}"), params)
            .await?;
        self.engine
            .create_table_with_data(&db, &sc, &table, schema, batches)?;
        Ok(ResultEnvelope::count(affected))
    }

    /// Best-effort row-count statistics after INSERT; failures are logged
    /// and ignored since the stats cache is advisory.
    fn adjust_row_stats(&self, prepared: &str, affected: i64) {
        let target = regex::Regex::new(
            r"(?i)\bINTO\s+([A-Za-z_][\w$]*)\.([A-Za-z_][\w$]*)\.([A-Za-z_][\w$]*)",
        )
        .unwrap();
        if let Some(cap) = target.captures(prepared) {
            if let Err(err) = self.catalog.bump_row_count(&cap[1], &cap[2], &cap[3], affected) {
                tracing::warn!(error = %err, "row count adjustment skipped");
            }
        }
    }
}

/// Affected-row count from a DML result. The engine reports one row with a
/// single count column.
fn dml_count(batches: &[datafusion::arrow::array::RecordBatch]) -> i64 {
    let Some(batch) = batches.first() else {
        return 0;
    };
    if batch.num_rows() == 0 || batch.num_columns() == 0 {
        return 0;
    }
    engine::format_value(batch.column(0), 0)
        .ok()
        .flatten()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn str_columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn last_name_part(fqn: &str) -> String {
    fqn.rsplit('.').next().unwrap_or(fqn).to_string()
}

/// Recreate one database's schemas, tables, and views on the engine.
/// Tables come back empty; view definitions re-qualify against their own
/// namespace. A view that no longer resolves is skipped with a warning.
async fn hydrate_database(engine: &Engine, db: &str, database: &DatabaseEntry) {
    for (sc, schema) in &database.schemas {
        if !sc.eq_ignore_ascii_case("PUBLIC") {
            if let Err(err) = engine.create_schema(db, sc) {
                tracing::warn!(schema = %sc, error = %err, "schema hydration failed");
                continue;
            }
        }
        hydrate_schema(engine, db, sc, schema).await;
    }
}

async fn hydrate_schema(engine: &Engine, db: &str, sc: &str, schema: &SchemaEntry) {
    for (table, entry) in &schema.tables {
        if let Err(err) = engine.create_table(db, sc, table, &entry.columns) {
            tracing::warn!(table = %table, error = %err, "table hydration failed");
        }
    }
    for (view, entry) in &schema.views {
        let prepared = match qualify(&translate(&entry.definition), Some(db), Some(sc)) {
            Ok(sql) => sql,
            Err(err) => {
                tracing::warn!(view = %view, error = %err, "view hydration failed");
                continue;
            }
        };
        if let Err(err) = engine.create_view(db, sc, view, &prepared, false).await {
            tracing::warn!(view = %view, error = %err, "view hydration failed");
        }
    }
}
