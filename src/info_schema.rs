//! INFORMATION_SCHEMA projection
//!
//! Queries against `INFORMATION_SCHEMA` views are answered from the catalog
//! store instead of the engine, so they see soft-deleted state and catalog
//! metadata the engine does not track. Supported views and their fixed
//! column layouts:
//!
//! - `DATABASES(DATABASE_NAME, CREATED)`
//! - `SCHEMATA(CATALOG_NAME, SCHEMA_NAME, CREATED)`
//! - `TABLES(TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE, ROW_COUNT, CREATED)`
//! - `VIEWS(TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, VIEW_DEFINITION, CREATED)`
//! - `COLUMNS(TABLE_CATALOG, TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, ORDINAL_POSITION, DATA_TYPE, IS_NULLABLE)`
//!
//! Only simple `column = 'literal'` predicates are honored; anything else
//! in the WHERE clause is ignored. Comparisons are case-insensitive since
//! catalog names are stored upper-cased.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::catalog::CatalogStore;
use crate::error::{Error, Result};
use crate::session::Session;

/// A recognized INFORMATION_SCHEMA query, reduced to the parts the
/// projector acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoSchemaQuery {
    /// View name, upper-cased.
    pub view: String,
    /// Database qualifier, if the reference was `db.information_schema.v`.
    pub database: Option<String>,
    /// `column = 'value'` predicates from the WHERE clause.
    pub filters: Vec<(String, String)>,
}

/// Detect and decompose an INFORMATION_SCHEMA query. Returns `None` when
/// the statement does not reference an INFORMATION_SCHEMA view.
pub fn parse_query(sql: &str) -> Option<InfoSchemaQuery> {
    let from = Regex::new(
        r"(?i)\bFROM\s+(?:([A-Za-z_][\w$]*)\.)?INFORMATION_SCHEMA\.([A-Za-z_][\w$]*)",
    )
    .unwrap();
    let cap = from.captures(sql)?;
    let database = cap.get(1).map(|m| m.as_str().to_uppercase());
    let view = cap[2].to_uppercase();

    let mut filters = Vec::new();
    let where_clause = Regex::new(r"(?is)\bWHERE\s+(.+)$").unwrap();
    if let Some(cap) = where_clause.captures(sql) {
        let eq = Regex::new(r"(?i)([A-Za-z_][\w$]*)\s*=\s*'([^']*)'").unwrap();
        for m in eq.captures_iter(&cap[1]) {
            filters.push((m[1].to_uppercase(), m[2].to_string()));
        }
    }

    Some(InfoSchemaQuery {
        view,
        database,
        filters,
    })
}

/// A projected result: fixed column headers plus string-encoded rows.
pub type Projection = (Vec<String>, Vec<Vec<Option<String>>>);

fn created(ts: DateTime<Utc>) -> Option<String> {
    Some(ts.to_rfc3339())
}

/// Answer an INFORMATION_SCHEMA query from the catalog.
pub fn project(
    catalog: &CatalogStore,
    session: &Session,
    query: &InfoSchemaQuery,
) -> Result<Projection> {
    let (columns, mut rows) = match query.view.as_str() {
        "DATABASES" => project_databases(catalog),
        "SCHEMATA" => project_schemata(catalog, scoped_database(query, session)?),
        "TABLES" => project_tables(catalog, scoped_database(query, session)?)?,
        "VIEWS" => project_views(catalog, scoped_database(query, session)?)?,
        "COLUMNS" => project_columns(catalog, scoped_database(query, session)?)?,
        other => return Err(Error::UnknownView(other.to_string())),
    };

    for (name, value) in &query.filters {
        let Some(idx) = columns.iter().position(|c| c == name) else {
            continue;
        };
        rows.retain(|row| {
            row[idx]
                .as_deref()
                .map(|cell| cell.eq_ignore_ascii_case(value))
                .unwrap_or(false)
        });
    }

    Ok((columns, rows))
}

/// The database a scoped view reads from: the query's qualifier wins, then
/// the session's current database. `DATABASES` itself is account-level and
/// never calls this.
fn scoped_database(query: &InfoSchemaQuery, session: &Session) -> Result<String> {
    if let Some(db) = &query.database {
        return Ok(db.clone());
    }
    session
        .database
        .clone()
        .ok_or_else(|| Error::NoCurrentDatabase(format!("INFORMATION_SCHEMA.{}", query.view)))
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn project_databases(catalog: &CatalogStore) -> Projection {
    let rows = catalog
        .list_databases()
        .into_iter()
        .map(|db| vec![Some(db.name), created(db.created_at)])
        .collect();
    (headers(&["DATABASE_NAME", "CREATED"]), rows)
}

fn project_schemata(catalog: &CatalogStore, database: String) -> Projection {
    let rows = catalog
        .list_schemas(&database)
        .unwrap_or_default()
        .into_iter()
        .map(|sc| {
            vec![
                Some(database.clone()),
                Some(sc.name),
                created(sc.created_at),
            ]
        })
        .collect();
    (headers(&["CATALOG_NAME", "SCHEMA_NAME", "CREATED"]), rows)
}

fn project_tables(catalog: &CatalogStore, database: String) -> Result<Projection> {
    let mut rows = Vec::new();
    for schema in catalog.list_schemas(&database)? {
        for table in catalog.list_tables(&database, &schema.name)? {
            rows.push(vec![
                Some(database.clone()),
                Some(schema.name.clone()),
                Some(table.name),
                Some("BASE TABLE".to_string()),
                Some(table.row_count.to_string()),
                created(table.created_at),
            ]);
        }
        for view in catalog.list_views(&database, &schema.name)? {
            rows.push(vec![
                Some(database.clone()),
                Some(schema.name.clone()),
                Some(view.name),
                Some("VIEW".to_string()),
                None,
                created(view.created_at),
            ]);
        }
    }
    Ok((
        headers(&[
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "TABLE_TYPE",
            "ROW_COUNT",
            "CREATED",
        ]),
        rows,
    ))
}

fn project_views(catalog: &CatalogStore, database: String) -> Result<Projection> {
    let mut rows = Vec::new();
    for schema in catalog.list_schemas(&database)? {
        for view in catalog.list_views(&database, &schema.name)? {
            rows.push(vec![
                Some(database.clone()),
                Some(schema.name.clone()),
                Some(view.name),
                Some(view.definition),
                created(view.created_at),
            ]);
        }
    }
    Ok((
        headers(&[
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "VIEW_DEFINITION",
            "CREATED",
        ]),
        rows,
    ))
}

fn project_columns(catalog: &CatalogStore, database: String) -> Result<Projection> {
    let mut rows = Vec::new();
    for schema in catalog.list_schemas(&database)? {
        for table in catalog.list_tables(&database, &schema.name)? {
            for (i, column) in table.columns.iter().enumerate() {
                rows.push(vec![
                    Some(database.clone()),
                    Some(schema.name.clone()),
                    Some(table.name.clone()),
                    Some(column.name.clone()),
                    Some((i + 1).to_string()),
                    Some(column.data_type.clone()),
                    Some(if column.nullable { "YES" } else { "NO" }.to_string()),
                ]);
            }
        }
    }
    Ok((
        headers(&[
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "COLUMN_NAME",
            "ORDINAL_POSITION",
            "DATA_TYPE",
            "IS_NULLABLE",
        ]),
        rows,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;

    fn fixture() -> (tempfile::TempDir, CatalogStore) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CatalogStore::open(dir.path()).unwrap();
        catalog.create_database("sales", false).unwrap();
        catalog
            .create_table(
                "sales",
                "public",
                "orders",
                vec![
                    ColumnDef {
                        name: "ID".to_string(),
                        data_type: "INT".to_string(),
                        nullable: false,
                    },
                    ColumnDef {
                        name: "NOTE".to_string(),
                        data_type: "VARCHAR".to_string(),
                        nullable: true,
                    },
                ],
                false,
                false,
            )
            .unwrap();
        catalog
            .create_view("sales", "public", "recent", "SELECT * FROM orders", false)
            .unwrap();
        (dir, catalog)
    }

    fn session() -> Session {
        let mut s = Session::new();
        s.use_database("sales");
        s
    }

    #[test]
    fn parse_extracts_view_scope_and_filters() {
        let q = parse_query(
            "SELECT * FROM other.information_schema.tables WHERE table_name = 'ORDERS'",
        )
        .unwrap();
        assert_eq!(q.view, "TABLES");
        assert_eq!(q.database.as_deref(), Some("OTHER"));
        assert_eq!(
            q.filters,
            vec![("TABLE_NAME".to_string(), "ORDERS".to_string())]
        );

        assert!(parse_query("SELECT * FROM orders").is_none());
    }

    #[test]
    fn tables_view_lists_tables_and_views() {
        let (_dir, catalog) = fixture();
        let q = parse_query("SELECT * FROM information_schema.tables").unwrap();
        let (columns, rows) = project(&catalog, &session(), &q).unwrap();
        assert_eq!(columns[3], "TABLE_TYPE");
        assert_eq!(rows.len(), 2);
        let types: Vec<_> = rows.iter().map(|r| r[3].clone().unwrap()).collect();
        assert!(types.contains(&"BASE TABLE".to_string()));
        assert!(types.contains(&"VIEW".to_string()));
    }

    #[test]
    fn filters_are_case_insensitive() {
        let (_dir, catalog) = fixture();
        let q = parse_query(
            "SELECT * FROM information_schema.tables WHERE table_name = 'orders'",
        )
        .unwrap();
        let (_, rows) = project(&catalog, &session(), &q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2].as_deref(), Some("ORDERS"));
    }

    #[test]
    fn columns_view_reports_ordinal_and_nullability() {
        let (_dir, catalog) = fixture();
        let q = parse_query(
            "SELECT * FROM information_schema.columns WHERE table_name = 'ORDERS'",
        )
        .unwrap();
        let (_, rows) = project(&catalog, &session(), &q).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][4].as_deref(), Some("1"));
        assert_eq!(rows[0][6].as_deref(), Some("NO"));
        assert_eq!(rows[1][6].as_deref(), Some("YES"));
    }

    #[test]
    fn scoped_views_need_a_database() {
        let (_dir, catalog) = fixture();
        let q = parse_query("SELECT * FROM information_schema.schemata").unwrap();
        assert!(matches!(
            project(&catalog, &Session::new(), &q),
            Err(Error::NoCurrentDatabase(_))
        ));
        // DATABASES is account-level
        let q = parse_query("SELECT * FROM information_schema.databases").unwrap();
        let (_, rows) = project(&catalog, &Session::new(), &q).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unknown_view_is_an_error() {
        let (_dir, catalog) = fixture();
        let q = parse_query("SELECT * FROM information_schema.nope").unwrap();
        assert!(matches!(
            project(&catalog, &session(), &q),
            Err(Error::UnknownView(_))
        ));
    }
}
