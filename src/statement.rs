//! Statement classification
//!
//! Every incoming statement is classified exactly once, in a fixed order:
//! session and introspection commands first, then the DDL the emulator
//! handles itself, and whatever is left flows to the engine as a generic
//! statement. The classifier only recognizes shapes; executing them is the
//! dispatcher's job.

use regex::Regex;

use crate::catalog::ColumnDef;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::translator::split_top_level_args;

/// A possibly-partial dotted object name as written in the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    /// Parse `name`, `schema.name`, or `database.schema.name`. Parts are
    /// upper-cased to the catalog's case convention.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.trim().split('.').collect();
        match parts.as_slice() {
            [name] => Ok(Self {
                database: None,
                schema: None,
                name: name.trim().to_uppercase(),
            }),
            [schema, name] => Ok(Self {
                database: None,
                schema: Some(schema.trim().to_uppercase()),
                name: name.trim().to_uppercase(),
            }),
            [database, schema, name] => Ok(Self {
                database: Some(database.trim().to_uppercase()),
                schema: Some(schema.trim().to_uppercase()),
                name: name.trim().to_uppercase(),
            }),
            _ => Err(Error::Parse(format!("invalid object name: '{text}'"))),
        }
    }

    /// Fill missing parts from the session context. `operation` names the
    /// statement for the missing-context error message.
    pub fn resolve(&self, session: &Session, operation: &str) -> Result<(String, String, String)> {
        let database = match &self.database {
            Some(db) => db.clone(),
            None => session
                .database
                .clone()
                .ok_or_else(|| Error::NoCurrentDatabase(operation.to_string()))?,
        };
        let schema = match &self.schema {
            Some(sc) => sc.clone(),
            None => session
                .schema
                .clone()
                .ok_or_else(|| Error::NoCurrentSchema(operation.to_string()))?,
        };
        Ok((database, schema, self.name.clone()))
    }
}

/// A schema name as written: `schema` or `database.schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaName {
    pub database: Option<String>,
    pub schema: String,
}

impl SchemaName {
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.trim().split('.').collect();
        match parts.as_slice() {
            [schema] => Ok(Self {
                database: None,
                schema: schema.trim().to_uppercase(),
            }),
            [database, schema] => Ok(Self {
                database: Some(database.trim().to_uppercase()),
                schema: schema.trim().to_uppercase(),
            }),
            _ => Err(Error::Parse(format!("invalid schema name: '{text}'"))),
        }
    }

    pub fn resolve(&self, session: &Session, operation: &str) -> Result<(String, String)> {
        let database = match &self.database {
            Some(db) => db.clone(),
            None => session
                .database
                .clone()
                .ok_or_else(|| Error::NoCurrentDatabase(operation.to_string()))?,
        };
        Ok((database, self.schema.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    CurrentDatabase,
    CurrentSchema,
    CurrentWarehouse,
    CurrentRole,
    CurrentVersion,
}

impl Probe {
    /// The exact column header the probe reports under.
    pub fn column_name(&self) -> &'static str {
        match self {
            Probe::CurrentDatabase => "CURRENT_DATABASE()",
            Probe::CurrentSchema => "CURRENT_SCHEMA()",
            Probe::CurrentWarehouse => "CURRENT_WAREHOUSE()",
            Probe::CurrentRole => "CURRENT_ROLE()",
            Probe::CurrentVersion => "CURRENT_VERSION()",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowCommand {
    Databases {
        history: bool,
    },
    Schemas {
        database: Option<String>,
        history: bool,
    },
    Tables {
        scope: Option<SchemaName>,
        history: bool,
    },
    Views {
        scope: Option<SchemaName>,
        history: bool,
    },
    Variables,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    UseDatabase(String),
    UseSchema(SchemaName),
    UseWarehouse(String),
    UseRole(String),
    SetVariable { name: String, value: String },
    UnsetVariable { name: String },
    Show(ShowCommand),
    Describe(ObjectName),
    SelectProbes(Vec<Probe>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateTableBody {
    Columns(Vec<ColumnDef>),
    AsSelect(String),
    Clone(ObjectName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlCommand {
    CreateDatabase {
        name: String,
        if_not_exists: bool,
    },
    DropDatabase {
        name: String,
        if_exists: bool,
        cascade: bool,
    },
    UndropDatabase {
        name: String,
    },
    CreateSchema {
        name: SchemaName,
        if_not_exists: bool,
    },
    DropSchema {
        name: SchemaName,
        if_exists: bool,
        cascade: bool,
    },
    UndropSchema {
        name: SchemaName,
    },
    CreateTable {
        name: ObjectName,
        body: CreateTableBody,
        or_replace: bool,
        if_not_exists: bool,
    },
    DropTable {
        name: ObjectName,
        if_exists: bool,
    },
    UndropTable {
        name: ObjectName,
    },
    RenameTable {
        name: ObjectName,
        new_name: ObjectName,
    },
    TruncateTable {
        name: ObjectName,
    },
    CreateView {
        name: ObjectName,
        definition: String,
        or_replace: bool,
    },
    DropView {
        name: ObjectName,
        if_exists: bool,
    },
    UndropView {
        name: ObjectName,
    },
    /// Statements accepted for client compatibility but with no local
    /// effect: stages, file formats, warehouses, grants, transactions.
    Accepted {
        summary: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Session(SessionCommand),
    Ddl(DdlCommand),
    Generic(String),
}

/// Classify one statement. Trailing semicolons are ignored.
pub fn classify(sql: &str) -> Result<Statement> {
    let sql = sql.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        return Err(Error::Parse("empty statement".to_string()));
    }

    if let Some(cmd) = classify_session(sql)? {
        return Ok(Statement::Session(cmd));
    }
    if let Some(cmd) = classify_ddl(sql)? {
        return Ok(Statement::Ddl(cmd));
    }
    Ok(Statement::Generic(sql.to_string()))
}

const IDENT: &str = r#"[A-Za-z_][\w$]*"#;

fn dotted(max_parts: usize) -> String {
    format!(r"{IDENT}(?:\.{IDENT}){{0,{}}}", max_parts - 1)
}

fn classify_session(sql: &str) -> Result<Option<SessionCommand>> {
    let use_pattern = Regex::new(&format!(
        r"(?i)^USE\s+(?:(DATABASE|SCHEMA|WAREHOUSE|ROLE)\s+)?({})$",
        dotted(2)
    ))
    .unwrap();
    if let Some(cap) = use_pattern.captures(sql) {
        let target = cap[2].to_string();
        let kind = cap
            .get(1)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "DATABASE".to_string());
        return Ok(Some(match kind.as_str() {
            "SCHEMA" => SessionCommand::UseSchema(SchemaName::parse(&target)?),
            "WAREHOUSE" => SessionCommand::UseWarehouse(target.to_uppercase()),
            "ROLE" => SessionCommand::UseRole(target.to_uppercase()),
            _ => {
                if target.contains('.') {
                    return Err(Error::Parse(format!("invalid database name: '{target}'")));
                }
                SessionCommand::UseDatabase(target.to_uppercase())
            }
        }));
    }

    let set_pattern = Regex::new(&format!(r"(?i)^SET\s+({IDENT})\s*=\s*(.+)$")).unwrap();
    if let Some(cap) = set_pattern.captures(sql) {
        return Ok(Some(SessionCommand::SetVariable {
            name: cap[1].to_uppercase(),
            value: cap[2].trim().to_string(),
        }));
    }
    let unset_pattern = Regex::new(&format!(r"(?i)^UNSET\s+({IDENT})$")).unwrap();
    if let Some(cap) = unset_pattern.captures(sql) {
        return Ok(Some(SessionCommand::UnsetVariable {
            name: cap[1].to_uppercase(),
        }));
    }

    if let Some(show) = classify_show(sql)? {
        return Ok(Some(SessionCommand::Show(show)));
    }

    let describe_pattern = Regex::new(&format!(
        r"(?i)^(?:DESCRIBE|DESC)\s+(?:TABLE\s+|VIEW\s+)?({})$",
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = describe_pattern.captures(sql) {
        return Ok(Some(SessionCommand::Describe(ObjectName::parse(&cap[1])?)));
    }

    if let Some(probes) = parse_probes(sql) {
        return Ok(Some(SessionCommand::SelectProbes(probes)));
    }

    Ok(None)
}

/// `SELECT CURRENT_DATABASE()[, CURRENT_SCHEMA(), ...]` with nothing else.
fn parse_probes(sql: &str) -> Option<Vec<Probe>> {
    let select = Regex::new(r"(?i)^SELECT\s+(.+)$").unwrap();
    let list = select.captures(sql)?.get(1)?.as_str().to_string();
    let item = Regex::new(
        r"(?i)^CURRENT_(DATABASE|SCHEMA|WAREHOUSE|ROLE|VERSION)\s*\(\s*\)$",
    )
    .unwrap();

    let mut probes = Vec::new();
    for part in split_top_level_args(&list) {
        let cap = item.captures(part.trim())?;
        probes.push(match cap[1].to_uppercase().as_str() {
            "DATABASE" => Probe::CurrentDatabase,
            "SCHEMA" => Probe::CurrentSchema,
            "WAREHOUSE" => Probe::CurrentWarehouse,
            "ROLE" => Probe::CurrentRole,
            _ => Probe::CurrentVersion,
        });
    }
    if probes.is_empty() {
        return None;
    }
    Some(probes)
}

fn classify_show(sql: &str) -> Result<Option<ShowCommand>> {
    let show_pattern = Regex::new(&format!(
        r"(?i)^SHOW\s+(DATABASES|SCHEMAS|TABLES|VIEWS|VARIABLES)(\s+HISTORY)?(?:\s+IN\s+(?:(DATABASE|SCHEMA)\s+)?({}))?$",
        dotted(2)
    ))
    .unwrap();
    let Some(cap) = show_pattern.captures(sql) else {
        return Ok(None);
    };
    let history = cap.get(2).is_some();
    let scope_kind = cap.get(3).map(|m| m.as_str().to_uppercase());
    let scope_name = cap.get(4).map(|m| m.as_str().to_string());

    let object = cap[1].to_uppercase();
    let command = match object.as_str() {
        "DATABASES" => {
            if scope_name.is_some() {
                return Err(Error::Parse("SHOW DATABASES takes no IN clause".to_string()));
            }
            ShowCommand::Databases { history }
        }
        "SCHEMAS" => {
            let database = match &scope_name {
                Some(name) if name.contains('.') => {
                    return Err(Error::Parse(format!("invalid database name: '{name}'")));
                }
                Some(name) => Some(name.to_uppercase()),
                None => None,
            };
            ShowCommand::Schemas { database, history }
        }
        "TABLES" | "VIEWS" => {
            let scope = match (&scope_kind, &scope_name) {
                (_, None) => None,
                (Some(kind), Some(name)) if kind == "DATABASE" => {
                    // database scope: every schema of that database
                    if name.contains('.') {
                        return Err(Error::Parse(format!("invalid database name: '{name}'")));
                    }
                    Some(SchemaName {
                        database: Some(name.to_uppercase()),
                        schema: String::new(),
                    })
                }
                (_, Some(name)) => Some(SchemaName::parse(name)?),
            };
            if object == "TABLES" {
                ShowCommand::Tables { scope, history }
            } else {
                ShowCommand::Views { scope, history }
            }
        }
        _ => {
            if history || scope_name.is_some() {
                return Err(Error::Parse("SHOW VARIABLES takes no modifiers".to_string()));
            }
            ShowCommand::Variables
        }
    };
    Ok(Some(command))
}

fn classify_ddl(sql: &str) -> Result<Option<DdlCommand>> {
    // statements accepted but without local effect
    let accepted_pattern = Regex::new(
        r"(?i)^(?:(?:CREATE(?:\s+OR\s+REPLACE)?|DROP|ALTER)\s+(?:STAGE|FILE\s+FORMAT|PIPE|WAREHOUSE|ROLE|USER|SEQUENCE|TAG)\b|GRANT\b|REVOKE\b|BEGIN\b|COMMIT\b|ROLLBACK\b|ALTER\s+SESSION\b)",
    )
    .unwrap();
    if accepted_pattern.is_match(sql) {
        let summary = sql.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
        return Ok(Some(DdlCommand::Accepted { summary }));
    }

    let create_db = Regex::new(&format!(
        r"(?i)^CREATE\s+(?:OR\s+REPLACE\s+)?(?:TRANSIENT\s+)?DATABASE\s+(IF\s+NOT\s+EXISTS\s+)?({IDENT})\s*$"
    ))
    .unwrap();
    if let Some(cap) = create_db.captures(sql) {
        return Ok(Some(DdlCommand::CreateDatabase {
            name: cap[2].to_uppercase(),
            if_not_exists: cap.get(1).is_some(),
        }));
    }
    let drop_db = Regex::new(&format!(
        r"(?i)^DROP\s+DATABASE\s+(IF\s+EXISTS\s+)?({IDENT})(\s+CASCADE|\s+RESTRICT)?\s*$"
    ))
    .unwrap();
    if let Some(cap) = drop_db.captures(sql) {
        let cascade = cap
            .get(3)
            .map(|m| m.as_str().trim().eq_ignore_ascii_case("CASCADE"))
            .unwrap_or(false);
        return Ok(Some(DdlCommand::DropDatabase {
            name: cap[2].to_uppercase(),
            if_exists: cap.get(1).is_some(),
            cascade,
        }));
    }
    let undrop_db = Regex::new(&format!(r"(?i)^UNDROP\s+DATABASE\s+({IDENT})\s*$")).unwrap();
    if let Some(cap) = undrop_db.captures(sql) {
        return Ok(Some(DdlCommand::UndropDatabase {
            name: cap[1].to_uppercase(),
        }));
    }

    let create_schema = Regex::new(&format!(
        r"(?i)^CREATE\s+(?:OR\s+REPLACE\s+)?(?:TRANSIENT\s+)?SCHEMA\s+(IF\s+NOT\s+EXISTS\s+)?({})\s*$",
        dotted(2)
    ))
    .unwrap();
    if let Some(cap) = create_schema.captures(sql) {
        return Ok(Some(DdlCommand::CreateSchema {
            name: SchemaName::parse(&cap[2])?,
            if_not_exists: cap.get(1).is_some(),
        }));
    }
    let drop_schema = Regex::new(&format!(
        r"(?i)^DROP\s+SCHEMA\s+(IF\s+EXISTS\s+)?({})(\s+CASCADE|\s+RESTRICT)?\s*$",
        dotted(2)
    ))
    .unwrap();
    if let Some(cap) = drop_schema.captures(sql) {
        let cascade = cap
            .get(3)
            .map(|m| m.as_str().trim().eq_ignore_ascii_case("CASCADE"))
            .unwrap_or(false);
        return Ok(Some(DdlCommand::DropSchema {
            name: SchemaName::parse(&cap[2])?,
            if_exists: cap.get(1).is_some(),
            cascade,
        }));
    }
    let undrop_schema =
        Regex::new(&format!(r"(?i)^UNDROP\s+SCHEMA\s+({})\s*$", dotted(2))).unwrap();
    if let Some(cap) = undrop_schema.captures(sql) {
        return Ok(Some(DdlCommand::UndropSchema {
            name: SchemaName::parse(&cap[1])?,
        }));
    }

    let create_table = Regex::new(&format!(
        r"(?is)^CREATE\s+(OR\s+REPLACE\s+)?(?:(?:LOCAL|GLOBAL|TEMP|TEMPORARY|TRANSIENT)\s+)*TABLE\s+(IF\s+NOT\s+EXISTS\s+)?({})\s*(.*)$",
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = create_table.captures(sql) {
        let name = ObjectName::parse(&cap[3])?;
        let body = parse_create_table_body(cap[4].trim())?;
        return Ok(Some(DdlCommand::CreateTable {
            name,
            body,
            or_replace: cap.get(1).is_some(),
            if_not_exists: cap.get(2).is_some(),
        }));
    }
    let drop_table = Regex::new(&format!(
        r"(?i)^DROP\s+TABLE\s+(IF\s+EXISTS\s+)?({})(\s+CASCADE|\s+RESTRICT)?\s*$",
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = drop_table.captures(sql) {
        return Ok(Some(DdlCommand::DropTable {
            name: ObjectName::parse(&cap[2])?,
            if_exists: cap.get(1).is_some(),
        }));
    }
    let undrop_table =
        Regex::new(&format!(r"(?i)^UNDROP\s+TABLE\s+({})\s*$", dotted(3))).unwrap();
    if let Some(cap) = undrop_table.captures(sql) {
        return Ok(Some(DdlCommand::UndropTable {
            name: ObjectName::parse(&cap[1])?,
        }));
    }
    let rename_table = Regex::new(&format!(
        r"(?i)^ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?({})\s+RENAME\s+TO\s+({})\s*$",
        dotted(3),
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = rename_table.captures(sql) {
        return Ok(Some(DdlCommand::RenameTable {
            name: ObjectName::parse(&cap[1])?,
            new_name: ObjectName::parse(&cap[2])?,
        }));
    }
    let truncate = Regex::new(&format!(
        r"(?i)^TRUNCATE\s+(?:TABLE\s+)?(?:IF\s+EXISTS\s+)?({})\s*$",
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = truncate.captures(sql) {
        return Ok(Some(DdlCommand::TruncateTable {
            name: ObjectName::parse(&cap[1])?,
        }));
    }

    let create_view = Regex::new(&format!(
        r"(?is)^CREATE\s+(OR\s+REPLACE\s+)?VIEW\s+({})\s+AS\s+(.+)$",
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = create_view.captures(sql) {
        return Ok(Some(DdlCommand::CreateView {
            name: ObjectName::parse(&cap[2])?,
            definition: cap[3].trim().to_string(),
            or_replace: cap.get(1).is_some(),
        }));
    }
    let drop_view = Regex::new(&format!(
        r"(?i)^DROP\s+VIEW\s+(IF\s+EXISTS\s+)?({})\s*$",
        dotted(3)
    ))
    .unwrap();
    if let Some(cap) = drop_view.captures(sql) {
        return Ok(Some(DdlCommand::DropView {
            name: ObjectName::parse(&cap[2])?,
            if_exists: cap.get(1).is_some(),
        }));
    }
    let undrop_view = Regex::new(&format!(r"(?i)^UNDROP\s+VIEW\s+({})\s*$", dotted(3))).unwrap();
    if let Some(cap) = undrop_view.captures(sql) {
        return Ok(Some(DdlCommand::UndropView {
            name: ObjectName::parse(&cap[1])?,
        }));
    }

    Ok(None)
}

fn parse_create_table_body(body: &str) -> Result<CreateTableBody> {
    if let Some(rest) = body.strip_prefix('(') {
        let close = matching_close(body).ok_or_else(|| {
            Error::Parse("unbalanced parentheses in column list".to_string())
        })?;
        let columns = parse_column_defs(&rest[..close - 1])?;
        return Ok(CreateTableBody::Columns(columns));
    }

    let as_select = Regex::new(r"(?is)^AS\s+(.+)$").unwrap();
    if let Some(cap) = as_select.captures(body) {
        return Ok(CreateTableBody::AsSelect(cap[1].trim().to_string()));
    }

    let clone = Regex::new(&format!(r"(?i)^CLONE\s+({})\s*$", dotted(3))).unwrap();
    if let Some(cap) = clone.captures(body) {
        return Ok(CreateTableBody::Clone(ObjectName::parse(&cap[1])?));
    }

    Err(Error::Parse(format!(
        "expected column list, AS SELECT, or CLONE after table name, got: '{body}'"
    )))
}

/// Index just past the `)` matching the leading `(` of `text`.
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Stop words that end a column's type text.
const TYPE_TERMINATORS: &[&str] = &[
    "NOT",
    "NULL",
    "DEFAULT",
    "PRIMARY",
    "UNIQUE",
    "COMMENT",
    "AUTOINCREMENT",
    "IDENTITY",
    "REFERENCES",
    "CHECK",
    "COLLATE",
];

const TABLE_CONSTRAINTS: &[&str] = &["PRIMARY", "UNIQUE", "FOREIGN", "CONSTRAINT", "CHECK", "KEY"];

fn parse_column_defs(list: &str) -> Result<Vec<ColumnDef>> {
    let mut columns = Vec::new();
    for item in split_top_level_args(list) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let Some(first) = item.split_whitespace().next() else {
            continue;
        };
        if TABLE_CONSTRAINTS
            .iter()
            .any(|kw| first.eq_ignore_ascii_case(kw))
        {
            continue;
        }
        let name = first.to_uppercase();
        let rest = item[first.len()..].trim();
        if rest.is_empty() {
            return Err(Error::Parse(format!("column '{name}' has no type")));
        }
        let (type_text, modifiers) = split_type_and_modifiers(rest);
        if type_text.is_empty() {
            return Err(Error::Parse(format!("column '{name}' has no type")));
        }
        let nullable = !Regex::new(r"(?i)\bNOT\s+NULL\b")
            .unwrap()
            .is_match(&modifiers);
        columns.push(ColumnDef {
            name,
            data_type: type_text.to_uppercase(),
            nullable,
        });
    }
    if columns.is_empty() {
        return Err(Error::Parse("empty column list".to_string()));
    }
    Ok(columns)
}

/// Split `DECIMAL(10, 2) NOT NULL DEFAULT 0` into the type text and the
/// trailing modifiers. The boundary is the first terminator keyword at
/// parenthesis depth zero.
fn split_type_and_modifiers(rest: &str) -> (String, String) {
    let mut depth = 0usize;
    let mut in_string = false;
    let bytes = rest.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => depth = depth.saturating_sub(1),
            c if !in_string
                && depth == 0
                && (c.is_ascii_alphabetic() || c == b'_')
                && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric() && bytes[i - 1] != b'_') =>
            {
                let mut j = i;
                while j < bytes.len()
                    && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_')
                {
                    j += 1;
                }
                let word = &rest[i..j];
                if TYPE_TERMINATORS
                    .iter()
                    .any(|kw| word.eq_ignore_ascii_case(kw))
                {
                    return (rest[..i].trim().to_string(), rest[i..].trim().to_string());
                }
                i = j;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    (rest.trim().to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_ok(sql: &str) -> Statement {
        classify(sql).unwrap()
    }

    #[test]
    fn use_forms() {
        assert_eq!(
            classify_ok("USE DATABASE sales;"),
            Statement::Session(SessionCommand::UseDatabase("SALES".to_string()))
        );
        assert_eq!(
            classify_ok("USE sales"),
            Statement::Session(SessionCommand::UseDatabase("SALES".to_string()))
        );
        assert_eq!(
            classify_ok("use schema sales.staging"),
            Statement::Session(SessionCommand::UseSchema(SchemaName {
                database: Some("SALES".to_string()),
                schema: "STAGING".to_string(),
            }))
        );
        assert_eq!(
            classify_ok("USE WAREHOUSE compute_wh"),
            Statement::Session(SessionCommand::UseWarehouse("COMPUTE_WH".to_string()))
        );
    }

    #[test]
    fn set_keeps_raw_value_text() {
        assert_eq!(
            classify_ok("SET min_id = 10"),
            Statement::Session(SessionCommand::SetVariable {
                name: "MIN_ID".to_string(),
                value: "10".to_string(),
            })
        );
        assert_eq!(
            classify_ok("SET label = 'a b c'"),
            Statement::Session(SessionCommand::SetVariable {
                name: "LABEL".to_string(),
                value: "'a b c'".to_string(),
            })
        );
    }

    #[test]
    fn show_forms() {
        assert_eq!(
            classify_ok("SHOW DATABASES HISTORY"),
            Statement::Session(SessionCommand::Show(ShowCommand::Databases {
                history: true
            }))
        );
        assert_eq!(
            classify_ok("SHOW TABLES IN SCHEMA sales.staging"),
            Statement::Session(SessionCommand::Show(ShowCommand::Tables {
                scope: Some(SchemaName {
                    database: Some("SALES".to_string()),
                    schema: "STAGING".to_string(),
                }),
                history: false,
            }))
        );
        assert_eq!(
            classify_ok("SHOW SCHEMAS IN DATABASE sales"),
            Statement::Session(SessionCommand::Show(ShowCommand::Schemas {
                database: Some("SALES".to_string()),
                history: false,
            }))
        );
        assert_eq!(
            classify_ok("SHOW VIEWS HISTORY"),
            Statement::Session(SessionCommand::Show(ShowCommand::Views {
                scope: None,
                history: true,
            }))
        );
    }

    #[test]
    fn probe_select_is_intercepted() {
        assert_eq!(
            classify_ok("SELECT CURRENT_DATABASE()"),
            Statement::Session(SessionCommand::SelectProbes(vec![Probe::CurrentDatabase]))
        );
        assert_eq!(
            classify_ok("select current_database(), current_schema()"),
            Statement::Session(SessionCommand::SelectProbes(vec![
                Probe::CurrentDatabase,
                Probe::CurrentSchema
            ]))
        );
        // anything beyond a pure probe list is a generic query
        assert!(matches!(
            classify_ok("SELECT CURRENT_DATABASE(), id FROM t"),
            Statement::Generic(_)
        ));
    }

    #[test]
    fn ddl_recognizers() {
        assert_eq!(
            classify_ok("CREATE DATABASE IF NOT EXISTS testdb"),
            Statement::Ddl(DdlCommand::CreateDatabase {
                name: "TESTDB".to_string(),
                if_not_exists: true,
            })
        );
        assert_eq!(
            classify_ok("DROP SCHEMA sales.staging CASCADE"),
            Statement::Ddl(DdlCommand::DropSchema {
                name: SchemaName {
                    database: Some("SALES".to_string()),
                    schema: "STAGING".to_string(),
                },
                if_exists: false,
                cascade: true,
            })
        );
        assert_eq!(
            classify_ok("UNDROP TABLE testdb.public.t"),
            Statement::Ddl(DdlCommand::UndropTable {
                name: ObjectName {
                    database: Some("TESTDB".to_string()),
                    schema: Some("PUBLIC".to_string()),
                    name: "T".to_string(),
                }
            })
        );
        assert_eq!(
            classify_ok("ALTER TABLE t RENAME TO t2"),
            Statement::Ddl(DdlCommand::RenameTable {
                name: ObjectName::parse("t").unwrap(),
                new_name: ObjectName::parse("t2").unwrap(),
            })
        );
    }

    #[test]
    fn create_table_column_list() {
        let Statement::Ddl(DdlCommand::CreateTable { name, body, .. }) =
            classify_ok("CREATE TABLE t (id INT NOT NULL, amount NUMBER(10, 2), note VARCHAR DEFAULT 'x')")
        else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(name.name, "T");
        let CreateTableBody::Columns(cols) = body else {
            panic!("expected column list");
        };
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].name, "ID");
        assert_eq!(cols[0].data_type, "INT");
        assert!(!cols[0].nullable);
        assert_eq!(cols[1].data_type, "NUMBER(10, 2)");
        assert!(cols[1].nullable);
        assert_eq!(cols[2].data_type, "VARCHAR");
        assert!(cols[2].nullable);
    }

    #[test]
    fn create_table_skips_table_constraints() {
        let Statement::Ddl(DdlCommand::CreateTable { body, .. }) =
            classify_ok("CREATE TABLE t (id INT, PRIMARY KEY (id))")
        else {
            panic!("expected CREATE TABLE");
        };
        let CreateTableBody::Columns(cols) = body else {
            panic!("expected column list");
        };
        assert_eq!(cols.len(), 1);
    }

    #[test]
    fn create_table_as_select_and_clone() {
        let Statement::Ddl(DdlCommand::CreateTable { body, or_replace, .. }) =
            classify_ok("CREATE OR REPLACE TABLE t2 AS SELECT * FROM t")
        else {
            panic!("expected CREATE TABLE");
        };
        assert!(or_replace);
        assert_eq!(body, CreateTableBody::AsSelect("SELECT * FROM t".to_string()));

        let Statement::Ddl(DdlCommand::CreateTable { body, .. }) =
            classify_ok("CREATE TABLE t3 CLONE t")
        else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(body, CreateTableBody::Clone(ObjectName::parse("t").unwrap()));
    }

    #[test]
    fn accepted_statements_are_recognized() {
        for sql in [
            "CREATE STAGE my_stage",
            "CREATE OR REPLACE FILE FORMAT csv_fmt TYPE = 'CSV'",
            "DROP WAREHOUSE compute_wh",
            "GRANT SELECT ON TABLE t TO ROLE analyst",
            "BEGIN",
            "COMMIT",
            "ALTER SESSION SET TIMEZONE = 'UTC'",
        ] {
            assert!(
                matches!(
                    classify_ok(sql),
                    Statement::Ddl(DdlCommand::Accepted { .. })
                ),
                "not accepted: {sql}"
            );
        }
    }

    #[test]
    fn dml_and_queries_are_generic() {
        for sql in [
            "SELECT * FROM t",
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET x = 1",
            "DELETE FROM t WHERE id = 1",
            "WITH c AS (SELECT 1) SELECT * FROM c",
        ] {
            assert!(matches!(classify_ok(sql), Statement::Generic(_)), "{sql}");
        }
    }

    #[test]
    fn column_type_keeps_parenthesized_arguments() {
        let (ty, modifiers) = split_type_and_modifiers("DECIMAL(10, 2) NOT NULL DEFAULT 0");
        assert_eq!(ty, "DECIMAL(10, 2)");
        assert!(modifiers.starts_with("NOT NULL"));

        let (ty, modifiers) = split_type_and_modifiers("VARCHAR(20)");
        assert_eq!(ty, "VARCHAR(20)");
        assert!(modifiers.is_empty());
    }
}
