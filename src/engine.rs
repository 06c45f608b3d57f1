//! Execution engine
//!
//! Thin wrapper around a DataFusion `SessionContext`. The engine mirrors
//! the catalog store's namespace as one catalog provider per database and
//! one schema provider per schema, all lower-cased since the engine
//! lower-cases unquoted identifiers. Table data lives here and only here,
//! in memory.

use std::sync::Arc;

use datafusion::arrow::array::{Array, ArrayRef, RecordBatch};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use datafusion::catalog::{
    CatalogProvider, MemoryCatalogProvider, MemorySchemaProvider, SchemaProvider,
};
use datafusion::common::ScalarValue;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;

use crate::catalog::ColumnDef;
use crate::error::{Error, Result};
use crate::functions;

pub struct Engine {
    ctx: SessionContext,
}

impl Engine {
    pub fn new() -> Self {
        let ctx = SessionContext::new();
        functions::register_all(&ctx);
        Self { ctx }
    }

    fn schema_provider(&self, db: &str, sc: &str) -> Result<Arc<dyn SchemaProvider>> {
        let catalog = self
            .ctx
            .catalog(&db.to_lowercase())
            .ok_or_else(|| Error::DatabaseNotFound(db.to_uppercase()))?;
        catalog
            .schema(&sc.to_lowercase())
            .ok_or_else(|| Error::SchemaNotFound(format!("{}.{}", db.to_uppercase(), sc.to_uppercase())))
    }

    /// Register a database-level catalog. Replaces any existing provider
    /// under the same name, which is also how databases are dropped.
    pub fn create_database(&self, db: &str) -> Result<()> {
        let provider = MemoryCatalogProvider::new();
        provider
            .register_schema("public", Arc::new(MemorySchemaProvider::new()))
            .map_err(Error::Engine)?;
        self.ctx
            .register_catalog(db.to_lowercase(), Arc::new(provider));
        Ok(())
    }

    /// Dropping replaces the catalog with an empty provider; the context
    /// API has no deregistration, and the catalog store is authoritative
    /// for existence anyway.
    pub fn drop_database(&self, db: &str) {
        self.ctx.register_catalog(
            db.to_lowercase(),
            Arc::new(MemoryCatalogProvider::new()),
        );
    }

    pub fn create_schema(&self, db: &str, sc: &str) -> Result<()> {
        let catalog = self
            .ctx
            .catalog(&db.to_lowercase())
            .ok_or_else(|| Error::DatabaseNotFound(db.to_uppercase()))?;
        catalog
            .register_schema(&sc.to_lowercase(), Arc::new(MemorySchemaProvider::new()))
            .map_err(Error::Engine)?;
        Ok(())
    }

    pub fn drop_schema(&self, db: &str, sc: &str) -> Result<()> {
        let catalog = self
            .ctx
            .catalog(&db.to_lowercase())
            .ok_or_else(|| Error::DatabaseNotFound(db.to_uppercase()))?;
        catalog
            .deregister_schema(&sc.to_lowercase(), true)
            .map_err(Error::Engine)?;
        Ok(())
    }

    /// Register an empty table. The single empty partition is what lets
    /// INSERT append to it later.
    pub fn create_table(&self, db: &str, sc: &str, name: &str, columns: &[ColumnDef]) -> Result<()> {
        let schema = Arc::new(column_defs_to_schema(columns));
        self.create_table_with_schema(db, sc, name, schema)
    }

    pub fn create_table_with_schema(
        &self,
        db: &str,
        sc: &str,
        name: &str,
        schema: SchemaRef,
    ) -> Result<()> {
        let provider = self.schema_provider(db, sc)?;
        let table = MemTable::try_new(schema, vec![vec![]])?;
        // MemorySchemaProvider errors on duplicate names, so drop any
        // existing entry first to keep the documented replace semantics.
        provider
            .deregister_table(&name.to_lowercase())
            .map_err(Error::Engine)?;
        provider
            .register_table(name.to_lowercase(), Arc::new(table))
            .map_err(Error::Engine)?;
        Ok(())
    }

    /// Register a table already holding data; used by CTAS, CLONE, and the
    /// DELETE/UPDATE rewrites. Replaces any table under the same name.
    pub fn create_table_with_data(
        &self,
        db: &str,
        sc: &str,
        name: &str,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<()> {
        let provider = self.schema_provider(db, sc)?;
        let table = MemTable::try_new(schema, vec![batches])?;
        provider
            .deregister_table(&name.to_lowercase())
            .map_err(Error::Engine)?;
        provider
            .register_table(name.to_lowercase(), Arc::new(table))
            .map_err(Error::Engine)?;
        Ok(())
    }

    pub fn drop_table(&self, db: &str, sc: &str, name: &str) -> Result<()> {
        let provider = self.schema_provider(db, sc)?;
        provider
            .deregister_table(&name.to_lowercase())
            .map_err(Error::Engine)?;
        Ok(())
    }

    /// Rename in place, carrying the backing provider and its rows.
    pub fn rename_table(&self, db: &str, sc: &str, old: &str, new: &str) -> Result<()> {
        let provider = self.schema_provider(db, sc)?;
        let table = provider
            .deregister_table(&old.to_lowercase())
            .map_err(Error::Engine)?
            .ok_or_else(|| {
                Error::TableNotFound(format!(
                    "{}.{}.{}",
                    db.to_uppercase(),
                    sc.to_uppercase(),
                    old.to_uppercase()
                ))
            })?;
        provider
            .register_table(new.to_lowercase(), table)
            .map_err(Error::Engine)?;
        Ok(())
    }

    /// Define a view over already-qualified, already-translated SQL.
    pub async fn create_view(
        &self,
        db: &str,
        sc: &str,
        name: &str,
        definition: &str,
        or_replace: bool,
    ) -> Result<()> {
        let or_replace = if or_replace { "OR REPLACE " } else { "" };
        let sql = format!(
            "CREATE {}VIEW {}.{}.{} AS {}",
            or_replace,
            db.to_lowercase(),
            sc.to_lowercase(),
            name.to_lowercase(),
            definition
        );
        self.ctx.sql(&sql).await?.collect().await?;
        Ok(())
    }

    pub fn drop_view(&self, db: &str, sc: &str, name: &str) -> Result<()> {
        self.drop_table(db, sc, name)
    }

    /// Run a statement and collect its full result.
    pub async fn sql(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        self.sql_with_params(sql, &[]).await
    }

    /// Like [`sql`](Self::sql), binding positional `$n` placeholders first.
    pub async fn sql_with_params(
        &self,
        sql: &str,
        params: &[ScalarValue],
    ) -> Result<Vec<RecordBatch>> {
        let mut df = self.ctx.sql(sql).await?;
        if !params.is_empty() {
            df = df.with_param_values(params.to_vec())?;
        }
        Ok(df.collect().await?)
    }

    /// Run a query and return its schema along with the batches; CTAS needs
    /// the schema even when the result is empty.
    pub async fn query(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        self.query_with_params(sql, &[]).await
    }

    pub async fn query_with_params(
        &self,
        sql: &str,
        params: &[ScalarValue],
    ) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let mut df = self.ctx.sql(sql).await?;
        if !params.is_empty() {
            df = df.with_param_values(params.to_vec())?;
        }
        let schema: SchemaRef = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await?;
        Ok((schema, batches))
    }

    /// Full scan of one table; used by CLONE.
    pub async fn scan_table(&self, db: &str, sc: &str, name: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        self.query(&format!(
            "SELECT * FROM {}.{}.{}",
            db.to_lowercase(),
            sc.to_lowercase(),
            name.to_lowercase()
        ))
        .await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a dialect type (as written in DDL, upper-cased) to an Arrow type.
pub fn dialect_type_to_arrow(data_type: &str) -> DataType {
    let upper = data_type.trim().to_uppercase();
    let base = upper.split('(').next().unwrap_or("").trim().to_string();
    match base.as_str() {
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" => DataType::Int64,
        "NUMBER" | "DECIMAL" | "NUMERIC" => {
            let (precision, scale) = parse_precision_scale(&upper).unwrap_or((38, 0));
            if scale == 0 && precision >= 19 {
                DataType::Int64
            } else {
                DataType::Decimal128(precision, scale)
            }
        }
        "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "REAL" => DataType::Float64,
        "VARCHAR" | "CHAR" | "CHARACTER" | "STRING" | "TEXT" | "VARIANT" | "OBJECT" | "ARRAY" => {
            DataType::Utf8
        }
        "BOOLEAN" => DataType::Boolean,
        "DATE" => DataType::Date32,
        "TIME" => DataType::Time64(TimeUnit::Nanosecond),
        "DATETIME" | "TIMESTAMP" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" => {
            DataType::Timestamp(TimeUnit::Nanosecond, None)
        }
        "BINARY" | "VARBINARY" => DataType::Binary,
        _ => DataType::Utf8,
    }
}

fn parse_precision_scale(upper: &str) -> Option<(u8, i8)> {
    let open = upper.find('(')?;
    let close = upper.rfind(')')?;
    let mut parts = upper[open + 1..close].split(',');
    let precision: u8 = parts.next()?.trim().parse().ok()?;
    let scale: i8 = match parts.next() {
        Some(s) => s.trim().parse().ok()?,
        None => 0,
    };
    Some((precision, scale))
}

/// Map an Arrow type back to dialect type text; used to describe tables
/// whose layout came from a query rather than a DDL column list.
pub fn arrow_type_to_dialect(data_type: &DataType) -> String {
    match data_type {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            "NUMBER(38,0)".to_string()
        }
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => format!("NUMBER({p},{s})"),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "FLOAT".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            "VARCHAR(16777216)".to_string()
        }
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Time32(_) | DataType::Time64(_) => "TIME(9)".to_string(),
        DataType::Timestamp(_, _) => "TIMESTAMP_NTZ(9)".to_string(),
        DataType::Binary | DataType::LargeBinary => "BINARY(8388608)".to_string(),
        _ => "VARIANT".to_string(),
    }
}

/// SQL cast target that reproduces an Arrow type through the engine's
/// parser; used when UPDATE rewrites assignments into a projection.
pub fn arrow_type_to_sql(data_type: &DataType) -> String {
    match data_type {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            "BIGINT".to_string()
        }
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => format!("DECIMAL({p}, {s})"),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "DOUBLE".to_string(),
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Time32(_) | DataType::Time64(_) => "TIME".to_string(),
        DataType::Timestamp(_, _) => "TIMESTAMP".to_string(),
        _ => "VARCHAR".to_string(),
    }
}

/// Column layout of a result schema as catalog column descriptors.
pub fn schema_to_column_defs(schema: &Schema) -> Vec<ColumnDef> {
    schema
        .fields()
        .iter()
        .map(|field| ColumnDef {
            name: field.name().to_uppercase(),
            data_type: arrow_type_to_dialect(field.data_type()),
            nullable: field.is_nullable(),
        })
        .collect()
}

fn column_defs_to_schema(columns: &[ColumnDef]) -> Schema {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| {
            Field::new(
                c.name.to_lowercase(),
                dialect_type_to_arrow(&c.data_type),
                c.nullable,
            )
        })
        .collect();
    Schema::new(fields)
}

/// String-encode one cell. `None` is SQL NULL.
pub fn format_value(array: &ArrayRef, row: usize) -> Result<Option<String>> {
    use datafusion::arrow::array::{
        Date32Array, TimestampMicrosecondArray, TimestampMillisecondArray,
        TimestampNanosecondArray, TimestampSecondArray,
    };

    if array.is_null(row) {
        return Ok(None);
    }

    let text = match array.data_type() {
        DataType::Date32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or_else(|| Error::Parse("Date32 array downcast failed".to_string()))?;
            let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| Error::Parse("invalid epoch".to_string()))?;
            (epoch + chrono::Duration::days(arr.value(row) as i64))
                .format("%Y-%m-%d")
                .to_string()
        }
        DataType::Timestamp(unit, _) => {
            let value = match unit {
                TimeUnit::Second => array
                    .as_any()
                    .downcast_ref::<TimestampSecondArray>()
                    .and_then(|a| chrono::DateTime::from_timestamp(a.value(row), 0)),
                TimeUnit::Millisecond => array
                    .as_any()
                    .downcast_ref::<TimestampMillisecondArray>()
                    .and_then(|a| chrono::DateTime::from_timestamp_millis(a.value(row))),
                TimeUnit::Microsecond => array
                    .as_any()
                    .downcast_ref::<TimestampMicrosecondArray>()
                    .and_then(|a| chrono::DateTime::from_timestamp_micros(a.value(row))),
                TimeUnit::Nanosecond => array
                    .as_any()
                    .downcast_ref::<TimestampNanosecondArray>()
                    .and_then(|a| {
                        let nanos = a.value(row);
                        chrono::DateTime::from_timestamp(
                            nanos.div_euclid(1_000_000_000),
                            nanos.rem_euclid(1_000_000_000) as u32,
                        )
                    }),
            };
            match value {
                Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string(),
                None => return Err(Error::Parse("timestamp out of range".to_string())),
            }
        }
        _ => datafusion::arrow::util::display::array_value_to_string(array, row)?,
    };
    Ok(Some(text))
}

/// Total row count across batches.
pub fn row_count(batches: &[RecordBatch]) -> i64 {
    batches.iter().map(|b| b.num_rows() as i64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef {
                name: "ID".to_string(),
                data_type: "INT".to_string(),
                nullable: false,
            },
            ColumnDef {
                name: "NAME".to_string(),
                data_type: "VARCHAR".to_string(),
                nullable: true,
            },
        ]
    }

    #[tokio::test]
    async fn create_insert_query_roundtrip() {
        let engine = Engine::new();
        engine.create_database("db1").unwrap();
        engine.create_table("db1", "public", "t", &columns()).unwrap();

        engine
            .sql("INSERT INTO db1.public.t VALUES (1, 'a'), (2, 'b')")
            .await
            .unwrap();
        let batches = engine
            .sql("SELECT * FROM db1.public.t ORDER BY id")
            .await
            .unwrap();
        assert_eq!(row_count(&batches), 2);
    }

    #[tokio::test]
    async fn schemas_register_and_deregister() {
        let engine = Engine::new();
        engine.create_database("db1").unwrap();
        engine.create_schema("db1", "staging").unwrap();
        engine
            .create_table("db1", "staging", "t", &columns())
            .unwrap();

        let batches = engine.sql("SELECT * FROM db1.staging.t").await.unwrap();
        assert_eq!(row_count(&batches), 0);

        engine.drop_schema("db1", "staging").unwrap();
        assert!(engine.sql("SELECT * FROM db1.staging.t").await.is_err());
    }

    #[tokio::test]
    async fn placeholders_bind_positionally() {
        let engine = Engine::new();
        engine.create_database("db1").unwrap();
        engine.create_table("db1", "public", "t", &columns()).unwrap();
        engine
            .sql("INSERT INTO db1.public.t VALUES (1, 'a'), (2, 'b')")
            .await
            .unwrap();

        let batches = engine
            .sql_with_params(
                "SELECT name FROM db1.public.t WHERE id = $1",
                &[ScalarValue::Int64(Some(2))],
            )
            .await
            .unwrap();
        assert_eq!(row_count(&batches), 1);
    }

    #[tokio::test]
    async fn rename_preserves_rows() {
        let engine = Engine::new();
        engine.create_database("db1").unwrap();
        engine.create_table("db1", "public", "t", &columns()).unwrap();
        engine
            .sql("INSERT INTO db1.public.t VALUES (1, 'a')")
            .await
            .unwrap();

        engine.rename_table("db1", "public", "t", "t2").unwrap();
        let batches = engine.sql("SELECT * FROM db1.public.t2").await.unwrap();
        assert_eq!(row_count(&batches), 1);
        assert!(engine.sql("SELECT * FROM db1.public.t").await.is_err());
    }

    #[tokio::test]
    async fn view_reads_through_to_table() {
        let engine = Engine::new();
        engine.create_database("db1").unwrap();
        engine.create_table("db1", "public", "t", &columns()).unwrap();
        engine
            .sql("INSERT INTO db1.public.t VALUES (1, 'a'), (2, 'b')")
            .await
            .unwrap();
        engine
            .create_view(
                "db1",
                "public",
                "v",
                "SELECT id FROM db1.public.t WHERE id > 1",
                false,
            )
            .await
            .unwrap();

        let batches = engine.sql("SELECT * FROM db1.public.v").await.unwrap();
        assert_eq!(row_count(&batches), 1);
    }

    #[test]
    fn type_mapping_covers_dialect_names() {
        assert_eq!(dialect_type_to_arrow("INT"), DataType::Int64);
        assert_eq!(dialect_type_to_arrow("NUMBER(38, 0)"), DataType::Int64);
        assert_eq!(
            dialect_type_to_arrow("NUMBER(10, 2)"),
            DataType::Decimal128(10, 2)
        );
        assert_eq!(dialect_type_to_arrow("STRING"), DataType::Utf8);
        assert_eq!(
            dialect_type_to_arrow("TIMESTAMP_NTZ"),
            DataType::Timestamp(TimeUnit::Nanosecond, None)
        );
        assert_eq!(dialect_type_to_arrow("made_up"), DataType::Utf8);
    }

    #[test]
    fn arrow_types_map_back_to_dialect_text() {
        assert_eq!(arrow_type_to_dialect(&DataType::Int64), "NUMBER(38,0)");
        assert_eq!(arrow_type_to_dialect(&DataType::Utf8), "VARCHAR(16777216)");
        assert_eq!(
            arrow_type_to_dialect(&DataType::Timestamp(TimeUnit::Nanosecond, None)),
            "TIMESTAMP_NTZ(9)"
        );
    }
}
