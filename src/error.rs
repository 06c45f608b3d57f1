//! Error types for the emulator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQL parse error: {0}")]
    Parse(String),

    #[error("Database '{0}' does not exist or not authorized")]
    DatabaseNotFound(String),

    #[error("Schema '{0}' does not exist or not authorized")]
    SchemaNotFound(String),

    #[error("Table '{0}' does not exist or not authorized")]
    TableNotFound(String),

    #[error("View '{0}' does not exist or not authorized")]
    ViewNotFound(String),

    #[error("Object '{0}' already exists")]
    AlreadyExists(String),

    #[error("Cannot restore '{0}': a live object with the same name already exists")]
    NameCollision(String),

    #[error("Schema '{0}' is not empty, use DROP SCHEMA ... CASCADE")]
    SchemaNotEmpty(String),

    #[error("Database '{0}' is not empty, use DROP DATABASE ... CASCADE")]
    DatabaseNotEmpty(String),

    #[error("Cannot perform {0}. This session does not have a current database. Call 'USE DATABASE', or use a qualified name.")]
    NoCurrentDatabase(String),

    #[error("Cannot perform {0}. This session does not have a current schema. Call 'USE SCHEMA', or use a qualified name.")]
    NoCurrentSchema(String),

    #[error("Unknown INFORMATION_SCHEMA view: '{0}'")]
    UnknownView(String),

    #[error("Engine error: {0}")]
    Engine(#[from] datafusion::error::DataFusionError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] datafusion::arrow::error::ArrowError),

    #[error("Catalog serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
