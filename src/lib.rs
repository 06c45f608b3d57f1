//! Local emulator for a cloud-warehouse SQL dialect, backed by Apache
//! DataFusion.
//!
//! A [`Dispatcher`] plays the role of one warehouse connection: point it at
//! a data directory, feed it dialect SQL, and get back uniform
//! [`ResultEnvelope`]s. Object definitions persist in a JSON catalog with
//! soft-delete (UNDROP) support; table data lives in memory for the life
//! of the dispatcher.
//!
//! ```no_run
//! # async fn demo() -> snowglobe::Result<()> {
//! let mut conn = snowglobe::Dispatcher::open("./data").await?;
//! conn.execute("CREATE DATABASE sales").await;
//! conn.execute("USE DATABASE sales").await;
//! conn.execute("CREATE TABLE orders (id INT, amount NUMBER(10, 2))").await;
//! let result = conn.execute("SELECT * FROM orders").await;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod dispatcher;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod functions;
pub mod info_schema;
pub mod qualify;
pub mod session;
pub mod statement;
pub mod translator;

pub use catalog::CatalogStore;
pub use dispatcher::Dispatcher;
pub use envelope::ResultEnvelope;
pub use error::{Error, Result};
pub use session::Session;

/// Parameter values for [`Dispatcher::execute_with_params`], re-exported
/// from DataFusion.
pub use datafusion::common::ScalarValue;
