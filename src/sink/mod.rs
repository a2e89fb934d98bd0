//! Sink writers
//!
//! The normalized table leaves the pipeline in two independent steps:
//!
//! 1. [`write_staging_csv`] serializes it to a local staging file, which an
//!    [`ObjectStore`] then uploads under a fixed key
//! 2. a [`RelationalStore`] replaces a fixed table with its rows
//!
//! The steps are not linked transactionally. A failed relational load leaves
//! the uploaded object in place.

mod error;
mod object_store;
mod relational;
mod staging;

pub use error::{LoadError, TransferError};
#[cfg(feature = "s3")]
pub use object_store::S3ObjectStore;
pub use object_store::{LocalObjectStore, ObjectLocation, ObjectStore};
#[cfg(feature = "duckdb-backend")]
pub use relational::{DuckDbConnector, DuckDbStore};
#[cfg(feature = "postgres-backend")]
pub use relational::{PostgresConnector, PostgresStore};
pub use relational::{
    ColumnType, RelationalConnector, RelationalStore, SqlValue, create_table_sql, infer_schema,
    quote_identifier, redact_secrets, replace_and_verify,
};
pub use staging::write_staging_csv;
