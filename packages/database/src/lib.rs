#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident store for the traffic map.
//!
//! The [`IncidentStore`] trait is the seam between the HTTP layer and the
//! data. Two implementations share one set of semantics:
//!
//! - [`postgis::PostgisStore`] renders every query as parameterized
//!   `PostGIS` SQL ([`queries`]) and runs it through `switchy_database`.
//! - [`memory::MemoryStore`] evaluates the same queries over records held
//!   in memory, using `geo` for the spatial predicates.
//!
//! Uses `switchy_schema` for embedded SQL migrations.

pub mod db;
pub mod memory;
pub mod postgis;
pub mod queries;

use async_trait::async_trait;
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;
use traffic_map_database_models::{AggregatedRow, AggregationQuery, NameEntry, TablePage, TableQuery};
use traffic_map_dataset_models::Dataset;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during incident store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// The dataset has no table in the incident store.
    #[error("Dataset '{dataset}' does not support this query")]
    UnsupportedDataset {
        /// The requested dataset.
        dataset: Dataset,
    },

    /// Reading a record file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read access to immutable incident records.
///
/// Every method is idempotent; a failed call can simply be reissued.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Counts matching incidents per grid cell (bounding-box predicates)
    /// or per buffer (buffer predicates).
    ///
    /// Rows are ordered by `(longitude, latitude)` for grid cells and by
    /// buffer order for buffers. Cells or buffers without incidents are
    /// omitted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the dataset has no table or the query fails.
    async fn aggregate(&self, query: &AggregationQuery) -> Result<Vec<AggregatedRow>, DbError>;

    /// Lists one page of matching incidents, newest first, plus the total
    /// match count.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the dataset has no table or the query fails.
    async fn table(&self, query: &TableQuery) -> Result<TablePage, DbError>;

    /// Distinct non-empty values of the dataset's category column, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the dataset has no category column or the
    /// query fails.
    async fn distinct_names(&self, dataset: Dataset) -> Result<Vec<NameEntry>, DbError>;
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}

/// Assigns 1-based ids to sorted distinct names.
pub(crate) fn number_names(names: impl IntoIterator<Item = String>) -> Vec<NameEntry> {
    names
        .into_iter()
        .zip(1u32..)
        .map(|(name, id)| NameEntry { id, name })
        .collect()
}
