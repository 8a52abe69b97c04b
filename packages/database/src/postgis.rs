//! [`IncidentStore`] backed by a `PostGIS` database.

use std::sync::Arc;

use async_trait::async_trait;
use switchy_database::Database;
use traffic_map_database_models::{
    AggregatedRow, AggregationQuery, NameEntry, TablePage, TableQuery,
};
use traffic_map_dataset_models::Dataset;
use traffic_map_spatial::SpatialPredicate;

use crate::{DbError, IncidentStore, queries};

/// Runs every store query against a shared database connection.
#[derive(Clone)]
pub struct PostgisStore {
    db: Arc<dyn Database>,
}

impl PostgisStore {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IncidentStore for PostgisStore {
    async fn aggregate(&self, query: &AggregationQuery) -> Result<Vec<AggregatedRow>, DbError> {
        match &query.predicate {
            SpatialPredicate::BoundingBox(bbox) => {
                log::debug!(
                    "Grid aggregation on {} with cell size {}",
                    query.dataset,
                    query.cell_size
                );
                queries::aggregate_grid(
                    &*self.db,
                    query.dataset,
                    bbox,
                    query.cell_size,
                    &query.filter,
                )
                .await
            }
            SpatialPredicate::Buffers(buffers) => {
                log::debug!(
                    "Buffer aggregation on {} with {} buffers",
                    query.dataset,
                    buffers.len()
                );
                queries::aggregate_buffers(&*self.db, query.dataset, buffers, &query.filter).await
            }
        }
    }

    async fn table(&self, query: &TableQuery) -> Result<TablePage, DbError> {
        let rows = queries::query_table(&*self.db, query).await?;
        let total = queries::count_table(&*self.db, query.dataset, &query.filter).await?;
        Ok(TablePage { rows, total })
    }

    async fn distinct_names(&self, dataset: Dataset) -> Result<Vec<NameEntry>, DbError> {
        queries::distinct_names(&*self.db, dataset).await
    }
}
