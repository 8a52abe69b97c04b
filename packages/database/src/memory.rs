//! [`IncidentStore`] over records held in memory.
//!
//! Evaluates the same predicates as the `PostGIS` queries: half-open date
//! ranges, closed bounding-box intersection, buffer polygon intersection
//! (zero-radius buffers match nothing), and round-half-to-even grid
//! snapping. Used for local runs
//! without a database and as the reference store in tests.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use traffic_map_database_models::{
    AggregatedRow, AggregationQuery, IncidentFilter, IncidentRecord, NameEntry, TablePage,
    TableQuery,
};
use traffic_map_dataset_models::Dataset;
use traffic_map_spatial::{BoundingBox, BufferSet, SpatialPredicate, grid};

use crate::{DbError, IncidentStore};

/// Immutable in-memory incident records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<IncidentRecord>,
}

impl MemoryStore {
    /// Creates a store over the given records.
    #[must_use]
    pub const fn new(records: Vec<IncidentRecord>) -> Self {
        Self { records }
    }

    /// Loads records from a JSON array file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read or is not an array of
    /// incident records.
    pub fn load(path: &Path) -> Result<Self, DbError> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<IncidentRecord> = serde_json::from_str(&contents)?;
        log::info!(
            "Loaded {} incident records from {}",
            records.len(),
            path.display()
        );
        Ok(Self::new(records))
    }

    fn matching<'a>(
        &'a self,
        dataset: Dataset,
        filter: &'a IncidentFilter,
    ) -> impl Iterator<Item = &'a IncidentRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.row.dataset() == dataset && r.matches(filter))
    }

    fn aggregate_grid(
        &self,
        dataset: Dataset,
        bbox: &BoundingBox,
        cell_size: f64,
        filter: &IncidentFilter,
    ) -> Vec<AggregatedRow> {
        let mut cells = self
            .matching(dataset, filter)
            .filter(|r| bbox.intersects_point(r.longitude, r.latitude))
            .map(|r| grid::snap_point(r.longitude, r.latitude, cell_size))
            .collect::<Vec<_>>();

        cells.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut rows: Vec<AggregatedRow> = Vec::new();
        for (longitude, latitude) in cells {
            match rows.last_mut() {
                Some(last)
                    if last.longitude.total_cmp(&longitude).is_eq()
                        && last.latitude.total_cmp(&latitude).is_eq() =>
                {
                    last.count += 1;
                }
                _ => rows.push(AggregatedRow {
                    longitude,
                    latitude,
                    count: 1,
                }),
            }
        }
        rows
    }

    fn aggregate_buffers(
        &self,
        dataset: Dataset,
        buffers: &BufferSet,
        filter: &IncidentFilter,
    ) -> Vec<AggregatedRow> {
        let regions = buffers.regions();
        let mut counts = vec![0u64; buffers.len()];
        for record in self.matching(dataset, filter) {
            for idx in regions.containing(record.longitude, record.latitude) {
                counts[idx] += 1;
            }
        }

        buffers
            .buffers()
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(buffer, count)| AggregatedRow {
                longitude: buffer.center.x(),
                latitude: buffer.center.y(),
                count,
            })
            .collect()
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn aggregate(&self, query: &AggregationQuery) -> Result<Vec<AggregatedRow>, DbError> {
        if query.dataset.schema().is_none() {
            return Err(DbError::UnsupportedDataset {
                dataset: query.dataset,
            });
        }
        Ok(match &query.predicate {
            SpatialPredicate::BoundingBox(bbox) => {
                self.aggregate_grid(query.dataset, bbox, query.cell_size, &query.filter)
            }
            SpatialPredicate::Buffers(buffers) => {
                self.aggregate_buffers(query.dataset, buffers, &query.filter)
            }
        })
    }

    async fn table(&self, query: &TableQuery) -> Result<TablePage, DbError> {
        if query.dataset.schema().is_none() {
            return Err(DbError::UnsupportedDataset {
                dataset: query.dataset,
            });
        }

        let mut matches = self
            .matching(query.dataset, &query.filter)
            .map(|r| &r.row)
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| {
            b.occurred_at()
                .cmp(&a.occurred_at())
                .then_with(|| a.key().cmp(b.key()))
        });

        let total = matches.len() as u64;
        let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let rows = matches
            .into_iter()
            .skip(offset)
            .take(query.page.size as usize)
            .cloned()
            .collect();

        Ok(TablePage { rows, total })
    }

    async fn distinct_names(&self, dataset: Dataset) -> Result<Vec<NameEntry>, DbError> {
        if !dataset
            .schema()
            .is_some_and(|s| s.category_column.is_some())
        {
            return Err(DbError::UnsupportedDataset { dataset });
        }

        let names = self
            .records
            .iter()
            .filter(|r| r.row.dataset() == dataset)
            .filter_map(|r| r.row.category())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>();

        Ok(crate::number_names(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use traffic_map_database_models::{
        CrashRow, DateRange, IncidentRow, Page, RedLightViolationRow, SpeedViolationRow,
    };
    use traffic_map_spatial::RouteStep;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn crash(id: &str, lon: f64, lat: f64, date: NaiveDateTime, street: &str) -> IncidentRecord {
        IncidentRecord {
            longitude: lon,
            latitude: lat,
            row: IncidentRow::Crash(CrashRow {
                crash_record_id: id.to_string(),
                crash_date: date,
                street_name: Some(street.to_string()),
                crash_type: None,
                weather_condition: None,
                lighting_condition: None,
                injuries_total: Some(0),
            }),
        }
    }

    fn speed(id: &str, lon: f64, lat: f64, date: NaiveDateTime) -> IncidentRecord {
        IncidentRecord {
            longitude: lon,
            latitude: lat,
            row: IncidentRow::SpeedViolation(SpeedViolationRow {
                camera_id: id.to_string(),
                address: None,
                violation_date: date,
                violations: 3,
            }),
        }
    }

    fn january() -> IncidentFilter {
        IncidentFilter {
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            ),
            category: None,
        }
    }

    fn loop_box() -> BoundingBox {
        BoundingBox::from_corners(&[[-87.7, 41.8], [-87.7, 41.9], [-87.6, 41.9], [-87.6, 41.8]])
            .unwrap()
    }

    fn grid_query(store_filter: IncidentFilter, cell_size: f64) -> AggregationQuery {
        AggregationQuery {
            dataset: Dataset::Crashes,
            predicate: SpatialPredicate::BoundingBox(loop_box()),
            cell_size,
            filter: store_filter,
        }
    }

    #[tokio::test]
    async fn grid_counts_only_points_inside_the_box() {
        let store = MemoryStore::new(vec![
            crash("a", -87.65, 41.85, at(2020, 1, 10), "STATE ST"),
            crash("b", -87.65, 41.85, at(2020, 1, 11), "STATE ST"),
            crash("c", -87.50, 41.85, at(2020, 1, 12), "STATE ST"),
        ]);

        let rows = store.aggregate(&grid_query(january(), 0.01)).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), 2);
        assert!((rows[0].longitude - -87.65).abs() < 1e-9);
        assert!((rows[0].latitude - 41.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn grid_applies_half_open_dates_and_category() {
        let store = MemoryStore::new(vec![
            crash("a", -87.65, 41.85, at(2019, 12, 31), "STATE ST"),
            crash("b", -87.65, 41.85, at(2020, 1, 15), "STATE ST"),
            crash("c", -87.65, 41.85, at(2020, 1, 15), "CLARK ST"),
            crash(
                "d",
                -87.65,
                41.85,
                NaiveDate::from_ymd_opt(2020, 2, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                "STATE ST",
            ),
        ]);

        let all = store.aggregate(&grid_query(january(), 0.01)).await.unwrap();
        assert_eq!(all.iter().map(|r| r.count).sum::<u64>(), 2);

        let mut filter = january();
        filter.category = Some("STATE ST".to_string());
        let state = store.aggregate(&grid_query(filter, 0.01)).await.unwrap();
        assert_eq!(state.iter().map(|r| r.count).sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn grid_rows_are_sorted_and_deterministic() {
        let store = MemoryStore::new(vec![
            crash("a", -87.61, 41.89, at(2020, 1, 2), "A"),
            crash("b", -87.69, 41.81, at(2020, 1, 3), "B"),
            crash("c", -87.65, 41.85, at(2020, 1, 4), "C"),
            crash("d", -87.69, 41.85, at(2020, 1, 5), "D"),
        ]);
        let query = grid_query(january(), 0.02);

        let first = store.aggregate(&query).await.unwrap();
        let second = store.aggregate(&query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(first.windows(2).all(|w| {
            w[0].longitude < w[1].longitude
                || (w[0].longitude.total_cmp(&w[1].longitude).is_eq()
                    && w[0].latitude < w[1].latitude)
        }));
    }

    #[tokio::test]
    async fn grid_ignores_other_datasets() {
        let store = MemoryStore::new(vec![
            crash("a", -87.65, 41.85, at(2020, 1, 10), "STATE ST"),
            speed("cam", -87.65, 41.85, at(2020, 1, 10)),
        ]);
        let rows = store.aggregate(&grid_query(january(), 0.01)).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn buffers_count_per_buffer_in_order() {
        let store = MemoryStore::new(vec![
            crash("a", -87.6298, 41.8781, at(2020, 1, 10), "STATE ST"),
            crash("b", -87.6299, 41.8782, at(2020, 1, 10), "STATE ST"),
            crash("c", -87.6000, 41.9500, at(2020, 1, 10), "STATE ST"),
        ]);
        let buffers = BufferSet::from_steps(&[
            RouteStep::new(-87.6400, 41.8700, 50.0),
            RouteStep::new(-87.6298, 41.8781, 100.0),
        ])
        .unwrap();

        let rows = store
            .aggregate(&AggregationQuery {
                dataset: Dataset::Crashes,
                predicate: SpatialPredicate::Buffers(buffers),
                cell_size: 0.0,
                filter: january(),
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 2);
        assert!((rows[0].longitude - -87.6298).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_buffer_set_yields_no_rows() {
        let store = MemoryStore::new(vec![crash("a", -87.65, 41.85, at(2020, 1, 10), "X")]);
        let rows = store
            .aggregate(&AggregationQuery {
                dataset: Dataset::Crashes,
                predicate: SpatialPredicate::Buffers(BufferSet::from_steps(&[]).unwrap()),
                cell_size: 0.0,
                filter: january(),
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn zero_radius_buffer_matches_nothing() {
        let store = MemoryStore::new(vec![crash("a", -87.6244, 41.8827, at(2020, 1, 10), "X")]);
        let buffers = BufferSet::from_steps(&[RouteStep::new(-87.6244, 41.8827, 0.0)]).unwrap();
        let rows = store
            .aggregate(&AggregationQuery {
                dataset: Dataset::Crashes,
                predicate: SpatialPredicate::Buffers(buffers),
                cell_size: 0.0,
                filter: january(),
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn table_pages_partition_the_matches() {
        let store = MemoryStore::new(
            (1..=5)
                .map(|day| speed(&format!("cam-{day}"), -87.65, 41.85, at(2020, 1, day)))
                .chain(std::iter::once(speed("cam-0", -87.65, 41.85, at(2020, 1, 5))))
                .collect(),
        );
        let page = |index| TableQuery {
            dataset: Dataset::Speeds,
            filter: january(),
            page: Page { size: 4, index },
        };

        let first = store.table(&page(0)).await.unwrap();
        let second = store.table(&page(1)).await.unwrap();
        let third = store.table(&page(2)).await.unwrap();

        assert_eq!(first.total, 6);
        assert_eq!(second.total, 6);
        assert_eq!(first.rows.len(), 4);
        assert_eq!(second.rows.len(), 2);
        assert!(third.rows.is_empty());

        let keys = first
            .rows
            .iter()
            .chain(&second.rows)
            .map(IncidentRow::key)
            .collect::<Vec<_>>();
        assert_eq!(keys, ["cam-0", "cam-5", "cam-4", "cam-3", "cam-2", "cam-1"]);
    }

    #[tokio::test]
    async fn distinct_names_are_sorted_and_numbered() {
        let mut records = vec![
            crash("a", 0.0, 0.0, at(2020, 1, 1), "STATE ST"),
            crash("b", 0.0, 0.0, at(2020, 1, 1), "CLARK ST"),
            crash("c", 0.0, 0.0, at(2020, 1, 1), "STATE ST"),
            crash("d", 0.0, 0.0, at(2020, 1, 1), ""),
        ];
        records.push(IncidentRecord {
            longitude: 0.0,
            latitude: 0.0,
            row: IncidentRow::RedLightViolation(RedLightViolationRow {
                camera_id: "rl".to_string(),
                intersection: Some("ASHLAND AND 63RD".to_string()),
                address: None,
                violation_date: at(2020, 1, 1),
                violations: 1,
            }),
        });
        let store = MemoryStore::new(records);

        let names = store.distinct_names(Dataset::Crashes).await.unwrap();
        assert_eq!(
            names,
            vec![
                NameEntry {
                    id: 1,
                    name: "CLARK ST".to_string()
                },
                NameEntry {
                    id: 2,
                    name: "STATE ST".to_string()
                },
            ]
        );

        let intersections = store.distinct_names(Dataset::Redlights).await.unwrap();
        assert_eq!(intersections.len(), 1);

        assert!(matches!(
            store.distinct_names(Dataset::Speeds).await,
            Err(DbError::UnsupportedDataset { .. })
        ));
    }

    #[tokio::test]
    async fn loads_sample_records() {
        let path = Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../data/fixtures/incidents.json"
        ));
        let store = MemoryStore::load(path).unwrap();
        assert_eq!(store.records.len(), 5);

        let page = store
            .table(&TableQuery {
                dataset: Dataset::Crashes,
                filter: january(),
                page: Page { size: 10, index: 0 },
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.rows[0].key(), "c9d0");

        let redlights = store.distinct_names(Dataset::Redlights).await.unwrap();
        assert_eq!(redlights[0].name, "ASHLAND AND 63RD");
    }

    #[tokio::test]
    async fn congestions_are_not_stored() {
        let store = MemoryStore::default();
        let result = store
            .table(&TableQuery {
                dataset: Dataset::Congestions,
                filter: january(),
                page: Page { size: 10, index: 0 },
            })
            .await;
        assert!(matches!(result, Err(DbError::UnsupportedDataset { .. })));
    }
}
