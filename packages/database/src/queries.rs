//! `PostGIS` query builders and executors for the incident store.
//!
//! Every builder returns the SQL text together with its bound parameters.
//! Values never appear in the SQL itself: only `$n` placeholders, table
//! and column names from the static [`DatasetSchema`]s, and placeholder
//! lists sized by the input.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};
use traffic_map_database_models::{
    AggregatedRow, CrashRow, IncidentFilter, IncidentRow, NameEntry, RedLightViolationRow,
    SpeedViolationRow, TableQuery,
};
use traffic_map_dataset_models::{Dataset, DatasetSchema};
use traffic_map_spatial::{BoundingBox, BufferSet};

use crate::DbError;

/// SQL text plus positional parameters.
pub type BoundQuery = (String, Vec<DatabaseValue>);

/// Appends `value` to `params` and returns its `$n` placeholder.
fn bind(params: &mut Vec<DatabaseValue>, value: DatabaseValue) -> String {
    params.push(value);
    format!("${}", params.len())
}

/// Looks up the table layout for a dataset.
///
/// # Errors
///
/// Returns [`DbError::UnsupportedDataset`] for fixture-only datasets.
pub fn schema_for(dataset: Dataset) -> Result<&'static DatasetSchema, DbError> {
    dataset
        .schema()
        .ok_or(DbError::UnsupportedDataset { dataset })
}

/// Appends the date-range and category predicates shared by aggregation,
/// listing, and count queries.
fn push_filter(
    sql: &mut String,
    params: &mut Vec<DatabaseValue>,
    schema: &DatasetSchema,
    filter: &IncidentFilter,
) {
    let ts = schema.timestamp_column;

    let start = bind(
        params,
        DatabaseValue::DateTime(filter.date_range.start_datetime()),
    );
    let end = bind(
        params,
        DatabaseValue::DateTime(filter.date_range.end_datetime()),
    );
    write!(sql, " AND i.{ts} >= {start} AND i.{ts} < {end}").unwrap();

    if let (Some(column), Some(value)) = (schema.category_column, &filter.category) {
        let p = bind(params, DatabaseValue::String(value.clone()));
        write!(sql, " AND i.{column} = {p}").unwrap();
    }
}

/// Builds the grid aggregation query for a bounding box.
///
/// Snaps every matching point to the grid with `ST_SnapToGrid`, keeps
/// points intersecting the closed bounding-box ring, applies the filter,
/// and counts per snapped cell.
#[must_use]
pub fn grid_aggregation_sql(
    schema: &DatasetSchema,
    bbox: &BoundingBox,
    cell_size: f64,
    filter: &IncidentFilter,
) -> BoundQuery {
    let mut params = Vec::new();
    let geom = schema.geometry_column;

    let size = bind(&mut params, DatabaseValue::Real64(cell_size));

    let ring = bbox
        .closed_ring()
        .iter()
        .map(|[lon, lat]| {
            let x = bind(&mut params, DatabaseValue::Real64(*lon));
            let y = bind(&mut params, DatabaseValue::Real64(*lat));
            format!("ST_MakePoint({x}, {y})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT ST_X(cell) AS longitude, ST_Y(cell) AS latitude, COUNT(*) AS count
         FROM (
             SELECT ST_SnapToGrid(i.{geom}, {size}) AS cell
             FROM {table} i
             WHERE ST_Intersects(
                 i.{geom},
                 ST_SetSRID(ST_MakePolygon(ST_MakeLine(ARRAY[{ring}])), 4326)
             )",
        table = schema.table,
    );
    push_filter(&mut sql, &mut params, schema, filter);
    sql.push_str(
        "
         ) AS snapped
         GROUP BY cell
         ORDER BY longitude, latitude",
    );

    (sql, params)
}

/// Builds the buffer aggregation query for a non-empty buffer set.
///
/// Each buffer becomes a row of an inline `VALUES` table turned into a
/// geography buffer (ellipsoidal meters). The union of all circles
/// prefilters incidents in one pass; the join on individual circles
/// produces the per-buffer counts.
#[must_use]
pub fn buffer_aggregation_sql(
    schema: &DatasetSchema,
    buffers: &BufferSet,
    filter: &IncidentFilter,
) -> BoundQuery {
    let mut params = Vec::new();
    let geom = schema.geometry_column;

    let values = buffers
        .buffers()
        .iter()
        .zip(0i64..)
        .map(|(buffer, idx)| {
            let i = bind(&mut params, DatabaseValue::Int64(idx));
            let x = bind(&mut params, DatabaseValue::Real64(buffer.center.x()));
            let y = bind(&mut params, DatabaseValue::Real64(buffer.center.y()));
            let r = bind(&mut params, DatabaseValue::Real64(buffer.radius_meters));
            format!("({i}::int8, {x}::float8, {y}::float8, {r}::float8)")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "WITH circles AS (
             SELECT t.idx, t.longitude, t.latitude,
                    ST_Buffer(
                        ST_SetSRID(ST_MakePoint(t.longitude, t.latitude), 4326)::geography,
                        t.radius
                    )::geometry AS geom
             FROM (VALUES {values}) AS t(idx, longitude, latitude, radius)
         ),
         search_area AS (
             SELECT ST_Union(geom) AS geom FROM circles
         )
         SELECT c.idx, c.longitude, c.latitude, COUNT(*) AS count
         FROM {table} i
         JOIN search_area s ON ST_Intersects(i.{geom}, s.geom)
         JOIN circles c ON ST_Intersects(i.{geom}, c.geom)
         WHERE TRUE",
        table = schema.table,
    );
    push_filter(&mut sql, &mut params, schema, filter);
    sql.push_str(
        "
         GROUP BY c.idx, c.longitude, c.latitude
         ORDER BY c.idx",
    );

    (sql, params)
}

/// Builds the paginated listing query.
#[must_use]
pub fn table_rows_sql(schema: &DatasetSchema, query: &TableQuery) -> BoundQuery {
    let mut params = Vec::new();

    let columns = schema
        .table_columns
        .iter()
        .map(|c| format!("i.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT {columns} FROM {table} i WHERE TRUE",
        table = schema.table
    );
    push_filter(&mut sql, &mut params, schema, &query.filter);

    let limit = bind(
        &mut params,
        DatabaseValue::Int64(i64::from(query.page.size)),
    );
    let offset = bind(
        &mut params,
        DatabaseValue::Int64(i64::try_from(query.page.offset()).unwrap_or(i64::MAX)),
    );
    write!(
        sql,
        " ORDER BY i.{ts} DESC, i.{key} ASC LIMIT {limit} OFFSET {offset}",
        ts = schema.timestamp_column,
        key = schema.key_column,
    )
    .unwrap();

    (sql, params)
}

/// Builds the unpaginated count query with the same predicate as
/// [`table_rows_sql`].
#[must_use]
pub fn table_count_sql(schema: &DatasetSchema, filter: &IncidentFilter) -> BoundQuery {
    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT COUNT(*) AS count FROM {table} i WHERE TRUE",
        table = schema.table
    );
    push_filter(&mut sql, &mut params, schema, filter);
    (sql, params)
}

/// Builds the distinct category value query, or `None` if the dataset
/// has no category column.
#[must_use]
pub fn distinct_names_sql(schema: &DatasetSchema) -> Option<String> {
    let column = schema.category_column?;
    Some(format!(
        "SELECT DISTINCT i.{column} AS name
         FROM {table} i
         WHERE i.{column} IS NOT NULL AND i.{column} <> ''
         ORDER BY name",
        table = schema.table
    ))
}

/// Runs the grid aggregation for a bounding box.
///
/// # Errors
///
/// Returns [`DbError`] if the dataset has no table or the query fails.
pub async fn aggregate_grid(
    db: &dyn Database,
    dataset: Dataset,
    bbox: &BoundingBox,
    cell_size: f64,
    filter: &IncidentFilter,
) -> Result<Vec<AggregatedRow>, DbError> {
    let schema = schema_for(dataset)?;
    let (sql, params) = grid_aggregation_sql(schema, bbox, cell_size, filter);
    let rows = db.query_raw_params(&sql, &params).await?;
    rows.iter().map(aggregated_row).collect()
}

/// Runs the buffer aggregation. An empty buffer set returns no rows
/// without querying.
///
/// # Errors
///
/// Returns [`DbError`] if the dataset has no table or the query fails.
pub async fn aggregate_buffers(
    db: &dyn Database,
    dataset: Dataset,
    buffers: &BufferSet,
    filter: &IncidentFilter,
) -> Result<Vec<AggregatedRow>, DbError> {
    let schema = schema_for(dataset)?;
    if buffers.is_empty() {
        return Ok(Vec::new());
    }
    let (sql, params) = buffer_aggregation_sql(schema, buffers, filter);
    let rows = db.query_raw_params(&sql, &params).await?;
    rows.iter().map(aggregated_row).collect()
}

/// Lists one page of incidents.
///
/// # Errors
///
/// Returns [`DbError`] if the dataset has no table, the query fails, or
/// a row cannot be decoded.
pub async fn query_table(
    db: &dyn Database,
    query: &TableQuery,
) -> Result<Vec<IncidentRow>, DbError> {
    let schema = schema_for(query.dataset)?;
    let (sql, params) = table_rows_sql(schema, query);
    let rows = db.query_raw_params(&sql, &params).await?;
    rows.iter()
        .map(|row| incident_row(query.dataset, row))
        .collect()
}

/// Counts every incident matching the filter.
///
/// # Errors
///
/// Returns [`DbError`] if the dataset has no table or the query fails.
pub async fn count_table(
    db: &dyn Database,
    dataset: Dataset,
    filter: &IncidentFilter,
) -> Result<u64, DbError> {
    let schema = schema_for(dataset)?;
    let (sql, params) = table_count_sql(schema, filter);
    let rows = db.query_raw_params(&sql, &params).await?;
    let count: i64 = rows.first().map_or(Ok(0), |r| {
        r.to_value("count").map_err(|e| DbError::Conversion {
            message: format!("Failed to parse count: {e}"),
        })
    })?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Returns the distinct category values of a dataset.
///
/// # Errors
///
/// Returns [`DbError`] if the dataset has no category column or the
/// query fails.
pub async fn distinct_names(
    db: &dyn Database,
    dataset: Dataset,
) -> Result<Vec<NameEntry>, DbError> {
    let schema = schema_for(dataset)?;
    let sql = distinct_names_sql(schema).ok_or(DbError::UnsupportedDataset { dataset })?;
    let rows = db.query_raw_params(&sql, &[]).await?;
    let names = rows.iter().map(name_column).collect::<Result<Vec<_>, _>>()?;
    Ok(crate::number_names(
        names.into_iter().filter(|name| !name.is_empty()),
    ))
}

fn conversion(column: &str, e: &impl std::fmt::Display) -> DbError {
    DbError::Conversion {
        message: format!("Failed to parse {column}: {e}"),
    }
}

fn name_column(row: &Row) -> Result<String, DbError> {
    row.to_value("name").map_err(|e| conversion("name", &e))
}

fn aggregated_row(row: &Row) -> Result<AggregatedRow, DbError> {
    let count: i64 = row
        .to_value("count")
        .map_err(|e| conversion("count", &e))?;
    Ok(AggregatedRow {
        longitude: row
            .to_value("longitude")
            .map_err(|e| conversion("longitude", &e))?,
        latitude: row
            .to_value("latitude")
            .map_err(|e| conversion("latitude", &e))?,
        count: u64::try_from(count).unwrap_or(0),
    })
}

fn incident_row(dataset: Dataset, row: &Row) -> Result<IncidentRow, DbError> {
    match dataset {
        Dataset::Crashes => Ok(IncidentRow::Crash(CrashRow {
            crash_record_id: row
                .to_value("crash_record_id")
                .map_err(|e| conversion("crash_record_id", &e))?,
            crash_date: row
                .to_value("crash_date")
                .map_err(|e| conversion("crash_date", &e))?,
            street_name: row.to_value("street_name").unwrap_or(None),
            crash_type: row.to_value("first_crash_type").unwrap_or(None),
            weather_condition: row.to_value("weather_condition").unwrap_or(None),
            lighting_condition: row.to_value("lighting_condition").unwrap_or(None),
            injuries_total: row.to_value("injuries_total").unwrap_or(None),
        })),
        Dataset::Speeds => Ok(IncidentRow::SpeedViolation(SpeedViolationRow {
            camera_id: row
                .to_value("camera_id")
                .map_err(|e| conversion("camera_id", &e))?,
            address: row.to_value("address").unwrap_or(None),
            violation_date: row
                .to_value("violation_date")
                .map_err(|e| conversion("violation_date", &e))?,
            violations: row.to_value("violations").unwrap_or(0),
        })),
        Dataset::Redlights => Ok(IncidentRow::RedLightViolation(RedLightViolationRow {
            camera_id: row
                .to_value("camera_id")
                .map_err(|e| conversion("camera_id", &e))?,
            intersection: row.to_value("intersection").unwrap_or(None),
            address: row.to_value("address").unwrap_or(None),
            violation_date: row
                .to_value("violation_date")
                .map_err(|e| conversion("violation_date", &e))?,
            violations: row.to_value("violations").unwrap_or(0),
        })),
        Dataset::Congestions => Err(DbError::UnsupportedDataset { dataset }),
    }
}
