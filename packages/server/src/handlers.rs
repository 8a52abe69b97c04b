//! HTTP handler functions for the traffic map API.

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use traffic_map_database_models::{
    AggregationQuery, DateRange, IncidentFilter, Page, TableQuery,
};
use traffic_map_dataset_models::Dataset;
use traffic_map_directions::{parse_waypoints, steps::unique_steps};
use traffic_map_features::rows_to_feature_collection;
use traffic_map_server_models::{
    ApiHealth, MapQueryParams, NavigationQueryParams, NavigationResponse, TableQueryParams,
    TableResponse,
};
use traffic_map_spatial::{BoundingBox, BufferSet, SpatialPredicate, grid};

use crate::AppState;
use crate::error::ApiError;

/// Largest accepted `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// `GET /api/v1/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/v1/{dataset}/map`
///
/// Counts incidents per grid cell inside the bounding box.
pub async fn map(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<MapQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let dataset = stored_dataset(&path)?;
    let params = params.into_inner();

    let cell_size = resolve_cell_size(params.grid_size, params.zoom)?;
    let bbox = BoundingBox::parse_json(&params.bounding_box)?;
    let filter = IncidentFilter {
        date_range: date_range(params.start_date, params.end_date)?,
        category: category_filter(dataset, params.street_name, params.intersection)?,
    };

    let rows = state
        .store
        .aggregate(&AggregationQuery {
            dataset,
            predicate: SpatialPredicate::BoundingBox(bbox),
            cell_size,
            filter,
        })
        .await?;

    log::debug!("{dataset} map: {} cells at cell size {cell_size}", rows.len());
    Ok(HttpResponse::Ok().json(rows_to_feature_collection(&rows)))
}

/// `GET /api/v1/{dataset}/table`
///
/// Lists one page of incidents, newest first, with the total match count.
pub async fn table(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<TableQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let dataset = stored_dataset(&path)?;
    let params = params.into_inner();

    if params.page_size == 0 || params.page_size > MAX_PAGE_SIZE {
        return Err(ApiError::validation(format!(
            "pageSize must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let query = TableQuery {
        dataset,
        filter: IncidentFilter {
            date_range: date_range(params.start_date, params.end_date)?,
            category: category_filter(dataset, params.street_name, params.intersection)?,
        },
        page: Page {
            size: params.page_size,
            index: params.page_index,
        },
    };

    let page = state.store.table(&query).await?;
    Ok(HttpResponse::Ok().json(TableResponse {
        rows: page.rows,
        total: page.total,
    }))
}

/// `GET /api/v1/{dataset}/cluster`
///
/// Serves the pre-merged static fixture for the dataset.
pub async fn cluster(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let dataset = parse_dataset(&path)?;
    if !dataset.has_cluster_fixture() {
        return Err(ApiError::not_found(format!(
            "Dataset '{dataset}' has no cluster view"
        )));
    }
    let collection = state
        .fixtures
        .get(dataset)
        .ok_or_else(|| ApiError::not_found(format!("Dataset '{dataset}' has no cluster view")))?;
    Ok(HttpResponse::Ok().json(collection))
}

/// `GET /api/v1/navigation`
///
/// Requests alternative driving routes, buffers every unique maneuver
/// point by its step distance, and counts crashes inside each buffer.
pub async fn navigation(
    state: web::Data<AppState>,
    params: web::Query<NavigationQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let waypoints = parse_waypoints(&params.coordinates)?;
    let date_range = date_range(params.start_date, params.end_date)?;

    let routes = state.directions.routes(&waypoints).await?;
    let steps = unique_steps(&routes);
    let buffers = BufferSet::from_steps(&steps)?;

    log::debug!(
        "Navigation: {} route(s), {} unique buffer(s)",
        routes.len(),
        buffers.len()
    );

    let rows = state
        .store
        .aggregate(&AggregationQuery {
            dataset: Dataset::Crashes,
            predicate: SpatialPredicate::Buffers(buffers),
            cell_size: 0.0,
            filter: IncidentFilter {
                date_range,
                category: None,
            },
        })
        .await?;

    Ok(HttpResponse::Ok().json(NavigationResponse {
        geo_json: rows_to_feature_collection(&rows),
        routes_data: routes.into_iter().map(|route| route.geometry).collect(),
    }))
}

/// `GET /api/v1/crashes/streetnames`
pub async fn street_names(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let names = state.store.distinct_names(Dataset::Crashes).await?;
    Ok(HttpResponse::Ok().json(names))
}

/// `GET /api/v1/redlights/intersections`
pub async fn intersections(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let names = state.store.distinct_names(Dataset::Redlights).await?;
    Ok(HttpResponse::Ok().json(names))
}

fn parse_dataset(name: &str) -> Result<Dataset, ApiError> {
    name.parse()
        .map_err(|_| ApiError::not_found(format!("Unknown dataset '{name}'")))
}

/// A dataset with incident tables (everything but congestions).
fn stored_dataset(name: &str) -> Result<Dataset, ApiError> {
    let dataset = parse_dataset(name)?;
    if dataset.schema().is_none() {
        return Err(ApiError::not_found(format!(
            "Dataset '{dataset}' only has a cluster view"
        )));
    }
    Ok(dataset)
}

fn date_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, ApiError> {
    if end < start {
        return Err(ApiError::validation(format!(
            "endDate {end} is before startDate {start}"
        )));
    }
    Ok(DateRange::new(start, end))
}

/// `gridSize` wins over `zoom`; one of them is required. `gridSize` may
/// not be finer than [`grid::FINEST_CELL_SIZE`].
fn resolve_cell_size(grid_size: Option<f64>, zoom: Option<f64>) -> Result<f64, ApiError> {
    match (grid_size, zoom) {
        (Some(size), _) if size.is_finite() && size >= grid::FINEST_CELL_SIZE => Ok(size),
        (Some(size), _) => Err(ApiError::validation(format!(
            "gridSize must be a number of at least {}, got {size}",
            grid::FINEST_CELL_SIZE
        ))),
        (None, Some(zoom)) if zoom.is_finite() => Ok(grid::cell_size_for_zoom(zoom)),
        (None, Some(zoom)) => Err(ApiError::validation(format!(
            "zoom must be a number, got {zoom}"
        ))),
        (None, None) => Err(ApiError::validation("gridSize or zoom is required")),
    }
}

/// Picks the category value matching the dataset's filter parameter and
/// rejects filters the dataset does not support.
fn category_filter(
    dataset: Dataset,
    street_name: Option<String>,
    intersection: Option<String>,
) -> Result<Option<String>, ApiError> {
    let (wanted, other) = match dataset.category_param() {
        Some("streetName") => (street_name, intersection.map(|_| "intersection")),
        Some("intersection") => (intersection, street_name.map(|_| "streetName")),
        _ => (
            None,
            street_name
                .map(|_| "streetName")
                .or_else(|| intersection.map(|_| "intersection")),
        ),
    };

    if let Some(param) = other {
        return Err(ApiError::validation(format!(
            "{param} filter is not supported for {dataset}"
        )));
    }

    Ok(wanted.filter(|value| !value.is_empty()))
}
