#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the traffic map.
//!
//! Serves grid-aggregated incident maps, paginated incident tables, static
//! camera clusters, and crash counts along driving routes for the City of
//! Chicago traffic datasets. Incidents come from a `PostGIS` database (or
//! an in-memory store for local work); routes come from the Mapbox
//! Directions API.

pub mod config;
pub mod error;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use traffic_map_database::memory::MemoryStore;
use traffic_map_database::postgis::PostgisStore;
use traffic_map_database::{IncidentStore, db, run_migrations};
use traffic_map_directions::mapbox::MapboxDirections;
use traffic_map_directions::{DirectionsProvider, Unconfigured};
use traffic_map_features::ClusterFixtures;

pub use config::{ServerConfig, StoreKind};
pub use error::ApiError;
pub use handlers::MAX_PAGE_SIZE;

/// File in the fixtures directory holding records for the in-memory store.
pub const MEMORY_STORE_FILE: &str = "incidents.json";

/// Shared application state. Immutable after start-up.
pub struct AppState {
    /// Incident aggregation and listing.
    pub store: Arc<dyn IncidentStore>,
    /// Driving directions for `/navigation`.
    pub directions: Arc<dyn DirectionsProvider>,
    /// Pre-merged cluster collections.
    pub fixtures: Arc<ClusterFixtures>,
}

/// Registers the `/api/v1` routes.
///
/// Query-string extraction failures (missing or malformed parameters)
/// are answered with a JSON `400` like every other validation error.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::validation(err.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health))
            .route("/navigation", web::get().to(handlers::navigation))
            .route("/crashes/streetnames", web::get().to(handlers::street_names))
            .route(
                "/redlights/intersections",
                web::get().to(handlers::intersections),
            )
            .route("/{dataset}/map", web::get().to(handlers::map))
            .route("/{dataset}/table", web::get().to(handlers::table))
            .route("/{dataset}/cluster", web::get().to(handlers::cluster)),
    );
}

/// Starts the traffic map API server.
///
/// Reads [`ServerConfig`] from the environment, opens the incident store
/// (connecting to `PostGIS` and running migrations, or loading the
/// in-memory store), loads the cluster fixtures, and starts the Actix-Web
/// HTTP server. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the database connection fails, migrations fail, the
/// fixtures cannot be parsed, or the directions client cannot be built.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env();

    let store: Arc<dyn IncidentStore> = match config.store {
        StoreKind::Postgis => {
            log::info!("Connecting to database...");
            let db_conn = db::connect(&config.database_url, config.statement_timeout)
                .await
                .expect("Failed to connect to database");

            log::info!("Running migrations...");
            run_migrations(db_conn.as_ref())
                .await
                .expect("Failed to run migrations");

            Arc::new(PostgisStore::new(Arc::from(db_conn)))
        }
        StoreKind::Memory => {
            let path = config.fixtures_dir.join(MEMORY_STORE_FILE);
            if path.exists() {
                Arc::new(MemoryStore::load(&path).expect("Failed to load in-memory incidents"))
            } else {
                log::warn!(
                    "{} not found, serving an empty in-memory store",
                    path.display()
                );
                Arc::new(MemoryStore::default())
            }
        }
    };

    let directions: Arc<dyn DirectionsProvider> = match &config.mapbox_access_token {
        Some(token) => Arc::new(
            MapboxDirections::new(&config.directions_base_url, token)
                .expect("Failed to build directions client"),
        ),
        None => {
            log::warn!("MAPBOX_ACCESS_TOKEN is not set, /navigation will fail");
            Arc::new(Unconfigured)
        }
    };

    log::info!("Loading cluster fixtures...");
    let fixtures =
        ClusterFixtures::load(&config.fixtures_dir).expect("Failed to load cluster fixtures");

    let state = web::Data::new(AppState {
        store,
        directions,
        fixtures: Arc::new(fixtures),
    });

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
