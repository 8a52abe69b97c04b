//! Database connection utilities.

use std::time::Duration;

use switchy_database::Database;
use switchy_database_connection::Credentials;

/// Opens the `PostGIS` connection shared by every request.
///
/// Sets `statement_timeout` so a runaway aggregation fails with an error
/// instead of holding the connection indefinitely.
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed, the connection fails, or
/// the session timeout cannot be set.
pub async fn connect(
    url: &str,
    statement_timeout: Duration,
) -> Result<Box<dyn Database>, Box<dyn std::error::Error>> {
    // Strip query parameters (e.g., ?sslmode=require) that the Credentials
    // parser doesn't understand. TLS is handled by the native-tls connector.
    let url_base = url.split('?').next().unwrap_or(url);

    let creds = Credentials::from_url(url_base)?;
    let db = switchy_database_connection::init_postgres_raw_native_tls(creds).await?;

    let timeout_ms = statement_timeout.as_millis();
    db.exec_raw(&format!("SET statement_timeout = {timeout_ms}"))
        .await?;
    log::debug!("Set statement_timeout to {timeout_ms}ms");

    Ok(db)
}
