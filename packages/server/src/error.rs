//! HTTP error type for the API handlers.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use traffic_map_database::DbError;
use traffic_map_directions::DirectionsError;
use traffic_map_spatial::SpatialError;

/// Everything a handler can fail with.
///
/// The response body is always `{"error": "<message>"}`. Store failures
/// are reported with a generic message; the detail only goes to the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed request parameters.
    #[error("{message}")]
    Validation {
        /// What is wrong with the request.
        message: String,
    },

    /// Unknown dataset, or a dataset without the requested view.
    #[error("{message}")]
    NotFound {
        /// What was not found.
        message: String,
    },

    /// Unusable bounding box or buffer geometry.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Incident store failure.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Directions provider failure.
    #[error(transparent)]
    Directions(#[from] DirectionsError),
}

impl ApiError {
    /// Shorthand for [`ApiError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`ApiError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(DbError::UnsupportedDataset { .. })
            | Self::Validation { .. }
            | Self::NotFound { .. }
            | Self::Spatial(_)
            | Self::Directions(
                DirectionsError::NoRoute | DirectionsError::InvalidCoordinates { .. },
            ) => self.to_string(),
            Self::Database(_) => "Failed to query incidents".to_string(),
            Self::Directions(DirectionsError::NotConfigured) => {
                "Directions provider is not configured".to_string()
            }
            Self::Directions(_) => "Directions provider request failed".to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::Spatial(_)
            | Self::Directions(DirectionsError::InvalidCoordinates { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. }
            | Self::Database(DbError::UnsupportedDataset { .. })
            | Self::Directions(DirectionsError::NoRoute) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Directions(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::warn!("Request rejected: {self}");
        }
        HttpResponse::build(status).json(json!({ "error": self.public_message() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_map_dataset_models::Dataset;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SpatialError::InvalidGeometry {
                message: "zero area".to_string()
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DirectionsError::NoRoute).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DirectionsError::NotConfigured).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(DbError::Conversion {
                message: "count".to_string()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(DbError::UnsupportedDataset {
                dataset: Dataset::Congestions
            })
            .status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn hides_store_details() {
        let err = ApiError::from(DbError::Conversion {
            message: "column crash_date missing".to_string(),
        });
        assert_eq!(err.public_message(), "Failed to query incidents");
        assert_eq!(
            ApiError::from(DirectionsError::NoRoute).public_message(),
            "No route found"
        );
    }
}
