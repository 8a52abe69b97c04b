#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial building blocks for the traffic map aggregation queries.
//!
//! - [`grid`] maps a map zoom level to a grid-cell edge length and snaps
//!   coordinates onto that grid.
//! - [`predicate`] turns a viewport bounding box or a set of route steps
//!   into a [`SpatialPredicate`] that the incident store can evaluate.
//!
//! Everything here is pure: no I/O, no shared state.

pub mod grid;
pub mod predicate;

pub use predicate::{
    BoundingBox, Buffer, BufferRegions, BufferSet, RouteStep, SpatialPredicate,
};

use thiserror::Error;

/// Errors from building spatial predicates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    /// The supplied geometry cannot be used as a search region.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what is wrong with the input.
        message: String,
    },
}

impl SpatialError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }
}
