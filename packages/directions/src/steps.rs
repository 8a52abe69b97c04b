//! Maneuver-point extraction for route buffering.
//!
//! Alternative routes usually share most of their maneuvers, so the same
//! `(location, distance)` pair shows up once per route. Each unique pair
//! becomes one buffer in the route aggregation query.

use std::collections::BTreeSet;

use crate::{Route, RouteStep};

/// Flattens every step of every leg of every route and removes exact
/// duplicates.
///
/// Two steps are duplicates only when both location and distance match,
/// so the same corner reached with a different remaining distance is kept.
/// Survivors keep the order of their first occurrence.
#[must_use]
pub fn unique_steps(routes: &[Route]) -> Vec<RouteStep> {
    let steps = routes
        .iter()
        .flat_map(|route| &route.legs)
        .flat_map(|leg| &leg.steps)
        .map(|step| RouteStep {
            location: step.maneuver.location,
            distance: step.distance,
        });

    let unique = dedup_steps(steps);
    log::debug!(
        "Extracted {} unique step(s) from {} route(s)",
        unique.len(),
        routes.len()
    );
    unique
}

/// Removes exact duplicate steps, keeping first occurrences in order.
#[must_use]
pub fn dedup_steps(steps: impl IntoIterator<Item = RouteStep>) -> Vec<RouteStep> {
    let mut seen = BTreeSet::new();
    steps
        .into_iter()
        .filter(|step| seen.insert(step.identity()))
        .collect()
}
