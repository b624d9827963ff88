#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Joins dissolved boundaries with statistics rows on area code.

use estat_api::{ApiError, EStatClient};
use estat_api_models::SingleStatsQuery;
use estat_table::{Table, TableError};
use thiserror::Error;

/// Errors that can occur while merging.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Fetching or parsing the statistics failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A join key column is unusable.
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Join key column on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeKeys<'a> {
    /// Key column of the boundary table.
    pub boundary: &'a str,
    /// Key column of the statistics table.
    pub stats: &'a str,
}

/// Dissolved `AREA_CODE` against the API's `area_code`.
pub const AREA_CODE_KEYS: MergeKeys<'static> = MergeKeys {
    boundary: "AREA_CODE",
    stats: "area_code",
};

/// Inner join of `boundary` with `stats`.
///
/// Areas without statistics and statistics without an area are dropped.
/// An area matching several statistics rows appears once per match, each
/// carrying the same geometry.
///
/// # Errors
///
/// Returns [`MergeError::Table`] if either key column is missing.
pub fn merge_boundary_stats(
    boundary: &Table,
    stats: &Table,
    keys: MergeKeys<'_>,
) -> Result<Table, MergeError> {
    let merged = boundary.inner_join(stats, keys.boundary, keys.stats)?;

    log::info!(
        "Merged {} areas with {} statistics rows into {} records",
        boundary.len(),
        stats.len(),
        merged.len()
    );
    if merged.is_empty() {
        log::warn!(
            "No statistics matched on {} = {}",
            keys.boundary,
            keys.stats
        );
    }

    Ok(merged)
}

/// Fetches one area / class / year, keeps that year's rows and joins them
/// onto `boundary`.
///
/// # Errors
///
/// Returns [`MergeError::Api`] if the fetch fails or [`MergeError::Table`]
/// if a key column is missing.
pub async fn fetch_and_merge(
    client: &EStatClient,
    boundary: &Table,
    query: &SingleStatsQuery,
    keys: MergeKeys<'_>,
) -> Result<Table, MergeError> {
    let stats = client.fetch_stats_for_year(query).await?;
    merge_boundary_stats(boundary, &stats, keys)
}
