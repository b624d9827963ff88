//! Projects a boundary table, derives its area code and dissolves the
//! polygons of each area into one multipolygon.

use estat_table::{Column, ColumnValues, GEOMETRY_COLUMN, Table};
use geo::{MultiPolygon, unary_union};

use crate::BoundaryError;

/// Attribute columns of the census small-area boundaries kept for merging.
pub const BOUNDARY_COLUMNS: &[&str] = &[
    "KEY_CODE",
    "PREF",
    "CITY",
    "PREF_NAME",
    "CITY_NAME",
    GEOMETRY_COLUMN,
];

/// Name of the derived prefecture + city code column.
pub const AREA_CODE_COLUMN: &str = "AREA_CODE";

/// A column derived by concatenating two text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcatKey<'a> {
    /// Derived column name.
    pub name: &'a str,
    /// Leading source column.
    pub first: &'a str,
    /// Trailing source column.
    pub second: &'a str,
}

/// `AREA_CODE = PREF ++ CITY`.
pub const AREA_CODE: ConcatKey<'static> = ConcatKey {
    name: AREA_CODE_COLUMN,
    first: "PREF",
    second: "CITY",
};

/// Reduces raw boundary shards to one row per area.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryNormalizer<'a> {
    columns: &'a [&'a str],
    key: ConcatKey<'a>,
}

impl Default for BoundaryNormalizer<'static> {
    fn default() -> Self {
        Self::new(BOUNDARY_COLUMNS, AREA_CODE)
    }
}

impl<'a> BoundaryNormalizer<'a> {
    #[must_use]
    pub const fn new(columns: &'a [&'a str], key: ConcatKey<'a>) -> Self {
        Self { columns, key }
    }

    /// Projects, derives the key and dissolves on it.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Table`] if a projected or source column is
    /// missing.
    pub fn normalize(&self, table: &Table) -> Result<Table, BoundaryError> {
        let mut projected = table.select(self.columns)?;
        projected.concat_text(self.key.name, self.key.first, self.key.second)?;

        log::info!("Dissolving boundaries on {}", self.key.name);
        dissolve(&projected, self.key.name)
    }
}

/// Merges all rows sharing a `key` value.
///
/// One output row per distinct non-missing key, in ascending key order.
/// Columns are the key, then the geometry (union of the group's polygons),
/// then every other column holding its first non-missing value in original
/// row order. Rows without a key are dropped.
///
/// # Errors
///
/// Returns [`BoundaryError::Table`] if `key` is not a text column.
pub fn dissolve(table: &Table, key: &str) -> Result<Table, BoundaryError> {
    let groups = table.group_by(key)?;

    let grouped_rows: usize = groups.iter().map(|g| g.rows.len()).sum();
    if grouped_rows < table.len() {
        log::warn!(
            "Dropped {} rows without a {key} value",
            table.len() - grouped_rows
        );
    }

    let mut columns = vec![Column::text(
        key,
        groups.iter().map(|g| Some(g.key.clone())).collect(),
    )];

    if let Some(geometry) = table.geometry() {
        let values = geometry.as_geometry().unwrap_or_default();
        columns.push(Column::geometry(
            geometry.name(),
            groups
                .iter()
                .map(|g| union_all(g.rows.iter().filter_map(|&i| values[i].as_ref())))
                .collect(),
        ));
    }

    for column in table.columns() {
        if column.name() == key || column.is_geometry() {
            continue;
        }
        let ColumnValues::Text(values) = column.values() else {
            continue;
        };
        columns.push(Column::text(
            column.name(),
            groups
                .iter()
                .map(|g| g.rows.iter().find_map(|&i| values[i].clone()))
                .collect(),
        ));
    }

    log::info!("Dissolved {} rows into {} areas", table.len(), groups.len());

    Ok(Table::new(columns)?)
}

/// Unions a group's geometries in one overlay pass. A single geometry is
/// returned as is.
fn union_all<'g>(
    geometries: impl Iterator<Item = &'g MultiPolygon<f64>>,
) -> Option<MultiPolygon<f64>> {
    let geometries: Vec<&MultiPolygon<f64>> = geometries.collect();
    match geometries.as_slice() {
        [] => None,
        [only] => Some((*only).clone()),
        _ => Some(unary_union(geometries)),
    }
}
