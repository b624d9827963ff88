#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ordered, named, string-typed columns with an optional geometry column.
//!
//! Every value read from the e-Stat API or a shapefile attribute table is
//! kept as text so that codes with leading zeros (`"01"`, `"00200502"`)
//! survive unchanged. Geometry lives in its own column kind so that tables
//! can be projected, grouped and joined without caring which columns carry
//! polygons.

pub mod delimited;

use std::collections::{BTreeMap, BTreeSet};

use geo::MultiPolygon;
use thiserror::Error;

/// Conventional name of the geometry column produced by the shapefile loader.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Errors that can occur during table operations.
#[derive(Debug, Error)]
pub enum TableError {
    /// A referenced column does not exist.
    #[error("Column not found: {name}")]
    ColumnNotFound {
        /// Requested column name.
        name: String,
    },

    /// A text operation was applied to a geometry column.
    #[error("Column {name} is not a text column")]
    NotText {
        /// Offending column name.
        name: String,
    },

    /// A column's row count disagrees with the table's.
    #[error("Column {name} has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// Offending column name.
        name: String,
        /// Row count of the table.
        expected: usize,
        /// Row count of the column.
        actual: usize,
    },

    /// Two columns share a name.
    #[error("Duplicate column: {name}")]
    DuplicateColumn {
        /// Duplicated column name.
        name: String,
    },

    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cell storage for a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// Text cells; `None` is a missing value.
    Text(Vec<Option<String>>),
    /// Polygon cells; `None` is a missing geometry.
    Geometry(Vec<Option<MultiPolygon<f64>>>),
}

impl ColumnValues {
    /// Number of cells in the column.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Text(values) => values.len(),
            Self::Geometry(values) => values.len(),
        }
    }

    /// Whether the column has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gathers the cells at `indices`, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        match self {
            Self::Text(values) => Self::Text(indices.iter().map(|&i| values[i].clone()).collect()),
            Self::Geometry(values) => {
                Self::Geometry(indices.iter().map(|&i| values[i].clone()).collect())
            }
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    /// Creates a text column.
    #[must_use]
    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Text(values),
        }
    }

    /// Creates a geometry column.
    #[must_use]
    pub fn geometry(name: impl Into<String>, values: Vec<Option<MultiPolygon<f64>>>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Geometry(values),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn values(&self) -> &ColumnValues {
        &self.values
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the text cells, or `None` for a geometry column.
    #[must_use]
    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match &self.values {
            ColumnValues::Text(values) => Some(values),
            ColumnValues::Geometry(_) => None,
        }
    }

    /// Returns the geometry cells, or `None` for a text column.
    #[must_use]
    pub fn as_geometry(&self) -> Option<&[Option<MultiPolygon<f64>>]> {
        match &self.values {
            ColumnValues::Geometry(values) => Some(values),
            ColumnValues::Text(_) => None,
        }
    }

    #[must_use]
    pub const fn is_geometry(&self) -> bool {
        matches!(self.values, ColumnValues::Geometry(_))
    }

    fn take(&self, indices: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            values: self.values.take(indices),
        }
    }

    fn renamed(mut self, name: String) -> Self {
        self.name = name;
        self
    }
}

/// Rows grouped under one key value, in original row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Shared key value.
    pub key: String,
    /// Row indices carrying the key, ascending.
    pub rows: Vec<usize>,
}

/// An ordered sequence of equally long named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    len: usize,
}

impl Table {
    /// Builds a table from columns.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::LengthMismatch`] if the columns differ in length
    /// or [`TableError::DuplicateColumn`] if two columns share a name.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let len = columns.first().map_or(0, Column::len);
        let mut seen = BTreeSet::new();

        for column in &columns {
            if column.len() != len {
                return Err(TableError::LengthMismatch {
                    name: column.name.clone(),
                    expected: len,
                    actual: column.len(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }

        Ok(Self { columns, len })
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Looks up a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] if no column has that name.
    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Looks up a text column's cells by name.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] if the column is missing or
    /// [`TableError::NotText`] if it holds geometry.
    pub fn text(&self, name: &str) -> Result<&[Option<String>], TableError> {
        self.column(name)?
            .as_text()
            .ok_or_else(|| TableError::NotText {
                name: name.to_string(),
            })
    }

    /// The first geometry column, if any.
    #[must_use]
    pub fn geometry(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_geometry())
    }

    /// Adds a column, replacing an existing column of the same name in place.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::LengthMismatch`] if the column's length differs
    /// from the table's (an empty table adopts the column's length).
    pub fn insert_column(&mut self, column: Column) -> Result<(), TableError> {
        if self.columns.is_empty() {
            self.len = column.len();
        } else if column.len() != self.len {
            return Err(TableError::LengthMismatch {
                actual: column.len(),
                name: column.name,
                expected: self.len,
            });
        }

        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
        } else {
            self.columns.push(column);
        }

        Ok(())
    }

    /// Keeps exactly the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] for the first unknown name.
    pub fn select(&self, names: &[&str]) -> Result<Self, TableError> {
        let columns = names
            .iter()
            .map(|name| self.column(name).cloned())
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(columns)
    }

    /// Adds (or replaces) `new_name` holding `first ++ second` for every row.
    ///
    /// The values are concatenated as strings; a missing value on either side
    /// yields a missing result.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] or [`TableError::NotText`] if
    /// either source column is unusable.
    pub fn concat_text(
        &mut self,
        new_name: &str,
        first: &str,
        second: &str,
    ) -> Result<(), TableError> {
        let values = self
            .text(first)?
            .iter()
            .zip(self.text(second)?)
            .map(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => Some(format!("{a}{b}")),
                _ => None,
            })
            .collect();

        self.insert_column(Column::text(new_name, values))
    }

    /// Gathers the rows at `indices`, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            len: indices.len(),
        }
    }

    /// Keeps the rows whose text value in `name` satisfies `predicate`.
    /// Rows with a missing value are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] or [`TableError::NotText`].
    pub fn filter_text(
        &self,
        name: &str,
        predicate: impl Fn(&str) -> bool,
    ) -> Result<Self, TableError> {
        let indices: Vec<usize> = self
            .text(name)?
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_deref().filter(|v| predicate(v)).map(|_| i))
            .collect();

        Ok(self.take(&indices))
    }

    /// Groups row indices by the text value in `key`.
    ///
    /// Groups are ordered by ascending key; row indices inside a group keep
    /// their original order. Rows with a missing key are not grouped.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] or [`TableError::NotText`].
    pub fn group_by(&self, key: &str) -> Result<Vec<Group>, TableError> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

        for (i, value) in self.text(key)?.iter().enumerate() {
            if let Some(value) = value {
                groups.entry(value.as_str()).or_default().push(i);
            }
        }

        Ok(groups
            .into_iter()
            .map(|(key, rows)| Group {
                key: key.to_string(),
                rows,
            })
            .collect())
    }

    /// Inner equi-join of `self` (left) with `right` on `left_on == right_on`.
    ///
    /// Output rows follow left row order; each left row is repeated once per
    /// matching right row, in right row order. Columns are all left columns
    /// followed by all right columns. When both keys share a name the right
    /// key column is omitted; any other name present on both sides gets an
    /// `_x` (left) or `_y` (right) suffix.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ColumnNotFound`] or [`TableError::NotText`] if a
    /// key column is unusable.
    pub fn inner_join(
        &self,
        right: &Self,
        left_on: &str,
        right_on: &str,
    ) -> Result<Self, TableError> {
        let left_keys = self.text(left_on)?;
        let right_keys = right.text(right_on)?;

        let mut right_index: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (j, key) in right_keys.iter().enumerate() {
            if let Some(key) = key {
                right_index.entry(key.as_str()).or_default().push(j);
            }
        }

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for (i, key) in left_keys.iter().enumerate() {
            let Some(matches) = key.as_deref().and_then(|k| right_index.get(k)) else {
                continue;
            };
            for &j in matches {
                left_rows.push(i);
                right_rows.push(j);
            }
        }

        let shared_key = left_on == right_on;
        let right_columns: Vec<&Column> = right
            .columns
            .iter()
            .filter(|c| !(shared_key && c.name == right_on))
            .collect();

        let left_names: BTreeSet<&str> = self.columns.iter().map(Column::name).collect();
        let right_names: BTreeSet<&str> = right_columns.iter().map(|c| c.name()).collect();

        let mut columns = Vec::with_capacity(self.columns.len() + right_columns.len());
        for column in &self.columns {
            let name = if right_names.contains(column.name()) {
                format!("{}_x", column.name)
            } else {
                column.name.clone()
            };
            columns.push(column.take(&left_rows).renamed(name));
        }
        for column in right_columns {
            let name = if left_names.contains(column.name()) {
                format!("{}_y", column.name)
            } else {
                column.name.clone()
            };
            columns.push(column.take(&right_rows).renamed(name));
        }

        log::debug!(
            "Joined {} x {} rows on {left_on}={right_on} -> {} rows",
            self.len,
            right.len,
            left_rows.len()
        );

        Self::new(columns)
    }
}
