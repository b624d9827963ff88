#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! GeoJSON and CSV output.
//!
//! Both writers create the destination directory and silently replace an
//! existing file.

use std::path::{Path, PathBuf};

use estat_table::{ColumnValues, Table, TableError, delimited};
use geojson::{Feature, FeatureCollection, Geometry, feature::Id};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    /// GeoJSON output needs a geometry column.
    #[error("Table has no geometry column")]
    NoGeometry,

    /// I/O error on an output path.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error.
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Builds a `FeatureCollection` with one feature per row.
///
/// Feature ids are the row index. Text columns become properties, missing
/// values `null`.
///
/// # Errors
///
/// Returns [`ExportError::NoGeometry`] if the table has no geometry column.
pub fn table_to_feature_collection(table: &Table) -> Result<FeatureCollection, ExportError> {
    let geometries = table
        .geometry()
        .and_then(|column| column.as_geometry())
        .ok_or(ExportError::NoGeometry)?;

    let features = geometries
        .iter()
        .enumerate()
        .map(|(row, geometry)| {
            let mut properties = Map::new();
            for column in table.columns() {
                if let ColumnValues::Text(values) = column.values() {
                    let value = values[row].clone().map_or(Value::Null, Value::String);
                    properties.insert(column.name().to_string(), value);
                }
            }

            Feature {
                bbox: None,
                geometry: geometry
                    .as_ref()
                    .map(|mp| Geometry::new(geojson::Value::from(mp))),
                id: Some(Id::String(row.to_string())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Writes `table` as pretty-printed GeoJSON to `dir/file_name`.
///
/// # Errors
///
/// Returns [`ExportError::NoGeometry`] for a table without geometry, or
/// [`ExportError::Io`] if the file cannot be written.
pub fn write_geojson(table: &Table, dir: &Path, file_name: &str) -> Result<PathBuf, ExportError> {
    let collection = table_to_feature_collection(table)?;
    let json = serde_json::to_string_pretty(&collection)?;

    let path = prepare(dir, file_name)?;
    std::fs::write(&path, json).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    log::info!("Wrote {} features to {}", table.len(), path.display());
    Ok(path)
}

/// Writes `table` as UTF-8 CSV to `dir/file_name`.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the file cannot be created or
/// [`ExportError::Table`] if a row cannot be written.
pub fn write_csv(table: &Table, dir: &Path, file_name: &str) -> Result<PathBuf, ExportError> {
    let path = prepare(dir, file_name)?;
    let file = std::fs::File::create(&path).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    delimited::write(table, file)?;

    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(path)
}

fn prepare(dir: &Path, file_name: &str) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    Ok(dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use estat_table::{Column, GEOMETRY_COLUMN};
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn table() -> Table {
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]);
        Table::new(vec![
            Column::text("AREA_CODE", vec![Some("01101".into()), Some("13101".into())]),
            Column::geometry(GEOMETRY_COLUMN, vec![Some(square), None]),
            Column::text("CITY_NAME", vec![Some("中央区".into()), None]),
        ])
        .unwrap()
    }

    #[test]
    fn features_carry_index_ids_and_text_properties() {
        let collection = table_to_feature_collection(&table()).unwrap();
        assert_eq!(collection.features.len(), 2);

        let first = &collection.features[0];
        assert_eq!(first.id, Some(Id::String("0".into())));
        assert!(first.geometry.is_some());
        let properties = first.properties.as_ref().unwrap();
        assert_eq!(properties["AREA_CODE"], Value::String("01101".into()));
        assert!(!properties.contains_key(GEOMETRY_COLUMN));

        let second = &collection.features[1];
        assert!(second.geometry.is_none());
        assert_eq!(second.properties.as_ref().unwrap()["CITY_NAME"], Value::Null);
    }

    #[test]
    fn geojson_requires_geometry() {
        let plain = table().select(&["AREA_CODE"]).unwrap();
        assert!(matches!(
            table_to_feature_collection(&plain),
            Err(ExportError::NoGeometry)
        ));
    }

    #[test]
    fn writes_geojson_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("created");

        let path = write_geojson(&table(), &out, "boundary.geojson").unwrap();
        let parsed: geojson::GeoJson = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        let geojson::GeoJson::FeatureCollection(collection) = parsed else {
            panic!("expected a FeatureCollection");
        };
        assert_eq!(collection.features.len(), 2);
    }

    #[test]
    fn csv_round_trip_keeps_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&table(), dir.path(), "boundary.csv").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let reread = delimited::read_str(&text, b',').unwrap();
        assert_eq!(reread.text("AREA_CODE").unwrap(), table().text("AREA_CODE").unwrap());
        assert_eq!(reread.text("CITY_NAME").unwrap(), table().text("CITY_NAME").unwrap());
    }

    #[test]
    fn rewriting_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(&table(), dir.path(), "stats.csv").unwrap();
        let smaller = table().select(&["AREA_CODE"]).unwrap();
        let path = write_csv(&smaller, dir.path(), "stats.csv").unwrap();

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "AREA_CODE\n01101\n13101\n"
        );
    }
}
