#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative boundary polygons from e-Stat.
//!
//! [`download`] fetches a prefecture's zipped shapefile, [`loader`] turns a
//! `.shp` or `.zip` into a [`estat_table::Table`], and [`normalize`]
//! dissolves the census small-area shards into one row per municipality.

pub mod download;
pub mod loader;
pub mod normalize;
pub mod progress;

use estat_table::TableError;
use thiserror::Error;

pub use download::{BoundaryDownloader, DEFAULT_DOWNLOAD_URL};
pub use loader::load_boundary;
pub use normalize::{AREA_CODE, AREA_CODE_COLUMN, BOUNDARY_COLUMNS, BoundaryNormalizer, ConcatKey};

/// Errors that can occur while acquiring or processing boundaries.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Only `.shp` and `.zip` can be loaded.
    #[error("Only .shp or .zip files can be read: {path}")]
    UnsupportedExtension {
        /// Rejected path.
        path: String,
    },

    /// The path is missing or not a regular file.
    #[error("Not a file: {path}")]
    NotAFile {
        /// Rejected path.
        path: String,
    },

    /// The download answered with something other than 200.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The archive holds no `.shp` member.
    #[error("No .shp file in archive {path}")]
    ShapefileNotInArchive {
        /// Archive path.
        path: String,
    },

    /// The archive holds a `.shp` without its `.dbf`.
    #[error("No .dbf next to {shp} in archive {path}")]
    DbfNotInArchive {
        /// Archive path.
        path: String,
        /// The `.shp` member found.
        shp: String,
    },

    /// A polygon record could not be converted.
    #[error("Invalid geometry: {message}")]
    Geometry {
        /// Conversion failure detail.
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error on a local file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Zip archive error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Shapefile read error.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// Attribute table read error.
    #[error("dBase error: {0}")]
    Dbase(#[from] shapefile::dbase::Error),

    /// Table operation error.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Header pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
