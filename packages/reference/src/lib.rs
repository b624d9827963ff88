#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Static e-Stat reference tables bundled with the toolchain.
//!
//! All tables are baked into the binary at compile time via
//! [`include_str!`] / [`include_bytes!`] and are read-only for the lifetime
//! of the process. The area code and government statistics code files are
//! Shift-JIS encoded, as published by e-Stat.

pub mod area;
pub mod default_ids;
pub mod gov_stats;
pub mod pref;

use std::borrow::Cow;

use estat_table::TableError;
use thiserror::Error;

/// Errors that can occur while loading or querying reference data.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// No prefecture has the given name.
    #[error("Prefecture not found: {name}")]
    PrefectureNotFound {
        /// Requested prefecture name.
        name: String,
    },

    /// No prefecture has the given code.
    #[error("Prefecture code not found: {code}")]
    PrefectureCodeNotFound {
        /// Requested prefecture code.
        code: u8,
    },

    /// No row of the standard area code table has the given code.
    #[error("Area code not found: {code}")]
    AreaCodeNotFound {
        /// Requested area code.
        code: String,
    },

    /// Reference table could not be parsed or projected.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading an external reference file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Decodes Shift-JIS bytes, logging if any sequence had to be replaced.
#[must_use]
pub fn decode_shift_jis(bytes: &[u8]) -> Cow<'_, str> {
    let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors {
        log::warn!("Replaced malformed Shift-JIS sequences while decoding reference data");
    }
    text
}
