use estat_api::ApiError;
use estat_boundary::BoundaryError;
use estat_export::ExportError;
use estat_merge::MergeError;
use estat_reference::ReferenceError;
use estat_table::TableError;
use thiserror::Error;

use crate::config::ConfigError;

/// Any failure that ends a command. `main` logs it and exits non-zero.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Table(#[from] TableError),
}
