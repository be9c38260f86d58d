use std::path::PathBuf;

use thiserror::Error;

use crate::model::Window;

/// Errors raised while reading layers, evaluating rules or writing products.
///
/// None of these are retried: the first failure aborts the product being
/// processed and is handed back to the caller.
#[derive(Debug, Error)]
pub enum StratError {
    #[error("layer {layer} does not match the domain mask grid: {reason}")]
    LayerGeometryMismatch { layer: String, reason: String },

    #[error("required layer {layer} not found (expected at {path:?})")]
    MissingLayer { layer: String, path: PathBuf },

    #[error("input array {layer} is required but was not loaded for this block")]
    MissingInput { layer: String },

    #[error("array {layer} has {actual} cells, expected {expected}")]
    ShapeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("cell ({col}, {row}) lies outside the {cols} x {rows} grid")]
    CellOutOfGrid {
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
    },

    #[error("failed to read block {window} of layer {layer}: {source}")]
    BlockRead {
        layer: String,
        window: Window,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("failed to write block {window} of product {product}: {source}")]
    BlockWrite {
        product: String,
        window: Window,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StratError>;
