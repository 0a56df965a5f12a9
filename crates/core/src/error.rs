//! Error types for GeoBIA

use thiserror::Error;

/// Main error type for GeoBIA operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid segment label {label} at ({row}, {col}): labels must be non-negative")]
    InvalidLabel { row: usize, col: usize, label: i32 },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GeoTIFF codec error: {0}")]
    Codec(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for GeoBIA operations
pub type Result<T> = std::result::Result<T, Error>;
