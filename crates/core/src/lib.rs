//! # GeoBIA Core
//!
//! Core types and I/O for the GeoBIA toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced grid type
//! - `GeoTransform`: affine mapping between pixel and geographic coordinates
//! - `SpatialRef`: spatial reference identifier (EPSG / WKT / PROJ)
//! - Native GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::SpatialRef;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::SpatialRef;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}
