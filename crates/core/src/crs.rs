//! Spatial reference identifiers
//!
//! A `SpatialRef` names the coordinate reference system a raster's
//! geotransform is expressed in. It travels with the raster as metadata and
//! ends up in the output file; resolving or reprojecting between reference
//! systems is left to the surrounding tooling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Spatial reference identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpatialRef {
    /// EPSG code, e.g. 32633 for WGS 84 / UTM zone 33N
    Epsg(u32),
    /// Well-known text definition
    Wkt(String),
    /// PROJ string definition
    Proj(String),
}

impl SpatialRef {
    /// WGS84 geographic coordinates (EPSG:4326)
    pub fn wgs84() -> Self {
        SpatialRef::Epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        SpatialRef::Epsg(3857)
    }

    /// EPSG code, if this reference is expressed as one
    pub fn epsg(&self) -> Option<u32> {
        match self {
            SpatialRef::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    /// Short string identifier, e.g. `EPSG:32633` or a truncated WKT
    pub fn identifier(&self) -> String {
        match self {
            SpatialRef::Epsg(code) => format!("EPSG:{}", code),
            SpatialRef::Proj(proj) => proj.clone(),
            SpatialRef::Wkt(wkt) => format!("WKT:{}", &wkt[..wkt.len().min(50)]),
        }
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for SpatialRef {
    fn default() -> Self {
        Self::wgs84()
    }
}
