//! # GeoBIA Algorithms
//!
//! Object-based image analysis algorithms for GeoBIA rasters.
//!
//! The centerpiece is the zonal aggregator in [`statistics::zonal`]: group a
//! value raster's pixels by segment label, reduce each group to summary
//! statistics, and attribute the chosen statistic back onto every pixel of
//! its segment.

mod maybe_rayon;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::statistics::{
        attribute_segments, zonal_mean, zonal_statistics, SegmentStats, ZonalParams,
        ZonalStatistic,
    };
    pub use geobia_core::prelude::*;
}
