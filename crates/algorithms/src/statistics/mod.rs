//! Statistical aggregation over labeled rasters
//!
//! - **zonal**: per-segment statistics and segment attribution

pub mod zonal;

pub use zonal::{
    attribute_segments, zonal_mean, zonal_statistics, SegmentStats, ZonalParams, ZonalStatistic,
};
