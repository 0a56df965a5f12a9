//! Zonal statistics and segment attribution
//!
//! A segmentation stage hands over a label raster in which every pixel
//! carries the integer id of its segment. This module reduces the value
//! raster per segment and writes the chosen statistic back onto each pixel,
//! producing the segment-attributed raster that object-based workflows
//! export.

use std::collections::HashMap;

use crate::maybe_rayon::*;
use geobia_core::raster::Raster;
use geobia_core::{Error, Result};
use ndarray::Array2;

/// Statistics that can be attributed back onto segments.
///
/// All of these derive from the associative [`SegmentStats`] accumulator,
/// so per-shard partial tables merge without revisiting any pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZonalStatistic {
    Mean,
    StdDev,
    Min,
    Max,
    Range,
    Sum,
    Count,
}

/// Options for zonal aggregation
#[derive(Debug, Clone)]
pub struct ZonalParams {
    /// Statistic written to the output raster
    pub statistic: ZonalStatistic,
    /// Exclude missing observations from the accumulation (default: true).
    /// When false they propagate: any missing observation in a segment
    /// renders its sum, mean and standard deviation NaN.
    pub skip_nodata: bool,
}

impl Default for ZonalParams {
    fn default() -> Self {
        Self {
            statistic: ZonalStatistic::Mean,
            skip_nodata: true,
        }
    }
}

/// Accumulated statistics for one segment.
///
/// `push` folds one sample in; `merge` combines two partial accumulators.
/// Both are associative, so shards covering disjoint pixel sets combine in
/// a single pass (the sum/count decomposition of the mean).
#[derive(Debug, Clone, Copy)]
pub struct SegmentStats {
    /// Segment label
    pub label: i32,
    /// Number of accumulated samples
    pub count: usize,
    /// Sum of samples
    pub sum: f64,
    /// Sum of squared samples
    pub sum_sq: f64,
    /// Smallest finite sample (infinity while empty)
    pub min: f64,
    /// Largest finite sample (-infinity while empty)
    pub max: f64,
}

impl SegmentStats {
    fn new(label: i32) -> Self {
        Self {
            label,
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn merge(&mut self, other: &SegmentStats) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
    }

    /// Arithmetic mean; NaN for a segment with no accumulated samples
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    /// Population standard deviation; NaN for an empty segment
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        let mean = self.mean();
        let var = self.sum_sq / self.count as f64 - mean * mean;
        if var.is_nan() {
            return f64::NAN;
        }
        var.max(0.0).sqrt()
    }

    /// Spread between the extremes; NaN when no finite sample was seen
    pub fn range(&self) -> f64 {
        if self.min <= self.max {
            self.max - self.min
        } else {
            f64::NAN
        }
    }

    /// The requested statistic for this segment
    pub fn value(&self, statistic: ZonalStatistic) -> f64 {
        match statistic {
            ZonalStatistic::Mean => self.mean(),
            ZonalStatistic::StdDev => self.std_dev(),
            ZonalStatistic::Min => {
                if self.min <= self.max {
                    self.min
                } else {
                    f64::NAN
                }
            }
            ZonalStatistic::Max => {
                if self.min <= self.max {
                    self.max
                } else {
                    f64::NAN
                }
            }
            ZonalStatistic::Range => self.range(),
            ZonalStatistic::Sum => {
                if self.count == 0 {
                    f64::NAN
                } else {
                    self.sum
                }
            }
            ZonalStatistic::Count => self.count as f64,
        }
    }
}

/// Compute per-segment statistics for a labeled raster.
///
/// Every distinct label in `labels` gets one [`SegmentStats`] entry,
/// including segments whose pixels are all missing (their `count` stays 0
/// and the derived statistics come out NaN).
///
/// Accumulation is sharded by rows and the partial tables merge in
/// ascending row order. The floating-point accumulation order is therefore
/// fixed: results are bit-identical across repeated calls and with or
/// without the `parallel` feature.
///
/// # Arguments
/// * `values` - Value raster; NaN and the raster's no-data sentinel mark
///   missing observations
/// * `labels` - Segment label raster, same shape, non-negative labels
/// * `skip_nodata` - Exclude missing observations from the accumulation
///
/// # Errors
/// `ShapeMismatch` when the rasters disagree in shape; `InvalidLabel` at
/// the first negative label.
pub fn zonal_statistics(
    values: &Raster<f64>,
    labels: &Raster<i32>,
    skip_nodata: bool,
) -> Result<HashMap<i32, SegmentStats>> {
    check_shapes(values, labels)?;

    let (rows, cols) = values.shape();
    let nodata = values.nodata();

    let partials: Vec<Result<HashMap<i32, SegmentStats>>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut table: HashMap<i32, SegmentStats> = HashMap::new();

            for col in 0..cols {
                let label = unsafe { labels.get_unchecked(row, col) };
                if label < 0 {
                    return Err(Error::InvalidLabel { row, col, label });
                }

                let entry = table
                    .entry(label)
                    .or_insert_with(|| SegmentStats::new(label));

                let value = unsafe { values.get_unchecked(row, col) };
                if is_nodata_f64(value, nodata) {
                    if skip_nodata {
                        continue;
                    }
                    // Missing observations poison the segment when kept
                    entry.push(f64::NAN);
                    continue;
                }

                entry.push(value);
            }

            Ok(table)
        })
        .collect();

    let mut merged: HashMap<i32, SegmentStats> = HashMap::new();
    for partial in partials {
        for (label, stats) in partial? {
            merged
                .entry(label)
                .and_modify(|acc| acc.merge(&stats))
                .or_insert(stats);
        }
    }

    Ok(merged)
}

/// Attribute each pixel with its segment's statistic.
///
/// The output has the same shape and georeferencing as `values`, with NaN
/// as its no-data value. A pixel whose segment accumulated no valid
/// observation comes out NaN.
///
/// # Arguments
/// * `values` - Value raster
/// * `labels` - Segment label raster, same shape
/// * `params` - Statistic to attribute and no-data handling
pub fn attribute_segments(
    values: &Raster<f64>,
    labels: &Raster<i32>,
    params: ZonalParams,
) -> Result<Raster<f64>> {
    let table = zonal_statistics(values, labels, params.skip_nodata)?;
    let (rows, cols) = values.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let label = unsafe { labels.get_unchecked(row, col) };
                // Every label was entered into the table during accumulation
                if let Some(stats) = table.get(&label) {
                    row_data[col] = stats.value(params.statistic);
                }
            }
            row_data
        })
        .collect();

    let mut output = values.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Segment-attributed mean, the default aggregation of object-based
/// workflows: every pixel receives the mean of its segment's valid
/// observations. Shorthand for [`attribute_segments`] with default
/// parameters.
pub fn zonal_mean(values: &Raster<f64>, labels: &Raster<i32>) -> Result<Raster<f64>> {
    attribute_segments(values, labels, ZonalParams::default())
}

fn check_shapes(values: &Raster<f64>, labels: &Raster<i32>) -> Result<()> {
    if values.shape() != labels.shape() {
        return Err(Error::ShapeMismatch {
            expected: values.shape(),
            actual: labels.shape(),
        });
    }
    Ok(())
}

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => (value - nd).abs() < f64::EPSILON,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geobia_core::GeoTransform;

    fn values_from(data: &[f64], rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(data.to_vec(), rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    fn labels_from(data: &[i32], rows: usize, cols: usize) -> Raster<i32> {
        Raster::from_vec(data.to_vec(), rows, cols).unwrap()
    }

    /// Compare two rasters bit-for-bit (NaN == NaN)
    fn assert_identical(a: &Raster<f64>, b: &Raster<f64>) {
        assert_eq!(a.shape(), b.shape());
        let (rows, cols) = a.shape();
        for row in 0..rows {
            for col in 0..cols {
                let va = a.get(row, col).unwrap();
                let vb = b.get(row, col).unwrap();
                assert_eq!(
                    va.to_bits(),
                    vb.to_bits(),
                    "rasters differ at ({}, {}): {} vs {}",
                    row,
                    col,
                    va,
                    vb
                );
            }
        }
    }

    #[test]
    fn test_two_segment_means() {
        let values = values_from(&[1.0, 3.0, 5.0, 7.0], 2, 2);
        let labels = labels_from(&[0, 0, 1, 1], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();

        assert_eq!(result.get(0, 0).unwrap(), 2.0);
        assert_eq!(result.get(0, 1).unwrap(), 2.0);
        assert_eq!(result.get(1, 0).unwrap(), 6.0);
        assert_eq!(result.get(1, 1).unwrap(), 6.0);
    }

    #[test]
    fn test_table_counts_and_sums() {
        let values = values_from(&[1.0, 3.0, 5.0, 7.0, 9.0, 11.0], 2, 3);
        let labels = labels_from(&[4, 4, 4, 9, 9, 9], 2, 3);

        let table = zonal_statistics(&values, &labels, true).unwrap();
        assert_eq!(table.len(), 2);

        let a = &table[&4];
        assert_eq!(a.count, 3);
        assert_eq!(a.sum, 9.0);
        assert_eq!(a.mean(), 3.0);

        let b = &table[&9];
        assert_eq!(b.count, 3);
        assert_eq!(b.sum, 27.0);
        assert_eq!(b.mean(), 9.0);
    }

    #[test]
    fn test_single_label_is_global_mean() {
        let values = values_from(&[2.0, 4.0, 6.0, 8.0], 2, 2);
        let labels = labels_from(&[7, 7, 7, 7], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(result.get(row, col).unwrap(), 5.0);
            }
        }
    }

    #[test]
    fn test_unique_labels_return_input() {
        let values = values_from(&[1.5, 2.5, 3.5, 4.5, 5.5, 6.5], 2, 3);
        let labels = labels_from(&[0, 1, 2, 3, 4, 5], 2, 3);

        let result = zonal_mean(&values, &labels).unwrap();
        assert_identical(&result, &values);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let values: Raster<f64> = Raster::new(4, 4);
        let labels: Raster<i32> = Raster::new(4, 5);

        let result = zonal_statistics(&values, &labels, true);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_negative_label_rejected() {
        let values = values_from(&[1.0, 2.0, 3.0, 4.0], 2, 2);
        let labels = labels_from(&[0, 0, -3, 0], 2, 2);

        let result = zonal_statistics(&values, &labels, true);
        match result {
            Err(Error::InvalidLabel { row, col, label }) => {
                assert_eq!((row, col, label), (1, 0, -3));
            }
            other => panic!("expected InvalidLabel, got {:?}", other),
        }
    }

    #[test]
    fn test_label_zero_is_a_segment() {
        let values = values_from(&[10.0, 20.0], 1, 2);
        let labels = labels_from(&[0, 0], 1, 2);

        let table = zonal_statistics(&values, &labels, true).unwrap();
        assert_eq!(table[&0].mean(), 15.0);
    }

    #[test]
    fn test_nodata_excluded_from_mean() {
        // Group of two with one missing member: the remaining value wins
        let values = values_from(&[8.0, f64::NAN, 1.0, 3.0], 2, 2);
        let labels = labels_from(&[0, 0, 1, 1], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 8.0);
        assert_eq!(result.get(0, 1).unwrap(), 8.0);
        assert_eq!(result.get(1, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_nodata_poisons_when_kept() {
        let values = values_from(&[8.0, f64::NAN, 1.0, 3.0], 2, 2);
        let labels = labels_from(&[0, 0, 1, 1], 2, 2);

        let params = ZonalParams {
            skip_nodata: false,
            ..Default::default()
        };
        let result = attribute_segments(&values, &labels, params).unwrap();

        assert!(result.get(0, 0).unwrap().is_nan());
        assert!(result.get(0, 1).unwrap().is_nan());
        assert_eq!(result.get(1, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_explicit_sentinel_respected() {
        let mut values = values_from(&[8.0, -9999.0, 1.0, 3.0], 2, 2);
        values.set_nodata(Some(-9999.0));
        let labels = labels_from(&[0, 0, 1, 1], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 8.0);
        assert_eq!(result.get(0, 1).unwrap(), 8.0);
    }

    #[test]
    fn test_all_nodata_segment_is_nodata() {
        let values = values_from(&[f64::NAN, f64::NAN, 1.0, 3.0], 2, 2);
        let labels = labels_from(&[5, 5, 6, 6], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
        assert!(result.get(0, 1).unwrap().is_nan());
        assert_eq!(result.get(1, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_all_nodata_raster_is_valid_degenerate() {
        let values = values_from(&[f64::NAN; 9], 3, 3);
        let labels = labels_from(&[1; 9], 3, 3);

        let result = zonal_mean(&values, &labels).unwrap();
        for row in 0..3 {
            for col in 0..3 {
                assert!(result.get(row, col).unwrap().is_nan());
            }
        }
    }

    #[test]
    fn test_single_pixel_segment_keeps_its_value() {
        let values = values_from(&[0.125, 4.0, 4.0, 4.0], 2, 2);
        let labels = labels_from(&[3, 8, 8, 8], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 0.125);
    }

    #[test]
    fn test_deterministic_repeat() {
        let mut data = Vec::with_capacity(40 * 40);
        let mut label_data = Vec::with_capacity(40 * 40);
        for row in 0..40 {
            for col in 0..40 {
                data.push(0.1 + (row * 7 + col * 13) as f64 * 0.01);
                label_data.push(((row / 5) * 8 + col / 5) as i32);
            }
        }
        let values = values_from(&data, 40, 40);
        let labels = labels_from(&label_data, 40, 40);

        let first = zonal_mean(&values, &labels).unwrap();
        let second = zonal_mean(&values, &labels).unwrap();
        assert_identical(&first, &second);
    }

    #[test]
    fn test_attribution_idempotent() {
        let values = values_from(&[1.0, 3.0, 5.0, 7.0], 2, 2);
        let labels = labels_from(&[0, 0, 1, 1], 2, 2);

        let once = zonal_mean(&values, &labels).unwrap();
        let twice = zonal_mean(&once, &labels).unwrap();
        assert_identical(&once, &twice);
    }

    #[test]
    fn test_statistic_menu() {
        let values = values_from(&[2.0, 4.0, 6.0, 100.0], 2, 2);
        let labels = labels_from(&[1, 1, 1, 2], 2, 2);

        let table = zonal_statistics(&values, &labels, true).unwrap();
        let s = &table[&1];

        assert_eq!(s.value(ZonalStatistic::Mean), 4.0);
        assert_eq!(s.value(ZonalStatistic::Min), 2.0);
        assert_eq!(s.value(ZonalStatistic::Max), 6.0);
        assert_eq!(s.value(ZonalStatistic::Range), 4.0);
        assert_eq!(s.value(ZonalStatistic::Sum), 12.0);
        assert_eq!(s.value(ZonalStatistic::Count), 3.0);

        // Population std dev of {2, 4, 6}
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((s.value(ZonalStatistic::StdDev) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_attribute_preserves_georeferencing() {
        let mut values = values_from(&[1.0, 3.0, 5.0, 7.0], 2, 2);
        values.set_transform(GeoTransform::new(500_000.0, 4_600_000.0, 30.0, -30.0));
        values.set_spatial_ref(Some(geobia_core::SpatialRef::Epsg(32633)));
        let labels = labels_from(&[0, 0, 1, 1], 2, 2);

        let result = zonal_mean(&values, &labels).unwrap();
        assert_eq!(result.transform(), values.transform());
        assert_eq!(result.spatial_ref(), values.spatial_ref());
        assert!(result.nodata().unwrap().is_nan());
    }
}
