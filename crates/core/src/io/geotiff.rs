//! Native GeoTIFF reading and writing
//!
//! Built on the `tiff` crate; the codec itself is the external dependency,
//! this module only maps rasters onto its encoder/decoder and handles the
//! georeferencing tags (ModelPixelScale, ModelTiepoint, GeoKeyDirectory)
//! plus the GDAL_NODATA convention.

use crate::crs::SpatialRef;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

// GeoTIFF / GDAL tag numbers
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

/// Read a GeoTIFF file into a raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

/// Decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Codec(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Codec(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Codec(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_samples(&buf),
        DecodingResult::U16(buf) => cast_samples(&buf),
        DecodingResult::U32(buf) => cast_samples(&buf),
        DecodingResult::I8(buf) => cast_samples(&buf),
        DecodingResult::I16(buf) => cast_samples(&buf),
        DecodingResult::I32(buf) => cast_samples(&buf),
        DecodingResult::F32(buf) => cast_samples(&buf),
        DecodingResult::F64(buf) => cast_samples(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    if let Some(nodata) = read_nodata(&mut decoder) {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

fn cast_samples<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// Recover the geotransform from ModelPixelScale + ModelTiepoint tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Codec("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Codec("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        let pixel_width = scale[0];
        let pixel_height = -scale[1]; // Negative for north-up

        return Ok(GeoTransform::new(
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        ));
    }

    Err(Error::Codec("Cannot determine geotransform".into()))
}

/// Recover the no-data sentinel from the GDAL_NODATA ASCII tag
fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()?;
    text.trim_end_matches('\0').trim().parse::<f64>().ok()
}

/// Write a raster to a GeoTIFF file.
///
/// Samples are stored as 32-bit floats. The geotransform, the spatial
/// reference (when it is an EPSG code) and the no-data sentinel travel
/// in the standard GeoTIFF/GDAL tags.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file)
}

/// Write a raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

/// Encode a raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Codec(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Codec(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::Codec(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::Codec(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(raster.spatial_ref());
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Codec(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            format!("{}", nodata)
        };
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), text.as_str())
            .map_err(|e| Error::Codec(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Codec(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// Minimal GeoKeyDirectory: model/raster type keys, plus the projected CS
/// key when the spatial reference is an EPSG code that fits in a SHORT.
/// GTModelTypeGeoKey=1 (Projected), GTRasterTypeGeoKey=1 (PixelIsArea).
fn geokey_directory(spatial_ref: Option<&SpatialRef>) -> Vec<u16> {
    let epsg = spatial_ref
        .and_then(|s| s.epsg())
        .filter(|&code| code <= u16::MAX as u32);

    match epsg {
        Some(code) => vec![
            1, 1, 0, 3, // Version 1.1.0, 3 keys
            1024, 0, 1, 1, // GTModelTypeGeoKey = ModelTypeProjected
            1025, 0, 1, 1, // GTRasterTypeGeoKey = RasterPixelIsArea
            3072, 0, 1, code as u16, // ProjectedCSTypeGeoKey
        ],
        None => vec![
            1, 1, 0, 2, // Version 1.1.0, 2 keys
            1024, 0, 1, 1, // GTModelTypeGeoKey = ModelTypeProjected
            1025, 0, 1, 1, // GTRasterTypeGeoKey = RasterPixelIsArea
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_raster() -> Raster<f64> {
        let mut raster = Raster::new(4, 5);
        raster.set_transform(GeoTransform::new(500_000.0, 4_600_000.0, 10.0, -10.0));
        raster.set_spatial_ref(Some(SpatialRef::Epsg(32633)));
        for row in 0..4 {
            for col in 0..5 {
                raster.set(row, col, (row * 5 + col) as f64).unwrap();
            }
        }
        raster
    }

    #[test]
    fn test_buffer_roundtrip_values_and_transform() {
        let raster = sample_raster();

        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), (4, 5));
        for row in 0..4 {
            for col in 0..5 {
                // Samples are stored as f32; the test values are exact in f32.
                assert_eq!(back.get(row, col).unwrap(), (row * 5 + col) as f64);
            }
        }

        let gt = back.transform();
        assert_relative_eq!(gt.origin_x, 500_000.0, epsilon = 1e-6);
        assert_relative_eq!(gt.origin_y, 4_600_000.0, epsilon = 1e-6);
        assert_relative_eq!(gt.pixel_width, 10.0, epsilon = 1e-10);
        assert_relative_eq!(gt.pixel_height, -10.0, epsilon = 1e-10);
    }

    #[test]
    fn test_buffer_roundtrip_nodata_sentinel() {
        let mut raster = sample_raster();
        raster.set_nodata(Some(-9999.0));

        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_buffer_roundtrip_nan_nodata() {
        let mut raster = sample_raster();
        raster.set_nodata(Some(f64::NAN));
        raster.set(1, 1, f64::NAN).unwrap();

        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert!(back.nodata().unwrap().is_nan());
        assert!(back.get(1, 1).unwrap().is_nan());
        assert_eq!(back.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_read_into_integer_labels() {
        let mut labels: Raster<i32> = Raster::new(3, 3);
        labels.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        for row in 0..3 {
            for col in 0..3 {
                labels.set(row, col, (row as i32) * 10 + col as i32).unwrap();
            }
        }

        let buf = write_geotiff_to_buffer(&labels).unwrap();
        let back: Raster<i32> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.get(2, 2).unwrap(), 22);
        assert_eq!(back.get(0, 1).unwrap(), 1);
    }

    #[test]
    fn test_garbage_input_is_codec_error() {
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(b"not a tiff");
        assert!(matches!(result, Err(Error::Codec(_))));
    }
}
