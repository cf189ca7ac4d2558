// convert.rs — Conversions between Mat and the outside world.
//
//   dynamic value  ⇄  Mat   (binding layer, serde_json)
//   DynamicImage   ⇄  Mat   (files, via the `image` crate)
//
// The dynamic image format is a plain object with interleaved samples:
//
//   { "width": 4, "height": 2, "channels": 1, "depth": "u8",
//     "data": [ ... width * height * channels samples ... ] }
//
// `channels` defaults to 1 and `depth` to "u8". Every failure here is an
// ImageConversion error; callers propagate it unchanged.

use ::image::{DynamicImage, ImageBuffer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClaheError, Result};
use crate::image::{Depth, Image, Pixel};
use crate::mat::{interleave, Mat};

/// Serialized shape of a Mat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageValue {
    pub width: usize,
    pub height: usize,
    #[serde(default = "one")]
    pub channels: usize,
    #[serde(default = "depth_u8")]
    pub depth: String,
    pub data: Vec<u32>,
}

fn one() -> usize {
    1
}

fn depth_u8() -> String {
    Depth::U8.as_str().to_string()
}

fn conversion_error(msg: impl Into<String>) -> ClaheError {
    ClaheError::ImageConversion(msg.into())
}

// ---------------------------------------------------------------------------
// Dynamic values
// ---------------------------------------------------------------------------

/// Interpret a dynamic value as a Mat.
pub fn mat_from_value(value: &Value) -> Result<Mat> {
    if !value.is_object() {
        return Err(conversion_error("expected an image object"));
    }
    let parsed = ImageValue::deserialize(value)
        .map_err(|e| conversion_error(format!("invalid image object: {e}")))?;

    let depth = Depth::parse(&parsed.depth)
        .ok_or_else(|| conversion_error(format!("unsupported image depth '{}'", parsed.depth)))?;

    match depth {
        Depth::U8 => {
            let samples = narrow::<u8>(&parsed.data)?;
            let planes =
                Mat::from_interleaved(parsed.width, parsed.height, parsed.channels, &samples)?;
            Mat::from_planes_u8(planes)
        }
        Depth::U16 => {
            let samples = narrow::<u16>(&parsed.data)?;
            let planes =
                Mat::from_interleaved(parsed.width, parsed.height, parsed.channels, &samples)?;
            Mat::from_planes_u16(planes)
        }
    }
}

/// Convert a Mat into its dynamic value form.
pub fn mat_to_value(mat: &Mat) -> Value {
    let image = ImageValue {
        width: mat.width(),
        height: mat.height(),
        channels: mat.channels(),
        depth: mat.depth().as_str().to_string(),
        data: mat.to_interleaved().into_iter().map(u32::from).collect(),
    };
    // ImageValue contains only plain numbers and strings.
    serde_json::to_value(image).unwrap_or(Value::Null)
}

fn narrow<T: Pixel>(data: &[u32]) -> Result<Vec<T>> {
    let max = (T::BINS - 1) as u32;
    data.iter()
        .map(|&v| {
            if v > max {
                Err(conversion_error(format!(
                    "sample {v} out of range for {} image",
                    T::DEPTH
                )))
            } else {
                Ok(T::from_bin(v as usize))
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// image::DynamicImage
// ---------------------------------------------------------------------------

fn planes_u8(w: usize, h: usize, channels: usize, raw: &[u8]) -> Result<Mat> {
    Mat::from_planes_u8(Mat::from_interleaved(w, h, channels, raw)?)
}

fn planes_u16(w: usize, h: usize, channels: usize, raw: &[u16]) -> Result<Mat> {
    Mat::from_planes_u16(Mat::from_interleaved(w, h, channels, raw)?)
}

fn buffer<P: ::image::Pixel>(
    w: u32,
    h: u32,
    raw: Vec<P::Subpixel>,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>> {
    ImageBuffer::from_raw(w, h, raw)
        .ok_or_else(|| conversion_error("image buffer does not match its dimensions"))
}

/// Convert a decoded image into a Mat, keeping its channels and depth.
///
/// 32-bit float images are rejected; CLAHE needs integer samples.
pub fn mat_from_dynamic(img: &DynamicImage) -> Result<Mat> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    match img {
        DynamicImage::ImageLuma8(b) => planes_u8(w, h, 1, b.as_raw()),
        DynamicImage::ImageLumaA8(b) => planes_u8(w, h, 2, b.as_raw()),
        DynamicImage::ImageRgb8(b) => planes_u8(w, h, 3, b.as_raw()),
        DynamicImage::ImageRgba8(b) => planes_u8(w, h, 4, b.as_raw()),
        DynamicImage::ImageLuma16(b) => planes_u16(w, h, 1, b.as_raw()),
        DynamicImage::ImageLumaA16(b) => planes_u16(w, h, 2, b.as_raw()),
        DynamicImage::ImageRgb16(b) => planes_u16(w, h, 3, b.as_raw()),
        DynamicImage::ImageRgba16(b) => planes_u16(w, h, 4, b.as_raw()),
        _ => Err(conversion_error(format!(
            "unsupported pixel format {:?}",
            img.color()
        ))),
    }
}

/// Convert a Mat back into a DynamicImage.
pub fn mat_to_dynamic(mat: &Mat) -> Result<DynamicImage> {
    let (w, h) = (mat.width() as u32, mat.height() as u32);
    let img = match mat {
        Mat::U8(planes) => {
            let raw = interleave(planes);
            match planes.len() {
                1 => DynamicImage::ImageLuma8(buffer(w, h, raw)?),
                2 => DynamicImage::ImageLumaA8(buffer(w, h, raw)?),
                3 => DynamicImage::ImageRgb8(buffer(w, h, raw)?),
                4 => DynamicImage::ImageRgba8(buffer(w, h, raw)?),
                n => return Err(conversion_error(format!("cannot encode a {n}-channel image"))),
            }
        }
        Mat::U16(planes) => {
            let raw = interleave(planes);
            match planes.len() {
                1 => DynamicImage::ImageLuma16(buffer(w, h, raw)?),
                2 => DynamicImage::ImageLumaA16(buffer(w, h, raw)?),
                3 => DynamicImage::ImageRgb16(buffer(w, h, raw)?),
                4 => DynamicImage::ImageRgba16(buffer(w, h, raw)?),
                n => return Err(conversion_error(format!("cannot encode a {n}-channel image"))),
            }
        }
    };
    Ok(img)
}

/// Single 8-bit plane from a decoded image, converting to luma first.
pub fn luma8_from_dynamic(img: &DynamicImage) -> Image<u8> {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    Image::from_vec(w as usize, h as usize, gray.into_raw())
}
