//! Marshaling between the crate's [`Image`] and the engine's
//! `DynamicImage`, plus the small helpers every codec shares.
//!
//! These are pure functions so they can be unit tested without touching a
//! codec.

use super::MessageLog;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::image::{Image, PixelData, Shape};
use crate::meta::{COMMENTS, Meta, MetaValue};
use image::{DynamicImage, ImageBuffer, ImageFormat};

pub(crate) fn decode_error(format: &'static Format, e: impl std::fmt::Display) -> Error {
    Error::Decode {
        format: format.name,
        message: e.to_string(),
    }
}

pub(crate) fn encode_error(format: &'static Format, e: impl std::fmt::Display) -> Error {
    Error::Encode {
        format: format.name,
        message: e.to_string(),
    }
}

/// Decode a whole buffer with the engine's decoder for `engine_format`.
pub(crate) fn load(
    format: &'static Format,
    data: &[u8],
    engine_format: ImageFormat,
) -> Result<DynamicImage> {
    image::load_from_memory_with_format(data, engine_format).map_err(|e| decode_error(format, e))
}

/// Wrap a `u8` image in the matching `DynamicImage` variant.
pub(crate) fn to_dynamic(format: &'static Format, image: &Image) -> Result<DynamicImage> {
    let data = image
        .as_u8()
        .ok_or_else(|| encode_error(format, "expected 8-bit pixel data"))?
        .to_vec();
    let (w, h) = dimensions_u32(format, image)?;
    let dynamic = match image.channels() {
        1 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        2 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
        3 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => ImageBuffer::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        n => return Err(encode_error(format, format!("unsupported channel count {n}"))),
    };
    dynamic.ok_or_else(|| encode_error(format, "pixel buffer does not match dimensions"))
}

pub(crate) fn dimensions_u32(format: &'static Format, image: &Image) -> Result<(u32, u32)> {
    let w = u32::try_from(image.width())
        .map_err(|_| encode_error(format, "image width exceeds 32 bits"))?;
    let h = u32::try_from(image.height())
        .map_err(|_| encode_error(format, "image height exceeds 32 bits"))?;
    Ok((w, h))
}

/// Unwrap an engine image into the crate's layout. Single-channel images
/// come back 2-D; 16-bit data is reduced to 8 bits (with a logged note);
/// 32-bit float data is kept as `f32`.
pub(crate) fn from_dynamic(dynamic: DynamicImage, log: &MessageLog) -> Result<Image> {
    let h = dynamic.height() as usize;
    let w = dynamic.width() as usize;
    let (shape, data) = match dynamic {
        DynamicImage::ImageLuma8(b) => (Shape::gray(h, w), PixelData::U8(b.into_raw())),
        DynamicImage::ImageLumaA8(b) => (Shape::with_channels(h, w, 2)?, PixelData::U8(b.into_raw())),
        DynamicImage::ImageRgb8(b) => (Shape::with_channels(h, w, 3)?, PixelData::U8(b.into_raw())),
        DynamicImage::ImageRgba8(b) => (Shape::with_channels(h, w, 4)?, PixelData::U8(b.into_raw())),
        DynamicImage::ImageLuma16(_) => {
            log.push("reduced 16-bit greyscale data to 8 bits");
            (Shape::gray(h, w), PixelData::U8(dynamic.to_luma8().into_raw()))
        }
        DynamicImage::ImageLumaA16(_) => {
            log.push("reduced 16-bit greyscale+alpha data to 8 bits");
            (
                Shape::with_channels(h, w, 2)?,
                PixelData::U8(dynamic.to_luma_alpha8().into_raw()),
            )
        }
        DynamicImage::ImageRgb16(_) => {
            log.push("reduced 16-bit RGB data to 8 bits");
            (Shape::with_channels(h, w, 3)?, PixelData::U8(dynamic.to_rgb8().into_raw()))
        }
        DynamicImage::ImageRgba16(_) => {
            log.push("reduced 16-bit RGBA data to 8 bits");
            (Shape::with_channels(h, w, 4)?, PixelData::U8(dynamic.to_rgba8().into_raw()))
        }
        DynamicImage::ImageRgb32F(b) => (Shape::with_channels(h, w, 3)?, PixelData::F32(b.into_raw())),
        DynamicImage::ImageRgba32F(b) => {
            (Shape::with_channels(h, w, 4)?, PixelData::F32(b.into_raw()))
        }
        other => (Shape::with_channels(h, w, 4)?, PixelData::U8(other.to_rgba8().into_raw())),
    };
    Image::new(shape, data)
}

/// `COMMENTS` entries as key/text pairs. Non-text scalars are stringified;
/// nested groups and byte blobs are skipped.
pub(crate) fn comments(meta: &Meta) -> Vec<(String, String)> {
    let Some(group) = meta.group(COMMENTS) else {
        return Vec::new();
    };
    group
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                MetaValue::Text(s) => s.clone(),
                MetaValue::Int(i) => i.to_string(),
                MetaValue::Float(f) => f.to_string(),
                MetaValue::Bool(b) => b.to_string(),
                MetaValue::Bytes(_) | MetaValue::Group(_) => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}

/// Whether every pixel of an interleaved buffer has identical R, G and B.
pub(crate) fn is_grey(pixels: &[u8], channels: usize) -> bool {
    channels >= 3
        && pixels
            .chunks_exact(channels)
            .all(|p| p[0] == p[1] && p[1] == p[2])
}
