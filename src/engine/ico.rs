//! Windows icons. Each directory entry is one frame.
//!
//! The engine's ICO decoder only returns the best entry, so every entry is
//! decoded on its own: PNG payloads directly, BMP payloads re-wrapped in a
//! one-entry container. Frames are always written as RGBA PNG-in-ICO.
//!
//! Opaque entries come back as RGB, or as 2-D grey when every pixel has
//! R = G = B. Translucent entries (or `makealpha`) keep their alpha.

use super::convert::{
    decode_error, dimensions_u32, encode_error, from_dynamic, is_grey, load, to_dynamic,
};
use super::{Codec, Decoded, MessageLog};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::image::Image;
use crate::meta::Meta;
use crate::options::ResolvedOptions;
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::{DynamicImage, ExtendedColorType, ImageFormat};

pub struct IcoCodec;

const HEADER_LEN: usize = 6;
const ENTRY_LEN: usize = 16;
const MAX_SIDE: usize = 256;
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Directory entries as raw 16-byte records.
fn entries(data: &[u8]) -> Option<Vec<&[u8]>> {
    let header = data.get(..HEADER_LEN)?;
    // Reserved 0, type 1 (icon)
    if header[0..4] != [0, 0, 1, 0] {
        return None;
    }
    let count = u16::from_le_bytes([header[4], header[5]]) as usize;
    (0..count)
        .map(|i| {
            let at = HEADER_LEN + i * ENTRY_LEN;
            data.get(at..at + ENTRY_LEN)
        })
        .collect()
}

/// The image data an entry points at.
fn entry_payload<'a>(data: &'a [u8], entry: &[u8]) -> Option<&'a [u8]> {
    let size = u32::from_le_bytes(entry[8..12].try_into().ok()?) as usize;
    let offset = u32::from_le_bytes(entry[12..16].try_into().ok()?) as usize;
    data.get(offset..offset.checked_add(size)?)
}

/// A standalone icon file holding only `entry`'s image.
fn single_entry_icon(entry: &[u8], payload: &[u8]) -> Vec<u8> {
    let size = payload.len();
    let mut icon = Vec::with_capacity(HEADER_LEN + ENTRY_LEN + size);
    icon.extend_from_slice(&[0, 0, 1, 0, 1, 0]);
    icon.extend_from_slice(&entry[..12]);
    icon.extend_from_slice(&((HEADER_LEN + ENTRY_LEN) as u32).to_le_bytes());
    icon.extend_from_slice(payload);
    icon
}

/// Decode one directory entry.
fn decode_entry(
    format: &'static Format,
    data: &[u8],
    entry: &[u8],
    i: usize,
) -> Result<DynamicImage> {
    let payload = entry_payload(data, entry)
        .ok_or_else(|| decode_error(format, format!("icon entry {i} is truncated")))?;
    if payload.starts_with(PNG_SIGNATURE) {
        load(format, payload, ImageFormat::Png)
    } else {
        load(format, &single_entry_icon(entry, payload), ImageFormat::Ico)
    }
}

impl Codec for IcoCodec {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded> {
        let entries = entries(data).ok_or_else(|| decode_error(format, "bad icon directory"))?;
        let make_alpha = options.bool("makealpha");
        let mut frames = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let rgba = decode_entry(format, data, entry, i)?.to_rgba8();
            let translucent = rgba.pixels().any(|p| p.0[3] != 255);
            let dynamic = if make_alpha || translucent {
                DynamicImage::ImageRgba8(rgba)
            } else if is_grey(rgba.as_raw(), 4) {
                DynamicImage::ImageLuma8(DynamicImage::ImageRgba8(rgba).to_luma8())
            } else {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
            };
            frames.push(from_dynamic(dynamic, log)?);
        }
        Ok(Decoded {
            frames,
            meta: Meta::new(),
        })
    }

    fn encode(
        &self,
        format: &'static Format,
        frames: &[Image],
        _meta: &Meta,
        _options: &ResolvedOptions,
        _log: &MessageLog,
    ) -> Result<Vec<u8>> {
        let mut pngs = Vec::with_capacity(frames.len());
        for image in frames {
            let (w, h) = dimensions_u32(format, image)?;
            let rgba = to_dynamic(format, image)?.to_rgba8();
            pngs.push(
                IcoFrame::as_png(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                    .map_err(|e| encode_error(format, e))?,
            );
        }
        let mut out = Vec::new();
        IcoEncoder::new(&mut out)
            .encode_images(&pngs)
            .map_err(|e| encode_error(format, e))?;
        Ok(out)
    }

    fn check_frame(
        &self,
        format: &'static Format,
        image: &Image,
        _options: &ResolvedOptions,
    ) -> Result<()> {
        if image.width() > MAX_SIDE || image.height() > MAX_SIDE {
            return Err(Error::InvalidArgument(format!(
                "{} frames are limited to {MAX_SIDE}x{MAX_SIDE}, got {}x{}",
                format.name,
                image.width(),
                image.height()
            )));
        }
        Ok(())
    }
}
