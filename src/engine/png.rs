//! PNG: pixels through the engine decoder, ancillary chunks and all
//! encoding through the `png` crate.
//!
//! Read:
//! - `tEXt` chunks → `COMMENTS`
//! - `gAMA` → pixel correction to display gamma unless `ignoregamma`
//!
//! Write:
//! - `compression` 0–9 → deflate band (0–2 fast, 3–6 default, 7–9 best)
//! - `quantize` → indexed PNG, RGB input only
//! - `COMMENTS` → `tEXt` chunks

use super::convert::{comments, decode_error, dimensions_u32, encode_error, from_dynamic, load};
use super::quantize::quantize_rgb;
use super::{Codec, Decoded, MessageLog};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::image::{Image, PixelData};
use crate::meta::{COMMENTS, Meta};
use crate::options::ResolvedOptions;
use image::ImageFormat;
use std::io::Cursor;

/// Assumed display gamma.
const DISPLAY_GAMMA: f32 = 2.2;

pub struct PngCodec;

/// Ancillary chunks read ahead of the pixel data.
#[derive(Debug, Default)]
struct PngInfo {
    gamma: Option<f32>,
    texts: Vec<(String, String)>,
}

fn read_info(data: &[u8]) -> std::result::Result<PngInfo, png::DecodingError> {
    let decoder = png::Decoder::new(Cursor::new(data));
    let reader = decoder.read_info()?;
    let info = reader.info();
    Ok(PngInfo {
        gamma: info.source_gamma.map(|g| g.into_value()),
        texts: info
            .uncompressed_latin1_text
            .iter()
            .map(|t| (t.keyword.clone(), t.text.clone()))
            .collect(),
    })
}

impl Codec for PngCodec {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded> {
        let info = read_info(data).map_err(|e| decode_error(format, e))?;
        let mut image = from_dynamic(load(format, data, ImageFormat::Png)?, log)?;

        let mut meta = Meta::new();
        for (keyword, text) in info.texts {
            meta.group_mut(COMMENTS).insert(keyword, text.into());
        }
        if let Some(gamma) = info.gamma
            && !options.bool("ignoregamma")
        {
            image = apply_gamma(image, gamma)?;
        }
        let image = image.with_meta(meta.clone());
        Ok(Decoded {
            frames: vec![image],
            meta,
        })
    }

    fn encode(
        &self,
        format: &'static Format,
        frames: &[Image],
        meta: &Meta,
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Vec<u8>> {
        let Some(image) = frames.first() else {
            return Err(encode_error(format, "no image to encode"));
        };
        let pixels = image
            .as_u8()
            .ok_or_else(|| encode_error(format, "expected 8-bit pixel data"))?;
        let (w, h) = dimensions_u32(format, image)?;

        let palette = palette_size(image, options)?.map(|n| quantize_rgb(pixels, n));
        if options.bool("interlaced") {
            log.push("PNG: interlaced output is not supported by the encoder; writing non-interlaced");
        }

        let compression = options.int("compression");
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_depth(png::BitDepth::Eight);
            let (level, filter) = match compression {
                0..=2 => (png::Compression::Fast, png::Filter::NoFilter),
                3..=6 => (png::Compression::Balanced, png::Filter::Sub),
                _ => (png::Compression::High, png::Filter::Adaptive),
            };
            // set_compression also picks a filter, so ours goes second
            encoder.set_compression(level);
            encoder.set_filter(filter);
            for (keyword, text) in comments(meta) {
                encoder
                    .add_text_chunk(keyword, text)
                    .map_err(|e| encode_error(format, e))?;
            }

            let data: &[u8] = match &palette {
                Some(q) => {
                    encoder.set_color(png::ColorType::Indexed);
                    encoder.set_palette(q.palette.clone());
                    &q.indices
                }
                None => {
                    encoder.set_color(match image.channels() {
                        1 => png::ColorType::Grayscale,
                        2 => png::ColorType::GrayscaleAlpha,
                        3 => png::ColorType::Rgb,
                        _ => png::ColorType::Rgba,
                    });
                    pixels
                }
            };
            let mut writer = encoder
                .write_header()
                .map_err(|e| encode_error(format, e))?;
            writer
                .write_image_data(data)
                .map_err(|e| encode_error(format, e))?;
            writer.finish().map_err(|e| encode_error(format, e))?;
        }
        Ok(out)
    }

    fn check_frame(
        &self,
        _format: &'static Format,
        image: &Image,
        options: &ResolvedOptions,
    ) -> Result<()> {
        palette_size(image, options).map(|_| ())
    }
}

/// The `quantize` palette size for `image`, if one was requested.
fn palette_size(image: &Image, options: &ResolvedOptions) -> Result<Option<usize>> {
    match options.int("quantize") {
        0 => Ok(None),
        1 => Err(Error::InvalidOption {
            name: "quantize".into(),
            reason: "palette size must be 2-256 (or 0 to disable)".into(),
        }),
        n if image.channels() != 3 => Err(Error::InvalidOption {
            name: "quantize".into(),
            reason: format!(
                "can only quantize RGB images, got {} channel(s) (quantize={n})",
                image.channels()
            ),
        }),
        n => Ok(Some(n as usize)),
    }
}

/// Map file gamma to display gamma on the color channels (alpha untouched).
/// Gamma within 1% of the display's is left alone.
fn apply_gamma(image: Image, file_gamma: f32) -> Result<Image> {
    if file_gamma <= 0.0 {
        return Ok(image);
    }
    let exponent = 1.0 / (file_gamma * DISPLAY_GAMMA);
    if (exponent - 1.0).abs() <= 0.01 {
        return Ok(image);
    }
    let channels = image.channels();
    let color_channels = if channels == 2 || channels == 4 {
        channels - 1
    } else {
        channels
    };
    let (shape, data, meta) = image.into_parts();
    let data = match data {
        PixelData::U8(mut v) => {
            let lut: Vec<u8> = (0..=255u16)
                .map(|i| ((f32::from(i) / 255.0).powf(exponent) * 255.0).round() as u8)
                .collect();
            for (i, value) in v.iter_mut().enumerate() {
                if i % channels < color_channels {
                    *value = lut[*value as usize];
                }
            }
            PixelData::U8(v)
        }
        PixelData::F32(mut v) => {
            for (i, value) in v.iter_mut().enumerate() {
                if i % channels < color_channels {
                    *value = value.max(0.0).powf(exponent);
                }
            }
            PixelData::F32(v)
        }
    };
    Ok(Image::new(shape, data)?.with_meta(meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::engine;
    use crate::meta::MetaValue;
    use crate::options::Options;

    fn png() -> &'static Format {
        engine().formats().lookup("PNG").unwrap()
    }

    fn write_opts(pairs: &[(&str, i64)]) -> ResolvedOptions {
        let given: Options = pairs.iter().map(|(k, v)| (*k, *v)).collect();
        ResolvedOptions::resolve("PNG", png().write_options, &given).unwrap()
    }

    fn read_opts(ignoregamma: bool) -> ResolvedOptions {
        let given: Options = [("ignoregamma", ignoregamma)].into_iter().collect();
        ResolvedOptions::resolve("PNG", png().read_options, &given).unwrap()
    }

    fn gradient() -> Image {
        Image::from_fn_u8(&[16, 24, 3], |y, x, c| (y * 8 + x * 4 + c * 30) as u8).unwrap()
    }

    #[test]
    fn roundtrip_is_lossless() {
        let log = MessageLog::default();
        let img = gradient();
        let bytes = PngCodec
            .encode(png(), &[img.clone()], &Meta::new(), &write_opts(&[]), &log)
            .unwrap();
        let decoded = PngCodec.decode(png(), &bytes, &read_opts(false), &log).unwrap();
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.frames[0].as_u8(), img.as_u8());
    }

    #[test]
    fn text_chunks_roundtrip_as_comments() {
        let log = MessageLog::default();
        let mut meta = Meta::new();
        meta.group_mut(COMMENTS).insert("Title".into(), "cat".into());
        let bytes = PngCodec
            .encode(png(), &[gradient()], &meta, &write_opts(&[]), &log)
            .unwrap();
        let decoded = PngCodec.decode(png(), &bytes, &read_opts(false), &log).unwrap();
        assert_eq!(
            decoded.meta.group(COMMENTS).unwrap().get("Title"),
            Some(&MetaValue::Text("cat".into()))
        );
    }

    #[test]
    fn quantize_requires_rgb() {
        let log = MessageLog::default();
        let gray = Image::zeros(&[4, 4], crate::image::DType::U8).unwrap();
        let err = PngCodec
            .encode(png(), &[gray], &Meta::new(), &write_opts(&[("quantize", 100)]), &log)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
    }

    #[test]
    fn quantize_is_checked_per_frame() {
        let rgba = Image::zeros(&[4, 4, 4], crate::image::DType::U8).unwrap();
        let rgb = Image::zeros(&[4, 4, 3], crate::image::DType::U8).unwrap();
        let opts = write_opts(&[("quantize", 16)]);
        assert!(matches!(
            PngCodec.check_frame(png(), &rgba, &opts),
            Err(Error::InvalidOption { .. })
        ));
        assert!(PngCodec.check_frame(png(), &rgb, &opts).is_ok());
        assert!(PngCodec.check_frame(png(), &rgba, &write_opts(&[])).is_ok());
    }

    #[test]
    fn fewer_palette_colors_give_smaller_files() {
        let log = MessageLog::default();
        let img = gradient();
        let big = PngCodec
            .encode(png(), &[img.clone()], &Meta::new(), &write_opts(&[("quantize", 256)]), &log)
            .unwrap();
        let small = PngCodec
            .encode(png(), &[img], &Meta::new(), &write_opts(&[("quantize", 4)]), &log)
            .unwrap();
        assert!(small.len() < big.len());
    }

    #[test]
    fn interlaced_is_logged() {
        let log = MessageLog::default();
        PngCodec
            .encode(png(), &[gradient()], &Meta::new(), &write_opts(&[("interlaced", 1)]), &log)
            .unwrap();
        assert_eq!(log.snapshot().len(), 1);
    }

    #[test]
    fn gamma_skips_alpha_and_near_identity() {
        let img = Image::from_u8(&[1, 1, 2], vec![128, 128]).unwrap();
        let img = apply_gamma(img, 1.0 / 2.2).unwrap();
        assert_eq!(img.as_u8().unwrap(), &[128, 128]);

        let img = apply_gamma(img, 1.0).unwrap();
        let data = img.as_u8().unwrap();
        assert!(data[0] > 128, "1/2.2 exponent brightens mid grey");
        assert_eq!(data[1], 128);
    }
}
