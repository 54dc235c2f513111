//! JPEG: engine decode/encode with EXIF and comment segments handled here.
//!
//! `exifrotate` (default on) applies the EXIF Orientation tag to the decoded
//! pixels and resets the tag to 1 in the returned metadata, so writing the
//! image back does not rotate it twice.

use super::convert::{encode_error, from_dynamic, load, to_dynamic};
use super::exif::{self, MAX_SEGMENT_PAYLOAD};
use super::{Codec, Decoded, MessageLog};
use crate::error::Result;
use crate::format::Format;
use crate::image::Image;
use crate::meta::{COMMENTS, EXIF_MAIN, EXIF_RAW, Meta, MetaValue};
use crate::options::ResolvedOptions;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

pub struct JpegCodec;

impl Codec for JpegCodec {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded> {
        let mut dynamic = load(format, data, ImageFormat::Jpeg)?;
        let mut meta = Meta::new();

        let mut orientation = None;
        if let Some(payload) = exif::find_exif(data) {
            let parsed = exif::parse(payload);
            orientation = parsed.orientation;
            parsed.into_meta(&mut meta);
            meta.insert(EXIF_RAW, payload.to_vec());
        }
        for (i, comment) in exif::find_comments(data).into_iter().enumerate() {
            let key = if i == 0 {
                "Comment".to_string()
            } else {
                format!("Comment{i}")
            };
            meta.group_mut(COMMENTS).insert(key, comment.into());
        }

        if options.int("exifrotate") != 0
            && let Some(o @ 2..=8) = orientation
        {
            dynamic = apply_orientation(dynamic, o);
            reset_orientation(&mut meta, log);
        }

        let image = from_dynamic(dynamic, log)?.with_meta(meta.clone());
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
        if !format.write_channels.contains(&image.channels()) {
            return Err(encode_error(
                format,
                format!("cannot store {} channel(s); JPEG has no alpha", image.channels()),
            ));
        }
        if options.bool("progressive") {
            log.push("JPEG: progressive encoding is not supported by the encoder; writing baseline");
        }
        if options.bool("optimize") {
            log.push("JPEG: optimized Huffman tables are not supported by the encoder");
        }

        let quality = options.int("quality").clamp(1, 100) as u8;
        let dynamic = to_dynamic(format, image)?;
        let mut encoded = Vec::new();
        dynamic
            .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, quality))
            .map_err(|e| encode_error(format, e))?;

        let exif_payload = meta
            .get(EXIF_RAW)
            .and_then(MetaValue::as_bytes)
            .filter(|p| p.starts_with(exif::EXIF_HEADER));
        let exif_payload = match exif_payload {
            Some(p) if p.len() > MAX_SEGMENT_PAYLOAD => {
                log.push("JPEG: EXIF block exceeds 64 KiB and was not written");
                None
            }
            other => other,
        };
        let comments: Vec<String> = super::convert::comments(meta)
            .into_iter()
            .map(|(_, text)| text)
            .filter(|text| text.len() <= MAX_SEGMENT_PAYLOAD)
            .collect();
        if exif_payload.is_none() && comments.is_empty() {
            return Ok(encoded);
        }
        Ok(exif::insert_segments(&encoded, exif_payload, &comments))
    }
}

/// Undo the transform described by an EXIF Orientation value.
fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Set Orientation to 1 in both the parsed group and the raw payload. A
/// raw payload whose tag cannot be rewritten is dropped, so writing the
/// rotated pixels back never carries the old orientation.
fn reset_orientation(meta: &mut Meta, log: &MessageLog) {
    if let Some(MetaValue::Group(main)) = meta.remove(EXIF_MAIN) {
        let mut main = main;
        main.insert("Orientation".into(), MetaValue::Int(1));
        meta.insert(EXIF_MAIN, main);
    }
    if let Some(MetaValue::Bytes(mut raw)) = meta.remove(EXIF_RAW) {
        if exif::set_orientation(&mut raw, 1) {
            meta.insert(EXIF_RAW, raw);
        } else {
            log.push("JPEG: could not reset the EXIF orientation; raw EXIF block dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::engine;
    use crate::error::Error;
    use crate::options::Options;
    use crate::test_helpers::{exif_payload, jpeg_with_exif};

    fn jpeg() -> &'static Format {
        engine().formats().lookup("JPEG").unwrap()
    }

    fn read_opts(exifrotate: i64) -> ResolvedOptions {
        let given: Options = [("exifrotate", exifrotate)].into_iter().collect();
        ResolvedOptions::resolve("JPEG", jpeg().read_options, &given).unwrap()
    }

    fn write_opts(pairs: &[(&str, i64)]) -> ResolvedOptions {
        let given: Options = pairs.iter().map(|(k, v)| (*k, *v)).collect();
        ResolvedOptions::resolve("JPEG", jpeg().write_options, &given).unwrap()
    }

    #[test]
    fn orientation_six_rotates_and_resets() {
        let log = MessageLog::default();
        // 8 rows × 16 columns stored, Orientation 6 = rotate 90° clockwise
        let data = jpeg_with_exif(16, 8, 6);
        let decoded = JpegCodec.decode(jpeg(), &data, &read_opts(1), &log).unwrap();
        let image = &decoded.frames[0];
        assert_eq!((image.height(), image.width()), (16, 8));
        let main = decoded.meta.group(EXIF_MAIN).unwrap();
        assert_eq!(main.get("Orientation"), Some(&MetaValue::Int(1)));
        let raw = decoded.meta.get(EXIF_RAW).unwrap().as_bytes().unwrap();
        assert_eq!(exif::parse(raw).orientation, Some(1));
    }

    #[test]
    fn long_orientation_is_reset_in_raw_block() {
        let log = MessageLog::default();
        let mut payload = exif_payload(6);
        payload[30..32].copy_from_slice(&4u16.to_le_bytes());
        let rgb = image::RgbImage::from_pixel(16, 8, image::Rgb([10, 200, 30]));
        let mut plain = Vec::new();
        DynamicImage::ImageRgb8(rgb)
            .write_with_encoder(JpegEncoder::new_with_quality(&mut plain, 90))
            .unwrap();
        let data = exif::insert_segments(&plain, Some(&payload), &[]);

        let decoded = JpegCodec.decode(jpeg(), &data, &read_opts(1), &log).unwrap();
        assert_eq!(decoded.frames[0].dims(), vec![16, 8, 3]);
        let raw = decoded.meta.get(EXIF_RAW).unwrap().as_bytes().unwrap();
        assert_eq!(exif::parse(raw).orientation, Some(1));

        // Written back and read again, nothing rotates a second time
        let bytes = JpegCodec
            .encode(jpeg(), &decoded.frames, &decoded.meta, &write_opts(&[]), &log)
            .unwrap();
        let again = JpegCodec.decode(jpeg(), &bytes, &read_opts(1), &log).unwrap();
        assert_eq!(again.frames[0].dims(), vec![16, 8, 3]);
    }

    #[test]
    fn exifrotate_off_keeps_stored_layout() {
        let log = MessageLog::default();
        let data = jpeg_with_exif(16, 8, 6);
        let decoded = JpegCodec.decode(jpeg(), &data, &read_opts(0), &log).unwrap();
        let image = &decoded.frames[0];
        assert_eq!((image.height(), image.width()), (8, 16));
        let main = decoded.meta.group(EXIF_MAIN).unwrap();
        assert_eq!(main.get("Orientation"), Some(&MetaValue::Int(6)));
    }

    #[test]
    fn exif_and_comments_are_written_back() {
        let log = MessageLog::default();
        let img = Image::from_fn_u8(&[8, 8, 3], |y, x, c| (y * 20 + x * 10 + c) as u8).unwrap();
        let mut meta = Meta::new().with(EXIF_RAW, exif_payload(1));
        meta.group_mut(COMMENTS)
            .insert("Comment".into(), "hello".into());
        let bytes = JpegCodec
            .encode(jpeg(), &[img], &meta, &write_opts(&[]), &log)
            .unwrap();
        let decoded = JpegCodec.decode(jpeg(), &bytes, &read_opts(1), &log).unwrap();
        assert!(decoded.meta.contains_key(EXIF_MAIN));
        assert_eq!(
            decoded.meta.group(COMMENTS).unwrap().get("Comment"),
            Some(&MetaValue::Text("hello".into()))
        );
    }

    #[test]
    fn alpha_is_rejected() {
        let log = MessageLog::default();
        let img = Image::zeros(&[4, 4, 4], crate::image::DType::U8).unwrap();
        let err = JpegCodec
            .encode(jpeg(), &[img], &Meta::new(), &write_opts(&[]), &log)
            .unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn quality_changes_size() {
        let log = MessageLog::default();
        let img = Image::from_fn_u8(&[32, 32, 3], |y, x, c| ((y * 7 + x * 13 + c * 31) % 256) as u8)
            .unwrap();
        let low = JpegCodec
            .encode(jpeg(), &[img.clone()], &Meta::new(), &write_opts(&[("quality", 10)]), &log)
            .unwrap();
        let high = JpegCodec
            .encode(jpeg(), &[img], &Meta::new(), &write_opts(&[("quality", 90)]), &log)
            .unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn unsupported_flags_are_logged() {
        let log = MessageLog::default();
        let img = Image::zeros(&[4, 4, 3], crate::image::DType::U8).unwrap();
        JpegCodec
            .encode(
                jpeg(),
                &[img],
                &Meta::new(),
                &write_opts(&[("progressive", 1), ("optimize", 1), ("baseline", 1)]),
                &log,
            )
            .unwrap();
        assert_eq!(log.snapshot().len(), 2);
    }
}
