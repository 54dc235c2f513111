//! Formats with no options of their own (TIFF, WEBP, HDR): a straight engine
//! decode and encode.

use super::convert::{encode_error, from_dynamic, load, to_dynamic};
use super::{Codec, Decoded, MessageLog};
use crate::error::Result;
use crate::format::Format;
use crate::image::Image;
use crate::meta::Meta;
use crate::options::ResolvedOptions;
use std::io::Cursor;

pub struct GenericCodec;

impl Codec for GenericCodec {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        _options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded> {
        let image = from_dynamic(load(format, data, format.engine_format)?, log)?;
        Ok(Decoded {
            frames: vec![image],
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
        let Some(image) = frames.first() else {
            return Err(encode_error(format, "no image to encode"));
        };
        let dynamic = to_dynamic(format, image)?;
        let mut out = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut out), format.engine_format)
            .map_err(|e| encode_error(format, e))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::engine;
    use crate::options::Options;

    fn roundtrip(name: &str, img: &Image) -> Image {
        let format = engine().formats().lookup(name).unwrap();
        let none = ResolvedOptions::resolve(name, &[], &Options::new()).unwrap();
        let log = MessageLog::default();
        let bytes = GenericCodec
            .encode(format, std::slice::from_ref(img), &Meta::new(), &none, &log)
            .unwrap();
        GenericCodec
            .decode(format, &bytes, &none, &log)
            .unwrap()
            .frames
            .remove(0)
    }

    #[test]
    fn tiff_is_lossless() {
        let img = Image::from_fn_u8(&[5, 6, 3], |y, x, c| (y * 40 + x * 5 + c) as u8).unwrap();
        assert_eq!(roundtrip("TIFF", &img), img);
        let gray = Image::from_fn_u8(&[5, 6], |y, x, _| (y * 40 + x) as u8).unwrap();
        assert_eq!(roundtrip("TIFF", &gray), gray);
    }

    #[test]
    fn webp_is_lossless() {
        let img = Image::from_fn_u8(&[4, 7, 4], |y, x, c| (y * 30 + x * 3 + c * 60) as u8).unwrap();
        assert_eq!(roundtrip("WEBP", &img).as_u8(), img.as_u8());
    }

    #[test]
    fn hdr_decodes_to_float_rgb() {
        let format = engine().formats().lookup("HDR").unwrap();
        let none = ResolvedOptions::resolve("HDR", &[], &Options::new()).unwrap();
        let pixels = vec![image::Rgb([0.25f32, 0.5, 1.0]); 4 * 2];
        let mut bytes = Vec::new();
        image::codecs::hdr::HdrEncoder::new(&mut bytes)
            .encode(&pixels, 4, 2)
            .unwrap();
        let decoded = GenericCodec
            .decode(format, &bytes, &none, &MessageLog::default())
            .unwrap();
        let frame = &decoded.frames[0];
        assert_eq!(frame.dims(), vec![2, 4, 3]);
        let data = frame.as_f32().unwrap();
        assert!((data[2] - 1.0).abs() < 0.01);
        assert!((data[0] - 0.25).abs() < 0.01);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let format = engine().formats().lookup("HDR").unwrap();
        let none = ResolvedOptions::resolve("HDR", &[], &Options::new()).unwrap();
        let err = GenericCodec
            .decode(format, b"this is not an image", &none, &MessageLog::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Codec);
    }
}
