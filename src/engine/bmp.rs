//! BMP through the engine. Palette files whose palette is all grey come back
//! as single-channel images, which is how greyscale images are stored.

use super::convert::{encode_error, from_dynamic, is_grey, load, to_dynamic};
use super::{Codec, Decoded, MessageLog};
use crate::error::Result;
use crate::format::Format;
use crate::image::Image;
use crate::meta::Meta;
use crate::options::ResolvedOptions;
use image::codecs::bmp::BmpEncoder;
use image::{DynamicImage, ImageFormat};

pub struct BmpCodec;

/// Bits per pixel from the DIB header: BITMAPCOREHEADER (12 bytes) keeps it
/// at offset 24, every later header at 28.
fn bits_per_pixel(data: &[u8]) -> Option<u16> {
    let header_size = u32::from_le_bytes(data.get(14..18)?.try_into().ok()?);
    let at = if header_size == 12 { 24 } else { 28 };
    Some(u16::from_le_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

impl Codec for BmpCodec {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        _options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded> {
        let mut dynamic = load(format, data, ImageFormat::Bmp)?;
        let paletted = bits_per_pixel(data).is_some_and(|bpp| bpp <= 8);
        if paletted
            && let DynamicImage::ImageRgb8(rgb) = &dynamic
            && is_grey(rgb.as_raw(), 3)
        {
            dynamic = DynamicImage::ImageLuma8(dynamic.to_luma8());
        }
        let image = from_dynamic(dynamic, log)?;
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
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Vec<u8>> {
        let Some(image) = frames.first() else {
            return Err(encode_error(format, "no image to encode"));
        };
        if options.bool("compression") {
            log.push("BMP: RLE compression is not supported by the encoder; writing uncompressed");
        }
        let dynamic = to_dynamic(format, image)?;
        let mut out = Vec::new();
        dynamic
            .write_with_encoder(BmpEncoder::new(&mut out))
            .map_err(|e| encode_error(format, e))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::engine;
    use crate::options::Options;

    fn bmp() -> &'static Format {
        engine().formats().lookup("BMP").unwrap()
    }

    fn roundtrip(img: &Image) -> Image {
        let log = MessageLog::default();
        let write = ResolvedOptions::resolve("BMP", bmp().write_options, &Options::new()).unwrap();
        let read = ResolvedOptions::resolve("BMP", bmp().read_options, &Options::new()).unwrap();
        let bytes = BmpCodec
            .encode(bmp(), std::slice::from_ref(img), &Meta::new(), &write, &log)
            .unwrap();
        BmpCodec
            .decode(bmp(), &bytes, &read, &log)
            .unwrap()
            .frames
            .remove(0)
    }

    #[test]
    fn grey_comes_back_single_channel() {
        let img = Image::from_fn_u8(&[5, 7], |y, x, _| (y * 30 + x) as u8).unwrap();
        let back = roundtrip(&img);
        assert_eq!(back.dims(), vec![5, 7]);
        assert_eq!(back.as_u8(), img.as_u8());
    }

    #[test]
    fn rgb_is_lossless() {
        let img = Image::from_fn_u8(&[3, 5, 3], |y, x, c| (y * 50 + x * 10 + c) as u8).unwrap();
        assert_eq!(roundtrip(&img).as_u8(), img.as_u8());
    }

    #[test]
    fn header_bit_depth() {
        let mut header = vec![0u8; 30];
        header[14] = 40;
        header[28] = 8;
        assert_eq!(bits_per_pixel(&header), Some(8));
        assert_eq!(bits_per_pixel(&[0u8; 10]), None);
    }

    #[test]
    fn compression_flag_is_logged() {
        let log = MessageLog::default();
        let given: Options = [("compression", true)].into_iter().collect();
        let write = ResolvedOptions::resolve("BMP", bmp().write_options, &given).unwrap();
        let img = Image::zeros(&[2, 2, 3], crate::image::DType::U8).unwrap();
        BmpCodec
            .encode(bmp(), &[img], &Meta::new(), &write, &log)
            .unwrap();
        assert_eq!(log.snapshot().len(), 1);
    }
}
