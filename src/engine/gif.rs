//! Animated GIF. Every frame is decoded to full-canvas RGBA with its delay
//! in `ANIMATION.FrameTime` (milliseconds).

use super::convert::{decode_error, encode_error, from_dynamic, to_dynamic};
use super::{Codec, Decoded, MessageLog};
use crate::error::Result;
use crate::format::Format;
use crate::image::Image;
use crate::meta::{ANIMATION, Meta, MetaValue};
use crate::options::ResolvedOptions;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Delay, DynamicImage, Frame};
use std::io::Cursor;

pub struct GifCodec;

const FRAME_TIME: &str = "FrameTime";

fn frame_time(meta: &Meta) -> Option<u32> {
    meta.group(ANIMATION)?
        .get(FRAME_TIME)?
        .as_int()
        .and_then(|ms| u32::try_from(ms).ok())
}

impl Codec for GifCodec {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        _options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded> {
        let decoder = GifDecoder::new(Cursor::new(data)).map_err(|e| decode_error(format, e))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| decode_error(format, e))?;

        let mut images = Vec::with_capacity(frames.len());
        for frame in frames {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let ms = if denom == 0 { 0 } else { numer / denom };
            let mut meta = Meta::new();
            meta.group_mut(ANIMATION)
                .insert(FRAME_TIME.into(), MetaValue::Int(i64::from(ms)));
            let rgba = DynamicImage::ImageRgba8(frame.into_buffer());
            images.push(from_dynamic(rgba, log)?.with_meta(meta));
        }
        Ok(Decoded {
            frames: images,
            meta: Meta::new(),
        })
    }

    fn encode(
        &self,
        format: &'static Format,
        frames: &[Image],
        _meta: &Meta,
        options: &ResolvedOptions,
        _log: &MessageLog,
    ) -> Result<Vec<u8>> {
        let default_ms = u32::try_from(options.int("duration")).unwrap_or(100);
        let mut gif_frames = Vec::with_capacity(frames.len());
        for image in frames {
            let rgba = to_dynamic(format, image)?.to_rgba8();
            let ms = frame_time(&image.meta).unwrap_or(default_ms);
            gif_frames.push(Frame::from_parts(
                rgba,
                0,
                0,
                Delay::from_numer_denom_ms(ms, 1),
            ));
        }

        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            if gif_frames.len() > 1 {
                let repeat = match options.int("loop") {
                    0 => Repeat::Infinite,
                    n => Repeat::Finite(u16::try_from(n).unwrap_or(u16::MAX)),
                };
                encoder
                    .set_repeat(repeat)
                    .map_err(|e| encode_error(format, e))?;
            }
            encoder
                .encode_frames(gif_frames)
                .map_err(|e| encode_error(format, e))?;
        }
        Ok(out)
    }
}
