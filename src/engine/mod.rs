//! The codec engine: the image-rs codec set behind a single process-wide
//! handle.
//!
//! | Format | Crate / function |
//! |---|---|
//! | Decode (all) | `image::load_from_memory_with_format` |
//! | PNG encode | `png::Encoder` (deflate level, palette, tEXt chunks) |
//! | PNG palette | `color_quant::NeuQuant` |
//! | JPEG encode | `image::codecs::jpeg::JpegEncoder` + EXIF/COM segment splicing |
//! | GIF frames | `image::codecs::gif::{GifDecoder, GifEncoder}` |
//! | ICO frames | per-entry decode + `image::codecs::ico::IcoEncoder` |
//! | EXIF | custom TIFF-IFD walker ([`exif`]) |
//!
//! The module is split into:
//! - **Engine**: the lazily loaded singleton, its format registry and its
//!   [`MessageLog`]
//! - **Codec**: one [`Codec`] implementation per format family
//! - **Convert**: marshaling between [`Image`] and `image::DynamicImage`
//!
//! Codecs never log directly. Anything worth telling the caller (options
//! the encoder cannot honour, lossy conversions) goes into the message log,
//! which accumulates until someone drains it with
//! [`Engine::show_warnings`] or [`Engine::take_error_message`]. Decode and
//! encode errors carry whatever was in the log when they happened.

mod bmp;
pub(crate) mod convert;
pub mod exif;
mod generic;
mod gif;
mod ico;
mod jpeg;
mod png;
mod quantize;

use crate::error::{Error, Result};
use crate::format::{Format, FormatRegistry};
use crate::image::Image;
use crate::meta::Meta;
use crate::options::ResolvedOptions;
use image::ImageFormat;
use log::{debug, warn};
use std::sync::{LazyLock, Mutex, PoisonError};

/// What a decode produced: every frame (each with its own metadata) plus
/// file-level metadata.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub frames: Vec<Image>,
    pub meta: Meta,
}

/// One format family's decode/encode implementation.
///
/// `encode` receives `u8` frames whose channel count is in the format's
/// `write_channels`; the writer guarantees that before calling.
pub trait Codec: Sync {
    fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Decoded>;

    fn encode(
        &self,
        format: &'static Format,
        frames: &[Image],
        meta: &Meta,
        options: &ResolvedOptions,
        log: &MessageLog,
    ) -> Result<Vec<u8>>;

    /// Format-specific checks run when a frame is appended, so a frame the
    /// encoder would refuse never reaches `close`.
    fn check_frame(
        &self,
        _format: &'static Format,
        _image: &Image,
        _options: &ResolvedOptions,
    ) -> Result<()> {
        Ok(())
    }
}

/// Warnings and errors emitted by codecs, kept until drained.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<String>>,
}

impl MessageLog {
    pub fn push(&self, message: impl Into<String>) {
        self.lock().push(message.into());
    }

    /// Copy of everything currently in the log.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Engine {
    formats: FormatRegistry,
    log: MessageLog,
}

static ENGINE: LazyLock<Engine> = LazyLock::new(Engine::load);

/// The process-wide engine, loaded on first use.
pub fn engine() -> &'static Engine {
    &ENGINE
}

impl Engine {
    /// Probe the compiled-in codecs and build the format registry.
    pub fn load() -> Self {
        let formats = FormatRegistry::probe();
        debug!(
            "codec engine loaded with {} formats: {}",
            formats.len(),
            formats.names().join(", ")
        );
        Self {
            formats,
            log: MessageLog::default(),
        }
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Everything in the message log, without draining it.
    pub fn output_log(&self) -> Vec<String> {
        self.log.snapshot()
    }

    /// Drain the message log, emitting each entry as a `log::warn!`.
    /// Returns how many messages were shown.
    pub fn show_warnings(&self) -> usize {
        let messages = self.log.drain();
        for message in &messages {
            warn!("{message}");
        }
        messages.len()
    }

    /// Drain the message log into one newline-separated string.
    pub fn take_error_message(&self) -> Option<String> {
        let messages = self.log.drain();
        if messages.is_empty() {
            None
        } else {
            Some(messages.join("\n"))
        }
    }

    pub fn decode(
        &self,
        format: &'static Format,
        data: &[u8],
        options: &ResolvedOptions,
    ) -> Result<Decoded> {
        codec_for(format)
            .decode(format, data, options, &self.log)
            .map_err(|e| self.annotate(e))
    }

    pub fn encode(
        &self,
        format: &'static Format,
        frames: &[Image],
        meta: &Meta,
        options: &ResolvedOptions,
    ) -> Result<Vec<u8>> {
        codec_for(format)
            .encode(format, frames, meta, options, &self.log)
            .map_err(|e| self.annotate(e))
    }

    pub fn check_frame(
        &self,
        format: &'static Format,
        image: &Image,
        options: &ResolvedOptions,
    ) -> Result<()> {
        codec_for(format).check_frame(format, image, options)
    }

    /// Attach pending log messages to a codec error.
    fn annotate(&self, error: Error) -> Error {
        match error {
            Error::Decode { format, message } => Error::Decode {
                format,
                message: self.with_log(message),
            },
            Error::Encode { format, message } => Error::Encode {
                format,
                message: self.with_log(message),
            },
            other => other,
        }
    }

    fn with_log(&self, message: String) -> String {
        match self.take_error_message() {
            Some(log) => format!("{message}\n{log}"),
            None => message,
        }
    }
}

fn codec_for(format: &Format) -> &'static dyn Codec {
    match format.engine_format {
        ImageFormat::Png => &png::PngCodec,
        ImageFormat::Jpeg => &jpeg::JpegCodec,
        ImageFormat::Bmp => &bmp::BmpCodec,
        ImageFormat::Gif => &gif::GifCodec,
        ImageFormat::Ico => &ico::IcoCodec,
        _ => &generic::GenericCodec,
    }
}
