//! One-call helpers over [`Request`], [`Reader`] and [`Writer`].
//!
//! ```no_run
//! use imgio::{Options, imread, imsave};
//!
//! let image = imread("photo.jpg", Options::new())?;
//! imsave("photo.png", &image, Options::new().with("compression", 6))?;
//! # Ok::<(), imgio::Error>(())
//! ```

use crate::engine::engine;
use crate::error::Result;
use crate::format::FormatRegistry;
use crate::image::Image;
use crate::options::Options;
use crate::request::{Request, Target};
use crate::session::{Reader, Writer};
use std::path::Path;

/// The formats available in this build.
pub fn formats() -> &'static FormatRegistry {
    engine().formats()
}

/// Open a reader, resolving the format from the request.
pub fn read(request: Request) -> Result<Reader> {
    let format = request.resolve_format()?;
    format.read(request)
}

/// Open a writer, resolving the format from the request.
pub fn save(request: Request) -> Result<Writer> {
    let format = request.resolve_format()?;
    format.save(request)
}

/// Read the first image of a file, with its metadata attached.
pub fn imread(path: impl AsRef<Path>, options: Options) -> Result<Image> {
    let request = Request::new(path.as_ref(), "ri")?.with_options(options);
    read(request)?.get_data(0)
}

/// Like [`imread`] for encoded data already in memory. The format is
/// detected from the leading bytes.
pub fn imread_bytes(bytes: &[u8], options: Options) -> Result<Image> {
    let request = Request::new(bytes, "ri")?.with_options(options);
    read(request)?.get_data(0)
}

/// Write one image; the format follows the file extension.
pub fn imsave(path: impl AsRef<Path>, image: &Image, options: Options) -> Result<()> {
    let request = Request::new(path.as_ref(), "wi")?.with_options(options);
    let mut writer = save(request)?;
    writer.append_data(image)?;
    writer.close()?;
    Ok(())
}

/// Encode one image into memory as `format` (a name or extension).
pub fn imsave_bytes(image: &Image, format: &str, options: Options) -> Result<Vec<u8>> {
    let request = Request::new(Target::ReturnBytes, "wi")?
        .with_format(format)
        .with_options(options);
    let mut writer = save(request)?;
    writer.append_data(image)?;
    Ok(writer.close()?.unwrap_or_default())
}

/// Read every frame of a file.
pub fn mimread(path: impl AsRef<Path>, options: Options) -> Result<Vec<Image>> {
    let request = Request::new(path.as_ref(), "rI")?.with_options(options);
    read(request)?.into_frames()
}

/// Write several frames to one file. Single-frame formats reject more than
/// one image.
pub fn mimsave(path: impl AsRef<Path>, images: &[Image], options: Options) -> Result<()> {
    let request = Request::new(path.as_ref(), "wI")?.with_options(options);
    let mut writer = save(request)?;
    for image in images {
        writer.append_data(image)?;
    }
    writer.close()?;
    Ok(())
}
