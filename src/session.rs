//! Reader and writer sessions over one opened resource.
//!
//! A [`Reader`] decodes eagerly on open and then serves frames and metadata
//! by index. A [`Writer`] collects frames and metadata and encodes them all
//! on [`Writer::close`]. Both refuse further data operations once closed.

use crate::engine::engine;
use crate::error::{Error, Result};
use crate::format::{Format, check_capability};
use crate::image::{DType, Image};
use crate::meta::{Meta, MetaValue};
use crate::options::ResolvedOptions;
use crate::request::{ImageMode, IoMode, Request, Target};
use log::{debug, warn};

#[derive(Debug)]
pub struct Reader {
    format: &'static Format,
    request: Request,
    frames: Vec<Image>,
    meta: Meta,
    closed: bool,
}

impl Reader {
    pub(crate) fn open(format: &'static Format, request: Request) -> Result<Self> {
        if request.mode().io != IoMode::Read {
            return Err(Error::InvalidArgument(format!(
                "cannot read with a '{}' request",
                request.mode()
            )));
        }
        check_capability(format, IoMode::Read)?;
        let options = ResolvedOptions::resolve(format.name, format.read_options, request.options())?;
        let data = request.read_input()?;
        let decoded = engine().decode(format, &data, &options)?;
        debug!(
            "read {} frame(s) of {} from {}",
            decoded.frames.len(),
            format.name,
            request.describe()
        );
        Ok(Self {
            format,
            request,
            frames: decoded.frames,
            meta: decoded.meta,
            closed: false,
        })
    }

    pub fn format(&self) -> &'static Format {
        self.format
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Number of frames in the resource.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get_data(&self, index: usize) -> Result<Image> {
        self.ensure_open()?;
        self.frames.get(index).cloned().ok_or(Error::Index {
            index,
            len: self.frames.len(),
        })
    }

    /// Metadata of frame `index`, or file-level metadata for `None`.
    ///
    /// Multi-frame formats have no separate file-level metadata: `None`
    /// returns the first frame's and leaves a warning in the engine log.
    pub fn get_meta_data(&self, index: Option<usize>) -> Result<Meta> {
        self.ensure_open()?;
        match index {
            Some(index) => self.frames.get(index).map(|f| f.meta.clone()).ok_or(Error::Index {
                index,
                len: self.frames.len(),
            }),
            None if self.format.multi_frame => {
                engine().log().push(format!(
                    "{} has no file-level metadata; returning the first frame's",
                    self.format.name
                ));
                Ok(self
                    .frames
                    .first()
                    .map_or_else(|| self.meta.clone(), |f| f.meta.clone()))
            }
            None => Ok(self.meta.clone()),
        }
    }

    pub fn iter(&self) -> Result<impl Iterator<Item = &Image>> {
        self.ensure_open()?;
        Ok(self.frames.iter())
    }

    /// Consume the reader, handing over every frame.
    pub fn into_frames(mut self) -> Result<Vec<Image>> {
        self.ensure_open()?;
        self.closed = true;
        Ok(std::mem::take(&mut self.frames))
    }

    /// Release the decoded frames. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
        self.frames.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed("reader"))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct Writer {
    format: &'static Format,
    request: Request,
    options: ResolvedOptions,
    frames: Vec<Image>,
    meta: Meta,
    closed: bool,
}

impl Writer {
    pub(crate) fn open(format: &'static Format, request: Request) -> Result<Self> {
        if request.mode().io != IoMode::Write {
            return Err(Error::InvalidArgument(format!(
                "cannot write with a '{}' request",
                request.mode()
            )));
        }
        check_capability(format, IoMode::Write)?;
        let options =
            ResolvedOptions::resolve(format.name, format.write_options, request.options())?;
        Ok(Self {
            format,
            request,
            options,
            frames: Vec::new(),
            meta: Meta::new(),
            closed: false,
        })
    }

    pub fn format(&self) -> &'static Format {
        self.format
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Frames appended so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Queue `image` for writing. Float images are converted to `u8`;
    /// values outside `[0, 1]` are clipped with a warning in the engine log.
    pub fn append_data(&mut self, image: &Image) -> Result<()> {
        self.ensure_open()?;
        let single = !self.format.multi_frame || self.request.mode().image == ImageMode::Single;
        if single && !self.frames.is_empty() {
            return Err(Error::AppendRejected {
                format: self.format.name,
            });
        }
        if image.height() == 0 || image.width() == 0 {
            return Err(Error::InvalidArgument(format!(
                "cannot write an empty image of shape {}",
                image.shape()
            )));
        }
        if !self.format.write_channels.contains(&image.channels()) {
            return Err(Error::Encode {
                format: self.format.name,
                message: format!(
                    "cannot store {}-channel images (supported: {:?})",
                    image.channels(),
                    self.format.write_channels
                ),
            });
        }
        engine().check_frame(self.format, image, &self.options)?;

        let frame = if image.dtype() == DType::F32 {
            let (converted, clipped) = image.to_u8();
            if clipped {
                engine().log().push(format!(
                    "{}: float values outside [0, 1] were clipped",
                    self.format.name
                ));
            }
            converted
        } else {
            image.clone()
        };
        self.frames.push(frame);
        Ok(())
    }

    /// Store file-level metadata, merged into every frame on close. Only
    /// groups and raw blobs (`COMMENTS`, `EXIF_RAW`, ...) are kept.
    pub fn set_meta_data(&mut self, meta: &Meta) -> Result<()> {
        self.ensure_open()?;
        for (key, value) in meta.iter() {
            match value {
                MetaValue::Group(_) | MetaValue::Bytes(_) => {
                    self.meta.merge(&Meta::new().with(key.clone(), value.clone()));
                }
                _ => engine().log().push(format!(
                    "{}: ignoring metadata key '{key}' (not a metadata group)",
                    self.format.name
                )),
            }
        }
        Ok(())
    }

    /// Encode everything appended and write it out. Returns the encoded
    /// bytes when the target is [`Target::ReturnBytes`]. Closing twice is a
    /// no-op. A failed close leaves the writer open with its frames, so a
    /// later `close` fails the same way instead of reporting success.
    pub fn close(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        let frames: Vec<Image> = self
            .frames
            .iter()
            .map(|frame| {
                let mut meta = self.meta.clone();
                meta.merge(&frame.meta);
                frame.clone().with_meta(meta)
            })
            .collect();
        if frames.is_empty() {
            self.closed = true;
            engine().log().push(format!(
                "{}: no images were appended; nothing written to {}",
                self.format.name,
                self.request.describe()
            ));
            return Ok(None);
        }

        // A single-frame file's metadata is its frame's
        let file_meta = match frames.as_slice() {
            [only] if !self.format.multi_frame => &only.meta,
            _ => &self.meta,
        };
        let bytes = engine().encode(self.format, &frames, file_meta, &self.options)?;
        debug!(
            "wrote {} frame(s) as {} ({} bytes) to {}",
            frames.len(),
            self.format.name,
            bytes.len(),
            self.request.describe()
        );
        let returned = match self.request.target() {
            Target::Path(path) => {
                std::fs::write(path, &bytes)?;
                None
            }
            Target::ReturnBytes => Some(bytes),
            Target::Bytes(_) => {
                return Err(Error::InvalidArgument(
                    "cannot write into a byte buffer".into(),
                ));
            }
        };
        self.closed = true;
        self.frames.clear();
        Ok(returned)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed("writer"))
        } else {
            Ok(())
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if !self.closed && !self.frames.is_empty() {
            warn!(
                "{} writer for {} dropped with {} unwritten frame(s)",
                self.format.name,
                self.request.describe(),
                self.frames.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    fn format(name: &str) -> &'static Format {
        engine().formats().lookup(name).unwrap()
    }

    fn rgb() -> Image {
        Image::from_fn_u8(&[4, 5, 3], |y, x, c| (y * 40 + x * 8 + c) as u8).unwrap()
    }

    fn write_bytes(name: &str, mode: &str, frames: &[Image]) -> Vec<u8> {
        let req = Request::new(Target::ReturnBytes, mode).unwrap();
        let mut writer = format(name).save(req).unwrap();
        for frame in frames {
            writer.append_data(frame).unwrap();
        }
        writer.close().unwrap().unwrap()
    }

    #[test]
    fn reader_indexes_frames_and_meta() {
        let bytes = write_bytes("PNG", "wi", &[rgb()]);
        let reader = format("PNG").read(Request::new(bytes, "ri").unwrap()).unwrap();
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.get_data(0).unwrap().as_u8(), rgb().as_u8());
        assert!(reader.get_meta_data(None).is_ok());
        assert!(reader.get_meta_data(Some(0)).is_ok());
        assert!(matches!(reader.get_data(2), Err(Error::Index { index: 2, len: 1 })));
        assert!(matches!(reader.get_meta_data(Some(2)), Err(Error::Index { .. })));
    }

    #[test]
    fn closed_reader_rejects_access() {
        let bytes = write_bytes("PNG", "wi", &[rgb()]);
        let mut reader = format("PNG").read(Request::new(bytes, "ri").unwrap()).unwrap();
        reader.close();
        reader.close();
        assert!(matches!(reader.get_data(0), Err(Error::Closed("reader"))));
        assert!(reader.iter().is_err());
    }

    #[test]
    fn single_frame_writer_rejects_second_append() {
        let req = Request::new(Target::ReturnBytes, "wi").unwrap();
        let mut writer = format("PNG").save(req).unwrap();
        writer.append_data(&rgb()).unwrap();
        writer.set_meta_data(&Meta::new().with("foo", 3)).unwrap();
        let err = writer.append_data(&rgb()).unwrap_err();
        assert!(matches!(err, Error::AppendRejected { format: "PNG" }));
        assert!(writer.close().unwrap().is_some());
    }

    #[test]
    fn wi_mode_limits_multi_frame_formats() {
        let req = Request::new(Target::ReturnBytes, "wi").unwrap();
        let mut writer = format("GIF").save(req).unwrap();
        writer.append_data(&rgb()).unwrap();
        assert!(writer.append_data(&rgb()).is_err());
        writer.close().unwrap();
    }

    #[test]
    fn multi_frame_roundtrip_with_meta_warning() {
        let bytes = write_bytes("ICO", "wI", &[rgb(), rgb().crop(2, 2).unwrap()]);
        let reader = format("ICO").read(Request::new(bytes, "rI").unwrap()).unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(
            reader.get_meta_data(None).unwrap(),
            reader.get_meta_data(Some(0)).unwrap()
        );
    }

    #[test]
    fn float_frames_are_converted_and_clipped() {
        let float = Image::from_f32(&[1, 2], vec![0.5, 1.5]).unwrap();
        let req = Request::new(Target::ReturnBytes, "wi").unwrap();
        let mut writer = format("PNG").save(req).unwrap();
        writer.append_data(&float).unwrap();
        let bytes = writer.close().unwrap().unwrap();
        let reader = format("PNG").read(Request::new(bytes, "ri").unwrap()).unwrap();
        assert_eq!(reader.get_data(0).unwrap().as_u8().unwrap(), &[128, 255]);
    }

    #[test]
    fn quantize_on_alpha_frame_fails_at_append() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("q.png");
        let req = Request::new(&path, "wi")
            .unwrap()
            .with_options(Options::new().with("quantize", 16));
        let mut writer = format("PNG").save(req).unwrap();
        let rgba = Image::zeros(&[4, 4, 4], DType::U8).unwrap();
        assert!(matches!(
            writer.append_data(&rgba),
            Err(Error::InvalidOption { .. })
        ));
        assert!(writer.is_empty());
        assert_eq!(writer.close().unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn failed_close_keeps_writer_open() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("missing");
        let path = dir.join("out.png");
        let mut writer = format("PNG").save(Request::new(&path, "wi").unwrap()).unwrap();
        writer.append_data(&rgb()).unwrap();
        assert!(matches!(writer.close(), Err(Error::Io(_))));
        assert!(!writer.is_closed());
        assert_eq!(writer.len(), 1);
        assert!(writer.close().is_err());

        std::fs::create_dir(&dir).unwrap();
        assert_eq!(writer.close().unwrap(), None);
        assert!(writer.is_closed());
        assert!(path.exists());
    }

    #[test]
    fn close_without_frames_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.ico");
        let mut writer = format("ICO").save(Request::new(&path, "wI").unwrap()).unwrap();
        writer.set_meta_data(&Meta::new()).unwrap();
        assert_eq!(writer.close().unwrap(), None);
        assert!(!path.exists());
        assert!(matches!(writer.append_data(&rgb()), Err(Error::Closed("writer"))));
    }

    #[test]
    fn writer_rejects_unsupported_channels_and_options() {
        let req = Request::new(Target::ReturnBytes, "wi").unwrap();
        let mut writer = format("JPEG").save(req).unwrap();
        let rgba = Image::zeros(&[2, 2, 4], DType::U8).unwrap();
        assert!(matches!(writer.append_data(&rgba), Err(Error::Encode { .. })));

        let req = Request::new(Target::ReturnBytes, "wi")
            .unwrap()
            .with_options(Options::new().with("notavalidk", true));
        assert!(matches!(
            format("JPEG").save(req),
            Err(Error::UnknownOption { .. })
        ));
    }

    #[test]
    fn mode_direction_must_match() {
        let req = Request::new(Target::ReturnBytes, "wi").unwrap();
        assert!(format("PNG").read(req).is_err());
        let req = Request::new(vec![0u8; 4], "ri").unwrap();
        assert!(format("PNG").save(req).is_err());
    }
}
