//! A [`Request`] bundles what to read or write (a [`Target`]), how (a
//! [`Mode`]) and with which keyword [`Options`].
//!
//! Modes follow the two-letter convention:
//!
//! | Mode | Meaning |
//! |---|---|
//! | `ri` / `wi` | read / write a single image |
//! | `rI` / `wI` | read / write multiple images |
//! | `r?` / `w?` | either |

use crate::engine;
use crate::error::{Error, Result};
use crate::format::{Format, check_capability};
use crate::options::Options;
use log::debug;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    Single,
    Multi,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub io: IoMode,
    pub image: ImageMode,
}

impl Mode {
    pub const READ_SINGLE: Mode = Mode {
        io: IoMode::Read,
        image: ImageMode::Single,
    };
    pub const READ_MULTI: Mode = Mode {
        io: IoMode::Read,
        image: ImageMode::Multi,
    };
    pub const WRITE_SINGLE: Mode = Mode {
        io: IoMode::Write,
        image: ImageMode::Single,
    };
    pub const WRITE_MULTI: Mode = Mode {
        io: IoMode::Write,
        image: ImageMode::Multi,
    };
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let (Some(io), Some(image), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(Error::InvalidArgument(format!(
                "mode must be two characters such as 'ri' or 'wI', got '{s}'"
            )));
        };
        let io = match io {
            'r' => IoMode::Read,
            'w' => IoMode::Write,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "mode must start with 'r' or 'w', got '{other}'"
                )));
            }
        };
        let image = match image {
            'i' => ImageMode::Single,
            'I' => ImageMode::Multi,
            '?' => ImageMode::Any,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "image mode must be 'i', 'I' or '?', got '{other}'"
                )));
            }
        };
        Ok(Mode { io, image })
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let io = match self.io {
            IoMode::Read => 'r',
            IoMode::Write => 'w',
        };
        let image = match self.image {
            ImageMode::Single => 'i',
            ImageMode::Multi => 'I',
            ImageMode::Any => '?',
        };
        write!(f, "{io}{image}")
    }
}

/// Where the data comes from or goes to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Path(PathBuf),
    /// Encoded file contents already in memory (reads only).
    Bytes(Vec<u8>),
    /// Encode into memory; the writer hands the bytes back on close.
    ReturnBytes,
}

impl From<PathBuf> for Target {
    fn from(path: PathBuf) -> Self {
        Target::Path(path)
    }
}

impl From<&Path> for Target {
    fn from(path: &Path) -> Self {
        Target::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for Target {
    fn from(path: &PathBuf) -> Self {
        Target::Path(path.clone())
    }
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Target {
    fn from(bytes: Vec<u8>) -> Self {
        Target::Bytes(bytes)
    }
}

impl From<&[u8]> for Target {
    fn from(bytes: &[u8]) -> Self {
        Target::Bytes(bytes.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    target: Target,
    mode: Mode,
    format: Option<String>,
    options: Options,
}

impl Request {
    pub fn new(target: impl Into<Target>, mode: &str) -> Result<Self> {
        Self::with_mode(target, mode.parse()?)
    }

    pub fn with_mode(target: impl Into<Target>, mode: Mode) -> Result<Self> {
        let target = target.into();
        match (&target, mode.io) {
            (Target::Bytes(_), IoMode::Write) => {
                return Err(Error::InvalidArgument(
                    "cannot write into a byte buffer; use Target::ReturnBytes".into(),
                ));
            }
            (Target::ReturnBytes, IoMode::Read) => {
                return Err(Error::InvalidArgument(
                    "Target::ReturnBytes is only valid for writing".into(),
                ));
            }
            _ => {}
        }
        Ok(Self {
            target,
            mode,
            format: None,
            options: Options::new(),
        })
    }

    /// Force a format by name or extension instead of inferring it.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Short description of the target for messages.
    pub fn describe(&self) -> String {
        match &self.target {
            Target::Path(p) => p.display().to_string(),
            Target::Bytes(b) => format!("<{} bytes>", b.len()),
            Target::ReturnBytes => "<bytes>".to_string(),
        }
    }

    /// The encoded input, loaded from disk if needed.
    pub(crate) fn read_input(&self) -> Result<Cow<'_, [u8]>> {
        match &self.target {
            Target::Path(p) => Ok(Cow::Owned(std::fs::read(p)?)),
            Target::Bytes(b) => Ok(Cow::Borrowed(b)),
            Target::ReturnBytes => Err(Error::InvalidArgument(
                "Target::ReturnBytes has no input".into(),
            )),
        }
    }

    /// Select the format: explicit name first, then extension, then (for
    /// reads) magic bytes.
    pub fn resolve_format(&self) -> Result<&'static Format> {
        let registry = engine::engine().formats();
        let format = if let Some(name) = &self.format {
            registry.lookup(name)?
        } else {
            match &self.target {
                Target::Path(p) => match registry.for_path(p, self.mode.io) {
                    Ok(f) => f,
                    Err(Error::UnsupportedFormat(_)) if self.mode.io == IoMode::Read => {
                        let head = read_head(p)?;
                        registry.detect(&head).ok_or_else(|| {
                            Error::UnsupportedFormat(p.display().to_string())
                        })?
                    }
                    Err(e) => return Err(e),
                },
                Target::Bytes(b) => registry
                    .detect(b)
                    .ok_or_else(|| Error::UnsupportedFormat(self.describe()))?,
                Target::ReturnBytes => {
                    return Err(Error::UnsupportedFormat(
                        "in-memory output without an explicit format".into(),
                    ));
                }
            }
        };
        check_capability(format, self.mode.io)?;
        debug!("{} {} → {}", self.mode, self.describe(), format.name);
        Ok(format)
    }
}

fn read_head(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut head = Vec::with_capacity(64);
    std::fs::File::open(path)?.take(64).read_to_end(&mut head)?;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("ri".parse::<Mode>().unwrap(), Mode::READ_SINGLE);
        assert_eq!("wI".parse::<Mode>().unwrap(), Mode::WRITE_MULTI);
        let any: Mode = "r?".parse().unwrap();
        assert_eq!(any.image, ImageMode::Any);
        assert_eq!(any.to_string(), "r?");
    }

    #[test]
    fn reject_bad_modes() {
        for bad in ["", "r", "x", "xi", "rx", "rii"] {
            let err = bad.parse::<Mode>().unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{bad}");
        }
    }

    #[test]
    fn bytes_target_is_read_only() {
        assert!(Request::new(vec![1u8, 2, 3], "ri").is_ok());
        assert!(Request::new(vec![1u8, 2, 3], "wi").is_err());
        assert!(Request::new(Target::ReturnBytes, "ri").is_err());
        assert!(Request::new(Target::ReturnBytes, "wi").is_ok());
    }

    #[test]
    fn resolve_by_extension() {
        let req = Request::new("photo.JPG", "wi").unwrap();
        assert_eq!(req.resolve_format().unwrap().name, "JPEG");
    }

    #[test]
    fn explicit_format_wins() {
        let req = Request::new("photo.jpg", "wi").unwrap().with_format("png");
        assert_eq!(req.resolve_format().unwrap().name, "PNG");
    }

    #[test]
    fn return_bytes_needs_explicit_format() {
        let req = Request::new(Target::ReturnBytes, "wi").unwrap();
        assert!(matches!(
            req.resolve_format(),
            Err(Error::UnsupportedFormat(_))
        ));
        let req = req.with_format("JPEG");
        assert_eq!(req.resolve_format().unwrap().name, "JPEG");
    }

    #[test]
    fn read_only_format_rejected_for_write() {
        let req = Request::new("sky.hdr", "wi").unwrap();
        assert!(matches!(
            req.resolve_format(),
            Err(Error::Capability {
                format: "HDR",
                action: "write"
            })
        ));
    }

    #[test]
    fn unknown_extension_falls_back_to_magic_bytes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("image.data");
        std::fs::write(&path, b"GIF89a\x01\x00\x01\x00\x00\x00\x00").unwrap();
        let req = Request::new(&path, "ri").unwrap();
        assert_eq!(req.resolve_format().unwrap().name, "GIF");

        let path = tmp.path().join("noise.data");
        std::fs::write(&path, b"this is not an image").unwrap();
        let req = Request::new(&path, "ri").unwrap();
        assert!(matches!(
            req.resolve_format(),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
