//! Format descriptors and the registry that maps names and extensions onto
//! them.
//!
//! A [`Format`] is immutable and `'static`: the built-in table below is the
//! complete list, and the engine filters it down to the formats whose codec
//! is compiled in when it loads (see [`crate::engine::Engine::load`]).
//!
//! | Format | Extensions | Write | Multi-frame |
//! |---|---|---|---|
//! | PNG | png | yes | no |
//! | JPEG | jpg, jpeg, jpe, jfif | 1 or 3 channels | no |
//! | BMP | bmp | yes | no |
//! | GIF | gif | yes | yes |
//! | ICO | ico | up to 256×256 | yes |
//! | TIFF | tif, tiff | yes | no |
//! | WEBP | webp | lossless | no |
//! | HDR | hdr | no | no |

use crate::error::{Error, Result};
use crate::options::OptionSpec;
use crate::request::{IoMode, Request};
use crate::session::{Reader, Writer};
use image::ImageFormat;
use log::debug;
use std::path::Path;

/// A named codec descriptor.
#[derive(Debug, PartialEq)]
pub struct Format {
    pub name: &'static str,
    pub description: &'static str,
    /// Lowercase, without the leading dot.
    pub extensions: &'static [&'static str],
    /// The engine's identifier for this format.
    pub engine_format: ImageFormat,
    writable: bool,
    pub multi_frame: bool,
    /// Channel counts the encoder accepts.
    pub write_channels: &'static [usize],
    pub read_options: &'static [OptionSpec],
    pub write_options: &'static [OptionSpec],
}

impl Format {
    pub fn can_read(&self) -> bool {
        self.engine_format.reading_enabled()
    }

    pub fn can_write(&self) -> bool {
        self.writable && self.engine_format.writing_enabled()
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Option specs for the given direction.
    pub fn options_for(&self, io: IoMode) -> &'static [OptionSpec] {
        match io {
            IoMode::Read => self.read_options,
            IoMode::Write => self.write_options,
        }
    }

    /// Open a reader on `request` with this format.
    pub fn read(&'static self, request: Request) -> Result<Reader> {
        Reader::open(self, request)
    }

    /// Open a writer on `request` with this format.
    pub fn save(&'static self, request: Request) -> Result<Writer> {
        Writer::open(self, request)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.name, self.description)
    }
}

const ALL_CHANNELS: &[usize] = &[1, 2, 3, 4];

const PNG_READ: &[OptionSpec] = &[OptionSpec::flag(
    "ignoregamma",
    false,
    "Skip gamma correction from the gAMA chunk",
)];

const PNG_WRITE: &[OptionSpec] = &[
    OptionSpec::int("compression", 0, 9, 9, "Deflate effort, 0 (none) to 9 (best)"),
    OptionSpec::int(
        "quantize",
        0,
        256,
        0,
        "Reduce RGB images to a palette of this many colors (2-256, 0 = off)",
    ),
    OptionSpec::flag("interlaced", false, "Request Adam7 interlacing"),
];

const JPEG_READ: &[OptionSpec] = &[OptionSpec::flag_or_int(
    "exifrotate",
    0,
    2,
    1,
    "Apply the EXIF Orientation tag to the decoded pixels",
)];

const JPEG_WRITE: &[OptionSpec] = &[
    OptionSpec::int("quality", 1, 100, 75, "Encoding quality, 1 (worst) to 100 (best)"),
    OptionSpec::flag("progressive", false, "Request progressive encoding"),
    OptionSpec::flag("optimize", false, "Request optimized Huffman tables"),
    OptionSpec::flag("baseline", false, "Force baseline encoding"),
];

const BMP_WRITE: &[OptionSpec] = &[OptionSpec::flag(
    "compression",
    false,
    "Request RLE compression",
)];

const GIF_WRITE: &[OptionSpec] = &[
    OptionSpec::int("loop", 0, 65535, 0, "Animation repeat count, 0 = forever"),
    OptionSpec::int("duration", 0, 65535, 100, "Default frame time in milliseconds"),
];

const ICO_READ: &[OptionSpec] = &[OptionSpec::flag(
    "makealpha",
    false,
    "Always return an alpha channel",
)];

pub(crate) static BUILTIN_FORMATS: &[Format] = &[
    Format {
        name: "PNG",
        description: "Portable Network Graphics",
        extensions: &["png"],
        engine_format: ImageFormat::Png,
        writable: true,
        multi_frame: false,
        write_channels: ALL_CHANNELS,
        read_options: PNG_READ,
        write_options: PNG_WRITE,
    },
    Format {
        name: "JPEG",
        description: "JPEG - JFIF Compliant",
        extensions: &["jpg", "jpeg", "jpe", "jfif"],
        engine_format: ImageFormat::Jpeg,
        writable: true,
        multi_frame: false,
        write_channels: &[1, 3],
        read_options: JPEG_READ,
        write_options: JPEG_WRITE,
    },
    Format {
        name: "BMP",
        description: "Windows or OS/2 Bitmap",
        extensions: &["bmp"],
        engine_format: ImageFormat::Bmp,
        writable: true,
        multi_frame: false,
        write_channels: ALL_CHANNELS,
        read_options: &[],
        write_options: BMP_WRITE,
    },
    Format {
        name: "GIF",
        description: "Graphics Interchange Format",
        extensions: &["gif"],
        engine_format: ImageFormat::Gif,
        writable: true,
        multi_frame: true,
        write_channels: ALL_CHANNELS,
        read_options: &[],
        write_options: GIF_WRITE,
    },
    Format {
        name: "ICO",
        description: "Windows Icon",
        extensions: &["ico"],
        engine_format: ImageFormat::Ico,
        writable: true,
        multi_frame: true,
        write_channels: ALL_CHANNELS,
        read_options: ICO_READ,
        write_options: &[],
    },
    Format {
        name: "TIFF",
        description: "Tagged Image File Format",
        extensions: &["tif", "tiff"],
        engine_format: ImageFormat::Tiff,
        writable: true,
        multi_frame: false,
        write_channels: &[1, 3, 4],
        read_options: &[],
        write_options: &[],
    },
    Format {
        name: "WEBP",
        description: "Google WebP (lossless output)",
        extensions: &["webp"],
        engine_format: ImageFormat::WebP,
        writable: true,
        multi_frame: false,
        write_channels: ALL_CHANNELS,
        read_options: &[],
        write_options: &[],
    },
    Format {
        name: "HDR",
        description: "Radiance RGBE (read as 32-bit float)",
        extensions: &["hdr"],
        engine_format: ImageFormat::Hdr,
        writable: false,
        multi_frame: false,
        write_channels: &[],
        read_options: &[],
        write_options: &[],
    },
];

/// Lookup table over the formats available in this build.
#[derive(Debug)]
pub struct FormatRegistry {
    formats: Vec<&'static Format>,
}

impl FormatRegistry {
    /// Keep only the built-in formats whose decoder is compiled in.
    pub(crate) fn probe() -> Self {
        let formats = BUILTIN_FORMATS
            .iter()
            .filter(|f| {
                let available = f.can_read();
                if !available {
                    debug!("codec for {} is not compiled in; skipping", f.name);
                }
                available
            })
            .collect();
        Self { formats }
    }

    /// Find a format by name or extension, case-insensitively. A leading
    /// dot on an extension is ignored.
    pub fn get(&self, key: &str) -> Option<&'static Format> {
        let key = key.trim();
        self.formats
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(key))
            .or_else(|| self.formats.iter().find(|f| f.has_extension(key)))
            .copied()
    }

    pub fn lookup(&self, key: &str) -> Result<&'static Format> {
        self.get(key)
            .ok_or_else(|| Error::UnsupportedFormat(format!("'{key}'")))
    }

    /// Identify a format from the leading bytes of a file.
    pub fn detect(&self, bytes: &[u8]) -> Option<&'static Format> {
        let guessed = image::guess_format(bytes).ok()?;
        self.formats
            .iter()
            .find(|f| f.engine_format == guessed)
            .copied()
    }

    /// Pick the format for `path` by extension and check it supports the
    /// requested direction.
    pub fn for_path(&self, path: &Path, io: IoMode) -> Result<&'static Format> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(format!("{} (no extension)", path.display())))?;
        let format = self
            .formats
            .iter()
            .find(|f| f.has_extension(ext))
            .copied()
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        check_capability(format, io)?;
        Ok(format)
    }

    /// Resolve the format for a filename and a one-letter mode (`"r"` or
    /// `"w"`).
    pub fn format_for_file(&self, filename: &str, mode: &str) -> Result<&'static Format> {
        let io = match mode {
            "r" => IoMode::Read,
            "w" => IoMode::Write,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "mode must be 'r' or 'w', got '{other}'"
                )));
            }
        };
        self.for_path(Path::new(filename), io)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Format> + '_ {
        self.formats.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.formats.iter().map(|f| f.name).collect()
    }
}

pub(crate) fn check_capability(format: &'static Format, io: IoMode) -> Result<()> {
    match io {
        IoMode::Read if !format.can_read() => Err(Error::Capability {
            format: format.name,
            action: "read",
        }),
        IoMode::Write if !format.can_write() => Err(Error::Capability {
            format: format.name,
            action: "write",
        }),
        _ => Ok(()),
    }
}
