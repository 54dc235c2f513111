//! # imgio
//!
//! An image I/O adapter layer. Callers hand it array-shaped images
//! (`height × width[ × channels]`, `u8` or `f32` in `[0, 1]`) and a filename
//! or an in-memory buffer. The crate picks a format by name, extension or
//! magic bytes, validates the per-format keyword options, and carries pixels
//! and metadata across the boundary of a codec engine that does the actual
//! encoding and decoding.
//!
//! ```text
//! Request ──► Format ──► Reader ──► engine().decode ──► frames + Meta
//!   (target, mode,        Writer ──► engine().encode ──► file or bytes
//!    options)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`format`] | `Format` descriptors, per-format option specs and the `FormatRegistry` |
//! | [`request`] | Target, mode (`ri`, `wI`, ...) and format resolution |
//! | [`session`] | `Reader` and `Writer`: frame access, dtype conversion, append rules |
//! | [`engine`] | The process-wide codec engine, its message log and the per-format codecs |
//! | [`options`] | Loosely typed keyword options and their validation |
//! | [`image`] | The pixel buffer type shared by every layer |
//! | [`meta`] | Grouped metadata (`EXIF_MAIN`, `COMMENTS`, `ANIMATION`, ...) |
//! | [`api`] | One-call helpers: `imread`, `imsave`, `mimread`, `mimsave` |
//! | [`config`] | `imgio.toml` loading, merging and validation for the CLI |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Engine Per Process
//!
//! The engine is built on first use and never torn down. Building it probes
//! which codecs are compiled in; formats without a codec are simply absent
//! from the registry rather than failing at read time. Codec warnings are
//! collected in the engine's message log, which accumulates until drained
//! and is appended to decode and encode errors so failures explain
//! themselves.
//!
//! ## Validate Before Touching Data
//!
//! Options are checked against the format's declared specs before any file
//! is opened. An unknown key is a parameter error, a value out of range is
//! a value error. Nothing is silently dropped. Frames are checked against
//! the format and its options when appended (`quantize` on a non-RGB frame
//! fails at `append_data`, not at `close`).
//!
//! ## Owned Frames
//!
//! Readers decode the whole resource on open and hand out copies; writers
//! copy appended frames. No caller buffer is ever retained.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod image;
pub mod meta;
pub mod options;
pub mod output;
pub mod request;
pub mod session;

pub use api::{formats, imread, imread_bytes, imsave, imsave_bytes, mimread, mimsave, read, save};
pub use engine::engine;
pub use error::{Error, ErrorKind, Result};
pub use format::{Format, FormatRegistry};
pub use image::{DType, Image, PixelData, Shape};
pub use meta::{Meta, MetaValue};
pub use options::{OptionValue, Options};
pub use request::{Mode, Request, Target};
pub use session::{Reader, Writer};

#[cfg(test)]
pub(crate) mod test_helpers;
