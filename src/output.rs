//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Formats
//!
//! ```text
//! PNG  Portable Network Graphics
//!     Extensions: .png
//!     Modes: read, write
//!     Read options: ignoregamma=false
//!     Write options: compression=9 (0-9), quantize=0 (0-256), interlaced=false
//! ```
//!
//! ## Info
//!
//! ```text
//! photo.jpg (JPEG, 1 frame)
//! 001 480x640x3 uint8
//!     EXIF_MAIN
//!         Make: "Canon"
//!         Orientation: 1
//!     EXIF_RAW: <1024 bytes>
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::error::Result;
use crate::format::{Format, FormatRegistry};
use crate::meta::{Meta, MetaValue};
use crate::options::{OptionKind, OptionSpec};
use crate::session::Reader;
use serde::Serialize;

const MAX_TEXT: usize = 60;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// formats
// ============================================================================

fn option_summary(spec: &OptionSpec) -> String {
    match spec.kind {
        OptionKind::Bool => format!("{}={}", spec.name, spec.default),
        OptionKind::Int { min, max } | OptionKind::BoolOrInt { min, max } => {
            format!("{}={} ({min}-{max})", spec.name, spec.default)
        }
    }
}

fn options_line(label: &str, specs: &[OptionSpec]) -> Option<String> {
    if specs.is_empty() {
        return None;
    }
    let list: Vec<String> = specs.iter().map(option_summary).collect();
    Some(format!("{}{label}: {}", indent(1), list.join(", ")))
}

fn format_entry(format: &Format) -> Vec<String> {
    let mut lines = vec![format!("{}  {}", format.name, format.description)];
    let extensions: Vec<String> = format.extensions.iter().map(|e| format!(".{e}")).collect();
    lines.push(format!("{}Extensions: {}", indent(1), extensions.join(" ")));

    let mut modes = Vec::new();
    if format.can_read() {
        modes.push("read");
    }
    if format.can_write() {
        modes.push("write");
    }
    if format.multi_frame {
        modes.push("multi-frame");
    }
    lines.push(format!("{}Modes: {}", indent(1), modes.join(", ")));

    lines.extend(options_line("Read options", format.read_options));
    if format.can_write() {
        lines.extend(options_line("Write options", format.write_options));
    }
    lines
}

/// Format the registry as one block per format.
pub fn format_formats(registry: &FormatRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, format) in registry.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(format_entry(format));
    }
    lines
}

pub fn print_formats(registry: &FormatRegistry) {
    for line in format_formats(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// info
// ============================================================================

/// What `imgio info` reports about one file.
#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub source: String,
    pub format: &'static str,
    pub frames: Vec<FrameInfo>,
}

#[derive(Debug, Serialize)]
pub struct FrameInfo {
    pub shape: Vec<usize>,
    pub dtype: String,
    pub meta: Meta,
}

impl InfoReport {
    pub fn from_reader(source: impl Into<String>, reader: &Reader) -> Result<Self> {
        let mut frames = Vec::with_capacity(reader.len());
        for image in reader.iter()? {
            frames.push(FrameInfo {
                shape: image.dims(),
                dtype: image.dtype().to_string(),
                meta: image.meta.clone(),
            });
        }
        Ok(Self {
            source: source.into(),
            format: reader.format().name,
            frames,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn value_text(value: &MetaValue) -> String {
    match value {
        MetaValue::Bool(b) => b.to_string(),
        MetaValue::Int(i) => i.to_string(),
        MetaValue::Float(f) => f.to_string(),
        MetaValue::Text(s) => format!("{:?}", truncate(s, MAX_TEXT)),
        MetaValue::Bytes(b) => format!("<{} bytes>", b.len()),
        MetaValue::Group(g) => format!("<{} entries>", g.len()),
    }
}

fn meta_lines<'a>(
    entries: impl Iterator<Item = (&'a String, &'a MetaValue)>,
    depth: usize,
    lines: &mut Vec<String>,
) {
    for (key, value) in entries {
        match value {
            MetaValue::Group(group) => {
                lines.push(format!("{}{key}", indent(depth)));
                meta_lines(group.iter(), depth + 1, lines);
            }
            other => lines.push(format!("{}{key}: {}", indent(depth), value_text(other))),
        }
    }
}

/// Format an info report: a header, then one line per frame followed by
/// its metadata tree.
pub fn format_info(report: &InfoReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}, {})",
        report.source,
        report.format,
        plural(report.frames.len(), "frame")
    )];
    for (i, frame) in report.frames.iter().enumerate() {
        let dims: Vec<String> = frame.shape.iter().map(|d| d.to_string()).collect();
        lines.push(format!(
            "{} {} {}",
            format_index(i + 1),
            dims.join("x"),
            frame.dtype
        ));
        meta_lines(frame.meta.iter(), 1, &mut lines);
    }
    lines
}

pub fn print_info(report: &InfoReport) {
    for line in format_info(report) {
        println!("{}", line);
    }
}

// ============================================================================
// convert
// ============================================================================

pub fn format_convert(
    source: &str,
    dest: &str,
    from: &Format,
    to: &Format,
    frames: usize,
) -> Vec<String> {
    vec![format!(
        "{source} → {dest} ({} → {}, {})",
        from.name,
        to.name,
        plural(frames, "frame")
    )]
}

pub fn print_convert(source: &str, dest: &str, from: &Format, to: &Format, frames: usize) {
    for line in format_convert(source, dest, from, to, frames) {
        println!("{}", line);
    }
}
