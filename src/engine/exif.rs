//! Minimal EXIF support for JPEG files.
//!
//! Reads the APP1 `Exif\0\0` segment and COM segments, walks IFD0 plus the
//! Exif and GPS sub-IFDs, and turns the tags it knows into named
//! [`MetaValue`]s:
//! - IFD0 → `EXIF_MAIN`
//! - Exif sub-IFD (pointer tag 0x8769) → `EXIF_EXIF`
//! - GPS sub-IFD (pointer tag 0x8825) → `EXIF_GPS`
//!
//! The raw APP1 payload is kept as-is so it can be written back; the only
//! edit ever made to it is resetting the Orientation tag.

use crate::meta::{EXIF_EXIF, EXIF_GPS, EXIF_MAIN, Meta, MetaValue};
use std::collections::BTreeMap;
use std::ops::Range;

pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest payload a JPEG marker segment can carry (length field minus
/// itself).
pub const MAX_SEGMENT_PAYLOAD: usize = 65533;

const SOI: u8 = 0xD8;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const COM: u8 = 0xFE;

const TAG_ORIENTATION: u16 = 0x0112;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_MAKER_NOTE: u16 = 0x927C;

// ---------------------------------------------------------------------------
// JPEG segments
// ---------------------------------------------------------------------------

/// Marker and payload range of every segment before the scan data.
fn jpeg_segments(data: &[u8]) -> Vec<(u8, Range<usize>)> {
    let mut segments = Vec::new();
    if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
        return segments;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            break;
        }
        // Markers without length field
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > data.len() {
            break;
        }
        segments.push((marker, pos + 4..pos + 2 + len));
        pos += 2 + len;
    }
    segments
}

/// The APP1 payload (starting with `Exif\0\0`) of a JPEG file.
pub fn find_exif(data: &[u8]) -> Option<&[u8]> {
    jpeg_segments(data)
        .into_iter()
        .find(|(marker, range)| *marker == APP1 && data[range.clone()].starts_with(EXIF_HEADER))
        .map(|(_, range)| &data[range])
}

/// Text of every COM segment, in file order.
pub fn find_comments(data: &[u8]) -> Vec<String> {
    jpeg_segments(data)
        .into_iter()
        .filter(|(marker, _)| *marker == COM)
        .map(|(_, range)| {
            String::from_utf8_lossy(&data[range])
                .trim_end_matches('\0')
                .to_string()
        })
        .collect()
}

/// Splice an EXIF APP1 payload and COM segments into an encoded JPEG, right
/// after SOI (or after a leading JFIF APP0). Payloads longer than
/// [`MAX_SEGMENT_PAYLOAD`] must be filtered out by the caller.
pub fn insert_segments(jpeg: &[u8], exif: Option<&[u8]>, comments: &[String]) -> Vec<u8> {
    let mut insert_at = 2;
    if let Some((APP0, range)) = jpeg_segments(jpeg).first() {
        insert_at = range.end;
    }
    let mut out = Vec::with_capacity(jpeg.len() + exif.map_or(0, <[u8]>::len) + 64);
    out.extend_from_slice(&jpeg[..insert_at]);
    let mut push_segment = |marker: u8, payload: &[u8]| {
        out.extend_from_slice(&[0xFF, marker]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
    };
    if let Some(payload) = exif {
        push_segment(APP1, payload);
    }
    for comment in comments {
        push_segment(COM, comment.as_bytes());
    }
    out.extend_from_slice(&jpeg[insert_at..]);
    out
}

// ---------------------------------------------------------------------------
// TIFF structure inside the APP1 payload
// ---------------------------------------------------------------------------

struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let big_endian = match data.get(0..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let tiff = Self { data, big_endian };
        // TIFF magic (42)
        (tiff.u16(2)? == 42).then_some(tiff)
    }

    fn u16(&self, offset: usize) -> Option<u16> {
        let b: [u8; 2] = self.data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(b)
        } else {
            u16::from_le_bytes(b)
        })
    }

    fn u32(&self, offset: usize) -> Option<u32> {
        let b: [u8; 4] = self.data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        })
    }

    fn first_ifd(&self) -> Option<usize> {
        self.u32(4).map(|o| o as usize)
    }

    fn entries(&self, ifd: usize) -> Vec<Entry> {
        let Some(count) = self.u16(ifd) else {
            return Vec::new();
        };
        (0..count as usize)
            .map_while(|i| {
                let at = ifd + 2 + i * 12;
                Some(Entry {
                    offset: at,
                    tag: self.u16(at)?,
                    typ: self.u16(at + 2)?,
                    count: self.u32(at + 4)? as usize,
                })
            })
            .collect()
    }

    /// Byte range of an entry's value: inline if it fits in four bytes,
    /// otherwise at the stored offset.
    fn value_range(&self, entry: &Entry) -> Option<Range<usize>> {
        let len = entry.count.checked_mul(type_size(entry.typ))?;
        let start = if len <= 4 {
            entry.offset + 8
        } else {
            self.u32(entry.offset + 8)? as usize
        };
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }

    fn value(&self, entry: &Entry) -> Option<MetaValue> {
        let range = self.value_range(entry)?;
        let bytes = &self.data[range.clone()];
        let size = type_size(entry.typ);
        let nth = |i: usize| range.start + i * size;
        let numbers: Option<Vec<MetaValue>> = match entry.typ {
            // ASCII
            2 => {
                let text = String::from_utf8_lossy(bytes);
                return Some(MetaValue::Text(
                    text.trim_end_matches('\0').trim_end().to_string(),
                ));
            }
            // BYTE, UNDEFINED
            1 | 7 if entry.count != 1 => return Some(MetaValue::Bytes(bytes.to_vec())),
            1 | 7 => Some(vec![MetaValue::Int(i64::from(bytes[0]))]),
            6 => (0..entry.count)
                .map(|i| Some(MetaValue::Int(i64::from(bytes[i] as i8))))
                .collect(),
            3 => (0..entry.count)
                .map(|i| self.u16(nth(i)).map(|v| MetaValue::Int(i64::from(v))))
                .collect(),
            8 => (0..entry.count)
                .map(|i| self.u16(nth(i)).map(|v| MetaValue::Int(i64::from(v as i16))))
                .collect(),
            4 => (0..entry.count)
                .map(|i| self.u32(nth(i)).map(|v| MetaValue::Int(i64::from(v))))
                .collect(),
            9 => (0..entry.count)
                .map(|i| self.u32(nth(i)).map(|v| MetaValue::Int(i64::from(v as i32))))
                .collect(),
            5 | 10 => (0..entry.count)
                .map(|i| {
                    let num = self.u32(nth(i))?;
                    let den = self.u32(nth(i) + 4)?;
                    let (num, den) = if entry.typ == 10 {
                        (f64::from(num as i32), f64::from(den as i32))
                    } else {
                        (f64::from(num), f64::from(den))
                    };
                    Some(MetaValue::Float(if den == 0.0 { 0.0 } else { num / den }))
                })
                .collect(),
            11 => (0..entry.count)
                .map(|i| self.u32(nth(i)).map(|v| MetaValue::Float(f64::from(f32::from_bits(v)))))
                .collect(),
            _ => None,
        };
        let mut numbers = numbers?;
        if numbers.len() == 1 {
            return numbers.pop();
        }
        let joined = numbers
            .iter()
            .map(|v| match v {
                MetaValue::Int(i) => i.to_string(),
                MetaValue::Float(f) => f.to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Some(MetaValue::Text(joined))
    }
}

struct Entry {
    offset: usize,
    tag: u16,
    typ: u16,
    count: usize,
}

/// TIFF type sizes: count is number of values, not bytes.
fn type_size(typ: u16) -> usize {
    match typ {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

// ---------------------------------------------------------------------------
// Parsed EXIF
// ---------------------------------------------------------------------------

/// Named tags from the three IFDs, plus the orientation for convenience.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    pub main: BTreeMap<String, MetaValue>,
    pub exif: BTreeMap<String, MetaValue>,
    pub gps: BTreeMap<String, MetaValue>,
    pub orientation: Option<u16>,
}

impl ExifData {
    /// Add the non-empty groups to `meta`.
    pub fn into_meta(self, meta: &mut Meta) {
        for (key, group) in [(EXIF_MAIN, self.main), (EXIF_EXIF, self.exif), (EXIF_GPS, self.gps)] {
            if !group.is_empty() {
                meta.insert(key, group);
            }
        }
    }
}

/// Parse an APP1 payload. Returns default (empty) data on any parse failure.
pub fn parse(payload: &[u8]) -> ExifData {
    let mut result = ExifData::default();
    let Some(tiff) = payload.strip_prefix(EXIF_HEADER).and_then(Tiff::new) else {
        return result;
    };
    let Some(ifd0) = tiff.first_ifd() else {
        return result;
    };
    for entry in tiff.entries(ifd0) {
        match entry.tag {
            TAG_EXIF_IFD => {
                if let Some(MetaValue::Int(offset)) = tiff.value(&entry) {
                    read_ifd(&tiff, offset as usize, exif_tag_name, &mut result.exif);
                }
            }
            TAG_GPS_IFD => {
                if let Some(MetaValue::Int(offset)) = tiff.value(&entry) {
                    read_ifd(&tiff, offset as usize, gps_tag_name, &mut result.gps);
                }
            }
            tag => {
                if let Some(value) = tiff.value(&entry) {
                    if tag == TAG_ORIENTATION {
                        result.orientation = value.as_int().and_then(|v| u16::try_from(v).ok());
                    }
                    result.main.insert(main_tag_name(tag), value);
                }
            }
        }
    }
    result
}

fn read_ifd(
    tiff: &Tiff<'_>,
    ifd: usize,
    name: fn(u16) -> String,
    into: &mut BTreeMap<String, MetaValue>,
) {
    for entry in tiff.entries(ifd) {
        if entry.tag == TAG_MAKER_NOTE {
            continue;
        }
        if let Some(value) = tiff.value(&entry) {
            into.insert(name(entry.tag), value);
        }
    }
}

/// Overwrite the IFD0 Orientation value in an APP1 payload. Returns false
/// when the payload has no SHORT or LONG Orientation tag.
pub fn set_orientation(payload: &mut [u8], value: u16) -> bool {
    let Some(body) = payload.strip_prefix(EXIF_HEADER) else {
        return false;
    };
    let target = {
        let Some(tiff) = Tiff::new(body) else {
            return false;
        };
        let Some(ifd0) = tiff.first_ifd() else {
            return false;
        };
        let found = tiff
            .entries(ifd0)
            .into_iter()
            .find(|e| e.tag == TAG_ORIENTATION && matches!(e.typ, 3 | 4) && e.count >= 1);
        match found {
            Some(entry) => (
                EXIF_HEADER.len() + entry.offset + 8,
                entry.typ == 4,
                tiff.big_endian,
            ),
            None => return false,
        }
    };
    let (at, long, big_endian) = target;
    let bytes: Vec<u8> = match (long, big_endian) {
        (false, true) => value.to_be_bytes().to_vec(),
        (false, false) => value.to_le_bytes().to_vec(),
        (true, true) => u32::from(value).to_be_bytes().to_vec(),
        (true, false) => u32::from(value).to_le_bytes().to_vec(),
    };
    payload[at..at + bytes.len()].copy_from_slice(&bytes);
    true
}

fn main_tag_name(tag: u16) -> String {
    let name = match tag {
        0x010E => "ImageDescription",
        0x010F => "Make",
        0x0110 => "Model",
        0x0112 => "Orientation",
        0x011A => "XResolution",
        0x011B => "YResolution",
        0x0128 => "ResolutionUnit",
        0x0131 => "Software",
        0x0132 => "DateTime",
        0x013B => "Artist",
        0x0213 => "YCbCrPositioning",
        0x8298 => "Copyright",
        _ => return unknown_tag(tag),
    };
    name.to_string()
}

fn exif_tag_name(tag: u16) -> String {
    let name = match tag {
        0x829A => "ExposureTime",
        0x829D => "FNumber",
        0x8822 => "ExposureProgram",
        0x8827 => "ISOSpeedRatings",
        0x9000 => "ExifVersion",
        0x9003 => "DateTimeOriginal",
        0x9004 => "DateTimeDigitized",
        0x9201 => "ShutterSpeedValue",
        0x9202 => "ApertureValue",
        0x9204 => "ExposureBiasValue",
        0x9207 => "MeteringMode",
        0x9209 => "Flash",
        0x920A => "FocalLength",
        0x9286 => "UserComment",
        0xA001 => "ColorSpace",
        0xA002 => "PixelXDimension",
        0xA003 => "PixelYDimension",
        0xA405 => "FocalLengthIn35mmFilm",
        0xA434 => "LensModel",
        _ => return unknown_tag(tag),
    };
    name.to_string()
}

fn gps_tag_name(tag: u16) -> String {
    let name = match tag {
        0x0000 => "GPSVersionID",
        0x0001 => "GPSLatitudeRef",
        0x0002 => "GPSLatitude",
        0x0003 => "GPSLongitudeRef",
        0x0004 => "GPSLongitude",
        0x0005 => "GPSAltitudeRef",
        0x0006 => "GPSAltitude",
        0x0007 => "GPSTimeStamp",
        0x001D => "GPSDateStamp",
        _ => return unknown_tag(tag),
    };
    name.to_string()
}

fn unknown_tag(tag: u16) -> String {
    format!("Tag0x{tag:04X}")
}
