//! Shared test utilities: hand-built EXIF blocks and small JPEG files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let payload = exif_payload(6);             // "Exif\0\0" + TIFF, Orientation 6
//! let jpeg = jpeg_with_exif(16, 8, 6);       // 16 wide, 8 high, with that block
//! ```

use crate::engine::exif;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, RgbImage};

// =========================================================================
// EXIF
// =========================================================================

/// An APP1 EXIF payload: the `Exif\0\0` header followed by a little-endian
/// TIFF structure with one IFD holding `Make = "Test"` and `Orientation`.
pub fn exif_payload(orientation: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II*\0");
    tiff.extend_from_slice(&8u32.to_le_bytes());

    // IFD0: 2 entries, then the next-IFD offset, then Make's value at 38
    tiff.extend_from_slice(&2u16.to_le_bytes());
    // Make, ASCII, count 5, offset 38
    tiff.extend_from_slice(&0x010Fu16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&5u32.to_le_bytes());
    tiff.extend_from_slice(&38u32.to_le_bytes());
    // Orientation, SHORT, count 1, inline value
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(tiff.len(), 38);
    tiff.extend_from_slice(b"Test\0");

    let mut payload = exif::EXIF_HEADER.to_vec();
    payload.extend_from_slice(&tiff);
    payload
}

// =========================================================================
// JPEG files
// =========================================================================

fn encode(image: DynamicImage) -> Vec<u8> {
    let mut out = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 90))
        .unwrap();
    out
}

/// A tiny greyscale JPEG with no metadata segments.
pub fn minimal_jpeg() -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        8,
        8,
        image::Luma([128]),
    )))
}

/// An RGB JPEG of `width × height` stored pixels carrying an EXIF block with
/// the given orientation. The left half is dark and the top half red, so
/// rotations and flips are visible after decoding.
pub fn jpeg_with_exif(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        let left = if x < width / 2 { 0 } else { 255 };
        let top = if y < height / 2 { 255 } else { 0 };
        image::Rgb([top, left, 128])
    });
    let jpeg = encode(DynamicImage::ImageRgb8(image));
    exif::insert_segments(&jpeg, Some(&exif_payload(orientation)), &[])
}
