//! Reference images and comparison helpers shared by the integration tests.

#![allow(dead_code)]

use imgio::{DType, Image};

/// Side length of every reference image.
pub const SIZE: usize = 32;

/// Reference pixel for `colors` channels (0 means a 2-D grey image).
///
/// - grey: top half 200, bottom half 0
/// - channel 0: top half 250
/// - channel 1: left half 200
/// - alpha: 255, dropping to 120 from row 20 down
pub fn ref_pixel(colors: usize, y: usize, x: usize, c: usize) -> u8 {
    match (colors, c) {
        (0 | 1, _) => {
            if y < 16 {
                200
            } else {
                0
            }
        }
        (_, 0) => {
            if y < 16 {
                250
            } else {
                0
            }
        }
        (_, 1) => {
            if x < 16 {
                200
            } else {
                0
            }
        }
        (4, 3) => {
            if y < 20 {
                255
            } else {
                120
            }
        }
        _ => 0,
    }
}

/// Reference image with `colors` in 0, 1, 3, 4; `crop` drops the last row
/// and column; `float` gives `f32` values in `[0, 1]`.
pub fn get_ref_im(colors: usize, crop: bool, float: bool) -> Image {
    assert!(matches!(colors, 0 | 1 | 3 | 4), "colors must be 0, 1, 3 or 4");
    tiled_ref_im(colors, SIZE, SIZE, crop, float)
}

/// The reference pattern repeated to fill `height × width`.
pub fn tiled_ref_im(colors: usize, height: usize, width: usize, crop: bool, float: bool) -> Image {
    let dims: Vec<usize> = match colors {
        0 => vec![height, width],
        c => vec![height, width, c],
    };
    let mut im = Image::from_fn_u8(&dims, |y, x, c| ref_pixel(colors, y % SIZE, x % SIZE, c))
        .expect("reference dims are valid");
    if crop {
        im = im.crop(height - 1, width - 1).expect("crop fits");
    }
    if float { im.to_f32() } else { im }
}

/// Values on the 0-255 scale regardless of dtype.
fn scaled(im: &Image, y: usize, x: usize, c: usize) -> f32 {
    match im.dtype() {
        DType::U8 => im.get(y, x, c),
        DType::F32 => im.get(y, x, c) * 255.0,
    }
}

/// Compare two images on the 0-255 scale. A trailing channel axis of 1 is
/// treated as 2-D, and rows and columns 15-16 are masked to ignore edge
/// artifacts from lossy codecs.
pub fn assert_close(expected: &Image, actual: &Image, tol: f32) {
    assert_eq!(
        (expected.height(), expected.width(), expected.channels()),
        (actual.height(), actual.width(), actual.channels()),
        "shape mismatch: {} vs {}",
        expected.shape(),
        actual.shape()
    );
    let mut worst = 0.0f32;
    for y in 0..expected.height() {
        for x in 0..expected.width() {
            if (15..17).contains(&y) || (15..17).contains(&x) {
                continue;
            }
            for c in 0..expected.channels() {
                let diff = (scaled(expected, y, x, c) - scaled(actual, y, x, c)).abs();
                worst = worst.max(diff);
            }
        }
    }
    assert!(worst <= tol, "max difference {worst} exceeds tolerance {tol}");
}
