//! The crate's in-memory image: an owned, row-major pixel buffer with a
//! NumPy-style shape.
//!
//! Shapes are `(height, width)` for single-channel images and
//! `(height, width, channels)` otherwise. A `(h, w, 1)` image is kept
//! distinct from `(h, w)` so that what the caller passed in is what they
//! get back from [`Image::shape`], but the two are interchangeable
//! everywhere pixels are compared or encoded.

use crate::error::{Error, Result};
use crate::meta::Meta;

/// Element type of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    U8,
    /// 32-bit float, nominally in `[0, 1]`.
    F32,
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::U8 => write!(f, "uint8"),
            DType::F32 => write!(f, "float32"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            PixelData::U8(_) => DType::U8,
            PixelData::F32(_) => DType::F32,
        }
    }
}

/// Image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    channel_axis: bool,
}

impl Shape {
    /// Build a shape from 2 or 3 dimensions; channel counts of 1-4 are
    /// supported.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        let shape = match *dims {
            [height, width] => Shape {
                height,
                width,
                channels: 1,
                channel_axis: false,
            },
            [height, width, channels] => Shape {
                height,
                width,
                channels,
                channel_axis: true,
            },
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "images must have 2 or 3 dimensions, got {}",
                    dims.len()
                )));
            }
        };
        if !(1..=4).contains(&shape.channels) {
            return Err(Error::InvalidArgument(format!(
                "images must have 1-4 channels, got {}",
                shape.channels
            )));
        }
        Ok(shape)
    }

    pub fn gray(height: usize, width: usize) -> Self {
        Shape {
            height,
            width,
            channels: 1,
            channel_axis: false,
        }
    }

    pub fn with_channels(height: usize, width: usize, channels: usize) -> Result<Self> {
        Self::from_dims(&[height, width, channels])
    }

    pub fn dims(&self) -> Vec<usize> {
        if self.channel_axis {
            vec![self.height, self.width, self.channels]
        } else {
            vec![self.height, self.width]
        }
    }

    pub fn ndim(&self) -> usize {
        if self.channel_axis { 3 } else { 2 }
    }

    pub fn pixel_count(&self) -> usize {
        self.height * self.width
    }

    pub fn element_count(&self) -> usize {
        self.pixel_count() * self.channels
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims: Vec<String> = self.dims().iter().map(usize::to_string).collect();
        write!(f, "({})", dims.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    shape: Shape,
    data: PixelData,
    pub meta: Meta,
}

impl Image {
    pub fn new(shape: Shape, data: PixelData) -> Result<Self> {
        if data.len() != shape.element_count() {
            return Err(Error::InvalidArgument(format!(
                "buffer of {} elements does not match shape {}",
                data.len(),
                shape
            )));
        }
        Ok(Self {
            shape,
            data,
            meta: Meta::new(),
        })
    }

    pub fn from_u8(dims: &[usize], data: Vec<u8>) -> Result<Self> {
        Self::new(Shape::from_dims(dims)?, PixelData::U8(data))
    }

    pub fn from_f32(dims: &[usize], data: Vec<f32>) -> Result<Self> {
        Self::new(Shape::from_dims(dims)?, PixelData::F32(data))
    }

    pub fn zeros(dims: &[usize], dtype: DType) -> Result<Self> {
        let shape = Shape::from_dims(dims)?;
        let n = shape.element_count();
        let data = match dtype {
            DType::U8 => PixelData::U8(vec![0; n]),
            DType::F32 => PixelData::F32(vec![0.0; n]),
        };
        Self::new(shape, data)
    }

    /// Build a `u8` image by evaluating `f(row, col, channel)` per element.
    pub fn from_fn_u8(
        dims: &[usize],
        mut f: impl FnMut(usize, usize, usize) -> u8,
    ) -> Result<Self> {
        let shape = Shape::from_dims(dims)?;
        let mut data = Vec::with_capacity(shape.element_count());
        for y in 0..shape.height {
            for x in 0..shape.width {
                for c in 0..shape.channels {
                    data.push(f(y, x, c));
                }
            }
        }
        Self::new(shape, PixelData::U8(data))
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn dims(&self) -> Vec<usize> {
        self.shape.dims()
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            PixelData::U8(v) => Some(v),
            PixelData::F32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            PixelData::F32(v) => Some(v),
            PixelData::U8(_) => None,
        }
    }

    fn offset(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.shape.width + x) * self.shape.channels + c
    }

    /// Element value as `f32`, in the buffer's own scale (0-255 for `u8`).
    pub fn get(&self, y: usize, x: usize, c: usize) -> f32 {
        let i = self.offset(y, x, c);
        match &self.data {
            PixelData::U8(v) => f32::from(v[i]),
            PixelData::F32(v) => v[i],
        }
    }

    /// Set one element; `value` is cast to the buffer's dtype.
    pub fn set(&mut self, y: usize, x: usize, c: usize, value: f32) {
        let i = self.offset(y, x, c);
        match &mut self.data {
            PixelData::U8(v) => v[i] = value.clamp(0.0, 255.0) as u8,
            PixelData::F32(v) => v[i] = value,
        }
    }

    /// Convert to `u8`. Floats are scaled by 255 and rounded; the returned
    /// flag reports whether any value had to be clipped to `[0, 1]` first.
    pub fn to_u8(&self) -> (Image, bool) {
        match &self.data {
            PixelData::U8(_) => (self.clone(), false),
            PixelData::F32(values) => {
                let mut clipped = false;
                let data = values
                    .iter()
                    .map(|&v| {
                        let v = if v.is_nan() { 0.0 } else { v };
                        if !(0.0..=1.0).contains(&v) {
                            clipped = true;
                        }
                        (v.clamp(0.0, 1.0) * 255.0).round() as u8
                    })
                    .collect();
                (
                    Image {
                        shape: self.shape,
                        data: PixelData::U8(data),
                        meta: self.meta.clone(),
                    },
                    clipped,
                )
            }
        }
    }

    /// Convert to `f32` in `[0, 1]`.
    pub fn to_f32(&self) -> Image {
        match &self.data {
            PixelData::F32(_) => self.clone(),
            PixelData::U8(values) => Image {
                shape: self.shape,
                data: PixelData::F32(values.iter().map(|&v| f32::from(v) / 255.0).collect()),
                meta: self.meta.clone(),
            },
        }
    }

    /// Top-left `height × width` region as a new image.
    pub fn crop(&self, height: usize, width: usize) -> Result<Image> {
        if height > self.shape.height || width > self.shape.width {
            return Err(Error::InvalidArgument(format!(
                "crop {height}x{width} exceeds image {}",
                self.shape
            )));
        }
        let c = self.shape.channels;
        let row_len = self.shape.width * c;
        let take = width * c;
        let mut shape = self.shape;
        shape.height = height;
        shape.width = width;
        let data = match &self.data {
            PixelData::U8(v) => PixelData::U8(
                v.chunks_exact(row_len)
                    .take(height)
                    .flat_map(|row| row[..take].iter().copied())
                    .collect(),
            ),
            PixelData::F32(v) => PixelData::F32(
                v.chunks_exact(row_len)
                    .take(height)
                    .flat_map(|row| row[..take].iter().copied())
                    .collect(),
            ),
        };
        Ok(Image {
            shape,
            data,
            meta: self.meta.clone(),
        })
    }

    /// A single channel as a 2-D image.
    pub fn channel(&self, index: usize) -> Result<Image> {
        if index >= self.shape.channels {
            return Err(Error::InvalidArgument(format!(
                "channel {index} out of range for {} channel(s)",
                self.shape.channels
            )));
        }
        let c = self.shape.channels;
        let data = match &self.data {
            PixelData::U8(v) => PixelData::U8(v.iter().skip(index).step_by(c).copied().collect()),
            PixelData::F32(v) => {
                PixelData::F32(v.iter().skip(index).step_by(c).copied().collect())
            }
        };
        Ok(Image {
            shape: Shape::gray(self.shape.height, self.shape.width),
            data,
            meta: self.meta.clone(),
        })
    }

    /// Drop the metadata and give back the raw parts.
    pub fn into_parts(self) -> (Shape, PixelData, Meta) {
        (self.shape, self.data, self.meta)
    }
}
