// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A simple interleaved-channel pixmap type.

use crate::Error;

/// A pixel buffer of interleaved 8-bit channels.
///
/// Pixels are stored in row-major order with `channels` bytes per pixel
/// (1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA) and `stride` bytes per
/// row, where `stride >= width * channels`.
#[derive(Debug, Clone)]
pub struct Pixmap {
    /// Width of the pixmap in pixels.
    width: u16,
    /// Height of the pixmap in pixels.
    height: u16,
    /// Number of interleaved channels per pixel.
    channels: u8,
    /// Bytes per row.
    stride: usize,
    buf: Vec<u8>,
}

impl Pixmap {
    /// Create a new packed pixmap with the given size in pixels.
    ///
    /// All bytes are initialized to zero.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or greater than 4.
    pub fn new(width: u16, height: u16, channels: u8) -> Self {
        assert!(
            (1..=4).contains(&channels),
            "channel count must be between 1 and 4"
        );
        let stride = usize::from(width) * usize::from(channels);
        let buf = vec![0; stride * usize::from(height)];
        Self {
            width,
            height,
            channels,
            stride,
            buf,
        }
    }

    /// Create a new packed pixmap, allocating the buffer fallibly.
    pub(crate) fn try_new(width: u16, height: u16, channels: u8) -> Result<Self, Error> {
        let stride = usize::from(width) * usize::from(channels);
        let len = stride * usize::from(height);
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, 0);
        Ok(Self {
            width,
            height,
            channels,
            stride,
            buf,
        })
    }

    /// Create a pixmap from packed pixel data.
    ///
    /// The pixels are in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not of length `width * height * channels` exactly,
    /// or if `channels` is 0 or greater than 4.
    pub fn from_vec(data: Vec<u8>, width: u16, height: u16, channels: u8) -> Self {
        assert!(
            (1..=4).contains(&channels),
            "channel count must be between 1 and 4"
        );
        let stride = usize::from(width) * usize::from(channels);
        assert_eq!(
            data.len(),
            stride * usize::from(height),
            "expected `data` to have length of exactly `width * height * channels`"
        );
        Self {
            width,
            height,
            channels,
            stride,
            buf: data,
        }
    }

    /// Return the width of the pixmap.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Return the height of the pixmap.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Return the number of interleaved channels per pixel.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Return the number of bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether rows are stored without padding between them.
    pub(crate) fn is_packed(&self) -> bool {
        self.stride == usize::from(self.width) * usize::from(self.channels)
    }

    /// Returns a reference to the underlying bytes.
    ///
    /// The pixels are in row-major order.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Returns a mutable reference to the underlying bytes.
    ///
    /// The pixels are in row-major order.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Returns the pixels of one row, without any trailing stride padding.
    #[inline(always)]
    pub fn row(&self, y: u16) -> &[u8] {
        let start = usize::from(y) * self.stride;
        let row_bytes = usize::from(self.width) * usize::from(self.channels);
        &self.buf[start..start + row_bytes]
    }

    /// Returns the pixels of one row mutably, without any trailing stride
    /// padding.
    #[inline(always)]
    pub fn row_mut(&mut self, y: u16) -> &mut [u8] {
        let start = usize::from(y) * self.stride;
        let row_bytes = usize::from(self.width) * usize::from(self.channels);
        &mut self.buf[start..start + row_bytes]
    }

    /// A view of the buffer as packed 32-bit pixels.
    ///
    /// Only available for packed 4-channel pixmaps.
    pub fn pixels_u32(&self) -> Option<&[u32]> {
        if self.channels != 4 || !self.is_packed() {
            return None;
        }
        bytemuck::try_cast_slice(&self.buf).ok()
    }

    /// A mutable view of the buffer as packed 32-bit pixels.
    ///
    /// Only available for packed 4-channel pixmaps.
    pub fn pixels_u32_mut(&mut self) -> Option<&mut [u32]> {
        if self.channels != 4 || !self.is_packed() {
            return None;
        }
        bytemuck::try_cast_slice_mut(&mut self.buf).ok()
    }

    /// Consume the pixmap, returning the underlying bytes.
    pub fn take(self) -> Vec<u8> {
        self.buf
    }

    /// Create a pixmap from a PNG file.
    ///
    /// The channel count follows the decoded color type: gray, gray + alpha,
    /// RGB or RGBA. Indexed and low-bit-depth images are expanded to 8 bits
    /// per channel.
    #[cfg(feature = "png")]
    pub fn from_png(data: impl std::io::Read) -> Result<Self, png::DecodingError> {
        let mut decoder = png::Decoder::new(data);
        decoder.set_transformations(png::Transformations::normalize_to_color8());

        let mut reader = decoder.read_info()?;
        let (width, height) = {
            let info = reader.info();
            let width: u16 = info
                .width
                .try_into()
                .map_err(|_| png::DecodingError::LimitsExceeded)?;
            let height: u16 = info
                .height
                .try_into()
                .map_err(|_| png::DecodingError::LimitsExceeded)?;
            (width, height)
        };

        // `output_color_type` takes the transformations into account.
        let (color_type, bit_depth) = reader.output_color_type();
        debug_assert_eq!(
            bit_depth,
            png::BitDepth::Eight,
            "normalize_to_color8 means the bit depth is always 8."
        );
        let channels = match color_type {
            png::ColorType::Grayscale => 1,
            png::ColorType::GrayscaleAlpha => 2,
            png::ColorType::Rgb => 3,
            png::ColorType::Rgba => 4,
            png::ColorType::Indexed => {
                unreachable!("transformation should have expanded indexed images")
            }
        };

        let mut pixmap = Self::new(width, height, channels);
        debug_assert_eq!(
            pixmap.data().len(),
            reader.output_buffer_size(),
            "the pixmap buffer should have the same number of bytes as the image"
        );
        reader.next_frame(pixmap.data_mut())?;

        Ok(pixmap)
    }

    /// Return the current content of the pixmap as a PNG.
    #[cfg(feature = "png")]
    pub fn into_png(self) -> Result<Vec<u8>, png::EncodingError> {
        let color_type = match self.channels {
            1 => png::ColorType::Grayscale,
            2 => png::ColorType::GrayscaleAlpha,
            3 => png::ColorType::Rgb,
            _ => png::ColorType::Rgba,
        };

        let mut data = Vec::new();
        let mut encoder = png::Encoder::new(&mut data, u32::from(self.width), u32::from(self.height));
        encoder.set_color(color_type);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        if self.is_packed() {
            writer.write_image_data(&self.buf)?;
        } else {
            let row_bytes = usize::from(self.width) * usize::from(self.channels);
            let mut packed = Vec::with_capacity(row_bytes * usize::from(self.height));
            for y in 0..self.height {
                packed.extend_from_slice(self.row(y));
            }
            writer.write_image_data(&packed)?;
        }
        writer.finish().map(|_| data)
    }
}
