//! Pixel formats and plane layout

use serde::{Deserialize, Serialize};
use triple_buffer::BufferError;

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// YCrCb 4:2:0 semi-planar: Y plane, then interleaved V/U
    Nv21,
    /// YCbCr 4:2:0 semi-planar: Y plane, then interleaved U/V
    Nv12,
    /// YCrCb 4:2:0 planar: Y plane, V plane, U plane
    Yv12,
    /// Packed 8-bit RGBA
    Rgba8888,
}

impl PixelFormat {
    /// Whether chroma is stored at half resolution in separate planes
    pub fn is_chroma_subsampled(self) -> bool {
        !matches!(self, PixelFormat::Rgba8888)
    }

    /// Bytes per pixel in the first (luma or packed) plane
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            _ => 1,
        }
    }

    fn chroma_plane_count(self) -> usize {
        match self {
            PixelFormat::Nv21 | PixelFormat::Nv12 => 1,
            PixelFormat::Yv12 => 2,
            PixelFormat::Rgba8888 => 0,
        }
    }
}

/// Location of one plane inside an image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    /// Byte offset of the first row
    pub offset: usize,
    /// Bytes between row starts
    pub stride: usize,
    /// Meaningful bytes per row
    pub row_bytes: usize,
    pub rows: usize,
}

impl Plane {
    /// Byte range of `row` within the buffer
    pub fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        let start = self.offset + row * self.stride;
        start..start + self.row_bytes
    }

    /// Bytes spanned by the plane, padding included
    pub fn size(&self) -> usize {
        self.stride * self.rows
    }
}

/// Image geometry fixed at manager creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFormat {
    pub width: u32,
    pub height: u32,
    /// Bytes between luma (or packed) row starts
    pub stride: u32,
    pub format: PixelFormat,
}

impl ImageFormat {
    /// Create and validate an image format
    pub fn new(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> Result<Self, BufferError> {
        let image_format = Self {
            width,
            height,
            stride,
            format,
        };
        image_format.validate()?;
        Ok(image_format)
    }

    /// Image format without row padding
    pub fn packed(width: u32, height: u32, format: PixelFormat) -> Result<Self, BufferError> {
        let stride = width as usize * format.bytes_per_pixel();
        let stride = u32::try_from(stride)
            .map_err(|_| BufferError::invalid(format!("stride overflow for width {}", width)))?;
        Self::new(width, height, stride, format)
    }

    pub fn validate(&self) -> Result<(), BufferError> {
        if self.width == 0 || self.height == 0 {
            return Err(BufferError::invalid(format!(
                "image dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        if (self.stride as usize) < row_bytes {
            return Err(BufferError::invalid(format!(
                "stride {} is smaller than a {} byte row",
                self.stride, row_bytes
            )));
        }
        Ok(())
    }

    /// Same geometry and pixel format, ignoring stride
    pub fn same_shape(&self, other: &ImageFormat) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// Luma plane, or the only plane for packed formats
    pub fn luma_plane(&self) -> Plane {
        Plane {
            offset: 0,
            stride: self.stride as usize,
            row_bytes: self.width as usize * self.format.bytes_per_pixel(),
            rows: self.height as usize,
        }
    }

    /// Number of chroma planes (0 for packed formats)
    pub fn chroma_plane_count(&self) -> usize {
        self.format.chroma_plane_count()
    }

    /// Chroma plane `index`, following the luma plane in memory
    pub fn chroma_plane(&self, index: usize) -> Option<Plane> {
        if index >= self.chroma_plane_count() {
            return None;
        }
        let half_width = (self.width as usize).div_ceil(2);
        let rows = (self.height as usize).div_ceil(2);
        let (stride, row_bytes) = match self.format {
            // Interleaved chroma pairs share the luma stride
            PixelFormat::Nv21 | PixelFormat::Nv12 => (self.stride as usize, half_width * 2),
            _ => ((self.stride as usize).div_ceil(2), half_width),
        };
        let offset = self.luma_plane().size() + index * stride * rows;
        Some(Plane {
            offset,
            stride,
            row_bytes,
            rows,
        })
    }

    /// Total bytes of one image in this format
    pub fn buffer_size(&self) -> usize {
        let chroma: usize = (0..self.chroma_plane_count())
            .filter_map(|i| self.chroma_plane(i))
            .map(|plane| plane.size())
            .sum();
        self.luma_plane().size() + chroma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv21_layout() {
        let format = ImageFormat::packed(640, 480, PixelFormat::Nv21).unwrap();
        assert_eq!(format.luma_plane().size(), 640 * 480);
        let chroma = format.chroma_plane(0).unwrap();
        assert_eq!(chroma.offset, 640 * 480);
        assert_eq!(chroma.rows, 240);
        assert_eq!(chroma.row_bytes, 640);
        assert!(format.chroma_plane(1).is_none());
        assert_eq!(format.buffer_size(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_yv12_layout_with_stride() {
        let format = ImageFormat::new(100, 10, 128, PixelFormat::Yv12).unwrap();
        let v = format.chroma_plane(0).unwrap();
        let u = format.chroma_plane(1).unwrap();
        assert_eq!(v.offset, 1280);
        assert_eq!(v.stride, 64);
        assert_eq!(v.row_bytes, 50);
        assert_eq!(u.offset, 1280 + 64 * 5);
        assert_eq!(format.buffer_size(), 1280 + 2 * 64 * 5);
    }

    #[test]
    fn test_rgba_is_single_plane() {
        let format = ImageFormat::packed(4, 2, PixelFormat::Rgba8888).unwrap();
        assert_eq!(format.stride, 16);
        assert_eq!(format.chroma_plane_count(), 0);
        assert_eq!(format.buffer_size(), 32);
        assert!(!PixelFormat::Rgba8888.is_chroma_subsampled());
    }

    #[test]
    fn test_invalid_formats() {
        assert!(ImageFormat::new(0, 480, 640, PixelFormat::Nv21).is_err());
        assert!(ImageFormat::new(640, 480, 600, PixelFormat::Nv21).is_err());
        assert!(ImageFormat::new(640, 480, 640, PixelFormat::Rgba8888).is_err());
    }
}
