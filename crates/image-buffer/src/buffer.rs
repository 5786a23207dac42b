//! Image buffer sample types

use crate::{CopyRegion, ImageError, ImageFormat, PixelFormat, Plane};
use image::{DynamicImage, GrayImage, RgbaImage};
use triple_buffer::{try_with_capacity, BufferError, Sample};

/// Borrowed view of one color camera callback payload
#[derive(Debug, Clone, Copy)]
pub struct ImageFrame<'a> {
    /// Layout of `data`; the stride may differ from the manager's
    pub format: ImageFormat,
    /// Capture timestamp (seconds)
    pub timestamp: f64,
    pub frame_number: u64,
    pub data: &'a [u8],
}

impl<'a> ImageFrame<'a> {
    pub fn new(format: ImageFormat, timestamp: f64, frame_number: u64, data: &'a [u8]) -> Self {
        Self {
            format,
            timestamp,
            frame_number,
            data,
        }
    }
}

/// Pre-allocated image slot
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    format: ImageFormat,
    timestamp: f64,
    frame_number: u64,
    data: Vec<u8>,
}

fn copy_row(dst: &mut [u8], dst_plane: &Plane, src: &[u8], src_plane: &Plane, row: usize) {
    dst[dst_plane.row_range(row)].copy_from_slice(&src[src_plane.row_range(row)]);
}

impl ImageBuffer {
    /// Allocate a zeroed image in `format`
    pub fn allocate(format: ImageFormat) -> Result<Self, BufferError> {
        format.validate()?;
        let size = format.buffer_size();
        let mut data = try_with_capacity(size)?;
        data.resize(size, 0);
        Ok(Self {
            format,
            timestamp: 0.0,
            frame_number: 0,
            data,
        })
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    pub fn width(&self) -> u32 {
        self.format.width
    }

    pub fn height(&self) -> u32 {
        self.format.height
    }

    pub fn stride(&self) -> u32 {
        self.format.stride
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format.format
    }

    /// Capture timestamp (seconds), 0 before the first update
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Whole buffer, all planes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luma plane (or the packed plane for RGBA)
    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.format.luma_plane().size()]
    }

    /// Everything after the luma plane
    pub fn chroma_planes(&self) -> &[u8] {
        &self.data[self.format.luma_plane().size()..]
    }

    /// Meaningful bytes of luma row `line`
    pub fn row(&self, line: u32) -> Option<&[u8]> {
        let plane = self.format.luma_plane();
        if line as usize >= plane.rows {
            return None;
        }
        Some(&self.data[plane.row_range(line as usize)])
    }

    /// Grayscale copy for detectors that only need intensity
    pub fn to_luma_image(&self) -> Option<GrayImage> {
        let plane = self.format.luma_plane();
        let mut packed = Vec::with_capacity(plane.row_bytes * plane.rows);
        for row in 0..plane.rows {
            packed.extend_from_slice(&self.data[plane.row_range(row)]);
        }

        match self.format.format {
            PixelFormat::Rgba8888 => {
                let rgba = RgbaImage::from_raw(self.format.width, self.format.height, packed)?;
                Some(DynamicImage::ImageRgba8(rgba).to_luma8())
            }
            _ => GrayImage::from_raw(self.format.width, self.format.height, packed),
        }
    }

    /// Copy `frame` into this slot, restricted to `region` when given.
    ///
    /// Rows outside the region keep their previous contents. Timestamp and
    /// frame number are always taken from `frame`.
    pub(crate) fn fill(
        &mut self,
        frame: &ImageFrame<'_>,
        region: Option<CopyRegion>,
    ) -> Result<(), ImageError> {
        let src = &frame.format;
        if !self.format.same_shape(src) {
            return Err(ImageError::FormatMismatch {
                expected: self.format,
                actual: *src,
            });
        }
        src.validate()?;
        if frame.data.len() < src.buffer_size() {
            return Err(ImageError::ShortFrame {
                expected: src.buffer_size(),
                actual: frame.data.len(),
            });
        }

        let dst_luma = self.format.luma_plane();
        let src_luma = src.luma_plane();
        let luma_lines = region.map_or(0..=dst_luma.rows - 1, |r| r.luma_lines());
        for row in luma_lines {
            copy_row(&mut self.data, &dst_luma, frame.data, &src_luma, row);
        }

        let copy_chroma = region.map_or(true, |r| !r.y_plane_only);
        if copy_chroma {
            for index in 0..self.format.chroma_plane_count() {
                if let (Some(dst_plane), Some(src_plane)) =
                    (self.format.chroma_plane(index), src.chroma_plane(index))
                {
                    let lines = region.map_or(0..=dst_plane.rows - 1, |r| r.chroma_lines());
                    for row in lines {
                        copy_row(&mut self.data, &dst_plane, frame.data, &src_plane, row);
                    }
                }
            }
        }

        self.timestamp = frame.timestamp;
        self.frame_number = frame.frame_number;
        Ok(())
    }
}

impl Sample for ImageBuffer {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn copy_from(&mut self, source: &Self) -> Result<(), BufferError> {
        if source.format != self.format {
            return Err(BufferError::invalid(format!(
                "image format {:?} does not match {:?}",
                source.format, self.format
            )));
        }
        self.data.copy_from_slice(&source.data);
        self.timestamp = source.timestamp;
        self.frame_number = source.frame_number;
        Ok(())
    }
}
