//! Triple-buffered image buffer manager

use crate::{CopyRegion, CopyRegionHandle, ImageBuffer, ImageError, ImageFormat, ImageFrame};
use tracing::info;
use triple_buffer::{BufferManager, BufferStats, Consumer, Producer};

/// Producer half, driven by the color camera callback thread
pub struct ImageBufferProducer {
    inner: Producer<ImageBuffer>,
    region: CopyRegionHandle,
    format: ImageFormat,
}

impl ImageBufferProducer {
    /// Copy `frame` (or the configured row region of it) into the back
    /// buffer and publish it.
    ///
    /// A frame without data, with a non-finite timestamp, or not newer than
    /// the last published image is skipped with `Ok(false)` before anything
    /// is copied.
    pub fn update(&mut self, frame: &ImageFrame<'_>) -> Result<bool, ImageError> {
        if frame.data.is_empty() || !self.inner.accepts(frame.timestamp) {
            return Ok(false);
        }
        let region = self.region.get();
        self.inner
            .update_with(|back| back.fill(frame, region).map(|_| true))
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    /// Handle for changing the copy region from another thread
    pub fn copy_region(&self) -> CopyRegionHandle {
        self.region.clone()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.stats()
    }
}

/// Consumer half, polled by the render or detection loop
pub struct ImageBufferConsumer {
    inner: Consumer<ImageBuffer>,
    region: CopyRegionHandle,
}

impl ImageBufferConsumer {
    /// Latest published image and whether it is new since the last poll.
    ///
    /// Before the first update the image is zeroed with timestamp 0.
    pub fn get_latest(&mut self) -> (&ImageBuffer, bool) {
        self.inner.get_latest()
    }

    /// See [`CopyRegionHandle::set`]
    pub fn set_copy_region(
        &self,
        begin_line: u32,
        end_line: u32,
        y_plane_only: bool,
    ) -> Result<(), ImageError> {
        self.region.set(begin_line, end_line, y_plane_only)
    }

    pub fn clear_copy_region(&self) {
        self.region.clear()
    }

    pub fn copy_region(&self) -> Option<CopyRegion> {
        self.region.get()
    }

    pub fn has_new_data(&self) -> bool {
        self.inner.has_new_data()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.stats()
    }
}

/// Image buffer manager holding both halves
pub struct ImageBufferManager {
    producer: ImageBufferProducer,
    consumer: ImageBufferConsumer,
}

impl ImageBufferManager {
    /// Allocate three images in `format`
    pub fn new(format: ImageFormat) -> Result<Self, ImageError> {
        format.validate()?;
        let (producer, consumer) =
            BufferManager::new(format.buffer_size(), |_| ImageBuffer::allocate(format))?.split();
        let region = CopyRegionHandle::new(format.height);

        info!(
            "Created image buffer manager: {}x{} stride={} {:?}",
            format.width, format.height, format.stride, format.format
        );

        Ok(Self {
            producer: ImageBufferProducer {
                inner: producer,
                region: region.clone(),
                format,
            },
            consumer: ImageBufferConsumer {
                inner: consumer,
                region,
            },
        })
    }

    /// Separate the callback-side and render-side halves
    pub fn split(self) -> (ImageBufferProducer, ImageBufferConsumer) {
        (self.producer, self.consumer)
    }

    /// See [`ImageBufferProducer::update`]
    pub fn update(&mut self, frame: &ImageFrame<'_>) -> Result<bool, ImageError> {
        self.producer.update(frame)
    }

    /// See [`ImageBufferConsumer::get_latest`]
    pub fn get_latest(&mut self) -> (&ImageBuffer, bool) {
        self.consumer.get_latest()
    }

    /// Restrict subsequent updates to rows `[begin_line, end_line]`
    pub fn set_copy_region(
        &self,
        begin_line: u32,
        end_line: u32,
        y_plane_only: bool,
    ) -> Result<(), ImageError> {
        self.consumer.set_copy_region(begin_line, end_line, y_plane_only)
    }

    pub fn clear_copy_region(&self) {
        self.consumer.clear_copy_region()
    }

    pub fn format(&self) -> &ImageFormat {
        self.producer.format()
    }

    pub fn stats(&self) -> BufferStats {
        self.producer.stats()
    }
}
