//! Scan-line copy region

use crate::ImageError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Largest line index a region can name (31 bits per bound when packed)
pub const MAX_LINE: u32 = (1 << 31) - 1;

const LINE_MASK: u64 = MAX_LINE as u64;
const END_SHIFT: u32 = 31;
const Y_PLANE_ONLY: u64 = 1 << 62;
const PRESENT: u64 = 1 << 63;

/// Rows copied on each update, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRegion {
    pub begin_line: u32,
    pub end_line: u32,
    /// Skip chroma planes of subsampled formats
    pub y_plane_only: bool,
}

impl CopyRegion {
    /// Check `begin_line <= end_line <= height - 1`
    pub fn validate(&self, height: u32) -> Result<(), ImageError> {
        if self.begin_line > self.end_line || self.end_line >= height || self.end_line > MAX_LINE {
            return Err(ImageError::InvalidRegion {
                begin_line: self.begin_line,
                end_line: self.end_line,
                height,
            });
        }
        Ok(())
    }

    /// Chroma rows covering the luma rows of this region (4:2:0)
    pub(crate) fn chroma_lines(&self) -> std::ops::RangeInclusive<usize> {
        (self.begin_line as usize / 2)..=(self.end_line as usize / 2)
    }

    pub(crate) fn luma_lines(&self) -> std::ops::RangeInclusive<usize> {
        (self.begin_line as usize)..=(self.end_line as usize)
    }

    /// Bounds must already be validated against [`MAX_LINE`]
    fn pack(&self) -> u64 {
        let y_only = if self.y_plane_only { Y_PLANE_ONLY } else { 0 };
        PRESENT | y_only | (u64::from(self.end_line) << END_SHIFT) | u64::from(self.begin_line)
    }

    fn unpack(bits: u64) -> Option<Self> {
        if bits & PRESENT == 0 {
            return None;
        }
        Some(Self {
            begin_line: (bits & LINE_MASK) as u32,
            end_line: ((bits >> END_SHIFT) & LINE_MASK) as u32,
            y_plane_only: bits & Y_PLANE_ONLY != 0,
        })
    }
}

/// Shared region setting, written by the setup or consumer thread and read
/// by the producer at the start of every update.
///
/// The region lives in a single atomic word, so reading it on the callback
/// thread never waits on a lock.
#[derive(Debug, Clone)]
pub struct CopyRegionHandle {
    height: u32,
    region: Arc<AtomicU64>,
}

impl CopyRegionHandle {
    pub(crate) fn new(height: u32) -> Self {
        Self {
            height,
            region: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Restrict copies to rows `[begin_line, end_line]`.
    ///
    /// An invalid region is rejected and the previous setting kept.
    pub fn set(
        &self,
        begin_line: u32,
        end_line: u32,
        y_plane_only: bool,
    ) -> Result<(), ImageError> {
        let region = CopyRegion {
            begin_line,
            end_line,
            y_plane_only,
        };
        region.validate(self.height)?;
        self.region.store(region.pack(), Ordering::Release);
        Ok(())
    }

    /// Go back to copying whole frames
    pub fn clear(&self) {
        self.region.store(0, Ordering::Release);
    }

    /// Current region, `None` for whole frames
    pub fn get(&self) -> Option<CopyRegion> {
        CopyRegion::unpack(self.region.load(Ordering::Acquire))
    }
}
