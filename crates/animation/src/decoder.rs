use image::RgbaImage;

use crate::AnimationError;

/// Source of frame pixels for an [`AnimatedImage`](crate::AnimatedImage).
///
/// Implementations must be safe to call from any thread; frames are decoded
/// on the playback worker when no per-display cache is present.
pub trait FrameDecoder: Send + Sync {
    fn frame_count(&self) -> usize;

    fn decode(&self, index: usize) -> Result<RgbaImage, AnimationError>;
}

/// Fully composited frames kept in memory, copied out on each decode.
#[derive(Debug, Clone, Default)]
pub struct PackedFrames {
    frames: Vec<RgbaImage>,
}

impl PackedFrames {
    pub fn new(frames: Vec<RgbaImage>) -> Self {
        Self { frames }
    }

    pub fn dimensions(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.frames.iter().map(RgbaImage::dimensions)
    }
}

impl FrameDecoder for PackedFrames {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn decode(&self, index: usize) -> Result<RgbaImage, AnimationError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(AnimationError::FrameOutOfRange {
                index,
                count: self.frames.len(),
            })
    }
}
