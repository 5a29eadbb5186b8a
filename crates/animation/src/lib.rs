//! Decoded animation data shared by every display that shows it.
//!
//! An [`AnimatedImage`] is immutable once built: an ordered list of frame
//! descriptors, a loop budget, and a [`FrameDecoder`] that materialises frame
//! pixels on demand. Callers wrap it in an `Arc` when the same source is shown
//! on more than one display.

mod decoder;
mod gif;

pub use decoder::{FrameDecoder, PackedFrames};
pub use gif::{load_gif_bytes, load_gif_path, netscape_loop_count};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

/// Delays shorter than this are treated as "unspecified" by the GIF format in practice.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

/// Replacement delay for frames whose encoded delay falls under [`MIN_FRAME_DELAY`].
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Loop counts at or above this justify a persistent frame cache.
pub const CACHE_ELIGIBLE_LOOPS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("failed to read animation from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode animation: {0}")]
    Decode(#[from] image::ImageError),
    #[error("animation contains no frames")]
    Empty,
    #[error("decoder provides {decoded} frames but {described} were described")]
    FrameCountMismatch { described: usize, decoded: usize },
    #[error("frame {index} out of range (animation has {count} frames)")]
    FrameOutOfRange { index: usize, count: usize },
    #[error("invalid loop count {0}; expected -1 (infinite) or a non-negative value")]
    InvalidLoopCount(i64),
}

/// How many times an animation plays before it stops on its last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopCount {
    /// Wrap around forever.
    Infinite,
    /// Repeat this many times after the first pass; `0` plays once.
    Finite(u32),
}

impl LoopCount {
    /// Converts the signed convention used by configuration files (`-1` = infinite).
    pub fn from_raw(raw: i64) -> Result<Self, AnimationError> {
        match raw {
            -1 => Ok(Self::Infinite),
            n if n >= 0 => Ok(Self::Finite(u32::try_from(n).unwrap_or(u32::MAX))),
            other => Err(AnimationError::InvalidLoopCount(other)),
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            Self::Infinite => -1,
            Self::Finite(n) => i64::from(n),
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Self::Infinite)
    }

    /// Number of full passes before playback stops, `None` when unbounded.
    pub fn passes(self) -> Option<u32> {
        match self {
            Self::Infinite => None,
            Self::Finite(n) => Some(n.saturating_add(1)),
        }
    }

    /// Short or finite animations are not worth keeping decoded in memory.
    pub fn is_cache_eligible(self) -> bool {
        match self {
            Self::Infinite => true,
            Self::Finite(n) => n >= CACHE_ELIGIBLE_LOOPS,
        }
    }
}

impl Default for LoopCount {
    fn default() -> Self {
        Self::Infinite
    }
}

impl fmt::Display for LoopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => f.write_str("infinite"),
            Self::Finite(n) => write!(f, "{n}"),
        }
    }
}

/// Geometry and timing of one frame, known without decoding its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
}

impl FrameInfo {
    pub fn new(width: u32, height: u32, duration: Duration) -> Self {
        Self {
            width,
            height,
            duration: normalize_delay(duration),
        }
    }

    /// Bytes the frame occupies once decoded to RGBA8.
    pub fn decoded_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4
    }
}

pub fn normalize_delay(delay: Duration) -> Duration {
    if delay < MIN_FRAME_DELAY {
        DEFAULT_FRAME_DELAY
    } else {
        delay
    }
}

/// A decoded frame ready to hand to a rendering surface.
///
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct FrameImage {
    index: usize,
    pixels: Arc<RgbaImage>,
}

impl FrameImage {
    pub fn new(index: usize, pixels: RgbaImage) -> Self {
        Self {
            index,
            pixels: Arc::new(pixels),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

pub struct AnimatedImage {
    frames: Vec<FrameInfo>,
    decoder: Arc<dyn FrameDecoder>,
    loop_count: LoopCount,
    byte_size: u64,
}

impl AnimatedImage {
    pub fn new(
        frames: Vec<FrameInfo>,
        decoder: Arc<dyn FrameDecoder>,
        loop_count: LoopCount,
    ) -> Result<Self, AnimationError> {
        if frames.is_empty() {
            return Err(AnimationError::Empty);
        }
        let decoded = decoder.frame_count();
        if decoded != frames.len() {
            return Err(AnimationError::FrameCountMismatch {
                described: frames.len(),
                decoded,
            });
        }
        let byte_size = frames.iter().map(FrameInfo::decoded_size).sum();
        Ok(Self {
            frames,
            decoder,
            loop_count,
            byte_size,
        })
    }

    /// Builds an animation whose frames are already held in memory.
    pub fn from_packed(
        packed: PackedFrames,
        durations: &[Duration],
        loop_count: LoopCount,
    ) -> Result<Self, AnimationError> {
        let frames = packed
            .dimensions()
            .zip(durations.iter().copied().chain(std::iter::repeat(DEFAULT_FRAME_DELAY)))
            .map(|((width, height), duration)| FrameInfo::new(width, height, duration))
            .collect();
        Self::new(frames, Arc::new(packed), loop_count)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn frame_duration(&self, index: usize) -> Duration {
        self.frames
            .get(index)
            .map(|frame| frame.duration)
            .unwrap_or(DEFAULT_FRAME_DELAY)
    }

    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|frame| frame.duration).sum()
    }

    pub fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    /// Memory a full decoded-frame cache of this animation would need.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn decode_frame(&self, index: usize) -> Result<FrameImage, AnimationError> {
        if index >= self.frames.len() {
            return Err(AnimationError::FrameOutOfRange {
                index,
                count: self.frames.len(),
            });
        }
        let pixels = self.decoder.decode(index)?;
        Ok(FrameImage::new(index, pixels))
    }
}

impl fmt::Debug for AnimatedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedImage")
            .field("frames", &self.frames.len())
            .field("loop_count", &self.loop_count)
            .field("byte_size", &self.byte_size)
            .finish()
    }
}
