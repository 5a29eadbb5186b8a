use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use animation::FrameImage;
use coordinator::RenderSurface;

/// Stand-in display that tallies what it was asked to paint.
#[derive(Debug, Default)]
pub struct CountingSurface {
    presented: AtomicU64,
    last_index: AtomicUsize,
}

impl CountingSurface {
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    pub fn last_index(&self) -> usize {
        self.last_index.load(Ordering::Relaxed)
    }
}

impl RenderSurface for CountingSurface {
    fn present(&self, frame: FrameImage) {
        self.presented.fetch_add(1, Ordering::Relaxed);
        self.last_index.store(frame.index(), Ordering::Relaxed);
    }
}
