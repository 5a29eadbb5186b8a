use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use animation::{FrameImage, LoopCount};

/// Stable identity of a registered binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BindingId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        BindingId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

/// Where a binding's current frame ends up. Called on the UI-owning context only.
pub trait RenderSurface: Send + Sync {
    fn present(&self, frame: FrameImage);
}

/// One display paired with one animation, as seen by the coordinator.
///
/// Mutating methods take `&self`; implementations keep their playback state
/// behind interior mutability. The coordinator only ever calls
/// [`advance_frame`](Binding::advance_frame), [`evict_cache`](Binding::evict_cache),
/// [`rebuild_cache`](Binding::rebuild_cache) and [`release`](Binding::release)
/// from its serial context, and implementations must not call back into the
/// manager from those methods.
pub trait Binding: Send + Sync {
    fn id(&self) -> BindingId;

    /// Decoded size of the bound animation in bytes.
    fn byte_size(&self) -> u64;

    fn is_displaying(&self) -> bool;

    /// More than one frame, not paused, loop budget not exhausted.
    fn is_animating(&self) -> bool;

    fn loop_count(&self) -> LoopCount;

    fn current_frame(&self) -> FrameImage;

    fn surface(&self) -> Arc<dyn RenderSurface>;

    fn advance_frame(&self, elapsed: Duration);

    fn evict_cache(&self);

    fn rebuild_cache(&self);

    fn release(&self);
}

pub type SharedBinding = Arc<dyn Binding>;

/// Per-binding half of the cache policy; the manager adds the global flag.
pub fn cache_eligible(displaying: bool, loop_count: LoopCount) -> bool {
    displaying && loop_count.is_cache_eligible()
}
