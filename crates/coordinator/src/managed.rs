use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use animation::{AnimatedImage, AnimationError, FrameImage, LoopCount};

use crate::binding::{cache_eligible, Binding, BindingId, RenderSurface};

/// The stock [`Binding`]: one surface showing one shared animation.
pub struct ManagedBinding {
    id: BindingId,
    animation: Arc<AnimatedImage>,
    surface: Arc<dyn RenderSurface>,
    loop_count: LoopCount,
    state: Mutex<PlaybackState>,
}

struct PlaybackState {
    index: usize,
    elapsed: Duration,
    passes_completed: u32,
    displaying: bool,
    paused: bool,
    finished: bool,
    current: FrameImage,
    cache: Option<Vec<FrameImage>>,
}

impl ManagedBinding {
    /// Decodes the first frame up front so there is always something to present.
    pub fn new(
        animation: Arc<AnimatedImage>,
        surface: Arc<dyn RenderSurface>,
    ) -> Result<Self, AnimationError> {
        let current = animation.decode_frame(0)?;
        let loop_count = animation.loop_count();
        Ok(Self {
            id: BindingId::next(),
            animation,
            surface,
            loop_count,
            state: Mutex::new(PlaybackState {
                index: 0,
                elapsed: Duration::ZERO,
                passes_completed: 0,
                displaying: true,
                paused: false,
                finished: false,
                current,
                cache: None,
            }),
        })
    }

    /// Overrides the loop budget encoded in the animation.
    pub fn with_loop_count(mut self, loop_count: LoopCount) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn animation(&self) -> &Arc<AnimatedImage> {
        &self.animation
    }

    pub fn set_displaying(&self, displaying: bool) {
        self.lock().displaying = displaying;
    }

    pub fn pause(&self) {
        self.lock().paused = true;
    }

    pub fn resume(&self) {
        self.lock().paused = false;
    }

    /// Rewinds to the first frame and resets the loop budget.
    pub fn restart(&self) -> Result<(), AnimationError> {
        let mut state = self.lock();
        let first = frame_at(&self.animation, &state, 0)?;
        state.index = 0;
        state.elapsed = Duration::ZERO;
        state.passes_completed = 0;
        state.finished = false;
        state.current = first;
        Ok(())
    }

    pub fn current_index(&self) -> usize {
        self.lock().index
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn has_frame_cache(&self) -> bool {
        self.lock().cache.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn frame_at(
    animation: &AnimatedImage,
    state: &PlaybackState,
    index: usize,
) -> Result<FrameImage, AnimationError> {
    match state.cache.as_ref().and_then(|cache| cache.get(index)) {
        Some(frame) => Ok(frame.clone()),
        None => animation.decode_frame(index),
    }
}

impl Binding for ManagedBinding {
    fn id(&self) -> BindingId {
        self.id
    }

    fn byte_size(&self) -> u64 {
        self.animation.byte_size()
    }

    fn is_displaying(&self) -> bool {
        self.lock().displaying
    }

    fn is_animating(&self) -> bool {
        let state = self.lock();
        self.animation.is_animated() && !state.paused && !state.finished
    }

    fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    fn current_frame(&self) -> FrameImage {
        self.lock().current.clone()
    }

    fn surface(&self) -> Arc<dyn RenderSurface> {
        Arc::clone(&self.surface)
    }

    fn advance_frame(&self, elapsed: Duration) {
        let mut state = self.lock();
        if !self.animation.is_animated() || state.paused || state.finished {
            return;
        }

        state.elapsed += elapsed;
        let cycle = self.animation.total_duration();
        if self.loop_count.is_infinite() && state.elapsed > cycle && !cycle.is_zero() {
            let remainder = state.elapsed.as_nanos() % cycle.as_nanos();
            state.elapsed = Duration::from_nanos(remainder as u64);
        }

        let start = state.index;
        let last = self.animation.frame_count() - 1;
        loop {
            let duration = self.animation.frame_duration(state.index);
            if state.elapsed <= duration {
                break;
            }
            state.elapsed -= duration;
            if state.index < last {
                state.index += 1;
                continue;
            }

            state.passes_completed = state.passes_completed.saturating_add(1);
            match self.loop_count.passes() {
                Some(budget) if state.passes_completed >= budget => {
                    state.finished = true;
                    state.elapsed = Duration::ZERO;
                    tracing::debug!(binding = %self.id, passes = budget, "loop budget exhausted");
                    break;
                }
                _ => state.index = 0,
            }
        }

        if state.index != start {
            match frame_at(&self.animation, &state, state.index) {
                Ok(frame) => state.current = frame,
                Err(err) => {
                    tracing::warn!(binding = %self.id, index = state.index, %err, "failed to decode frame");
                }
            }
        }
    }

    fn evict_cache(&self) {
        if self.lock().cache.take().is_some() {
            tracing::debug!(binding = %self.id, "evicted frame cache");
        }
    }

    fn rebuild_cache(&self) {
        let mut state = self.lock();
        if !cache_eligible(state.displaying, self.loop_count) {
            state.cache = None;
            return;
        }
        if state.cache.is_some() {
            return;
        }

        let frames: Result<Vec<_>, _> = (0..self.animation.frame_count())
            .map(|index| self.animation.decode_frame(index))
            .collect();
        match frames {
            Ok(frames) => {
                tracing::debug!(
                    binding = %self.id,
                    frames = frames.len(),
                    bytes = self.animation.byte_size(),
                    "rebuilt frame cache"
                );
                state.cache = Some(frames);
            }
            Err(err) => {
                tracing::warn!(binding = %self.id, %err, "frame cache rebuild failed; decoding on demand");
            }
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.cache = None;
        state.displaying = false;
    }
}

impl fmt::Debug for ManagedBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedBinding")
            .field("id", &self.id)
            .field("animation", &self.animation)
            .field("loop_count", &self.loop_count)
            .finish()
    }
}
