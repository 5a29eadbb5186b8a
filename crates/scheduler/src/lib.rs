mod main_context;
mod tick;

pub use main_context::{main_context, MainContext, MainQueue};
pub use tick::{IntervalTicker, ManualTicker, TickSource};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use coordinator::{BindingId, CacheManager};

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub published: usize,
    pub advanced: usize,
    pub failed: usize,
}

/// Publishes and advances every registered binding once per tick.
///
/// Publishing goes to the [`MainContext`] and never blocks. Advancing goes to
/// the manager's serial context and blocks until that binding is done, so
/// bindings advance strictly one after another in registration order.
///
/// Each binding is advanced by the time since the previous tick that visited
/// it. A binding's first tick advances it by zero, and paused bindings are
/// still visited so resuming does not jump ahead.
pub struct FrameScheduler<'m> {
    manager: &'m CacheManager,
    main: MainContext,
    last_seen: Mutex<HashMap<BindingId, Instant>>,
}

impl<'m> FrameScheduler<'m> {
    pub fn new(manager: &'m CacheManager, main: MainContext) -> Self {
        Self {
            manager,
            main,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn tick(&self, now: Instant) -> TickReport {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashMap::with_capacity(last_seen.len());
        let mut report = TickReport::default();

        self.manager.for_each_binding(|binding| {
            let id = binding.id();
            let elapsed = last_seen
                .get(&id)
                .map(|previous| now.saturating_duration_since(*previous))
                .unwrap_or(Duration::ZERO);
            seen.insert(id, now);

            let frame = binding.current_frame();
            let surface = binding.surface();
            if self.main.post(move || surface.present(frame)) {
                report.published += 1;
            }

            if binding.is_animating() {
                let target = Arc::clone(binding);
                match self
                    .manager
                    .run_serial(move || target.advance_frame(elapsed))
                {
                    Ok(()) => report.advanced += 1,
                    Err(err) => {
                        report.failed += 1;
                        tracing::warn!(binding = %id, %err, "frame advance failed");
                    }
                }
            }
        });
        *last_seen = seen;

        tracing::trace!(
            published = report.published,
            advanced = report.advanced,
            failed = report.failed,
            "tick"
        );
        report
    }

    /// Ticks until `source` runs dry, draining `main_queue` after each tick.
    /// Returns the number of ticks processed.
    pub fn drive<S>(&self, source: &mut S, main_queue: &MainQueue) -> u64
    where
        S: TickSource + ?Sized,
    {
        let mut ticks = 0;
        while let Some(now) = source.next_tick() {
            self.tick(now);
            main_queue.run_pending();
            ticks += 1;
        }
        tracing::debug!(ticks, "tick source finished");
        ticks
    }
}
