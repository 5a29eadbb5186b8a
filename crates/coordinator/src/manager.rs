use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::binding::{cache_eligible, Binding, BindingId, SharedBinding};
use crate::context::{ContextError, SerialContext};

/// Budget used by [`default_manager`].
pub const DEFAULT_MEMORY_LIMIT: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheJob {
    Evict,
    Rebuild,
    Release,
}

struct Entry {
    binding: SharedBinding,
    size: u64,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Entry>,
    ids: HashSet<BindingId>,
    total_size: u64,
}

/// Point-in-time view of the manager's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub bindings: usize,
    pub total_size: u64,
    pub memory_limit: u64,
    pub cache_enabled: bool,
}

/// Registry of active bindings under one memory budget.
///
/// Caching is a global switch. Registering past the limit (`total > limit`)
/// turns it off and evicts every binding's frame cache; unregistering back
/// under it (`total < limit`) turns it on and rebuilds them. A total exactly
/// equal to the limit never flips the switch in either direction.
///
/// Registry mutation and iteration share one lock, and all per-binding jobs
/// are run to completion on the manager's [`SerialContext`] before the
/// triggering call returns.
///
/// By default a newly registered binding gets no cache job unless it pushes
/// the total over the limit. [`CacheManager::with_priming`] additionally
/// rebuilds an eligible binding's cache as soon as it is registered.
pub struct CacheManager {
    memory_limit: u64,
    cache_enabled: AtomicBool,
    prime_on_register: bool,
    registry: Mutex<Registry>,
    serial: SerialContext,
}

impl CacheManager {
    pub fn new(memory_limit: u64) -> Result<Self, ContextError> {
        Ok(Self {
            memory_limit,
            cache_enabled: AtomicBool::new(true),
            prime_on_register: false,
            registry: Mutex::new(Registry::default()),
            serial: SerialContext::spawn("cache")?,
        })
    }

    /// Rebuild the cache of each eligible binding when it is registered while
    /// caching is enabled.
    pub fn with_priming(mut self, enabled: bool) -> Self {
        self.prime_on_register = enabled;
        self
    }

    /// Adds a binding; returns `false` if one with the same id is already registered.
    pub fn register(&self, binding: SharedBinding) -> bool {
        let mut registry = self.lock();
        let id = binding.id();
        if registry.ids.contains(&id) {
            tracing::debug!(binding = %id, "binding already registered");
            return false;
        }

        let size = binding.byte_size();
        registry.total_size = registry.total_size.saturating_add(size);
        registry.ids.insert(id);
        registry.entries.push(Entry {
            binding: Arc::clone(&binding),
            size,
        });
        tracing::debug!(
            binding = %id,
            size,
            total = registry.total_size,
            limit = self.memory_limit,
            "registered binding"
        );

        if registry.total_size > self.memory_limit && self.cache_enabled() {
            self.cache_enabled.store(false, Ordering::SeqCst);
            tracing::info!(
                total = registry.total_size,
                limit = self.memory_limit,
                bindings = registry.entries.len(),
                "memory limit exceeded; disabling frame caches"
            );
            for entry in &registry.entries {
                self.dispatch(&entry.binding, CacheJob::Evict);
            }
        } else if self.prime_on_register && self.has_cache(binding.as_ref()) {
            self.dispatch(&binding, CacheJob::Rebuild);
        }
        true
    }

    /// Removes a binding by id and releases it; absent ids are ignored.
    pub fn unregister(&self, binding: &dyn Binding) {
        let mut registry = self.lock();
        let id = binding.id();
        if !registry.ids.remove(&id) {
            return;
        }
        let Some(index) = registry
            .entries
            .iter()
            .position(|entry| entry.binding.id() == id)
        else {
            return;
        };

        let removed = registry.entries.remove(index);
        registry.total_size = registry.total_size.saturating_sub(removed.size);
        self.dispatch(&removed.binding, CacheJob::Release);
        tracing::debug!(
            binding = %id,
            total = registry.total_size,
            limit = self.memory_limit,
            "unregistered binding"
        );

        if registry.total_size < self.memory_limit && !self.cache_enabled() {
            self.cache_enabled.store(true, Ordering::SeqCst);
            tracing::info!(
                total = registry.total_size,
                limit = self.memory_limit,
                bindings = registry.entries.len(),
                "back under memory limit; rebuilding frame caches"
            );
            for entry in &registry.entries {
                self.dispatch(&entry.binding, CacheJob::Rebuild);
            }
        }
    }

    pub fn contains(&self, binding: &dyn Binding) -> bool {
        self.lock().ids.contains(&binding.id())
    }

    /// Whether `binding` should hold decoded frames right now.
    ///
    /// Does not take the registry lock, so it is safe to call while iterating.
    pub fn has_cache(&self, binding: &dyn Binding) -> bool {
        cache_eligible(binding.is_displaying(), binding.loop_count()) && self.cache_enabled()
    }

    /// Releases every binding front to back and empties the registry.
    ///
    /// The cache switch is left as it was; only a later `unregister` that
    /// drops the total under the limit turns it back on.
    pub fn clear(&self) {
        let mut registry = self.lock();
        let released = registry.entries.len();
        while !registry.entries.is_empty() {
            let entry = registry.entries.remove(0);
            registry.ids.remove(&entry.binding.id());
            self.dispatch(&entry.binding, CacheJob::Release);
        }
        registry.total_size = 0;
        tracing::debug!(released, cache_enabled = self.cache_enabled(), "cleared cache manager");
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::SeqCst)
    }

    pub fn total_size(&self) -> u64 {
        self.lock().total_size
    }

    pub fn memory_limit(&self) -> u64 {
        self.memory_limit
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let registry = self.lock();
        CacheStats {
            bindings: registry.entries.len(),
            total_size: registry.total_size,
            memory_limit: self.memory_limit,
            cache_enabled: self.cache_enabled(),
        }
    }

    /// Visits bindings in registration order while holding the registry lock.
    ///
    /// `visit` must not register, unregister, or clear on this manager.
    pub fn for_each_binding(&self, mut visit: impl FnMut(&SharedBinding)) {
        let registry = self.lock();
        for entry in &registry.entries {
            visit(&entry.binding);
        }
    }

    /// Runs `job` on the serial context and waits for it.
    pub fn run_serial<R, F>(&self, job: F) -> Result<R, ContextError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.serial.run_sync(job)
    }

    fn dispatch(&self, binding: &SharedBinding, job: CacheJob) {
        let target = Arc::clone(binding);
        let id = target.id();
        let result = self.serial.run_sync(move || match job {
            CacheJob::Evict => target.evict_cache(),
            CacheJob::Rebuild => target.rebuild_cache(),
            CacheJob::Release => target.release(),
        });
        match result {
            Ok(()) => tracing::trace!(binding = %id, ?job, "cache job finished"),
            Err(err) => tracing::error!(binding = %id, ?job, %err, "cache job failed"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide manager with a [`DEFAULT_MEMORY_LIMIT`] budget, created on first use.
///
/// Convenience for callers that only show an animation here and there; code
/// that needs its own budget should own a [`CacheManager`] instead.
pub fn default_manager() -> Result<&'static CacheManager, ContextError> {
    static DEFAULT: OnceLock<CacheManager> = OnceLock::new();
    if let Some(manager) = DEFAULT.get() {
        return Ok(manager);
    }
    let manager = CacheManager::new(DEFAULT_MEMORY_LIMIT)?;
    Ok(DEFAULT.get_or_init(|| manager))
}
