//! Shared-memory-budget coordination for animated displays.
//!
//! The [`CacheManager`] keeps a registry of [`Binding`]s, sums their decoded
//! sizes, and flips a global cache policy when the total crosses its memory
//! limit. Every per-binding mutation (evict, rebuild, release, frame advance)
//! runs on one [`SerialContext`], so no two bindings change state at once.

mod binding;
mod context;
mod managed;
mod manager;

pub use binding::{cache_eligible, Binding, BindingId, RenderSurface, SharedBinding};
pub use context::{ContextError, SerialContext};
pub use managed::ManagedBinding;
pub use manager::{default_manager, CacheManager, CacheStats, DEFAULT_MEMORY_LIMIT};
