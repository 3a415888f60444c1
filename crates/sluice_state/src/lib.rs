//! Sluice state layer: the persistent change-dedup store and the advisory
//! cross-process lock.
//!
//! The store remembers, per marker path, the last change token committed
//! after a successful delivery, so re-runs over an unchanged tree do no
//! work. The lock keeps two concurrent runs from handling the same root.

pub mod lock;
pub mod store;

mod error;

pub use error::{Result, StateError};
pub use lock::{acquire_lock, LockGuard, DEFAULT_LOCK_TTL};
pub use store::{marker_token, Store, FALLBACK_TOKEN};
