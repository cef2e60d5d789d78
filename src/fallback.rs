//! Fallback values used to populate the cache on a miss.
//!
//! `get_with` accepts a [`Fallback`] describing what to store when the key is
//! absent or expired:
//!
//! | Variant | On miss |
//! |---------|---------|
//! | `Absent` | Nothing is written, `None` is returned |
//! | `Value(v)` | `v` is written with the adapter's default TTL |
//! | `Supplier(f)` | `f()` is called once; its result decides what is written |
//!
//! A supplier may return `None` (nothing written), a plain value, or a value
//! paired with a TTL that overrides the default for that single write.
//!
//! ```
//! use relcache::fallback::{Fallback, Supplied};
//! use std::time::Duration;
//!
//! let plain = Fallback::value(42);
//! let lazy = Fallback::supplier(|| Some(Supplied::Value(42)));
//! let short_lived = Fallback::supplier(|| Some(Supplied::Expiring(99, Duration::from_secs(5))));
//! # let _ = (plain, lazy, short_lived);
//! ```

use std::fmt;
use std::time::Duration;

type SupplierFn<T> = Box<dyn FnOnce() -> Option<Supplied<T>> + Send>;

/// Result of invoking a fallback supplier.
#[derive(Clone, Debug, PartialEq)]
pub enum Supplied<T> {
    /// Store with the adapter's default TTL.
    Value(T),
    /// Store with this TTL instead of the default.
    Expiring(T, Duration),
}

/// What to store when `get_with` misses.
pub enum Fallback<T> {
    /// Do not populate.
    Absent,
    /// Populate with this value.
    Value(T),
    /// Compute the value on demand.
    Supplier(SupplierFn<T>),
}

impl<T> Fallback<T> {
    /// Fallback to a plain value.
    pub fn value(value: T) -> Self {
        Fallback::Value(value)
    }

    /// Fallback computed by `supplier`, invoked only on a miss.
    pub fn supplier<F>(supplier: F) -> Self
    where
        F: FnOnce() -> Option<Supplied<T>> + Send + 'static,
    {
        Fallback::Supplier(Box::new(supplier))
    }

    /// Resolve into the value to write and the TTL to write it with.
    ///
    /// Returns `None` when nothing should be written.
    pub fn resolve(self, default_ttl: Duration) -> Option<(T, Duration)> {
        match self {
            Fallback::Absent => None,
            Fallback::Value(value) => Some((value, default_ttl)),
            Fallback::Supplier(supplier) => match supplier()? {
                Supplied::Value(value) => Some((value, default_ttl)),
                Supplied::Expiring(value, ttl) => Some((value, ttl)),
            },
        }
    }
}

impl<T> Default for Fallback<T> {
    fn default() -> Self {
        Fallback::Absent
    }
}

impl<T> From<Option<T>> for Fallback<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Fallback::Value(value),
            None => Fallback::Absent,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Fallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::Absent => write!(f, "Absent"),
            Fallback::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Fallback::Supplier(_) => write!(f, "Supplier(..)"),
        }
    }
}
