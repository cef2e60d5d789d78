//! # relcache
//!
//! An expiring key-value cache contract with a relational table backend.
//!
//! ## Features
//!
//! - **One contract:** `has`, `get`, `put`, `delete`, `flush` via the [`Cache`] trait
//! - **TTL expiry:** every entry carries an absolute expiry; expired entries are
//!   evicted by the read that finds them
//! - **Populate on miss:** `get_with` writes a [`Fallback`] value back with its own TTL
//! - **SQL backend:** a single `entries` table over MySQL (or SQLite), with a
//!   lazily opened connection and self-bootstrapping schema
//! - **In-memory backend:** the same contract over a concurrent map
//! - **Pluggable encoding:** values go through a [`Codec`] (JSON by default)
//!
//! ## Quick Start
//!
//! ```ignore
//! use relcache::backend::{Cache, SqlBackend, SqlConfig};
//! use relcache::fallback::{Fallback, Supplied};
//! use std::time::Duration;
//!
//! // 1. Build the backend (no connection yet)
//! let cache = SqlBackend::new(SqlConfig::from_env());
//!
//! // 2. Write and read
//! cache.put("user:1", vec!["admin", "ops"], None).await?;
//! let roles: Option<Vec<String>> = cache.get("user:1").await?;
//!
//! // 3. Populate on miss, with a TTL for this write only
//! let token: Option<String> = cache
//!     .get_or(
//!         "token",
//!         Fallback::supplier(|| Some(Supplied::Expiring(issue_token(), Duration::from_secs(60)))),
//!     )
//!     .await?;
//!
//! // 4. Housekeeping
//! cache.flush(true).await?;
//! cache.close().await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod clock;
pub mod error;
pub mod fallback;
pub mod serialization;

// Re-exports for convenience
pub use backend::{Cache, Entry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use fallback::{Fallback, Supplied};
pub use serialization::{Codec, JsonCodec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
