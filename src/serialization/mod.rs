//! Value encoding for cache storage.
//!
//! Every adapter stores values as strings. The [`Codec`] trait is the
//! pluggable encode/decode capability adapters depend on; [`JsonCodec`] is the
//! default and the only codec shipped with the crate.
//!
//! # Round-trip law
//!
//! For every value `v` an application passes in, `decode(encode(v)) == v`,
//! including nested structs, enums, maps and sequences.
//!
//! # Example
//!
//! ```rust
//! use relcache::serialization::{Codec, JsonCodec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u64,
//!     tags: Vec<String>,
//! }
//!
//! # fn main() -> relcache::Result<()> {
//! let user = User { id: 1, tags: vec!["admin".to_string()] };
//!
//! let payload = JsonCodec.encode(&user)?;
//! let decoded: User = JsonCodec.decode(&payload)?;
//! assert_eq!(user, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode/decode capability used by cache adapters.
///
/// Implementations must be reversible for every value shape the application
/// stores. The codec must also be self-describing enough to decode any valid
/// payload into [`serde::de::IgnoredAny`], which is how `has` probes an entry
/// without knowing its type.
pub trait Codec: Send + Sync + Clone {
    /// Encode a value into its stored string form.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if the value cannot be encoded.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;

    /// Decode a stored payload back into a value.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeserializationError` if the payload is malformed or
    /// does not match `T`.
    fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| {
            log::error!("Cache serialization failed: {}", e);
            Error::SerializationError(e.to_string())
        })
    }

    fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T> {
        serde_json::from_str(payload).map_err(|e| {
            log::error!("Cache deserialization failed: {}", e);
            Error::DeserializationError(e.to_string())
        })
    }
}
