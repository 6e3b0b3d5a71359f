//! Published signing keys.
//!
//! A [`KeySource`] produces the provider's key-set document; the
//! [`KeyCache`] turns it into verification keys indexed by key id and keeps
//! them fresh.

pub mod cache;
pub mod source;

use serde::{Deserialize, Serialize};

pub use self::cache::KeyCache;
pub use self::source::{HttpKeySource, InMemoryKeySource, KeySource};

/// One entry of a published key set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key id referenced by token headers.
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type; only `RSA` entries are used.
    #[serde(default)]
    pub kty: String,
    /// Intended use (`sig`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// The key-set document (`{"keys": [...]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetDocument {
    /// Published keys.
    #[serde(default)]
    pub keys: Vec<JsonWebKey>,
}
