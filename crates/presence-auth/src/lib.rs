//! # presence-auth
//!
//! Verification of identity tokens issued by an external identity provider.
//!
//! ## Modules
//!
//! - `encoding`: Lenient base64 decoding for key material and token segments
//! - `error`: Authentication error variants
//! - `identity`: The verified identity record and tolerant claim parsing
//! - `jwks`: Signing key sources and the refreshing key cache
//! - `validator`: Token signature and claim validation

pub mod encoding;
pub mod error;
pub mod identity;
pub mod jwks;
pub mod validator;

pub use error::AuthError;
pub use identity::{ClaimList, Identity};
pub use jwks::{HttpKeySource, InMemoryKeySource, KeyCache, KeySetDocument, KeySource};
pub use validator::TokenValidator;
