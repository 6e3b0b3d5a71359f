//! Token validation against the provider's published keys.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use presence_core::config::AuthConfig;
use serde_json::Value;
use tracing::{error, warn};

use crate::encoding::decode_lenient;
use crate::error::AuthError;
use crate::identity::{Identity, TokenClaims};
use crate::jwks::KeyCache;

/// Validates bearer tokens and produces the caller's [`Identity`].
pub struct TokenValidator {
    keys: Arc<KeyCache>,
    client_id: String,
    issuers: Vec<String>,
    leeway: u64,
    skip_verification: bool,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("client_id", &self.client_id)
            .field("issuers", &self.issuers)
            .field("skip_verification", &self.skip_verification)
            .finish()
    }
}

impl TokenValidator {
    /// Creates a validator from auth configuration.
    pub fn new(config: &AuthConfig, keys: Arc<KeyCache>) -> Self {
        if config.skip_token_verification {
            warn!("Token verification is DISABLED; every well-formed token is trusted");
        }

        Self {
            keys,
            client_id: config.client_id.clone(),
            issuers: config.accepted_issuers(),
            leeway: config.leeway_seconds,
            skip_verification: config.skip_token_verification,
        }
    }

    /// The key cache backing this validator.
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Validates `token` and maps its claims into an [`Identity`].
    pub async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        if self.skip_verification {
            let identity = Identity::from_claims(unverified_claims(token)?)?;
            warn!(
                subject_id = %identity.subject_id,
                "Accepted token without verification"
            );
            return Ok(identity);
        }

        let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;

        if !matches!(
            header.alg,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::MissingKeyId)?;

        let key = self.keys.resolve(&kid).await.inspect_err(|err| {
            if let AuthError::KeyFetch(reason) = err {
                error!(kid = %kid, reason = %reason, "Signing key set unavailable");
            }
        })?;

        let data = decode::<TokenClaims>(token, &key, &self.validation(header.alg))?;
        Identity::from_claims(data.claims)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway;
        validation.validate_exp = true;
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&self.issuers);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }
}

/// Reads the payload segment without any verification.
fn unverified_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(AuthError::Malformed("expected three segments".to_string())),
    };

    let bytes = decode_lenient(payload)
        .ok_or_else(|| AuthError::Malformed("payload is not base64".to_string()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Malformed(format!("payload is not JSON: {e}")))?;

    serde_json::from_value(value).map_err(|e| AuthError::Malformed(e.to_string()))
}
