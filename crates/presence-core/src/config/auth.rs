//! Token verification configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identity provider and token validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Directory (tenant) ID of the identity provider.
    #[serde(default)]
    pub tenant_id: String,
    /// Application (client) ID; the only accepted `aud` value.
    #[serde(default)]
    pub client_id: String,
    /// Override for the published key set location.
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// Issuers accepted in addition to the tenant's v1 and v2 issuers.
    #[serde(default)]
    pub extra_issuers: Vec<String>,
    /// Accept tokens without verifying them. Local testing only.
    #[serde(default)]
    pub skip_token_verification: bool,
    /// Maximum age of the cached key set before a refresh is forced.
    #[serde(default = "default_refresh_interval")]
    pub key_refresh_interval_seconds: u64,
    /// Network timeout for a key set fetch.
    #[serde(default = "default_fetch_timeout")]
    pub jwks_fetch_timeout_seconds: u64,
    /// Clock skew tolerated when checking `exp`.
    #[serde(default)]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            jwks_url: None,
            extra_issuers: Vec::new(),
            skip_token_verification: false,
            key_refresh_interval_seconds: default_refresh_interval(),
            jwks_fetch_timeout_seconds: default_fetch_timeout(),
            leeway_seconds: 0,
        }
    }
}

impl AuthConfig {
    /// Location of the tenant's published signing keys.
    pub fn jwks_url(&self) -> String {
        match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!(
                "https://login.microsoftonline.com/{}/discovery/v2.0/keys",
                self.tenant_id
            ),
        }
    }

    /// Issuer emitted by the v2.0 token endpoint.
    pub fn issuer_v2(&self) -> String {
        format!("https://login.microsoftonline.com/{}/v2.0", self.tenant_id)
    }

    /// Issuer emitted by the v1.0 token endpoint.
    pub fn issuer_v1(&self) -> String {
        format!("https://sts.windows.net/{}/", self.tenant_id)
    }

    /// Every issuer string a token may carry.
    pub fn accepted_issuers(&self) -> Vec<String> {
        let mut issuers = vec![self.issuer_v2(), self.issuer_v1()];
        issuers.extend(self.extra_issuers.iter().cloned());
        issuers
    }

    /// Refresh interval as a [`Duration`].
    pub fn key_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.key_refresh_interval_seconds)
    }

    /// Fetch timeout as a [`Duration`].
    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_fetch_timeout() -> u64 {
    10
}
