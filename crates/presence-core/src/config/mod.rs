//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod logging;
pub mod realtime;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::AuthConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::{DuplicatePolicy, RealtimeConfig};

use crate::error::AppError;

/// Flat environment variables honoured for compatibility with existing
/// deployments, mapped onto their structured keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("AZURE_TENANT_ID", "auth.tenant_id"),
    ("AZURE_CLIENT_ID", "auth.client_id"),
    ("SKIP_TOKEN_VERIFICATION", "auth.skip_token_verification"),
    ("PORT", "server.port"),
];

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Real-time WebSocket settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with an environment-specific overlay,
    /// environment variables prefixed with `PRESENCE__` and finally the
    /// legacy flat variables (`AZURE_TENANT_ID`, `PORT`, ...).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PRESENCE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.extra_issuers")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV_KEYS {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config: Self = builder
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.auth.skip_token_verification {
            if self.auth.tenant_id.trim().is_empty() {
                return Err(AppError::configuration(
                    "auth.tenant_id (AZURE_TENANT_ID) is required",
                ));
            }
            if self.auth.client_id.trim().is_empty() {
                return Err(AppError::configuration(
                    "auth.client_id (AZURE_CLIENT_ID) is required",
                ));
            }
        }

        if self.auth.key_refresh_interval_seconds == 0 {
            return Err(AppError::configuration(
                "auth.key_refresh_interval_seconds must be greater than zero",
            ));
        }

        if self.realtime.outbound_buffer_size == 0 {
            return Err(AppError::configuration(
                "realtime.outbound_buffer_size must be greater than zero",
            ));
        }

        if self.realtime.max_batch_messages == 0 {
            return Err(AppError::configuration(
                "realtime.max_batch_messages must be greater than zero",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.tenant_id = "tenant-1".to_string();
        config.auth.client_id = "client-1".to_string();
        config
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.realtime.outbound_buffer_size, 256);
        assert_eq!(config.auth.key_refresh_interval_seconds, 3600);
        assert_eq!(config.realtime.duplicate_policy, DuplicatePolicy::ReplaceExisting);
        assert!(!config.auth.skip_token_verification);
    }

    #[test]
    fn test_validate_requires_tenant_and_client() {
        let mut config = configured();
        assert!(config.validate().is_ok());

        config.auth.client_id.clear();
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("client_id"));

        config.auth.skip_token_verification = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let mut config = configured();
        config.realtime.outbound_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_validates_merged_config() {
        let configured_by_env = [
            "AZURE_TENANT_ID",
            "SKIP_TOKEN_VERIFICATION",
            "PRESENCE__AUTH__TENANT_ID",
            "PRESENCE__AUTH__SKIP_TOKEN_VERIFICATION",
        ]
        .iter()
        .any(|var| std::env::var(var).is_ok());
        if configured_by_env {
            return;
        }

        // No tenant anywhere: loading alone must reject the configuration.
        let err = AppConfig::load("test-no-such-overlay").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_sections_deserialize_from_toml() {
        let raw = r#"
            [server]
            port = 9090

            [auth]
            tenant_id = "contoso"
            client_id = "app-123"
            leeway_seconds = 30

            [realtime]
            duplicate_policy = "reject_new"
            announce_presence = false
        "#;

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.tenant_id, "contoso");
        assert_eq!(config.auth.leeway_seconds, 30);
        assert_eq!(config.realtime.duplicate_policy, DuplicatePolicy::RejectNew);
        assert!(!config.realtime.announce_presence);
        assert_eq!(config.realtime.max_batch_messages, 64);
        assert_eq!(config.logging.level, "info");
    }
}
