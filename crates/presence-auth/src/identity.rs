//! The verified caller identity and tolerant claim parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AuthError;

/// A string-list claim that providers emit inconsistently.
///
/// Accepts an array (non-string items are dropped), a single string,
/// `null`, or an absent field. The latter two become an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClaimList(Vec<String>);

impl ClaimList {
    /// Consumes the list.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    /// Borrows the entries.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Value> for ClaimList {
    fn from(value: Value) -> Self {
        let items = match value {
            Value::String(single) => vec![single],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Self(items)
    }
}

impl<'de> Deserialize<'de> for ClaimList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// Payload claims consumed from an identity token.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TokenClaims {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub roles: ClaimList,
    #[serde(default)]
    pub groups: ClaimList,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// The authenticated caller, produced once per validated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable subject identifier (`oid`, falling back to `sub`).
    #[serde(rename = "id")]
    pub subject_id: String,
    /// Email (`email`, falling back to `preferred_username`).
    pub email: String,
    /// Display name.
    pub name: String,
    /// Sign-in name as issued by the provider.
    pub preferred_username: String,
    /// Directory (tenant) the caller belongs to.
    pub tenant_id: String,
    /// Application roles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Group memberships.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Maps token claims, applying the subject and email fallbacks.
    pub(crate) fn from_claims(claims: TokenClaims) -> Result<Self, AuthError> {
        let subject_id = non_empty(claims.oid)
            .or_else(|| non_empty(claims.sub))
            .ok_or_else(|| AuthError::Malformed("token carries no subject".to_string()))?;

        let preferred_username = claims.preferred_username.unwrap_or_default();
        let email = non_empty(claims.email).unwrap_or_else(|| preferred_username.clone());

        Ok(Self {
            subject_id,
            email,
            name: claims.name.unwrap_or_default(),
            preferred_username,
            tenant_id: claims.tid.unwrap_or_default(),
            roles: claims.roles.into_inner(),
            groups: claims.groups.into_inner(),
            issued_at: timestamp(claims.iat),
            expires_at: timestamp(claims.exp),
        })
    }

    /// Whether the caller holds the given application role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn timestamp(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_default()
}
