//! Credential pair issued by the token and refresh endpoints.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An access/refresh token pair with optional expiry timestamps.
///
/// The same shape is used for the token endpoint response, the refresh
/// endpoint response and the persisted record, so a response body can be
/// deserialized and saved without any intermediate mapping.
///
/// Expiry flags are never stored. [`is_access_token_expired`] and
/// [`is_refresh_token_expired`] compare against the wall clock on every call.
///
/// A missing expiry means the token does not expire on its own.
///
/// [`is_access_token_expired`]: AuthTokens::is_access_token_expired
/// [`is_refresh_token_expired`]: AuthTokens::is_refresh_token_expired
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    /// Bearer token attached to outgoing requests.
    pub access_token: String,
    /// Token exchanged for a new pair at the refresh endpoint.
    pub refresh_token: String,
    /// When the access token stops being accepted.
    #[serde(default)]
    pub access_token_expiry: Option<DateTime<Utc>>,
    /// When the refresh token stops being accepted.
    #[serde(default)]
    pub refresh_token_expiry: Option<DateTime<Utc>>,
}

impl AuthTokens {
    /// Creates a token pair without expiry information.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_token_expiry: None,
            refresh_token_expiry: None,
        }
    }

    /// Sets the access token expiry.
    pub fn with_access_expiry(self, expiry: DateTime<Utc>) -> Self {
        Self {
            access_token_expiry: Some(expiry),
            ..self
        }
    }

    /// Sets the refresh token expiry.
    pub fn with_refresh_expiry(self, expiry: DateTime<Utc>) -> Self {
        Self {
            refresh_token_expiry: Some(expiry),
            ..self
        }
    }

    /// Whether the access token is expired right now.
    pub fn is_access_token_expired(&self) -> bool {
        self.is_access_token_expired_at(Utc::now())
    }

    /// Whether the refresh token is expired right now.
    pub fn is_refresh_token_expired(&self) -> bool {
        self.is_refresh_token_expired_at(Utc::now())
    }

    /// Whether the access token is expired at `now`.
    pub fn is_access_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.access_token_expiry, now)
    }

    /// Whether the refresh token is expired at `now`.
    pub fn is_refresh_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.refresh_token_expiry, now)
    }
}

fn is_expired(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expiry.is_some_and(|expiry| expiry <= now)
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn tokens_without_expiry_never_expire() {
        let tokens = AuthTokens::new("access", "refresh");
        assert!(!tokens.is_access_token_expired());
        assert!(!tokens.is_refresh_token_expired());
    }

    #[test]
    fn expiry_is_derived_from_the_given_instant() {
        let now = Utc::now();
        let tokens = AuthTokens::new("access", "refresh")
            .with_access_expiry(now + Duration::seconds(10))
            .with_refresh_expiry(now + Duration::hours(1));

        assert!(!tokens.is_access_token_expired_at(now));
        assert!(tokens.is_access_token_expired_at(now + Duration::seconds(10)));
        assert!(!tokens.is_refresh_token_expired_at(now + Duration::minutes(59)));
        assert!(tokens.is_refresh_token_expired_at(now + Duration::hours(2)));
    }

    #[test]
    fn persisted_record_uses_snake_case_and_nullable_expiry() {
        let expiry = "2030-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let tokens = AuthTokens::new("a", "r").with_refresh_expiry(expiry);

        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["refresh_token"], "r");
        assert!(json["access_token_expiry"].is_null());
        assert_eq!(json["refresh_token_expiry"], "2030-01-01T00:00:00Z");
    }

    #[test]
    fn endpoint_response_without_expiry_fields_parses() {
        let tokens: AuthTokens =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r"}"#).unwrap();
        assert_eq!(tokens, AuthTokens::new("a", "r"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let tokens = AuthTokens::new("very-secret-access", "very-secret-refresh");
        let rendered = format!("{tokens:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
