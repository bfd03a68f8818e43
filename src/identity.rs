//! Caller identity.
//!
//! Authentication happens in the gateway in front of this service, which
//! forwards the authenticated user's email in the `X-Authenticated-User`
//! header. Handlers extract it as an [`Identity`] and pass it explicitly to
//! the tweet service, which resolves it to a stored user.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::TweetError;

/// Header carrying the authenticated caller's email.
pub const IDENTITY_HEADER: &str = "x-authenticated-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    email: String,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Identity {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Parses a raw header value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tweet_service::identity::Identity;
    ///
    /// let identity = Identity::from_header_value(" alice@example.com ").unwrap();
    /// assert_eq!(identity.email(), "alice@example.com");
    /// assert!(Identity::from_header_value("   ").is_none());
    /// ```
    pub fn from_header_value(value: &str) -> Option<Self> {
        let email = value.trim();
        if email.is_empty() {
            None
        } else {
            Some(Identity::new(email))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = TweetError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Identity::from_header_value)
            .ok_or_else(|| {
                TweetError::Unauthenticated(format!("missing {} header", IDENTITY_HEADER))
            })
    }
}
