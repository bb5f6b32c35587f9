//! Subscription verification handshake
//!
//! Before delivering events the platform sends
//! `GET /webhook?hub.mode=subscribe&hub.verify_token=<secret>&hub.challenge=<n>`.
//! The challenge is echoed back with `200` only when the mode is `subscribe`
//! and the presented token equals the configured secret; everything else is
//! answered with `403`.

use std::sync::Arc;

use http::StatusCode;

use crate::config::VerifyToken;
use crate::webhook::observer::{Observation, WebhookObserver};

/// The only mode that can verify
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Body returned for every rejected handshake
pub const VERIFICATION_FAILED_BODY: &str = "Verification token mismatch";

/// Why a handshake was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// `hub.mode` missing or not `subscribe`
    ModeMismatch,
    /// `hub.verify_token` missing or wrong
    TokenMismatch,
}

impl VerificationFailure {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModeMismatch => "mode_mismatch",
            Self::TokenMismatch => "token_mismatch",
        }
    }
}

/// Outcome of one handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Mode and token matched; the challenge is returned verbatim
    Verified {
        /// Challenge to echo
        challenge: String,
    },
    /// The handshake was rejected
    Failed(VerificationFailure),
}

impl VerificationOutcome {
    /// HTTP status and body for this outcome
    pub fn into_response_parts(self) -> (StatusCode, String) {
        match self {
            Self::Verified { challenge } => (StatusCode::OK, challenge),
            Self::Failed(_) => (StatusCode::FORBIDDEN, VERIFICATION_FAILED_BODY.to_string()),
        }
    }
}

/// Parameters of one handshake request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationAttempt {
    /// `hub.mode`
    pub mode: Option<String>,
    /// `hub.verify_token`
    pub presented_token: Option<String>,
    /// `hub.challenge`
    pub challenge: Option<String>,
}

impl VerificationAttempt {
    /// Extract the `hub.*` parameters from a raw query string.
    ///
    /// Values are percent-decoded; when a key repeats, the first occurrence wins.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut attempt = Self::default();
        let Some(query) = query else {
            return attempt;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "hub.mode" => &mut attempt.mode,
                "hub.verify_token" => &mut attempt.presented_token,
                "hub.challenge" => &mut attempt.challenge,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        attempt
    }

    /// Check this attempt against the configured secret
    pub fn verify(self, secret: &VerifyToken) -> VerificationOutcome {
        if self.mode.as_deref() != Some(SUBSCRIBE_MODE) {
            return VerificationOutcome::Failed(VerificationFailure::ModeMismatch);
        }
        match self.presented_token.as_deref() {
            Some(token) if secret.matches(token) => VerificationOutcome::Verified {
                challenge: self.challenge.unwrap_or_default(),
            },
            _ => VerificationOutcome::Failed(VerificationFailure::TokenMismatch),
        }
    }
}

/// Services the GET side of the webhook.
///
/// Holds the secret injected at construction; keeps no per-request state.
pub struct VerificationHandler {
    secret: VerifyToken,
    observer: Arc<dyn WebhookObserver>,
}

impl VerificationHandler {
    /// Create a handler for the given secret
    pub fn new(secret: VerifyToken, observer: Arc<dyn WebhookObserver>) -> Self {
        Self { secret, observer }
    }

    /// Run one handshake and report its outcome
    pub fn handle(&self, attempt: VerificationAttempt) -> (StatusCode, String) {
        let outcome = attempt.verify(&self.secret);
        match &outcome {
            VerificationOutcome::Verified { .. } => self.observer.observe(&Observation::Verified),
            VerificationOutcome::Failed(reason) => {
                self.observer
                    .observe(&Observation::VerificationFailed { reason: *reason })
            }
        }
        outcome.into_response_parts()
    }

    /// Answer a handshake without reporting it
    pub fn peek(&self, attempt: VerificationAttempt) -> StatusCode {
        attempt.verify(&self.secret).into_response_parts().0
    }
}
