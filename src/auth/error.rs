//! Failure taxonomy for controller operations, and the only place that
//! sniffs backend error bodies for verification flags and field errors.

use crate::http::HttpError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type AuthResult<T> = Result<T, AuthError>;

/// Typed outcome of a failed controller operation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Per-field messages, rendered next to the offending inputs.
    #[error("Please correct the highlighted fields")]
    FieldValidation { fields: BTreeMap<String, String> },

    /// The account exists but its email must be confirmed with an OTP.
    #[error("{message}")]
    VerificationRequired { email: String, message: String },

    #[error("{0}")]
    Generic(String),

    /// A held token was rejected during a background refresh.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    /// Another login/register/verify call is still in flight.
    #[error("Another authentication request is already in progress")]
    Busy,
}

impl AuthError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.to_string(), message.into());
        Self::FieldValidation { fields }
    }
}

/// Body flags that mean "email verification is required".
const VERIFICATION_FLAGS: &[&str] = &[
    "requiresVerification",
    "requires_verification",
    "needsVerification",
];

const DEFAULT_VERIFICATION_MESSAGE: &str = "Please verify your email to continue";

/// If the failed call says the account needs email verification, return
/// the email to verify and the message to show.
///
/// Checks the body itself and a nested `data` object. `email_verified:
/// false` counts as a flag too.
pub fn verification_required(err: &HttpError, submitted_email: &str) -> Option<(String, String)> {
    let HttpError::Status { body, .. } = err else {
        return None;
    };

    let scopes = [Some(body), body.get("data")];
    let flagged = scopes.iter().flatten().any(|scope| {
        VERIFICATION_FLAGS
            .iter()
            .any(|flag| scope.get(*flag).and_then(Value::as_bool) == Some(true))
            || scope.get("email_verified").and_then(Value::as_bool) == Some(false)
    });
    if !flagged {
        return None;
    }

    let email = scopes
        .iter()
        .flatten()
        .find_map(|scope| scope.get("email").and_then(Value::as_str))
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(submitted_email)
        .to_string();
    let message = message_from_body(body).unwrap_or_else(|| DEFAULT_VERIFICATION_MESSAGE.into());

    Some((email, message))
}

/// Collect field-level validation messages for the given input names.
///
/// Accepts `{"errors": {"email": ["taken"]}}` and `{"errors": {"email":
/// "taken"}}`, at the top level or under `data`. Only the first message per
/// field is kept. Returns `None` when none of `allowed` has a message.
pub fn field_errors(err: &HttpError, allowed: &[&str]) -> Option<BTreeMap<String, String>> {
    let HttpError::Status { body, .. } = err else {
        return None;
    };

    let errors = body
        .get("errors")
        .or_else(|| body.get("data").and_then(|d| d.get("errors")))
        .and_then(Value::as_object)?;

    let fields: BTreeMap<String, String> = allowed
        .iter()
        .filter_map(|name| first_message(errors, name).map(|msg| ((*name).to_string(), msg)))
        .collect();

    (!fields.is_empty()).then_some(fields)
}

fn first_message(errors: &Map<String, Value>, name: &str) -> Option<String> {
    match errors.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Human-readable message for any failed backend call.
pub fn error_message(err: &HttpError, fallback: &str) -> String {
    match err {
        HttpError::Status { body, .. } => {
            message_from_body(body).unwrap_or_else(|| fallback.to_string())
        }
        HttpError::Transport(_) => "Unable to reach the server. Check your connection.".into(),
        HttpError::Decode(_) => "The server sent an unexpected response.".into(),
    }
}

fn message_from_body(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| {
            body.get("data")
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
        })
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(code: u16, body: Value) -> HttpError {
        HttpError::Status { status: code, body }
    }

    #[test]
    fn verification_flag_at_top_level() {
        let err = status(
            403,
            json!({"requiresVerification": true, "email": "a@b.com", "message": "Verify your email"}),
        );
        let (email, message) = verification_required(&err, "typed@b.com").unwrap();
        assert_eq!(email, "a@b.com");
        assert_eq!(message, "Verify your email");
    }

    #[test]
    fn verification_flag_nested_in_data_falls_back_to_submitted_email() {
        let err = status(403, json!({"data": {"requires_verification": true}}));
        let (email, message) = verification_required(&err, "typed@b.com").unwrap();
        assert_eq!(email, "typed@b.com");
        assert_eq!(message, DEFAULT_VERIFICATION_MESSAGE);
    }

    #[test]
    fn email_verified_false_counts_as_flag() {
        let err = status(403, json!({"email_verified": false}));
        assert!(verification_required(&err, "x@y.z").is_some());
    }

    #[test]
    fn no_verification_for_plain_errors_or_transport() {
        assert!(verification_required(&status(401, json!({"error": "nope"})), "x").is_none());
        assert!(verification_required(&HttpError::Transport("down".into()), "x").is_none());
    }

    #[test]
    fn field_errors_accept_arrays_and_strings() {
        let err = status(
            422,
            json!({"errors": {"email": ["The email is taken.", "second"], "password": "Too short", "other": ["ignored"]}}),
        );
        let fields = field_errors(&err, &["email", "password"]).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["email"], "The email is taken.");
        assert_eq!(fields["password"], "Too short");
    }

    #[test]
    fn field_errors_none_when_no_allowed_field_present() {
        let err = status(422, json!({"errors": {"username": ["bad"]}}));
        assert!(field_errors(&err, &["email", "password"]).is_none());
    }

    #[test]
    fn error_message_prefers_body() {
        let err = status(401, json!({"error": "Invalid username or password"}));
        assert_eq!(error_message(&err, "Login failed"), "Invalid username or password");
        let err = status(500, json!({}));
        assert_eq!(error_message(&err, "Login failed"), "Login failed");
    }
}
