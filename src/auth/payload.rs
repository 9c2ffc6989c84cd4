//! Pull `{token, user}` out of whatever envelope the auth endpoints return.

use serde_json::Value;

/// Token field names, in priority order.
const TOKEN_FIELDS: &[&str] = &["token", "accessToken", "access_token", "jwt", "idToken"];

/// User field names, in priority order.
const USER_FIELDS: &[&str] = &["user", "profile", "account"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthPayload {
    pub token: Option<String>,
    pub user: Option<Value>,
}

/// Unwrap a `{"data": {...}}` envelope.
fn unwrap_data(response: &Value) -> &Value {
    match response.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => response,
    }
}

fn find_token(scope: &Value) -> Option<String> {
    TOKEN_FIELDS.iter().find_map(|field| {
        scope
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn find_user(scope: &Value) -> Option<Value> {
    USER_FIELDS
        .iter()
        .find_map(|field| scope.get(*field).filter(|v| v.is_object()).cloned())
}

/// Extract the token and raw user from a successful auth response.
///
/// Either field is `None` when it cannot be found; callers treat that as an
/// invalid response.
pub fn extract_auth_payload(response: &Value) -> AuthPayload {
    let scope = unwrap_data(response);
    AuthPayload {
        token: find_token(scope),
        user: find_user(scope),
    }
}

/// Extract a profile from a "me" response: a user envelope if present,
/// otherwise the (unwrapped) document itself when it is an object.
pub fn extract_profile(response: &Value) -> Option<Value> {
    let scope = unwrap_data(response);
    find_user(scope).or_else(|| scope.is_object().then(|| scope.clone()))
}
