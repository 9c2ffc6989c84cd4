//! Canonical user identity and role normalization.
//!
//! Backends disagree on where the role lives (`role`, `userRole`,
//! `user_type`, `roles`). This module is the only place those names are
//! sniffed; everything downstream sees a [`User`] with a lower-cased
//! `role` that is always `roles[0]`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role assigned when the payload carries none.
pub const DEFAULT_ROLE: &str = "user";

pub const ADMIN_ROLE: &str = "admin";

/// Scalar role fields, in priority order.
const ROLE_FIELDS: &[&str] = &["role", "userRole", "user_type"];

const ROLES_FIELD: &str = "roles";

/// Fields with a dedicated slot in [`User`]; everything else passes through.
const CORE_FIELDS: &[&str] = &["id", "name", "email", "role", "roles"];

/// Core fields stored as plain strings.
const TEXT_FIELDS: &[&str] = &["name", "email"];

/// A normalized user. Build one with [`normalize_user`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Backend id, number or string. `null` when absent.
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub role: String,
    pub roles: Vec<String>,
    /// Any other fields the backend sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Display name, falling back to the email's local part.
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            return &self.name;
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

fn clean(role: &str) -> Option<String> {
    let r = role.trim().to_lowercase();
    (!r.is_empty()).then_some(r)
}

/// `roles` as a cleaned list. Accepts a single string or an array;
/// non-string array items are skipped.
fn roles_list(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get(ROLES_FIELD) {
        Some(Value::String(s)) => clean(s).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(clean)
            .collect(),
        _ => Vec::new(),
    }
}

fn explicit_role(obj: &Map<String, Value>) -> Option<String> {
    ROLE_FIELDS
        .iter()
        .find_map(|field| obj.get(*field).and_then(Value::as_str).and_then(clean))
        .or_else(|| roles_list(obj).into_iter().next())
}

/// The role the payload states explicitly, if any. No default applied.
pub fn extract_role_from_user(raw: &Value) -> Option<String> {
    explicit_role(raw.as_object()?)
}

/// `name` and `email` only get their own slot when they are strings; any
/// other value is passed through untouched.
fn keeps_in_extra(key: &str, value: &Value) -> bool {
    TEXT_FIELDS.contains(&key) && !value.is_string() && !value.is_null()
}

/// Turn a raw backend user object into a [`User`].
///
/// Returns `None` for `None` or non-object input. Idempotent:
/// normalizing the serialized output of this function yields the same user.
pub fn normalize_user(raw: Option<&Value>) -> Option<User> {
    let obj = raw?.as_object()?;

    let primary = explicit_role(obj).unwrap_or_else(|| DEFAULT_ROLE.to_string());
    let listed = roles_list(obj);
    let roles = if listed.first() == Some(&primary) {
        listed
    } else {
        std::iter::once(primary.clone()).chain(listed).collect()
    };

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };

    let extra = obj
        .iter()
        .filter(|(k, v)| !CORE_FIELDS.contains(&k.as_str()) || keeps_in_extra(k, v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(User {
        id: obj.get("id").cloned().unwrap_or(Value::Null),
        name: text("name"),
        email: text("email"),
        role: primary,
        roles,
        extra,
    })
}

/// Normalize with `role` forced to `role` (used after probe-based
/// inference or for synthesized identities).
pub fn normalize_with_role(raw: &Value, role: &str) -> Option<User> {
    let mut obj = raw.as_object()?.clone();
    obj.insert("role".into(), Value::String(role.to_string()));
    normalize_user(Some(&Value::Object(obj)))
}
