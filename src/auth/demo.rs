//! Local stand-in identity for when the backend cannot be used and demo
//! auth is switched on.

use super::roles::{normalize_with_role, ADMIN_ROLE, DEFAULT_ROLE};
use super::store::Session;
use crate::config::FeatureFlags;
use serde_json::json;

/// Token stored for synthesized sessions.
pub const DEMO_TOKEN: &str = "demo-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoMode {
    SignIn,
    Register,
}

#[derive(Debug, Clone, Copy)]
pub struct DemoPolicy {
    enabled: bool,
}

impl DemoPolicy {
    pub fn new(flags: &FeatureFlags) -> Self {
        Self {
            enabled: flags.demo_auth_enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Build a demo session, or `None` when demo auth is off.
    ///
    /// Sign-in gives `admin` to any email containing "admin"; registration
    /// always gives `user`.
    pub fn synthesize(&self, email: &str, name: Option<&str>, mode: DemoMode) -> Option<Session> {
        if !self.enabled {
            return None;
        }

        let email = email.trim();
        let local_part = email.split('@').next().unwrap_or(email);
        let role = match mode {
            DemoMode::SignIn if email.to_lowercase().contains("admin") => ADMIN_ROLE,
            _ => DEFAULT_ROLE,
        };
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(local_part);

        let raw = json!({
            "id": format!("demo-{local_part}"),
            "name": name,
            "email": email,
            "demo": true,
        });
        let user = normalize_with_role(&raw, role)?;
        Some(Session {
            token: DEMO_TOKEN.to_string(),
            user,
        })
    }
}
