//! Role inference by probing two role-gated reads.
//!
//! Only used to pick a landing route and a display label when the backend
//! sends no role. It is never an authorization decision. A user who can read
//! neither resource gets the caller's fallback, which may be wrong.

use super::roles::{ADMIN_ROLE, DEFAULT_ROLE};
use crate::config::Endpoints;
use crate::http::ApiClient;
use std::sync::Arc;

pub struct RoleResolver {
    api: Arc<dyn ApiClient>,
    admin_probe: String,
    user_probe: String,
}

impl RoleResolver {
    pub fn new(api: Arc<dyn ApiClient>, endpoints: &Endpoints) -> Self {
        Self {
            api,
            admin_probe: endpoints.admin_probe.clone(),
            user_probe: endpoints.user_probe.clone(),
        }
    }

    /// Admin probe first, user probe only if that fails, `fallback` if both
    /// fail. Never errors.
    pub async fn resolve(&self, token: &str, fallback: &str) -> String {
        match self.api.get(&self.admin_probe, Some(token)).await {
            Ok(_) => return ADMIN_ROLE.to_string(),
            Err(e) => tracing::debug!(probe = %self.admin_probe, "Admin probe failed: {e}"),
        }

        match self.api.get(&self.user_probe, Some(token)).await {
            Ok(_) => return DEFAULT_ROLE.to_string(),
            Err(e) => tracing::debug!(probe = %self.user_probe, "User probe failed: {e}"),
        }

        tracing::debug!(fallback, "Both role probes failed, using fallback");
        fallback.to_string()
    }
}
