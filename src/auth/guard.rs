//! Client-side route guard. Picks a redirect for the current session; the
//! backend still enforces access on every request.

use super::store::Session;
use crate::config::{FeatureFlags, Routes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

pub struct RouteGuard {
    enabled: bool,
    routes: Routes,
}

impl RouteGuard {
    pub fn new(flags: &FeatureFlags, routes: Routes) -> Self {
        Self {
            enabled: flags.auth_guard_enabled,
            routes,
        }
    }

    fn is_auth_page(&self, path: &str) -> bool {
        [&self.routes.sign_in, &self.routes.sign_up, &self.routes.verify]
            .iter()
            .any(|p| path == p.as_str())
    }

    fn is_admin_path(&self, path: &str) -> bool {
        let prefix = self.routes.admin_prefix.trim_end_matches('/');
        !prefix.is_empty() && (path == prefix || path.starts_with(&format!("{prefix}/")))
    }

    pub fn check(&self, path: &str, session: Option<&Session>) -> GuardDecision {
        if !self.enabled {
            return GuardDecision::Allow;
        }

        let path = path.split(['?', '#']).next().unwrap_or(path);

        match session {
            None if self.is_auth_page(path) => GuardDecision::Allow,
            None => GuardDecision::Redirect(self.routes.sign_in.clone()),
            Some(s) if self.is_auth_page(path) => {
                GuardDecision::Redirect(self.routes.landing_for(&s.user.role).to_string())
            }
            Some(s) if self.is_admin_path(path) && !s.user.is_admin() => {
                GuardDecision::Redirect(self.routes.user_landing.clone())
            }
            Some(_) => GuardDecision::Allow,
        }
    }
}
