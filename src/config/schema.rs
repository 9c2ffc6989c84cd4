use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub endpoints: Endpoints,
    pub routes: Routes,
    pub flags: FeatureFlags,
    pub session: SessionConfig,
    /// Development mode: a failed background profile refresh leaves the
    /// session alone instead of treating it as expiry.
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            timeout_secs: 30,
        }
    }
}

/// Backend paths used by the controller, relative to `api.base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub login: String,
    pub register: String,
    pub logout: String,
    pub me: String,
    pub verify_otp: String,
    pub resend_otp: String,
    /// Admin-only read used by role inference.
    pub admin_probe: String,
    /// User-only read used by role inference.
    pub user_probe: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".into(),
            register: "/api/auth/register".into(),
            logout: "/api/auth/logout".into(),
            me: "/api/auth/me".into(),
            verify_otp: "/api/auth/verify-otp".into(),
            resend_otp: "/api/auth/resend-otp".into(),
            admin_probe: "/api/admin/dashboard".into(),
            user_probe: "/api/user/dashboard".into(),
        }
    }
}

/// Client-side routes the controller and guard redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub sign_in: String,
    pub sign_up: String,
    pub verify: String,
    pub admin_landing: String,
    pub user_landing: String,
    /// Every path under this prefix is an admin screen.
    pub admin_prefix: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            sign_in: "/auth/signin".into(),
            sign_up: "/auth/signup".into(),
            verify: "/auth/verify".into(),
            admin_landing: "/admin/dashboard".into(),
            user_landing: "/dashboard".into(),
            admin_prefix: "/admin".into(),
        }
    }
}

impl Routes {
    pub fn landing_for(&self, role: &str) -> &str {
        if role == "admin" {
            &self.admin_landing
        } else {
            &self.user_landing
        }
    }
}

/// Process-wide feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub auth_guard_enabled: bool,
    /// Substitute a local identity when the backend call fails.
    pub demo_auth_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auth_guard_enabled: true,
            demo_auth_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Defaults to `~/.finboard/session.db`.
    pub db_path: Option<PathBuf>,
}
