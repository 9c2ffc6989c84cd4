//! Configuration: `~/.finboard/config.toml` plus `FINBOARD_*` environment
//! overrides. Read once at startup; the result is immutable for the life
//! of the process.

pub mod schema;

pub use schema::{ApiConfig, Config, Endpoints, FeatureFlags, Routes, SessionConfig};

use anyhow::{Context, Result};
use directories::UserDirs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".finboard";
const CONFIG_FILE: &str = "config.toml";
const SESSION_DB_FILE: &str = "session.db";

/// `~/.finboard`, or `./.finboard` when no home directory is known.
pub fn default_config_dir() -> PathBuf {
    UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

impl Config {
    /// Load from an explicit file, or from `~/.finboard/config.toml` when
    /// `path` is `None`. A missing default file yields defaults; a missing
    /// explicit file is an error. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = default_config_dir().join(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "No config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Apply `FINBOARD_*` overrides. `lookup` is injectable so tests do not
    /// have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FINBOARD_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(v) = lookup("FINBOARD_ENABLE_AUTH_GUARD").and_then(|v| parse_bool(&v)) {
            self.flags.auth_guard_enabled = v;
        }
        if let Some(v) = lookup("FINBOARD_ENABLE_DEMO_AUTH").and_then(|v| parse_bool(&v)) {
            self.flags.demo_auth_enabled = v;
        }
        if let Some(v) = lookup("FINBOARD_DEV_MODE").and_then(|v| parse_bool(&v)) {
            self.dev_mode = v;
        }
        if let Some(p) = lookup("FINBOARD_SESSION_DB").filter(|v| !v.trim().is_empty()) {
            self.session.db_path = Some(PathBuf::from(p.trim()));
        }
    }

    /// Where the session database lives.
    pub fn session_db_path(&self) -> PathBuf {
        self.session
            .db_path
            .clone()
            .unwrap_or_else(|| default_config_dir().join(SESSION_DB_FILE))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_enable_guard_and_disable_demo() {
        let config = Config::default();
        assert!(config.flags.auth_guard_enabled);
        assert!(!config.flags.demo_auth_enabled);
        assert!(!config.dev_mode);
        assert_eq!(config.endpoints.login, "/api/auth/login");
        assert_eq!(config.routes.sign_in, "/auth/signin");
    }

    #[test]
    fn env_overrides_flags_and_url() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup_from(&[
            ("FINBOARD_API_URL", "https://api.example.test"),
            ("FINBOARD_ENABLE_AUTH_GUARD", "false"),
            ("FINBOARD_ENABLE_DEMO_AUTH", "1"),
            ("FINBOARD_DEV_MODE", "yes"),
            ("FINBOARD_SESSION_DB", "/tmp/fb.db"),
        ]));
        assert_eq!(config.api.base_url, "https://api.example.test");
        assert!(!config.flags.auth_guard_enabled);
        assert!(config.flags.demo_auth_enabled);
        assert!(config.dev_mode);
        assert_eq!(config.session_db_path(), PathBuf::from("/tmp/fb.db"));
    }

    #[test]
    fn unparseable_env_bool_is_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup_from(&[("FINBOARD_ENABLE_AUTH_GUARD", "maybe")]));
        assert!(config.flags.auth_guard_enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
dev_mode = true

[api]
base_url = "https://finboard.example"

[flags]
demo_auth_enabled = true

[routes]
admin_landing = "/admin/overview"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.api.base_url, "https://finboard.example");
        assert_eq!(config.api.timeout_secs, ApiConfig::default().timeout_secs);
        assert!(config.flags.demo_auth_enabled);
        assert!(config.flags.auth_guard_enabled);
        assert_eq!(config.routes.admin_landing, "/admin/overview");
        assert_eq!(config.routes.user_landing, "/dashboard");
    }

    #[test]
    fn missing_explicit_file_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.toml");
        let err = Config::load(Some(missing.as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn invalid_toml_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
