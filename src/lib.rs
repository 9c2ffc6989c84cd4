//! Finboard client-side authentication and session lifecycle.
//!
//! The [`auth::AuthController`] owns sign-in, registration, email OTP
//! verification, logout and profile refresh for one dashboard client. It
//! talks to the backend through an [`http::ApiClient`], persists the
//! session through [`auth::SessionStore`], and asks the UI layer to show
//! toasts and change routes through the sinks in [`ui`].
//!
//! Everything is wired together explicitly: construct one controller at
//! startup, share it as `Arc<AuthController>`, drop it on shutdown.

pub mod auth;
pub mod config;
pub mod http;
pub mod ui;

pub use auth::{AuthController, AuthError, AuthResult, AuthState, Session, User};
pub use config::{Config, FeatureFlags};
