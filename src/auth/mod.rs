//! Client-side authentication and session lifecycle.
//!
//! Provides:
//! - Persistent session (token + normalized user) in a single SQLite record
//! - Role normalization and backend role probing
//! - Auth response payload extraction across backend shapes
//! - Login / registration / email OTP state machine ([`AuthController`])
//! - Optional demo identity when the backend is unreachable
//! - Client-side route guard
//!
//! Role and guard decisions here are presentation only. The backend
//! authorizes every request on its own.

pub mod controller;
pub mod demo;
pub mod error;
pub mod guard;
pub mod otp;
pub mod payload;
pub mod resolver;
pub mod roles;
pub mod store;

pub use controller::{AuthController, AuthState, RegisterPayload};
pub use demo::{DemoMode, DemoPolicy, DEMO_TOKEN};
pub use error::{AuthError, AuthResult};
pub use guard::{GuardDecision, RouteGuard};
pub use otp::{OtpContext, OtpSource};
pub use payload::{extract_auth_payload, extract_profile, AuthPayload};
pub use resolver::RoleResolver;
pub use roles::{extract_role_from_user, normalize_user, User};
pub use store::{Session, SessionStore};
