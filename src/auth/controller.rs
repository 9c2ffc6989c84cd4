//! Authentication state machine.
//!
//! ```text
//!              login/register                 success
//! Anonymous ───────────────────▶ Authenticating ─────────▶ Authenticated
//!     ▲                               │  │                      │
//!     │        failure (field/generic)│  │ verification          │ logout /
//!     └───────────────────────────────┘  ▼ required              │ expiry
//!     ▲                        VerificationRequired ──verify──▶ │
//!     └────────── cancel ──────────────┘                         │
//!     ◀──────────────────────────────────────────────────────────┘
//! ```
//!
//! One controller per client, shared as `Arc<AuthController>`. State sits
//! behind a `parking_lot::Mutex` that is never held across an `.await`.
//! `login`, `register`, `verify_otp` and `resend_otp` claim a single loading
//! flag; an overlapping call gets [`AuthError::Busy`].

use super::demo::{DemoMode, DemoPolicy, DEMO_TOKEN};
use super::error::{error_message, field_errors, verification_required, AuthError, AuthResult};
use super::guard::{GuardDecision, RouteGuard};
use super::otp::{is_valid_code, OtpContext, OtpSource};
use super::payload::{extract_auth_payload, extract_profile};
use super::resolver::RoleResolver;
use super::roles::{extract_role_from_user, normalize_user, normalize_with_role, User, DEFAULT_ROLE};
use super::store::{Session, SessionStore};
use crate::config::{Config, Endpoints, Routes};
use crate::http::{ApiClient, HttpError};
use crate::ui::{NavigateOptions, Navigator, Notifier, ToastLevel};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const LOGIN_FIELDS: &[&str] = &["email", "password"];
const REGISTER_FIELDS: &[&str] = &["name", "email", "password", "password_confirmation"];

const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    VerificationRequired,
    Authenticated,
}

impl AuthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::VerificationRequired => "verification_required",
            Self::Authenticated => "authenticated",
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign-up form.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Where to send the user after a successful sign-in.
#[derive(Debug, Clone, Copy)]
enum Landing {
    ByRole,
    User,
}

/// What a failed login/register call needs to pick a recovery branch.
struct FailureContext<'a> {
    email: &'a str,
    name: Option<&'a str>,
    source: OtpSource,
    fields: &'static [&'static str],
    fallback_message: &'static str,
    demo_mode: DemoMode,
    landing: Landing,
    /// Session epoch the attempt started in.
    epoch: u64,
}

#[derive(Debug)]
struct Inner {
    state: AuthState,
    session: Option<Session>,
    otp: Option<OtpContext>,
    /// Bumped whenever a new OTP context starts; stale tickers stop.
    otp_generation: u64,
    /// Bumped on logout and expiry; sign-ins started earlier are dropped.
    session_epoch: u64,
    last_error: Option<AuthError>,
}

/// Clears the loading flag when the operation ends, including when the
/// future is dropped mid-flight.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AuthController {
    api: Arc<dyn ApiClient>,
    store: SessionStore,
    resolver: RoleResolver,
    demo: DemoPolicy,
    guard: RouteGuard,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    endpoints: Endpoints,
    routes: Routes,
    dev_mode: bool,
    loading: AtomicBool,
    inner: Mutex<Inner>,
}

impl AuthController {
    /// Build the controller and restore any persisted session.
    pub fn new(
        config: &Config,
        api: Arc<dyn ApiClient>,
        store: SessionStore,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let controller = Self {
            resolver: RoleResolver::new(Arc::clone(&api), &config.endpoints),
            api,
            store,
            demo: DemoPolicy::new(&config.flags),
            guard: RouteGuard::new(&config.flags, config.routes.clone()),
            notifier,
            navigator,
            endpoints: config.endpoints.clone(),
            routes: config.routes.clone(),
            dev_mode: config.dev_mode,
            loading: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: AuthState::Anonymous,
                session: None,
                otp: None,
                otp_generation: 0,
                session_epoch: 0,
                last_error: None,
            }),
        };
        controller.restore();
        controller
    }

    /// Adopt the persisted session, if any.
    pub fn restore(&self) -> Option<Session> {
        let session = self.store.load();
        let mut inner = self.inner.lock();
        match &session {
            Some(s) => {
                tracing::info!(email = %s.user.email, role = %s.user.role, "Restored persisted session");
                inner.state = AuthState::Authenticated;
                inner.session = Some(s.clone());
            }
            None => {
                inner.state = AuthState::Anonymous;
                inner.session = None;
            }
        }
        session
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn state(&self) -> AuthState {
        self.inner.lock().state
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.lock().session.as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.inner
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.user.is_admin())
    }

    pub fn otp(&self) -> Option<OtpContext> {
        self.inner.lock().otp.clone()
    }

    pub fn last_error(&self) -> Option<AuthError> {
        self.inner.lock().last_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Route guard decision for `path` against the current session.
    pub fn check_route(&self, path: &str) -> GuardDecision {
        let inner = self.inner.lock();
        self.guard.check(path, inner.session.as_ref())
    }

    // ── Operations ──────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let _loading = self.begin()?;
        let email = email.trim();
        let epoch = self.enter_authenticating();
        tracing::info!(email, "Signing in");

        let ctx = FailureContext {
            email,
            name: None,
            source: OtpSource::SignIn,
            fields: LOGIN_FIELDS,
            fallback_message: "Login failed",
            demo_mode: DemoMode::SignIn,
            landing: Landing::ByRole,
            epoch,
        };
        let body = json!({ "email": email, "password": password });
        let outcome = match self.api.post(&self.endpoints.login, &body, None).await {
            Ok(resp) => {
                let signed_in = self
                    .complete_sign_in(&resp, "Invalid login response", Landing::ByRole, epoch)
                    .await;
                self.resolve_sign_in(signed_in, &ctx)
            }
            Err(err) => self.recover(err, &ctx),
        };
        self.settle(outcome)
    }

    pub async fn register(&self, payload: RegisterPayload) -> AuthResult<Session> {
        let _loading = self.begin()?;

        if payload.password != payload.password_confirmation {
            let err = AuthError::field("password_confirmation", "Passwords do not match");
            self.inner.lock().last_error = Some(err.clone());
            return Err(err);
        }

        let email = payload.email.trim().to_string();
        let epoch = self.enter_authenticating();
        tracing::info!(email = %email, "Registering account");

        let ctx = FailureContext {
            email: &email,
            name: Some(payload.name.as_str()),
            source: OtpSource::SignUp,
            fields: REGISTER_FIELDS,
            fallback_message: "Registration failed",
            demo_mode: DemoMode::Register,
            landing: Landing::User,
            epoch,
        };
        let body = json!({
            "name": payload.name.trim(),
            "email": email,
            "password": payload.password,
            "password_confirmation": payload.password_confirmation,
        });
        let outcome = match self.api.post(&self.endpoints.register, &body, None).await {
            Ok(resp) => {
                let signed_in = self
                    .complete_sign_in(
                        &resp,
                        "Invalid registration response",
                        Landing::User,
                        epoch,
                    )
                    .await;
                self.resolve_sign_in(signed_in, &ctx)
            }
            Err(err) => self.recover(err, &ctx),
        };
        self.settle(outcome)
    }

    /// Submit the emailed code. Only valid while verification is pending.
    pub async fn verify_otp(&self, email: &str, code: &str) -> AuthResult<Session> {
        if self.state() != AuthState::VerificationRequired {
            return Err(AuthError::generic("There is no verification in progress"));
        }
        let code = code.trim();
        if !is_valid_code(code) {
            let err = AuthError::field("code", "Enter the 6-digit code from your email");
            self.inner.lock().last_error = Some(err.clone());
            return Err(err);
        }

        let _loading = self.begin()?;
        let email = email.trim();
        let epoch = self.inner.lock().session_epoch;
        tracing::info!(email, "Verifying email code");

        let body = json!({ "email": email, "code": code });
        let outcome = match self.api.post(&self.endpoints.verify_otp, &body, None).await {
            Ok(resp) => {
                self.complete_sign_in(
                    &resp,
                    "Invalid verification response",
                    Landing::ByRole,
                    epoch,
                )
                .await
            }
            Err(err) => Err(AuthError::Generic(error_message(&err, "Verification failed"))),
        };

        if let Err(e) = &outcome {
            // stay in VerificationRequired and show the message inline
            tracing::warn!(email, "Code verification failed: {e}");
            self.inner.lock().last_error = Some(e.clone());
        }
        outcome
    }

    /// Ask the backend to send a new code. Allowed once the cooldown is 0.
    pub async fn resend_otp(&self, email: &str) -> AuthResult<()> {
        {
            let inner = self.inner.lock();
            if inner.state != AuthState::VerificationRequired {
                return Err(AuthError::generic("There is no verification in progress"));
            }
            match &inner.otp {
                Some(otp) if otp.can_resend() => {}
                Some(otp) => {
                    return Err(AuthError::Generic(format!(
                        "Please wait {}s before requesting another code",
                        otp.cooldown_secs
                    )))
                }
                None => return Err(AuthError::generic("There is no verification in progress")),
            }
        }

        let _loading = self.begin()?;
        let email = email.trim();
        let body = json!({ "email": email });
        match self.api.post(&self.endpoints.resend_otp, &body, None).await {
            Ok(_) => {
                if let Some(otp) = self.inner.lock().otp.as_mut() {
                    otp.restart_cooldown();
                }
                tracing::info!(email, "Verification code re-sent");
                self.notifier
                    .notify(ToastLevel::Success, &format!("A new code has been sent to {email}"));
                Ok(())
            }
            Err(err) => {
                let e = AuthError::Generic(error_message(&err, "Could not resend the code"));
                tracing::warn!(email, "Resend failed: {e}");
                self.notifier.notify(ToastLevel::Error, &e.to_string());
                self.inner.lock().last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Leave verification (tab switch, explicit cancel).
    pub fn cancel_verification(&self) {
        let mut inner = self.inner.lock();
        if inner.state == AuthState::VerificationRequired {
            inner.state = AuthState::Anonymous;
        }
        inner.otp = None;
        inner.last_error = None;
    }

    /// Sign out. The backend call is best effort; local state is always
    /// cleared.
    pub async fn logout(&self) {
        let token = self.inner.lock().session.as_ref().map(|s| s.token.clone());

        if let Some(token) = token.filter(|t| t != DEMO_TOKEN) {
            if let Err(e) = self
                .api
                .post(&self.endpoints.logout, &json!({}), Some(&token))
                .await
            {
                tracing::warn!("Backend logout failed, clearing local session anyway: {e}");
            }
        }

        self.clear_session(None);
        tracing::info!("Signed out");
        self.notifier.notify(ToastLevel::Info, "You have been signed out");
        self.navigator.go_to(
            &self.routes.sign_in,
            NavigateOptions {
                replace: true,
                notice: None,
            },
        );
    }

    /// Silent background refresh of the profile behind the held token.
    ///
    /// On failure outside dev mode the session is treated as expired.
    pub async fn refresh_profile(&self) -> AuthResult<Session> {
        let Some(current) = self.session() else {
            return Err(AuthError::generic("No active session"));
        };
        if current.token == DEMO_TOKEN {
            return Ok(current);
        }

        let fetched = match self.api.get(&self.endpoints.me, Some(&current.token)).await {
            Ok(resp) => match extract_profile(&resp) {
                Some(profile) => Ok((resp, profile)),
                None => Err(AuthError::generic("Invalid profile response")),
            },
            Err(err) => Err(AuthError::Generic(error_message(&err, "Profile refresh failed"))),
        };

        let (resp, profile) = match fetched {
            Ok(v) => v,
            Err(e) if self.dev_mode => {
                tracing::warn!("Profile refresh failed in dev mode, keeping session: {e}");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Profile refresh failed, treating session as expired: {e}");
                self.expire(&current.token);
                return Err(AuthError::SessionExpired);
            }
        };

        let token = extract_auth_payload(&resp)
            .token
            .unwrap_or_else(|| current.token.clone());
        let role = match extract_role_from_user(&profile) {
            Some(role) => role,
            None => self.resolver.resolve(&token, &current.user.role).await,
        };
        let user = normalize_with_role(&profile, &role)
            .ok_or_else(|| AuthError::generic("Invalid profile response"))?;

        let session = Session { token, user };
        let mut inner = self.inner.lock();
        // logout or a new sign-in raced the refresh; drop the stale result
        if inner.session.as_ref().map(|s| s.token.as_str()) != Some(current.token.as_str()) {
            return Err(AuthError::generic("Session changed during refresh"));
        }
        self.store
            .save(&session.token, &session.user)
            .map_err(|e| AuthError::Generic(format!("Could not save your session: {e}")))?;
        inner.state = AuthState::Authenticated;
        inner.session = Some(session.clone());
        tracing::debug!(role = %session.user.role, "Profile refreshed");
        Ok(session)
    }

    /// Merge `patch` into the current user and persist. No backend call.
    pub fn update_profile(&self, patch: &Map<String, Value>) -> AuthResult<User> {
        let mut inner = self.inner.lock();
        let Some(session) = inner.session.as_ref() else {
            return Err(AuthError::generic("No active session"));
        };

        let mut merged = match session.user.to_value() {
            Value::Object(obj) => obj,
            _ => Map::new(),
        };
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
        let user = normalize_user(Some(&Value::Object(merged)))
            .ok_or_else(|| AuthError::generic("Invalid profile update"))?;

        let token = session.token.clone();
        self.store
            .save(&token, &user)
            .map_err(|e| AuthError::Generic(format!("Could not save your session: {e}")))?;
        inner.session = Some(Session {
            token,
            user: user.clone(),
        });
        Ok(user)
    }

    // ── OTP cooldown ────────────────────────────────────────────────

    /// One second of resend cooldown elapsed. `None` when no verification
    /// is pending.
    pub fn tick_resend_cooldown(&self) -> Option<u32> {
        self.inner.lock().otp.as_mut().map(OtpContext::tick)
    }

    /// Decrement the resend cooldown once per second for the current
    /// verification episode. Stops when the episode ends.
    pub fn spawn_cooldown_ticker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let generation = controller.inner.lock().otp_generation;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut inner = controller.inner.lock();
                if inner.otp_generation != generation {
                    break;
                }
                match inner.otp.as_mut() {
                    Some(otp) => {
                        otp.tick();
                    }
                    None => break,
                }
            }
        })
    }

    // ── Internals ───────────────────────────────────────────────────

    fn begin(&self) -> AuthResult<LoadingGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| LoadingGuard(&self.loading))
            .map_err(|_| AuthError::Busy)
    }

    /// Returns the session epoch the attempt runs in.
    fn enter_authenticating(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.state = AuthState::Authenticating;
        inner.otp = None;
        inner.last_error = None;
        inner.session_epoch
    }

    /// Turn a successful auth response into a persisted session.
    async fn complete_sign_in(
        &self,
        resp: &Value,
        invalid_message: &str,
        landing: Landing,
        epoch: u64,
    ) -> AuthResult<Session> {
        let payload = extract_auth_payload(resp);
        let (Some(token), Some(raw_user)) = (payload.token, payload.user) else {
            return Err(AuthError::generic(invalid_message));
        };

        let role = match extract_role_from_user(&raw_user) {
            Some(role) => role,
            None => self.resolver.resolve(&token, DEFAULT_ROLE).await,
        };
        let user = normalize_with_role(&raw_user, &role)
            .ok_or_else(|| AuthError::generic(invalid_message))?;

        self.establish(Session { token, user }, landing, epoch)
    }

    /// A 2xx response that could not become a session fails like any
    /// other backend error, unless the user signed out meanwhile.
    fn resolve_sign_in(
        &self,
        signed_in: AuthResult<Session>,
        ctx: &FailureContext<'_>,
    ) -> AuthResult<Session> {
        match signed_in {
            Ok(session) => Ok(session),
            Err(e) if self.inner.lock().session_epoch != ctx.epoch => Err(e),
            Err(e) => {
                tracing::warn!(email = ctx.email, "{}: {e}", ctx.fallback_message);
                self.fail(e.to_string(), ctx)
            }
        }
    }

    /// Pick the recovery branch for a failed login/register call.
    fn recover(&self, err: HttpError, ctx: &FailureContext<'_>) -> AuthResult<Session> {
        if let Some((email, message)) = verification_required(&err, ctx.email) {
            tracing::info!(email = %email, source = ctx.source.as_str(), "Email verification required");
            let mut inner = self.inner.lock();
            inner.state = AuthState::VerificationRequired;
            inner.otp = Some(OtpContext::start(email.clone(), ctx.source));
            inner.otp_generation += 1;
            drop(inner);
            self.notifier.notify(ToastLevel::Info, &message);
            return Err(AuthError::VerificationRequired { email, message });
        }

        if let Some(fields) = field_errors(&err, ctx.fields) {
            return Err(AuthError::FieldValidation { fields });
        }

        tracing::warn!(email = ctx.email, "{}: {err}", ctx.fallback_message);
        self.fail(error_message(&err, ctx.fallback_message), ctx)
    }

    /// Generic failure: the demo identity when enabled, otherwise a toast.
    fn fail(&self, message: String, ctx: &FailureContext<'_>) -> AuthResult<Session> {
        if let Some(session) = self.demo.synthesize(ctx.email, ctx.name, ctx.demo_mode) {
            tracing::warn!(email = ctx.email, "Using demo identity");
            match self.establish(session, ctx.landing, ctx.epoch) {
                Ok(session) => return Ok(session),
                Err(e) => tracing::warn!("Demo session was not established: {e}"),
            }
        }

        self.notifier.notify(ToastLevel::Error, &message);
        Err(AuthError::Generic(message))
    }

    /// Persist the session, become `Authenticated`, and redirect.
    ///
    /// Refused when a logout happened after the attempt started.
    fn establish(&self, session: Session, landing: Landing, epoch: u64) -> AuthResult<Session> {
        {
            let mut inner = self.inner.lock();
            if inner.session_epoch != epoch {
                return Err(AuthError::generic("Signed out before sign-in completed"));
            }
            self.store
                .save(&session.token, &session.user)
                .map_err(|e| AuthError::Generic(format!("Could not save your session: {e}")))?;
            inner.state = AuthState::Authenticated;
            inner.session = Some(session.clone());
            inner.otp = None;
            inner.last_error = None;
        }

        tracing::info!(email = %session.user.email, role = %session.user.role, "Signed in");
        self.notifier.notify(
            ToastLevel::Success,
            &format!("Welcome, {}", session.user.display_name()),
        );
        let path = match landing {
            Landing::ByRole => self.routes.landing_for(&session.user.role),
            Landing::User => self.routes.user_landing.as_str(),
        };
        self.navigator.go_to(
            path,
            NavigateOptions {
                replace: true,
                notice: None,
            },
        );
        Ok(session)
    }

    /// Record the outcome of login/register. Failures other than
    /// verification drop back to the state the held session implies.
    fn settle(&self, outcome: AuthResult<Session>) -> AuthResult<Session> {
        if let Err(e) = &outcome {
            let mut inner = self.inner.lock();
            match e {
                AuthError::VerificationRequired { .. } => inner.last_error = None,
                _ => {
                    inner.state = if inner.session.is_some() {
                        AuthState::Authenticated
                    } else {
                        AuthState::Anonymous
                    };
                    inner.last_error = Some(e.clone());
                }
            }
        }
        outcome
    }

    fn clear_session(&self, error: Option<AuthError>) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear persisted session: {e}");
        }
        let mut inner = self.inner.lock();
        inner.state = AuthState::Anonymous;
        inner.session = None;
        inner.otp = None;
        inner.session_epoch += 1;
        inner.last_error = error;
    }

    /// Drop a rejected session and send the user back to sign-in.
    fn expire(&self, token: &str) {
        if self.inner.lock().session.as_ref().map(|s| s.token.as_str()) != Some(token) {
            return;
        }
        self.clear_session(Some(AuthError::SessionExpired));
        self.notifier.notify(ToastLevel::Error, SESSION_EXPIRED_NOTICE);
        self.navigator.go_to(
            &self.routes.sign_in,
            NavigateOptions {
                replace: true,
                notice: Some(SESSION_EXPIRED_NOTICE.to_string()),
            },
        );
    }
}
