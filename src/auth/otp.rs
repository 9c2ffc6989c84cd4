//! Transient email-OTP verification context.

/// Seconds before another code may be requested.
pub const RESEND_COOLDOWN_SECS: u32 = 60;

/// Length of a verification code.
pub const OTP_LENGTH: usize = 6;

/// Which form started the verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpSource {
    SignIn,
    SignUp,
}

impl OtpSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignIn => "signin",
            Self::SignUp => "signup",
        }
    }
}

/// In-memory only; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpContext {
    pub active: bool,
    pub email: String,
    pub source: OtpSource,
    /// Seconds left before resend is allowed.
    pub cooldown_secs: u32,
}

impl OtpContext {
    /// Fresh context with the resend cooldown already running.
    pub fn start(email: impl Into<String>, source: OtpSource) -> Self {
        Self {
            active: true,
            email: email.into(),
            source,
            cooldown_secs: RESEND_COOLDOWN_SECS,
        }
    }

    /// One second elapsed. Returns the remaining cooldown.
    pub fn tick(&mut self) -> u32 {
        self.cooldown_secs = self.cooldown_secs.saturating_sub(1);
        self.cooldown_secs
    }

    pub fn can_resend(&self) -> bool {
        self.active && self.cooldown_secs == 0
    }

    pub fn restart_cooldown(&mut self) {
        self.cooldown_secs = RESEND_COOLDOWN_SECS;
    }
}

/// Exactly six ASCII digits.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
