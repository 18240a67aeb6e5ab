//! Domain service for admin authentication and session management.
//!
//! This is the full surface the console layers (CRUD, UI bridge) call; they
//! construct one service at startup and pass it down explicitly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::password::PasswordPolicyError;

/// Errors specific to authentication operations.
///
/// Identifier and password mismatches share one generic variant and message
/// so failures never reveal which factor was wrong. None of these are fatal
/// to the process.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is temporarily locked due to too many failed attempts")]
    AccountLocked { until: DateTime<Utc> },

    #[error("{0}")]
    WeakPassword(#[from] PasswordPolicyError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// Successful-login payload surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub username: String,

    /// True until the generated initial password has been replaced.
    pub require_password_change: bool,

    pub last_login: Option<DateTime<Utc>>,
}

/// Result of a combined session check, mirroring what the console's session
/// timer polls for.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub valid: bool,
    pub remaining_minutes: i64,
}

/// Domain service trait for admin authentication.
///
/// All operations are plain blocking calls; the core has no async
/// suspension points and supports a single session at a time.
pub trait AuthService {
    /// Verifies credentials, arms the session on success.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] on mismatch,
    /// [`AuthError::AccountLocked`] during an active lockout window.
    fn authenticate(&mut self, identifier: &str, password: &str) -> Result<LoginOutcome, AuthError>;

    /// Changes the admin password after verifying the current one.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] if the current password is wrong,
    /// [`AuthError::WeakPassword`] if the new one fails the strength policy.
    fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<(), AuthError>;

    /// Whether the session is still within both timeouts. Does not refresh
    /// the activity timestamp.
    fn is_session_valid(&self) -> bool;

    /// Refreshes the activity timestamp. Invoked on every accepted
    /// privileged request, never on rejected ones.
    fn touch_activity(&mut self);

    /// Whole minutes left before the absolute session timeout.
    fn remaining_session_minutes(&self) -> i64;

    /// Validity check that refreshes activity and reports remaining time
    /// when the session is still live.
    fn check_session(&mut self) -> SessionStatus;

    /// Clears all session state.
    fn logout(&mut self);
}
