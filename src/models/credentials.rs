use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single persisted admin credential record.
///
/// Exactly one of these exists per installation; it is created on first
/// access with a generated password and `require_password_change` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentialRecord {
    pub username: String,

    /// Alternate login identifier, matched case-insensitively like `username`.
    pub email: String,

    /// Self-describing hash string: `pbkdf2_sha256$<iterations>$<salt>$<key>`
    /// with salt and key base64-encoded.
    pub password_hash: String,

    pub created_at: DateTime<Utc>,

    /// Updated on every successful authentication.
    pub last_login: Option<DateTime<Utc>>,

    pub last_password_change: DateTime<Utc>,

    /// Set at creation, cleared on the first successful password change.
    pub require_password_change: bool,

    /// Consecutive failed logins since the last success or unlock.
    pub failed_attempts: u32,

    /// While set and in the future, login is refused regardless of credentials.
    pub locked_until: Option<DateTime<Utc>>,
}

impl AdminCredentialRecord {
    #[must_use]
    pub fn new(username: &str, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: now,
            last_login: None,
            last_password_change: now,
            require_password_change: true,
            failed_attempts: 0,
            locked_until: None,
        }
    }

    /// Whether `identifier` names this record (username or email, case-insensitive).
    #[must_use]
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        identifier.eq_ignore_ascii_case(&self.username) || identifier.eq_ignore_ascii_case(&self.email)
    }
}

/// One-time plaintext disclosure of freshly generated credentials.
///
/// Produced exactly once, at initial record creation. The caller decides how
/// to surface it (console banner, sidecar file); the core never stores the
/// plaintext in recoverable form afterwards.
#[derive(Debug, Clone)]
pub struct InitialCredentials {
    pub username: String,
    pub password: String,
}
