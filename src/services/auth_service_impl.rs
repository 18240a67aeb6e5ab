//! Local implementation of the [`AuthService`] trait over the file-backed
//! credential store and the in-memory session guard.

use anyhow::Result;
use tracing::info;

use crate::models::{AdminCredentialRecord, InitialCredentials};
use crate::services::auth_service::{AuthError, AuthService, LoginOutcome, SessionStatus};
use crate::session::SessionGuard;
use crate::store::{
    CredentialStorage, CredentialStore, LockoutPolicy, LoginAttempt, PasswordChange,
};

pub struct LocalAuthService {
    credentials: CredentialStore,
    session: SessionGuard,
}

impl LocalAuthService {
    #[must_use]
    pub fn new(credentials: CredentialStore, session: SessionGuard) -> Self {
        Self {
            credentials,
            session,
        }
    }

    /// Open the credential store on `storage` and wrap it in a service.
    ///
    /// On first access the generated initial password is handed back for the
    /// caller's disclosure channel.
    pub fn open(
        storage: Box<dyn CredentialStorage>,
        iterations: u32,
        lockout: LockoutPolicy,
        session_timeout_minutes: i64,
    ) -> Result<(Self, Option<InitialCredentials>)> {
        let (credentials, disclosure) = CredentialStore::open(storage, iterations, lockout)?;
        let session = SessionGuard::new(session_timeout_minutes);
        Ok((Self::new(credentials, session), disclosure))
    }

    /// Read-only view of the stored record (never the hash plaintext).
    #[must_use]
    pub fn credential_record(&self) -> &AdminCredentialRecord {
        self.credentials.record()
    }

    fn login_outcome(&self) -> LoginOutcome {
        let record = self.credentials.record();
        LoginOutcome {
            username: record.username.clone(),
            require_password_change: record.require_password_change,
            last_login: record.last_login,
        }
    }
}

impl AuthService for LocalAuthService {
    fn authenticate(&mut self, identifier: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        match self.credentials.authenticate(identifier, password)? {
            LoginAttempt::Success => {
                self.session.arm();
                Ok(self.login_outcome())
            }
            LoginAttempt::InvalidCredentials => Err(AuthError::InvalidCredentials),
            LoginAttempt::Locked { until } => Err(AuthError::AccountLocked { until }),
        }
    }

    fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<(), AuthError> {
        match self.credentials.change_password(old_password, new_password)? {
            PasswordChange::Changed => Ok(()),
            PasswordChange::WrongPassword => Err(AuthError::InvalidCredentials),
            PasswordChange::Rejected(reason) => Err(AuthError::WeakPassword(reason)),
        }
    }

    fn is_session_valid(&self) -> bool {
        self.session.is_valid()
    }

    fn touch_activity(&mut self) {
        self.session.touch();
    }

    fn remaining_session_minutes(&self) -> i64 {
        self.session.remaining_minutes()
    }

    fn check_session(&mut self) -> SessionStatus {
        if !self.session.is_valid() {
            return SessionStatus {
                valid: false,
                remaining_minutes: 0,
            };
        }

        self.session.touch();
        SessionStatus {
            valid: true,
            remaining_minutes: self.session.remaining_minutes(),
        }
    }

    fn logout(&mut self) {
        info!("Admin logged out");
        self.session.clear();
    }
}
