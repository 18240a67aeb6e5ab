//! Credential record state machine: first-run initialization, rate-limited
//! authentication with lockout, and validated password changes.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use super::CredentialStorage;
use crate::models::{AdminCredentialRecord, InitialCredentials};
use crate::password::{
    self, GENERATED_PASSWORD_LENGTH, PasswordPolicyError, generate_password, hash_password,
    verify_password,
};

const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_EMAIL: &str = "admin@medicalpractice.local";

/// Lockout thresholds applied by [`CredentialStore::authenticate`].
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lockout.
    pub max_attempts: u32,

    /// How long the account stays locked once the threshold is reached.
    pub lockout_minutes: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

/// Outcome of one authentication attempt.
///
/// Identifier and password mismatches are deliberately indistinguishable so
/// a caller cannot enumerate valid identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAttempt {
    Success,
    InvalidCredentials,
    Locked { until: DateTime<Utc> },
}

/// Outcome of a password-change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChange {
    Changed,
    /// The supplied current password did not match; not an error.
    WrongPassword,
    Rejected(PasswordPolicyError),
}

/// Owns the single persisted [`AdminCredentialRecord`] and every mutation of
/// it. All mutating operations persist the full record immediately.
pub struct CredentialStore {
    storage: Box<dyn CredentialStorage>,
    record: AdminCredentialRecord,
    iterations: u32,
    lockout: LockoutPolicy,
}

impl CredentialStore {
    /// Load the record from `storage`, creating it on first access.
    ///
    /// When a new record is created, the generated plaintext password is
    /// returned exactly once for the caller's disclosure channel; it is not
    /// recoverable afterwards.
    pub fn open(
        storage: Box<dyn CredentialStorage>,
        iterations: u32,
        lockout: LockoutPolicy,
    ) -> Result<(Self, Option<InitialCredentials>)> {
        if let Some(record) = storage.load().context("Failed to load admin credentials")? {
            return Ok((
                Self {
                    storage,
                    record,
                    iterations,
                    lockout,
                },
                None,
            ));
        }

        let initial_password = generate_password(GENERATED_PASSWORD_LENGTH);
        let record = AdminCredentialRecord::new(
            DEFAULT_USERNAME,
            DEFAULT_EMAIL,
            hash_password(&initial_password, iterations),
        );

        storage
            .save(&record)
            .context("Failed to persist initial admin credentials")?;
        info!("Created initial admin credential record");

        let disclosure = InitialCredentials {
            username: record.username.clone(),
            password: initial_password,
        };

        Ok((
            Self {
                storage,
                record,
                iterations,
                lockout,
            },
            Some(disclosure),
        ))
    }

    #[must_use]
    pub fn record(&self) -> &AdminCredentialRecord {
        &self.record
    }

    /// Authenticate `identifier`/`password` against the stored record.
    ///
    /// An active lockout short-circuits without consuming an attempt; an
    /// elapsed lockout auto-clears before the credentials are evaluated.
    pub fn authenticate(&mut self, identifier: &str, password: &str) -> Result<LoginAttempt> {
        self.authenticate_at(identifier, password, Utc::now())
    }

    fn authenticate_at(
        &mut self,
        identifier: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginAttempt> {
        if let Some(until) = self.record.locked_until {
            if now < until {
                return Ok(LoginAttempt::Locked { until });
            }
            // Lockout window has elapsed: unlock and start counting fresh.
            self.record.locked_until = None;
            self.record.failed_attempts = 0;
            self.persist_best_effort();
        }

        if !self.record.matches_identifier(identifier) {
            self.record_failed_attempt(now);
            return Ok(LoginAttempt::InvalidCredentials);
        }

        if !verify_password(password, &self.record.password_hash) {
            self.record_failed_attempt(now);
            return Ok(LoginAttempt::InvalidCredentials);
        }

        let snapshot = self.record.clone();
        self.record.failed_attempts = 0;
        self.record.locked_until = None;
        self.record.last_login = Some(now);

        if let Err(e) = self.storage.save(&self.record) {
            // A login whose bookkeeping could not be written is not reported
            // as a success; restore the pre-attempt state.
            self.record = snapshot;
            return Err(e).context("Failed to persist credentials after successful login");
        }

        info!("Admin authentication succeeded");
        Ok(LoginAttempt::Success)
    }

    /// Change the admin password after verifying the current one and
    /// checking the new one against the strength policy.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<PasswordChange> {
        if !verify_password(old_password, &self.record.password_hash) {
            warn!("Password change rejected: current password mismatch");
            return Ok(PasswordChange::WrongPassword);
        }

        if let Err(reason) = password::validate_strength(new_password) {
            return Ok(PasswordChange::Rejected(reason));
        }

        let snapshot = self.record.clone();
        self.record.password_hash = hash_password(new_password, self.iterations);
        self.record.last_password_change = Utc::now();
        self.record.require_password_change = false;

        if let Err(e) = self.storage.save(&self.record) {
            self.record = snapshot;
            return Err(e).context("Failed to persist changed password");
        }

        info!("Admin password changed");
        Ok(PasswordChange::Changed)
    }

    fn record_failed_attempt(&mut self, now: DateTime<Utc>) {
        self.record.failed_attempts += 1;
        warn!(
            failed_attempts = self.record.failed_attempts,
            "Failed admin login attempt"
        );

        if self.record.failed_attempts >= self.lockout.max_attempts {
            let until = now + Duration::minutes(self.lockout.lockout_minutes);
            self.record.locked_until = Some(until);
            warn!(%until, "Admin account locked");
        }

        self.persist_best_effort();
    }

    // Bookkeeping writes on the failure path are logged but never mask the
    // authentication outcome.
    fn persist_best_effort(&self) {
        if let Err(e) = self.storage.save(&self.record) {
            error!("Failed to persist credentials: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    const TEST_ITERATIONS: u32 = 1_000;

    /// In-memory stand-in for the file storage, with a switchable failure mode.
    #[derive(Default)]
    struct MemoryStorage {
        record: RefCell<Option<AdminCredentialRecord>>,
        fail_saves: Cell<bool>,
    }

    impl CredentialStorage for std::rc::Rc<MemoryStorage> {
        fn load(&self) -> Result<Option<AdminCredentialRecord>> {
            Ok(self.record.borrow().clone())
        }

        fn save(&self, record: &AdminCredentialRecord) -> Result<()> {
            if self.fail_saves.get() {
                anyhow::bail!("disk full");
            }
            *self.record.borrow_mut() = Some(record.clone());
            Ok(())
        }
    }

    fn open_fresh() -> (CredentialStore, InitialCredentials, std::rc::Rc<MemoryStorage>) {
        let backing = std::rc::Rc::new(MemoryStorage::default());
        let (store, disclosure) = CredentialStore::open(
            Box::new(backing.clone()),
            TEST_ITERATIONS,
            LockoutPolicy::default(),
        )
        .unwrap();
        (store, disclosure.expect("fresh store must disclose a password"), backing)
    }

    #[test]
    fn test_first_open_creates_and_discloses() {
        let (store, disclosure, backing) = open_fresh();

        assert_eq!(disclosure.username, "admin");
        assert_eq!(disclosure.password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(store.record().require_password_change);
        assert!(backing.record.borrow().is_some());
    }

    #[test]
    fn test_second_open_does_not_disclose() {
        let (_, _, backing) = open_fresh();
        let (_, disclosure) = CredentialStore::open(
            Box::new(backing),
            TEST_ITERATIONS,
            LockoutPolicy::default(),
        )
        .unwrap();
        assert!(disclosure.is_none());
    }

    #[test]
    fn test_authenticate_with_username_and_email() {
        let (mut store, disclosure, _) = open_fresh();

        assert_eq!(
            store.authenticate("ADMIN", &disclosure.password).unwrap(),
            LoginAttempt::Success
        );
        assert_eq!(
            store
                .authenticate("admin@medicalpractice.local", &disclosure.password)
                .unwrap(),
            LoginAttempt::Success
        );
        assert!(store.record().last_login.is_some());
    }

    #[test]
    fn test_wrong_identifier_and_wrong_password_are_indistinguishable() {
        let (mut store, disclosure, _) = open_fresh();

        let by_identifier = store.authenticate("nobody", &disclosure.password).unwrap();
        let by_password = store.authenticate("admin", "wrong").unwrap();
        assert_eq!(by_identifier, LoginAttempt::InvalidCredentials);
        assert_eq!(by_password, LoginAttempt::InvalidCredentials);
        assert_eq!(store.record().failed_attempts, 2);
    }

    #[test]
    fn test_success_resets_failure_counter() {
        let (mut store, disclosure, _) = open_fresh();

        store.authenticate("admin", "wrong").unwrap();
        store.authenticate("admin", "wrong").unwrap();
        assert_eq!(store.record().failed_attempts, 2);

        store.authenticate("admin", &disclosure.password).unwrap();
        assert_eq!(store.record().failed_attempts, 0);
        assert!(store.record().locked_until.is_none());
    }

    #[test]
    fn test_lockout_after_max_attempts() {
        let (mut store, disclosure, _) = open_fresh();

        for _ in 0..5 {
            assert_eq!(
                store.authenticate("admin", "wrong").unwrap(),
                LoginAttempt::InvalidCredentials
            );
        }
        assert!(store.record().locked_until.is_some());

        // Even the correct password is refused while locked, and the
        // refusal does not consume another attempt.
        let outcome = store.authenticate("admin", &disclosure.password).unwrap();
        assert!(matches!(outcome, LoginAttempt::Locked { .. }));
        assert_eq!(store.record().failed_attempts, 5);
    }

    #[test]
    fn test_lockout_auto_clears_after_window() {
        let (mut store, disclosure, _) = open_fresh();
        let now = Utc::now();

        for _ in 0..5 {
            store.authenticate_at("admin", "wrong", now).unwrap();
        }
        let after_window = now + Duration::minutes(16);

        let outcome = store
            .authenticate_at("admin", &disclosure.password, after_window)
            .unwrap();
        assert_eq!(outcome, LoginAttempt::Success);
        assert_eq!(store.record().failed_attempts, 0);
        assert!(store.record().locked_until.is_none());
    }

    #[test]
    fn test_elapsed_lockout_evaluates_bad_credentials_normally() {
        let (mut store, _, _) = open_fresh();
        let now = Utc::now();

        for _ in 0..5 {
            store.authenticate_at("admin", "wrong", now).unwrap();
        }

        let after_window = now + Duration::minutes(16);
        let outcome = store.authenticate_at("admin", "wrong", after_window).unwrap();
        assert_eq!(outcome, LoginAttempt::InvalidCredentials);
        // Counter restarted from the unlock, so this is the first failure.
        assert_eq!(store.record().failed_attempts, 1);
    }

    #[test]
    fn test_persist_failure_on_success_path_rolls_back() {
        let (mut store, disclosure, backing) = open_fresh();
        store.authenticate("admin", "wrong").unwrap();

        backing.fail_saves.set(true);
        let result = store.authenticate("admin", &disclosure.password);
        assert!(result.is_err());

        // In-memory state matches the pre-attempt record.
        assert_eq!(store.record().failed_attempts, 1);
        assert!(store.record().last_login.is_none());

        backing.fail_saves.set(false);
        assert_eq!(
            store.authenticate("admin", &disclosure.password).unwrap(),
            LoginAttempt::Success
        );
    }

    #[test]
    fn test_persist_failure_on_failed_attempt_still_reports_invalid_credentials() {
        let (mut store, _, backing) = open_fresh();

        backing.fail_saves.set(true);
        let outcome = store.authenticate("admin", "wrong").unwrap();

        // The bookkeeping write failure is logged, never masks the outcome.
        assert_eq!(outcome, LoginAttempt::InvalidCredentials);
        assert_eq!(store.record().failed_attempts, 1);

        // The backing store still holds the pre-attempt record.
        assert_eq!(backing.record.borrow().as_ref().unwrap().failed_attempts, 0);
    }

    #[test]
    fn test_change_password_happy_path() {
        let (mut store, disclosure, _) = open_fresh();

        let outcome = store
            .change_password(&disclosure.password, "NewSecret123!")
            .unwrap();
        assert_eq!(outcome, PasswordChange::Changed);
        assert!(!store.record().require_password_change);

        assert_eq!(
            store.authenticate("admin", "NewSecret123!").unwrap(),
            LoginAttempt::Success
        );
        assert_eq!(
            store.authenticate("admin", &disclosure.password).unwrap(),
            LoginAttempt::InvalidCredentials
        );
    }

    #[test]
    fn test_change_password_wrong_current_is_not_an_error() {
        let (mut store, _, _) = open_fresh();
        let outcome = store.change_password("wrong", "NewSecret123!").unwrap();
        assert_eq!(outcome, PasswordChange::WrongPassword);
        assert!(store.record().require_password_change);
    }

    #[test]
    fn test_change_password_weak_candidates_leave_hash_untouched() {
        let (mut store, disclosure, _) = open_fresh();
        let original_hash = store.record().password_hash.clone();

        for (candidate, expected) in [
            ("Short1!", PasswordPolicyError::TooShort(12)),
            ("nouppercase123!", PasswordPolicyError::MissingUppercase),
            ("NOLOWERCASE123!", PasswordPolicyError::MissingLowercase),
            ("NoDigitsAtAll!!!", PasswordPolicyError::MissingDigit),
            ("NoSpecials12345", PasswordPolicyError::MissingSpecial),
        ] {
            let outcome = store.change_password(&disclosure.password, candidate).unwrap();
            assert_eq!(outcome, PasswordChange::Rejected(expected));
            assert_eq!(store.record().password_hash, original_hash);
            assert!(store.record().require_password_change);
        }
    }
}
