use anyhow::Result;

use crate::models::AdminCredentialRecord;

pub mod credentials;
pub mod file;

pub use credentials::{CredentialStore, LockoutPolicy, LoginAttempt, PasswordChange};
pub use file::FileCredentialStorage;

/// File-like storage seam for the single credential record.
///
/// Implementations must restrict the backing location to the owning user;
/// write failures surface as errors rather than panics. The core is
/// single-threaded by design, so no `Send`/`Sync` bound is imposed; a
/// multi-threaded host serializes access around the whole service.
pub trait CredentialStorage {
    /// Load the record, or `None` if no record has been created yet.
    fn load(&self) -> Result<Option<AdminCredentialRecord>>;

    /// Persist the full record, replacing any previous contents.
    fn save(&self, record: &AdminCredentialRecord) -> Result<()>;
}
