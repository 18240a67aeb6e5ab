//! Password hashing, generation, and strength validation.
//!
//! Hashes are self-describing strings in the form
//! `pbkdf2_sha256$<iterations>$<salt b64>$<key b64>`, so the iteration count
//! can be raised later without invalidating existing hashes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

const ALGORITHM_TAG: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 32;
const KEY_LEN: usize = 32;

pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Character classes required by both generation and validation.
const GENERATION_SYMBOLS: &[u8] = b"!@#$%^&*";
const POLICY_SYMBOLS: &str = "!@#$%^&*()_+-=";

pub const MIN_PASSWORD_LENGTH: usize = 12;
pub const GENERATED_PASSWORD_LENGTH: usize = 16;

/// A specific way a candidate password fails the strength policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),

    #[error("Password must contain uppercase letters")]
    MissingUppercase,

    #[error("Password must contain lowercase letters")]
    MissingLowercase,

    #[error("Password must contain numbers")]
    MissingDigit,

    #[error("Password must contain special characters")]
    MissingSpecial,
}

/// Hash `password` with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt[..]);

    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);

    format!(
        "{ALGORITHM_TAG}${iterations}${}${}",
        BASE64.encode(salt),
        BASE64.encode(key)
    )
}

/// Verify `password` against a stored hash string.
///
/// Returns `false` for unrecognized algorithm tags and any parse error; a
/// malformed hash must never authenticate, and never panics the caller.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(tag), Some(iter_str), Some(salt_b64), Some(key_b64)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if tag != ALGORITHM_TAG {
        return false;
    }

    let Ok(iterations) = iter_str.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(key)) = (BASE64.decode(salt_b64), BASE64.decode(key_b64)) else {
        return false;
    };

    let mut computed = vec![0u8; key.len().max(1)];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut computed);

    bool::from(computed.ct_eq(&key))
}

/// Generate a random password guaranteed to contain a lowercase letter, an
/// uppercase letter, a digit, and a symbol from the generation set.
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut alphabet = Vec::with_capacity(26 * 2 + 10 + GENERATION_SYMBOLS.len());
    alphabet.extend(b'a'..=b'z');
    alphabet.extend(b'A'..=b'Z');
    alphabet.extend(b'0'..=b'9');
    alphabet.extend_from_slice(GENERATION_SYMBOLS);

    let mut rng = rand::rng();
    loop {
        let password: String = (0..length)
            .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
            .collect();

        let has_lower = password.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = password.bytes().any(|b| b.is_ascii_uppercase());
        let has_digit = password.bytes().any(|b| b.is_ascii_digit());
        let has_symbol = password.bytes().any(|b| GENERATION_SYMBOLS.contains(&b));

        if has_lower && has_upper && has_digit && has_symbol {
            return password;
        }
    }
}

/// Check a candidate password against the change-password strength policy.
pub fn validate_strength(candidate: &str) -> Result<(), PasswordPolicyError> {
    if candidate.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooShort(MIN_PASSWORD_LENGTH));
    }
    if !candidate.chars().any(char::is_uppercase) {
        return Err(PasswordPolicyError::MissingUppercase);
    }
    if !candidate.chars().any(char::is_lowercase) {
        return Err(PasswordPolicyError::MissingLowercase);
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingDigit);
    }
    if !candidate.chars().any(|c| POLICY_SYMBOLS.contains(c)) {
        return Err(PasswordPolicyError::MissingSpecial);
    }
    Ok(())
}
