//! Account service: registration, credential checks, avatar colors.
//!
//! DESIGN
//! ======
//! Accounts live in `AppState::accounts`, keyed by username. Passwords are
//! stored as hex SHA-256 of a per-account random salt followed by the
//! password. A login string containing `@` is treated as an email address;
//! usernames may not contain `@` so the two never collide.

use std::fmt::Write;

use events::{PASSWORD_MIN_LEN, RegisterRequest, USERNAME_MAX_LEN, USERNAME_MIN_LEN, char_len};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::services::clock;
use crate::state::{Account, AppState};

/// Palette avatar colors are drawn from.
pub const AVATAR_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
];

// =============================================================================
// TYPES
// =============================================================================

/// Display text is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Username must be at least 2 characters long")]
    UsernameTooShort,
    #[error("Username must be less than 20 characters")]
    UsernameTooLong,
    #[error("Username cannot contain '@'")]
    UsernameHasAt,
    #[error("Password must be at least 3 characters long")]
    PasswordTooShort,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
}

// =============================================================================
// AVATARS
// =============================================================================

/// Stable avatar color for a username.
#[must_use]
pub fn avatar_color(username: &str) -> &'static str {
    let digest = Sha256::digest(username.as_bytes());
    AVATAR_COLORS[usize::from(digest[0]) % AVATAR_COLORS.len()]
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Trim and length-check a username. Returns the trimmed form.
///
/// # Errors
///
/// Returns the matching [`AccountError`] when the username is too short,
/// too long, or contains `@`.
pub fn validate_username(raw: &str) -> Result<String, AccountError> {
    let username = raw.trim();
    let len = char_len(username);
    if len < USERNAME_MIN_LEN {
        return Err(AccountError::UsernameTooShort);
    }
    if len > USERNAME_MAX_LEN {
        return Err(AccountError::UsernameTooLong);
    }
    if username.contains('@') {
        return Err(AccountError::UsernameHasAt);
    }
    Ok(username.to_owned())
}

/// # Errors
///
/// Returns [`AccountError::PasswordTooShort`] below the minimum length.
pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if char_len(password) < PASSWORD_MIN_LEN {
        return Err(AccountError::PasswordTooShort);
    }
    Ok(())
}

/// Blank or missing email is `None`; otherwise lowercased after a shape check.
///
/// # Errors
///
/// Returns [`AccountError::InvalidEmail`] when the address has no local part,
/// no dotted domain, or contains whitespace.
pub fn normalize_email(raw: Option<&str>) -> Result<Option<String>, AccountError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if raw.chars().any(char::is_whitespace) {
        return Err(AccountError::InvalidEmail);
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return Err(AccountError::InvalidEmail);
    };
    let dotted = domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'));
    if local.is_empty() || domain.contains('@') || !dotted {
        return Err(AccountError::InvalidEmail);
    }
    Ok(Some(raw.to_lowercase()))
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Register a new account. Returns the stored (trimmed) username.
///
/// # Errors
///
/// Returns a validation error, [`AccountError::UsernameTaken`], or
/// [`AccountError::EmailTaken`].
pub async fn register(state: &AppState, req: &RegisterRequest) -> Result<String, AccountError> {
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    let email = normalize_email(req.email.as_deref())?;

    let mut accounts = state.accounts.write().await;
    if accounts.contains_key(&username) {
        return Err(AccountError::UsernameTaken);
    }
    if let Some(email) = &email {
        if accounts.values().any(|a| a.email.as_ref() == Some(email)) {
            return Err(AccountError::EmailTaken);
        }
    }

    let salt = generate_salt();
    let password_hash = hash_password(&salt, &req.password);
    let account = Account {
        username: username.clone(),
        email,
        salt,
        password_hash,
        created_at: clock::date_time(clock::now()),
    };
    info!(%username, created_at = %account.created_at, total = accounts.len() + 1, "account registered");
    accounts.insert(username.clone(), account);

    Ok(username)
}

/// Check a login (username or email) and password. Returns the username.
///
/// # Errors
///
/// Returns [`AccountError::InvalidCredentials`] for unknown logins and wrong
/// passwords alike.
pub async fn verify(state: &AppState, login: &str, password: &str) -> Result<String, AccountError> {
    let login = login.trim();
    let accounts = state.accounts.read().await;

    let account = if login.contains('@') {
        let email = login.to_lowercase();
        accounts
            .values()
            .find(|a| a.email.as_deref() == Some(email.as_str()))
    } else {
        accounts.get(login)
    };

    let Some(account) = account else {
        return Err(AccountError::InvalidCredentials);
    };
    if hash_password(&account.salt, password) != account.password_hash {
        return Err(AccountError::InvalidCredentials);
    }
    Ok(account.username.clone())
}

// =============================================================================
// HASHING
// =============================================================================

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
