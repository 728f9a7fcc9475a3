//! Client-side form checks for the register and login commands.
//!
//! These run before anything goes over the network. The server repeats the
//! length checks; the confirm-password match is client-only.

use events::{PASSWORD_MIN_LEN, USERNAME_MAX_LEN, USERNAME_MIN_LEN, char_len};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Username must be at least 2 characters long")]
    UsernameTooShort,
    #[error("Username must be less than 20 characters")]
    UsernameTooLong,
    #[error("Password must be at least 3 characters long")]
    PasswordTooShort,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

// =============================================================================
// STRENGTH / MATCH INDICATORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

impl Strength {
    /// Fill of the strength bar.
    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            Self::Weak => 33,
            Self::Medium => 66,
            Self::Strong => 100,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Weak => "Weak",
            Self::Medium => "Medium",
            Self::Strong => "Strong",
        }
    }
}

/// Strength by character count. An empty password shows no indicator.
#[must_use]
pub fn password_strength(password: &str) -> Option<Strength> {
    match char_len(password) {
        0 => None,
        1..=3 => Some(Strength::Weak),
        4..=7 => Some(Strength::Medium),
        _ => Some(Strength::Strong),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Confirm field is empty.
    Hidden,
    Valid,
    Invalid,
}

#[must_use]
pub fn password_match(password: &str, confirm: &str) -> MatchState {
    if confirm.is_empty() {
        MatchState::Hidden
    } else if password == confirm {
        MatchState::Valid
    } else {
        MatchState::Invalid
    }
}

/// One-line rendering of both indicators, e.g. `Medium [######    ] 66%  match: ok`.
#[must_use]
pub fn render_indicators(password: &str, confirm: Option<&str>) -> String {
    let mut out = match password_strength(password) {
        Some(strength) => {
            let filled = usize::from(strength.percent()) / 10;
            format!(
                "{:<6} [{}{}] {}%",
                strength.label(),
                "#".repeat(filled),
                " ".repeat(10 - filled),
                strength.percent()
            )
        }
        None => "(no password)".to_owned(),
    };
    match confirm.map(|c| password_match(password, c)) {
        Some(MatchState::Valid) => out.push_str("  match: ok"),
        Some(MatchState::Invalid) => out.push_str("  match: no"),
        Some(MatchState::Hidden) | None => {}
    }
    out
}

// =============================================================================
// VALIDATION
// =============================================================================

fn check_username(username: &str) -> Result<(), FormError> {
    let len = char_len(username);
    if len < USERNAME_MIN_LEN {
        return Err(FormError::UsernameTooShort);
    }
    if len > USERNAME_MAX_LEN {
        return Err(FormError::UsernameTooLong);
    }
    Ok(())
}

/// Check the registration form. Returns the trimmed username.
///
/// # Errors
///
/// Returns the first failing rule, in form order.
pub fn validate_registration(username: &str, password: &str, confirm: &str) -> Result<String, FormError> {
    let username = username.trim();
    check_username(username)?;
    if char_len(password) < PASSWORD_MIN_LEN {
        return Err(FormError::PasswordTooShort);
    }
    if password != confirm {
        return Err(FormError::PasswordMismatch);
    }
    Ok(username.to_owned())
}

/// Check the login form. Only the lower username bound is checked here;
/// the server enforces the rest.
///
/// # Errors
///
/// Returns [`FormError::UsernameTooShort`] or [`FormError::PasswordRequired`].
pub fn validate_login(login: &str, password: &str) -> Result<String, FormError> {
    let login = login.trim();
    if char_len(login) < USERNAME_MIN_LEN {
        return Err(FormError::UsernameTooShort);
    }
    if password.is_empty() {
        return Err(FormError::PasswordRequired);
    }
    Ok(login.to_owned())
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
