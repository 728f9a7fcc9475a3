use super::*;
use crate::state::test_helpers;

fn request(username: &str, email: Option<&str>, password: &str) -> RegisterRequest {
    RegisterRequest { username: username.into(), email: email.map(Into::into), password: password.into() }
}

// =============================================================================
// validation
// =============================================================================

#[test]
fn username_is_trimmed_before_length_check() {
    assert_eq!(validate_username("  al  "), Ok("al".to_owned()));
    assert_eq!(validate_username(" a "), Err(AccountError::UsernameTooShort));
}

#[test]
fn username_length_bounds() {
    assert_eq!(validate_username(&"x".repeat(20)).map(|u| u.len()), Ok(20));
    assert_eq!(validate_username(&"x".repeat(21)), Err(AccountError::UsernameTooLong));
}

#[test]
fn username_length_counts_characters() {
    // 20 two-byte characters is still within the limit.
    assert!(validate_username(&"é".repeat(20)).is_ok());
}

#[test]
fn username_rejects_at_sign() {
    assert_eq!(validate_username("al@ce"), Err(AccountError::UsernameHasAt));
}

#[test]
fn password_minimum_length() {
    assert_eq!(validate_password("ab"), Err(AccountError::PasswordTooShort));
    assert_eq!(validate_password("abc"), Ok(()));
}

#[test]
fn error_messages_match_ui_text() {
    assert_eq!(AccountError::UsernameTooShort.to_string(), "Username must be at least 2 characters long");
    assert_eq!(AccountError::UsernameTooLong.to_string(), "Username must be less than 20 characters");
    assert_eq!(AccountError::PasswordTooShort.to_string(), "Password must be at least 3 characters long");
}

#[test]
fn email_normalization() {
    assert_eq!(normalize_email(None), Ok(None));
    assert_eq!(normalize_email(Some("   ")), Ok(None));
    assert_eq!(normalize_email(Some(" Al@Example.COM ")), Ok(Some("al@example.com".to_owned())));
    for bad in ["nobody", "@example.com", "al@example", "al@.com", "al@example.", "a l@example.com", "a@b@c.io"] {
        assert_eq!(normalize_email(Some(bad)), Err(AccountError::InvalidEmail), "{bad:?} should be invalid");
    }
}

// =============================================================================
// avatar colors
// =============================================================================

#[test]
fn avatar_color_is_stable_and_from_palette() {
    let first = avatar_color("alice");
    assert_eq!(first, avatar_color("alice"));
    assert!(AVATAR_COLORS.contains(&first));
}

#[test]
fn avatar_colors_vary_across_names() {
    let names = ["alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy"];
    let distinct: std::collections::HashSet<_> = names.iter().map(|n| avatar_color(n)).collect();
    assert!(distinct.len() > 1);
}

// =============================================================================
// register / verify
// =============================================================================

#[tokio::test]
async fn register_then_verify_by_username() {
    let state = test_helpers::test_app_state();
    let username = register(&state, &request(" alice ", None, "secret")).await.unwrap();
    assert_eq!(username, "alice");

    assert_eq!(verify(&state, "alice", "secret").await, Ok("alice".to_owned()));
    assert_eq!(verify(&state, " alice ", "secret").await, Ok("alice".to_owned()));
}

#[tokio::test]
async fn registration_is_stamped() {
    let state = test_helpers::test_app_state();
    register(&state, &request("alice", None, "secret")).await.unwrap();
    let accounts = state.accounts.read().await;
    let stamp = accounts["alice"].created_at.as_bytes();
    assert_eq!(stamp.len(), "2024-03-07 09:05:01".len());
    assert_eq!((stamp[4], stamp[10], stamp[13]), (b'-', b' ', b':'));
}

#[tokio::test]
async fn verify_rejects_wrong_password_and_unknown_user() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_account(&state, "alice", "secret").await;

    assert_eq!(verify(&state, "alice", "Secret").await, Err(AccountError::InvalidCredentials));
    assert_eq!(verify(&state, "mallory", "secret").await, Err(AccountError::InvalidCredentials));
}

#[tokio::test]
async fn verify_by_email_is_case_insensitive() {
    let state = test_helpers::test_app_state();
    register(&state, &request("alice", Some("Alice@Example.com"), "secret"))
        .await
        .unwrap();

    assert_eq!(verify(&state, "ALICE@example.com", "secret").await, Ok("alice".to_owned()));
}

#[tokio::test]
async fn duplicate_username_rejected() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_account(&state, "alice", "secret").await;
    let err = register(&state, &request("alice", None, "other")).await.unwrap_err();
    assert_eq!(err, AccountError::UsernameTaken);
    assert_eq!(err.to_string(), "Username already exists");
}

#[tokio::test]
async fn duplicate_email_rejected() {
    let state = test_helpers::test_app_state();
    register(&state, &request("alice", Some("a@x.io"), "secret")).await.unwrap();
    let err = register(&state, &request("bob", Some("A@X.io"), "secret")).await.unwrap_err();
    assert_eq!(err, AccountError::EmailTaken);
}

#[tokio::test]
async fn passwords_are_salted_and_not_stored_plain() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_account(&state, "alice", "same").await;
    test_helpers::seed_account(&state, "bob", "same").await;

    let accounts = state.accounts.read().await;
    let alice = &accounts["alice"];
    let bob = &accounts["bob"];
    assert_ne!(alice.password_hash, "same");
    assert_eq!(alice.password_hash.len(), 64);
    assert_ne!(alice.salt, bob.salt);
    assert_ne!(alice.password_hash, bob.password_hash);
}

#[tokio::test]
async fn failed_registration_stores_nothing() {
    let state = test_helpers::test_app_state();
    assert!(register(&state, &request("alice", None, "no")).await.is_err());
    assert!(state.accounts.read().await.is_empty());
}
