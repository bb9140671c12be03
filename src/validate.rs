// Client-side input checks run before anything is sent to the server.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters outside letters and digits that a password may (and must) use.
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";
pub const PASSWORD_MIN_LEN: usize = 8;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
});

static PASSWORD_CHARSET_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9@$!%*?&]+$").unwrap()
});

/// Whole-string email syntax check: local part, `@`, dotted domain, and a
/// top-level label of at least two letters.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Password strength check.
///
/// A password must be at least eight characters long, contain a lowercase
/// letter, an uppercase letter, a digit and one of `@$!%*?&`, and consist only
/// of those character classes.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LEN
        && PASSWORD_CHARSET_REGEX.is_match(password)
        && password.chars().any(|ch| ch.is_ascii_lowercase())
        && password.chars().any(|ch| ch.is_ascii_uppercase())
        && password.chars().any(|ch| ch.is_ascii_digit())
        && password.chars().any(|ch| PASSWORD_SPECIALS.contains(ch))
}
