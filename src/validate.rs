//! Declarative validation for sign-up and tweet forms.
//!
//! Each form field is described by a [`FieldRule`]; the checks run before
//! anything reaches the store. The relationship managers never validate
//! free text, they only see ids and handles that already passed here.
//!
//! Passwords additionally go through [`check_password_strength`]. Strength
//! problems are reported on `password2`, the confirmation field.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::{ChirpError, Result, levenshtein_distance};

/// Maximum tweet length in characters.
pub const TWEET_MAX_CHARS: usize = 200;

/// Maximum handle length in characters.
pub const HANDLE_MAX_CHARS: usize = 150;

/// Minimum password length in characters.
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Similarity ratio at or above which a password counts as too close to the
/// handle or email.
pub const PASSWORD_MAX_SIMILARITY: f64 = 0.7;

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("handle pattern compiles")
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Constraints on a single form field.
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub min_chars: Option<usize>,
    pub max_chars: Option<usize>,
    pub pattern: Option<&'static Lazy<Regex>>,
    /// Shown when `pattern` does not match.
    pub pattern_hint: &'static str,
}

pub static HANDLE_RULE: FieldRule = FieldRule {
    field: "handle",
    required: true,
    min_chars: None,
    max_chars: Some(HANDLE_MAX_CHARS),
    pattern: Some(&HANDLE_RE),
    pattern_hint: "use only letters, digits and @/./+/-/_",
};

pub static EMAIL_RULE: FieldRule = FieldRule {
    field: "email",
    required: true,
    min_chars: None,
    max_chars: Some(254),
    pattern: Some(&EMAIL_RE),
    pattern_hint: "enter a valid email address",
};

pub static CONTENT_RULE: FieldRule = FieldRule {
    field: "content",
    required: true,
    min_chars: None,
    max_chars: Some(TWEET_MAX_CHARS),
    pattern: None,
    pattern_hint: "",
};

pub static PASSWORD_RULE: FieldRule = FieldRule {
    field: "password1",
    required: true,
    min_chars: None,
    max_chars: Some(128),
    pattern: None,
    pattern_hint: "",
};

pub static CONFIRM_RULE: FieldRule = FieldRule {
    field: "password2",
    required: true,
    min_chars: Some(PASSWORD_MIN_CHARS),
    max_chars: Some(128),
    pattern: None,
    pattern_hint: "",
};

impl FieldRule {
    /// Check a value against this rule. `None` and blank strings count as missing.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the field when a constraint fails.
    pub fn check(&self, value: Option<&str>) -> Result<()> {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            if self.required {
                return Err(ChirpError::validation(self.field, "this field is required"));
            }
            return Ok(());
        };

        let len = value.chars().count();
        if let Some(min) = self.min_chars {
            if len < min {
                return Err(ChirpError::validation(
                    self.field,
                    format!("too short, it must contain at least {min} characters"),
                ));
            }
        }

        if let Some(max) = self.max_chars {
            if len > max {
                return Err(ChirpError::validation(
                    self.field,
                    format!("must be at most {max} characters (it has {len})"),
                ));
            }
        }

        if let Some(pattern) = self.pattern {
            if !pattern.is_match(value) {
                return Err(ChirpError::validation(self.field, self.pattern_hint));
            }
        }

        Ok(())
    }
}

/// Trimmed NFKC form of a handle, used for lookups. Does not validate.
#[must_use]
pub fn canonical_handle(raw: &str) -> String {
    raw.trim().nfkc().collect()
}

/// Normalize a handle (NFKC, trimmed) and validate it.
///
/// # Errors
///
/// Returns `Validation` if the normalized handle breaks [`HANDLE_RULE`].
pub fn normalize_handle(raw: &str) -> Result<String> {
    let handle = canonical_handle(raw);
    HANDLE_RULE.check(Some(&handle))?;
    Ok(handle)
}

/// Validate an email address and return it trimmed.
///
/// # Errors
///
/// Returns `Validation` if the email is blank or malformed.
pub fn validate_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    EMAIL_RULE.check(Some(email))?;
    Ok(email.to_string())
}

/// 1.0 for equal strings, falling toward 0.0 as the edit distance grows.
#[allow(clippy::cast_precision_loss)]
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

/// The attribute itself plus its pieces split on non-word characters, so
/// `alice.smith@example.com` also yields `alice`, `smith` and `example`.
fn attribute_parts(value: &str) -> Vec<String> {
    let lower = value.to_lowercase();
    let mut parts: Vec<String> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    parts.push(lower);
    parts
}

/// Reject passwords that are too close to the user's own details or that
/// are entirely digits. Length is checked by [`CONFIRM_RULE`].
///
/// # Errors
///
/// Returns `Validation` on `password2` naming the first failed check.
pub fn check_password_strength(password: &str, handle: &str, email: &str) -> Result<()> {
    let lower = password.to_lowercase();
    for (attribute, value) in [("handle", handle), ("email", email)] {
        if attribute_parts(value)
            .iter()
            .any(|part| similarity(&lower, part) >= PASSWORD_MAX_SIMILARITY)
        {
            return Err(ChirpError::validation(
                "password2",
                format!("the password is too similar to the {attribute}"),
            ));
        }
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ChirpError::validation(
            "password2",
            "the password is entirely numeric",
        ));
    }

    Ok(())
}

/// Sign-up form as submitted: handle, email and the password typed twice.
#[derive(Debug, Clone, Copy)]
pub struct SignupForm<'a> {
    pub handle: &'a str,
    pub email: &'a str,
    pub password1: &'a str,
    pub password2: &'a str,
}

/// A sign-up form that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub handle: String,
    pub email: String,
    pub password: String,
}

impl SignupForm<'_> {
    /// Run the field rules, the confirmation match and the strength checks.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the first field that failed.
    pub fn validate(&self) -> Result<NewUser> {
        let handle = normalize_handle(self.handle)?;
        let email = validate_email(self.email)?;
        PASSWORD_RULE.check(Some(self.password1))?;
        if self.password2.trim().is_empty() {
            return Err(ChirpError::validation(
                CONFIRM_RULE.field,
                "this field is required",
            ));
        }
        if self.password1 != self.password2 {
            return Err(ChirpError::validation(
                "password2",
                "the two password fields didn't match",
            ));
        }
        CONFIRM_RULE.check(Some(self.password2))?;
        check_password_strength(self.password2, &handle, &email)?;

        Ok(NewUser {
            handle,
            email,
            password: self.password1.to_string(),
        })
    }
}

/// Validate tweet content and return it trimmed.
///
/// # Errors
///
/// Returns `Validation` if the content is blank or longer than
/// [`TWEET_MAX_CHARS`] after trimming.
pub fn validate_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    CONTENT_RULE.check(Some(content))?;
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: &ChirpError) -> &'static str {
        match err {
            ChirpError::Validation { field, .. } => *field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn handle_is_nfkc_normalized() {
        // Fullwidth letters fold to ASCII.
        assert_eq!(normalize_handle(" ａｌｉｃｅ ").unwrap(), "alice");
        assert_eq!(normalize_handle("bob.smith+1").unwrap(), "bob.smith+1");
    }

    #[test]
    fn handle_rejects_blank_and_spaces() {
        assert_eq!(field_of(&normalize_handle("   ").unwrap_err()), "handle");
        assert_eq!(field_of(&normalize_handle("bad handle").unwrap_err()), "handle");
        assert_eq!(field_of(&normalize_handle("a/b").unwrap_err()), "handle");
    }

    #[test]
    fn handle_length_limit() {
        assert!(normalize_handle(&"a".repeat(HANDLE_MAX_CHARS)).is_ok());
        assert!(normalize_handle(&"a".repeat(HANDLE_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn email_is_required_and_checked() {
        assert_eq!(field_of(&validate_email("  ").unwrap_err()), "email");
        assert_eq!(validate_email(" a@example.com ").unwrap(), "a@example.com");
        assert_eq!(field_of(&validate_email("tests5icloud.com").unwrap_err()), "email");
    }

    fn form<'a>(handle: &'a str, password1: &'a str, password2: &'a str) -> SignupForm<'a> {
        SignupForm {
            handle,
            email: "tests7@icloud.com",
            password1,
            password2,
        }
    }

    fn reason_of(err: &ChirpError) -> String {
        match err {
            ChirpError::Validation { reason, .. } => reason.clone(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn signup_form_accepts_a_good_password() {
        let user = form("testuser", "QAz105edc", "QAz105edc").validate().unwrap();
        assert_eq!(user.handle, "testuser");
        assert_eq!(user.email, "tests7@icloud.com");
        assert_eq!(user.password, "QAz105edc");
    }

    #[test]
    fn signup_form_requires_every_field() {
        let empty = SignupForm {
            handle: "",
            email: "",
            password1: "",
            password2: "",
        };
        assert_eq!(field_of(&empty.validate().unwrap_err()), "handle");

        let no_email = SignupForm {
            email: "",
            ..form("testuser", "QAz105edc", "QAz105edc")
        };
        assert_eq!(field_of(&no_email.validate().unwrap_err()), "email");

        let err = form("testuser", "", "").validate().unwrap_err();
        assert_eq!(field_of(&err), "password1");
        assert_eq!(reason_of(&err), "this field is required");

        let err = form("testuser", "QAz105edc", " ").validate().unwrap_err();
        assert_eq!(field_of(&err), "password2");
        assert_eq!(reason_of(&err), "this field is required");
    }

    #[test]
    fn signup_form_rejects_short_password() {
        let err = form("testuser", "a1B", "a1B").validate().unwrap_err();
        assert_eq!(field_of(&err), "password2");
        assert!(reason_of(&err).contains("at least 8 characters"));
    }

    #[test]
    fn signup_form_rejects_password_like_handle() {
        let err = form("takedabc", "takedabc", "takedabc").validate().unwrap_err();
        assert_eq!(field_of(&err), "password2");
        assert_eq!(reason_of(&err), "the password is too similar to the handle");

        // One edit away from the handle is still too close.
        let err = form("takedabc", "takedabd", "takedabd").validate().unwrap_err();
        assert!(reason_of(&err).contains("handle"));
    }

    #[test]
    fn signup_form_rejects_password_like_email() {
        let user = SignupForm {
            email: "qaz105edc@example.com",
            ..form("testuser", "QAz105edc", "QAz105edc")
        };
        let err = user.validate().unwrap_err();
        assert_eq!(reason_of(&err), "the password is too similar to the email");
    }

    #[test]
    fn signup_form_rejects_numeric_password() {
        let err = form("testuser", "12481632", "12481632").validate().unwrap_err();
        assert_eq!(field_of(&err), "password2");
        assert_eq!(reason_of(&err), "the password is entirely numeric");
    }

    #[test]
    fn signup_form_rejects_mismatch() {
        let err = form("testuser", "Qaz105edc", "Qaz105eee").validate().unwrap_err();
        assert_eq!(field_of(&err), "password2");
        assert_eq!(reason_of(&err), "the two password fields didn't match");
    }

    #[test]
    fn content_limit_counts_characters() {
        assert!(validate_content(&"あ".repeat(TWEET_MAX_CHARS)).is_ok());
        let err = validate_content(&"a".repeat(500)).unwrap_err();
        assert_eq!(field_of(&err), "content");
        assert!(err.to_string().contains("it has 500"));
    }

    #[test]
    fn content_is_required() {
        assert_eq!(field_of(&validate_content("").unwrap_err()), "content");
        assert_eq!(field_of(&validate_content(" \n ").unwrap_err()), "content");
        assert_eq!(validate_content("  hi  ").unwrap(), "hi");
    }
}
