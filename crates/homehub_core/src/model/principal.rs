//! Principal (authenticated user) model.

use crate::model::family::FamilyId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Authenticated user identity.
///
/// Resolved, never mutated, by the access core. `family_id` is `None` for a
/// principal that has not joined a family yet; such a principal is denied
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier, stored lowercase.
    pub email: String,
    pub family_id: Option<FamilyId>,
}

impl Principal {
    pub fn new(email: impl Into<String>, family_id: Option<FamilyId>) -> Self {
        Self {
            email: email.into(),
            family_id,
        }
    }
}

/// Normalizes an email for lookup: trimmed and lowercased.
///
/// Returns `None` when the value does not look like an address.
pub fn normalize_email(value: &str) -> Option<String> {
    let normalized = value.trim().to_ascii_lowercase();
    if EMAIL_RE.is_match(&normalized) {
        Some(normalized)
    } else {
        None
    }
}

/// Log-safe email form: first character of the local part, then `***@domain`.
pub fn redact_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, redact_email};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  A@Fam1.com ").as_deref(),
            Some("a@fam1.com")
        );
    }

    #[test]
    fn normalize_email_rejects_malformed_values() {
        assert_eq!(normalize_email(""), None);
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("two@@signs.com"), None);
        assert_eq!(normalize_email("a@nodot"), None);
    }

    #[test]
    fn redact_email_keeps_only_first_char_and_domain() {
        assert_eq!(redact_email("alice@fam1.com"), "a***@fam1.com");
        assert_eq!(redact_email("garbage"), "***");
    }
}
