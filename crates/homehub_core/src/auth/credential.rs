//! Header credential parsing.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons a credential is rejected before or during verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    Missing,
    /// Credential does not start with `<scheme> `.
    MissingScheme { expected: String },
    /// Scheme prefix present but no token after it.
    EmptyToken,
    /// Verifier refused the token.
    Rejected(String),
}

impl Display for CredentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "credential is missing"),
            Self::MissingScheme { expected } => {
                write!(f, "credential must start with `{expected} `")
            }
            Self::EmptyToken => write!(f, "credential token is empty"),
            Self::Rejected(reason) => write!(f, "token rejected: {reason}"),
        }
    }
}

impl Error for CredentialError {}

/// Strips `<scheme> ` from a header value and returns the bare token.
///
/// Scheme matching is case-insensitive; the token itself is returned as-is
/// after trimming surrounding whitespace.
pub fn strip_scheme<'a>(
    credential: Option<&'a str>,
    scheme: &str,
) -> Result<&'a str, CredentialError> {
    let value = credential.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(CredentialError::Missing);
    }

    let (head, rest) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
    if !head.eq_ignore_ascii_case(scheme) {
        return Err(CredentialError::MissingScheme {
            expected: scheme.to_string(),
        });
    }

    let token = rest.trim();
    if token.is_empty() {
        return Err(CredentialError::EmptyToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::{strip_scheme, CredentialError};

    #[test]
    fn strips_bearer_prefix() {
        assert_eq!(strip_scheme(Some("Bearer abc.def"), "Bearer"), Ok("abc.def"));
        assert_eq!(strip_scheme(Some("bearer  abc "), "Bearer"), Ok("abc"));
    }

    #[test]
    fn rejects_missing_or_empty_credentials() {
        assert_eq!(strip_scheme(None, "Bearer"), Err(CredentialError::Missing));
        assert_eq!(strip_scheme(Some("   "), "Bearer"), Err(CredentialError::Missing));
        assert_eq!(
            strip_scheme(Some("Bearer "), "Bearer"),
            Err(CredentialError::EmptyToken)
        );
        assert_eq!(
            strip_scheme(Some("Bearer"), "Bearer"),
            Err(CredentialError::EmptyToken)
        );
    }

    #[test]
    fn rejects_credentials_without_scheme() {
        let err = strip_scheme(Some("abc.def.ghi"), "Bearer").expect_err("no scheme");
        assert_eq!(
            err,
            CredentialError::MissingScheme {
                expected: "Bearer".to_string()
            }
        );
        let err = strip_scheme(Some("Basic dXNlcg=="), "Bearer").expect_err("wrong scheme");
        assert!(matches!(err, CredentialError::MissingScheme { .. }));
    }
}
