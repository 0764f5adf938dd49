//! Identity resolution for bearer credentials.
//!
//! # Responsibility
//! - Strip the configured scheme prefix from a header-carried credential.
//! - Delegate token verification to a [`TokenVerifier`].
//! - Map the verified identity to a stored principal.
//!
//! # Invariants
//! - A malformed credential fails before any verifier or store call.
//! - Token material is never logged.

pub mod credential;
pub mod jwt;

use crate::model::principal::{redact_email, Principal};
use crate::repo::membership_repo::{MembershipStore, RepoError};
use credential::{strip_scheme, CredentialError};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Verifies a raw token and returns the identity it asserts (an email).
pub trait TokenVerifier {
    fn verify(&self, token: &str) -> Result<String, CredentialError>;
}

impl<T: TokenVerifier + ?Sized> TokenVerifier for &T {
    fn verify(&self, token: &str) -> Result<String, CredentialError> {
        (**self).verify(token)
    }
}

/// Identity resolution failures.
#[derive(Debug)]
pub enum IdentityError {
    /// Credential absent, malformed or rejected by verification.
    InvalidCredential(CredentialError),
    /// Verified identity has no stored principal.
    UnknownPrincipal(String),
    /// Store failed while looking the principal up.
    Store(RepoError),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredential(err) => write!(f, "invalid credential: {err}"),
            Self::UnknownPrincipal(email) => {
                write!(f, "unknown principal: {}", redact_email(email))
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCredential(err) => Some(err),
            Self::UnknownPrincipal(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<CredentialError> for IdentityError {
    fn from(value: CredentialError) -> Self {
        Self::InvalidCredential(value)
    }
}

impl From<RepoError> for IdentityError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Resolves the calling principal from a scheme-prefixed credential.
pub struct IdentityResolver<V: TokenVerifier> {
    scheme: String,
    verifier: V,
}

impl<V: TokenVerifier> IdentityResolver<V> {
    pub fn new(scheme: impl Into<String>, verifier: V) -> Self {
        Self {
            scheme: scheme.into(),
            verifier,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Resolves `credential` (e.g. `Bearer <token>`) to a stored principal.
    ///
    /// # Errors
    /// - `InvalidCredential` when the credential is absent, lacks the scheme
    ///   prefix or fails verification.
    /// - `UnknownPrincipal` when the verified email has no stored principal.
    pub fn resolve(
        &self,
        credential: Option<&str>,
        store: &impl MembershipStore,
    ) -> Result<Principal, IdentityError> {
        let token = match strip_scheme(credential, &self.scheme) {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    "event=identity_resolve module=auth status=error error_code=credential_malformed error={err}"
                );
                return Err(err.into());
            }
        };

        let email = match self.verifier.verify(token) {
            Ok(email) => email,
            Err(err) => {
                warn!(
                    "event=identity_resolve module=auth status=error error_code=verification_failed error={err}"
                );
                return Err(err.into());
            }
        };

        match store.lookup_principal(&email)? {
            Some(principal) => {
                debug!(
                    "event=identity_resolve module=auth status=ok principal={}",
                    redact_email(&principal.email)
                );
                Ok(principal)
            }
            None => {
                warn!(
                    "event=identity_resolve module=auth status=error error_code=unknown_principal principal={}",
                    redact_email(&email)
                );
                Err(IdentityError::UnknownPrincipal(email))
            }
        }
    }
}
