//! HS256 JWT verification and issuance.
//!
//! The identity carried by a token is an email, read from the configured
//! claim (`sub` unless configured otherwise).

use super::credential::CredentialError;
use super::TokenVerifier;
use crate::config::AuthConfig;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Registered claims decoded into dedicated fields; none of them can carry
/// the principal identity.
pub const RESERVED_IDENTITY_CLAIMS: &[&str] = &["iss", "aud", "exp", "iat", "nbf"];

pub fn is_reserved_identity_claim(claim: &str) -> bool {
    RESERVED_IDENTITY_CLAIMS.contains(&claim)
}

/// Token minting failures.
#[derive(Debug)]
pub enum TokenIssueError {
    /// `now + ttl` does not fit in a unix timestamp.
    ExpiryOverflow { ttl_secs: u64 },
    ReservedIdentityClaim(String),
    Encode(jsonwebtoken::errors::Error),
}

impl Display for TokenIssueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpiryOverflow { ttl_secs } => {
                write!(f, "token ttl of {ttl_secs}s overflows the expiry timestamp")
            }
            Self::ReservedIdentityClaim(claim) => {
                write!(f, "`{claim}` is a registered claim and cannot carry the identity")
            }
            Self::Encode(err) => write!(f, "failed to encode token: {err}"),
        }
    }
}

impl Error for TokenIssueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::ExpiryOverflow { .. } | Self::ReservedIdentityClaim(_) => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenIssueError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Encode(value)
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (usually the principal email)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<StringOrVec>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// String or array of strings (for audience claim)
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

/// JWT verifier bound to one shared secret.
pub struct JwtVerifier {
    secret: String,
    issuer: Option<String>,
    audience: Option<String>,
    identity_claim: String,
    token_ttl_secs: u64,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            audience: None,
            identity_claim: "sub".to_string(),
            token_ttl_secs: 3600,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            identity_claim: config.identity_claim.clone(),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_identity_claim(mut self, claim: impl Into<String>) -> Self {
        self.identity_claim = claim.into();
        self
    }

    pub fn with_token_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.token_ttl_secs = ttl_secs;
        self
    }

    /// Mints a token asserting `email`, valid for the configured TTL.
    pub fn issue(&self, email: &str) -> Result<String, TokenIssueError> {
        if is_reserved_identity_claim(&self.identity_claim) {
            return Err(TokenIssueError::ReservedIdentityClaim(self.identity_claim.clone()));
        }
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let exp = now
            .checked_add(self.token_ttl_secs)
            .filter(|exp| i64::try_from(*exp).is_ok())
            .ok_or(TokenIssueError::ExpiryOverflow {
                ttl_secs: self.token_ttl_secs,
            })?;
        let mut claims = Claims {
            sub: None,
            iss: self.issuer.clone(),
            aud: self.audience.clone().map(StringOrVec::String),
            exp,
            iat: Some(now),
            extra: HashMap::new(),
        };
        if self.identity_claim == "sub" {
            claims.sub = Some(email.to_string());
        } else {
            claims.extra.insert(
                self.identity_claim.clone(),
                serde_json::Value::String(email.to_string()),
            );
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        match &self.issuer {
            Some(iss) => validation.set_issuer(&[iss]),
            None => validation.iss = None,
        }
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation
    }

    fn extract_identity(&self, claims: &Claims) -> Option<String> {
        if self.identity_claim == "sub" {
            return claims.sub.clone();
        }

        match claims.extra.get(&self.identity_claim) {
            Some(serde_json::Value::String(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, CredentialError> {
        if self.secret.is_empty() {
            return Err(CredentialError::Rejected(
                "no secret configured for token verification".to_string(),
            ));
        }
        if is_reserved_identity_claim(&self.identity_claim) {
            return Err(CredentialError::Rejected(format!(
                "`{}` cannot carry the principal identity",
                self.identity_claim
            )));
        }

        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let token_data = decode::<Claims>(token, &key, &self.validation())
            .map_err(|err| CredentialError::Rejected(err.to_string()))?;

        self.extract_identity(&token_data.claims)
            .filter(|identity| !identity.trim().is_empty())
            .ok_or_else(|| {
                CredentialError::Rejected(format!(
                    "token has no `{}` identity claim",
                    self.identity_claim
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Claims, JwtVerifier, TokenIssueError};
    use crate::auth::credential::CredentialError;
    use crate::auth::TokenVerifier;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::collections::HashMap;

    #[test]
    fn issued_token_verifies_to_same_email() {
        let verifier = JwtVerifier::new("s3cret");
        let token = verifier.issue("a@fam1.com").expect("issue token");
        assert_eq!(verifier.verify(&token).expect("verify"), "a@fam1.com");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = JwtVerifier::new("other").issue("a@fam1.com").expect("issue");
        let err = JwtVerifier::new("s3cret").verify(&token).expect_err("bad signature");
        assert!(matches!(err, CredentialError::Rejected(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: Some("a@fam1.com".to_string()),
            iss: None,
            aud: None,
            exp: (Utc::now().timestamp() - 3600) as u64,
            iat: None,
            extra: HashMap::new(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .expect("encode");
        assert!(JwtVerifier::new("s3cret").verify(&token).is_err());
    }

    #[test]
    fn issuer_and_audience_must_match_when_configured() {
        let issuer = JwtVerifier::new("s3cret")
            .with_issuer("homehub")
            .with_audience("devices");
        let token = issuer.issue("a@fam1.com").expect("issue");
        assert!(issuer.verify(&token).is_ok());

        let strict = JwtVerifier::new("s3cret").with_issuer("someone-else");
        assert!(strict.verify(&token).is_err());
    }

    #[test]
    fn custom_identity_claim_is_used() {
        let verifier = JwtVerifier::new("s3cret").with_identity_claim("email");
        let token = verifier.issue("b@fam2.com").expect("issue");
        assert_eq!(verifier.verify(&token).expect("verify"), "b@fam2.com");

        let sub_only = JwtVerifier::new("s3cret").issue("b@fam2.com").expect("issue");
        assert!(verifier.verify(&sub_only).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(JwtVerifier::new("s3cret").verify("not-a-jwt").is_err());
    }

    #[test]
    fn oversized_ttl_fails_issuance_instead_of_overflowing() {
        let verifier = JwtVerifier::new("s3cret").with_token_ttl_secs(u64::MAX);
        let err = verifier.issue("a@fam1.com").expect_err("ttl overflow");
        assert!(matches!(
            err,
            TokenIssueError::ExpiryOverflow { ttl_secs } if ttl_secs == u64::MAX
        ));
    }

    #[test]
    fn registered_claim_cannot_be_identity_claim() {
        for claim in ["iss", "aud", "exp", "iat", "nbf"] {
            let verifier = JwtVerifier::new("s3cret")
                .with_issuer("homehub")
                .with_identity_claim(claim);
            let err = verifier.issue("a@fam1.com").expect_err("reserved claim");
            assert!(matches!(err, TokenIssueError::ReservedIdentityClaim(_)));

            let token = JwtVerifier::new("s3cret")
                .with_issuer("homehub")
                .issue("a@fam1.com")
                .expect("issue");
            let err = verifier.verify(&token).expect_err("reserved claim");
            assert!(matches!(err, CredentialError::Rejected(message) if message.contains(claim)));
        }
    }
}
