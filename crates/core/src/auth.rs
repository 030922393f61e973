//! Bearer credential verification.
//!
//! Verification fails closed: a malformed, expired or wrongly signed token,
//! or one without a usable subject, yields no claim at all.

use ballotbox_common::{AppError, AppResult, AuthConfig};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The verified identity of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaim {
    /// Stable identity subject.
    pub subject: String,
}

impl AuthClaim {
    /// Create a claim for `subject`.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Turns a bearer token into a claim.
pub trait CredentialVerifier: Send + Sync {
    /// Verify `token`, returning `None` when it is not acceptable.
    fn verify(&self, token: &str) -> Option<AuthClaim>;
}

/// Registered claims read from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// HS256 JWT verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Create a verifier from the `auth` config section.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.leeway_secs)
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Option<AuthClaim> {
        match decode::<TokenClaims>(token, &self.key, &self.validation) {
            Ok(data) if !data.claims.sub.trim().is_empty() => Some(AuthClaim::new(data.claims.sub)),
            Ok(_) => {
                debug!("Rejected bearer token with empty subject");
                None
            }
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                None
            }
        }
    }
}

/// Require an authenticated caller.
pub fn require_claim(claim: Option<&AuthClaim>) -> AppResult<&AuthClaim> {
    claim.ok_or(AppError::Unauthorized)
}

/// Require the caller to be the owner of a resource.
pub fn authorize_owner(claim: &AuthClaim, owner_id: &str) -> AppResult<()> {
    if claim.subject == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the poll owner may do this".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, exp_offset: i64, secret: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as u64;
        let claims = TokenClaims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let claim = verifier.verify(&token("u1", 600, SECRET)).unwrap();
        assert_eq!(claim.subject, "u1");
    }

    #[test]
    fn test_rejects_expired_token() {
        let verifier = JwtVerifier::new(SECRET, 0);
        assert!(verifier.verify(&token("u1", -600, SECRET)).is_none());
    }

    #[test]
    fn test_rejects_wrong_signature() {
        let verifier = JwtVerifier::new(SECRET, 0);
        assert!(verifier.verify(&token("u1", 600, "other-secret")).is_none());
    }

    #[test]
    fn test_rejects_garbage_and_empty_subject() {
        let verifier = JwtVerifier::new(SECRET, 0);
        assert!(verifier.verify("not-a-jwt").is_none());
        assert!(verifier.verify("").is_none());
        assert!(verifier.verify(&token("  ", 600, SECRET)).is_none());
    }

    #[test]
    fn test_require_claim_and_owner() {
        assert!(matches!(require_claim(None), Err(AppError::Unauthorized)));

        let claim = AuthClaim::new("u1");
        assert_eq!(require_claim(Some(&claim)).unwrap().subject, "u1");
        assert!(authorize_owner(&claim, "u1").is_ok());
        assert!(matches!(
            authorize_owner(&claim, "u2"),
            Err(AppError::Forbidden(_))
        ));
    }
}
