//! # Authorization Issuance
//!
//! Mints the ES256 bearer token that authenticates calls to the App Store
//! Server API. Tokens are valid for [`TOKEN_VALIDITY`] and addressed to
//! [`AUDIENCE`].

use std::fmt::{self, Debug};
use std::time::Duration;

use chrono::{DateTime, Utc};
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::claims::AuthorizationClaims;
use crate::error::{Error, Result};
use crate::jose::jwa::Algorithm;
use crate::jose::jwk::Jwk;
use crate::jose::jws;
use crate::Signer;

/// Audience of every authorization token.
pub const AUDIENCE: &str = "appstoreconnect-v1";

/// How long an issued token remains valid.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(30 * 60);

/// Media type of an authorization token.
pub const TOKEN_TYPE: &str = "JWT";

/// Everything needed to issue an authorization token. Supplied per call and
/// never retained.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationContext {
    /// Private key id from App Store Connect (e.g. `2X9R4HXF34`).
    pub key_id: String,

    /// Issuer id from the Keys page in App Store Connect.
    pub issuer_id: String,

    /// Bundle id of the app.
    pub bundle_id: String,

    /// PEM encoded P-256 private key for `key_id`.
    pub private_key: String,
}

impl Debug for AuthorizationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationContext")
            .field("key_id", &self.key_id)
            .field("issuer_id", &self.issuer_id)
            .field("bundle_id", &self.bundle_id)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// Issue a token valid from now.
///
/// # Errors
///
/// Returns [`Error::InvalidPrivateKey`] if the context's key cannot be parsed
/// and [`Error::SigningFailed`] if signing fails.
pub fn issue(ctx: &AuthorizationContext) -> Result<String> {
    issue_at(ctx, Utc::now())
}

/// Issue a token valid from `now`.
///
/// # Errors
///
/// See [`issue`].
#[instrument(level = "debug", skip(ctx), fields(kid = %ctx.key_id))]
pub fn issue_at(ctx: &AuthorizationContext, now: DateTime<Utc>) -> Result<String> {
    tracing::debug!("issue::issue_at");

    let signer = Es256Signer::from_pem(&ctx.private_key, ctx.key_id.clone())?;

    let iat = now.timestamp();
    #[allow(clippy::cast_possible_wrap)]
    let exp = iat + TOKEN_VALIDITY.as_secs() as i64;

    let claims = AuthorizationClaims {
        iss: ctx.issuer_id.clone(),
        iat,
        exp,
        aud: AUDIENCE.to_string(),
        bid: ctx.bundle_id.clone(),
    };

    jws::encode(Some(TOKEN_TYPE), &claims, &signer)
}

/// ES256 [`Signer`] over an in-memory P-256 key.
#[derive(Clone)]
pub struct Es256Signer {
    signing_key: SigningKey,
    key_id: String,
}

impl Debug for Es256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Es256Signer").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

impl Es256Signer {
    /// Wrap a signing key.
    #[must_use]
    pub fn new(signing_key: SigningKey, key_id: impl Into<String>) -> Self {
        Self {
            signing_key,
            key_id: key_id.into(),
        }
    }

    /// Load a PEM encoded P-256 private key, either PKCS#8 (`PRIVATE KEY`) or
    /// SEC1 (`EC PRIVATE KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrivateKey`] if `pem` is neither.
    pub fn from_pem(pem: &str, key_id: impl Into<String>) -> Result<Self> {
        let pem = pem.trim();
        let secret = match SecretKey::from_pkcs8_pem(pem) {
            Ok(secret) => secret,
            Err(pkcs8) => SecretKey::from_sec1_pem(pem).map_err(|sec1| Error::InvalidPrivateKey {
                reason: format!("not a PKCS#8 ({pkcs8}) or SEC1 ({sec1}) P-256 key"),
            })?,
        };
        Ok(Self::new(SigningKey::from(secret), key_id))
    }

    /// Public half of the signing key.
    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The public key as a publishable JWK.
    #[must_use]
    pub fn jwk(&self) -> Jwk {
        Jwk::p256(self.key_id.clone(), self.verifying_key())
    }
}

impl Signer for Es256Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ES256
    }

    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>> {
        let signature: Signature = self.signing_key.try_sign(msg)?;
        Ok(signature.to_vec())
    }
}

#[cfg(test)]
mod test {
    use assert_let_bind::assert_let;
    use chrono::{TimeDelta, TimeZone};
    use rstest::rstest;

    use super::*;
    use crate::claims::ClaimSet;
    use crate::jose::jwk::{self, KeyMaterial};

    const PKCS8: &str = include_str!("../crates/test-utils/fixtures/issuer_p256.pem");
    const SEC1: &str = include_str!("../crates/test-utils/fixtures/issuer_p256_sec1.pem");
    const RSA: &str = include_str!("../crates/test-utils/fixtures/counterparty_rsa.pem");

    fn context(private_key: &str) -> AuthorizationContext {
        AuthorizationContext {
            key_id: "2X9R4HXF34".into(),
            issuer_id: "57246542-96fe-1a63-e053-0824d011072a".into(),
            bundle_id: "com.example.testbundleid".into(),
            private_key: private_key.into(),
        }
    }

    #[rstest]
    #[case(PKCS8)]
    #[case(SEC1)]
    fn issue_claims(#[case] pem: &str) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("should be valid");
        let token = issue_at(&context(pem), now).expect("should issue");

        let jws = jws::split(&token).expect("should split");
        assert_eq!(jws.header.algorithm(), Some(Algorithm::ES256));
        assert_eq!(jws.header.key_id(), Some("2X9R4HXF34"));
        assert_eq!(jws.header.typ.as_deref(), Some("JWT"));

        let claims: AuthorizationClaims = jws.unverified_claims().expect("should decode");
        assert_eq!(claims.iss, "57246542-96fe-1a63-e053-0824d011072a");
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_001_800);
        assert_eq!(claims.audience(), vec![AUDIENCE]);
        assert_eq!(claims.bid, "com.example.testbundleid");

        // signature verifies with the key's public half
        let signer = Es256Signer::from_pem(pem, "2X9R4HXF34").expect("should load");
        let key = jwk::reconstruct(&signer.jwk()).expect("should reconstruct");
        assert_eq!(key, KeyMaterial::P256(signer.verifying_key().clone()));
        jws::verify(&key, Algorithm::ES256, &jws.signing_input(), jws.signature())
            .expect("should verify");
    }

    #[rstest]
    #[case("")]
    #[case("not a key")]
    #[case(RSA)]
    fn invalid_private_key(#[case] pem: &str) {
        assert_let!(Err(Error::InvalidPrivateKey { .. }), issue(&context(pem)));
    }

    #[test]
    fn claims_follow_clock() {
        let ctx = context(PKCS8);
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("should be valid");
        let decode = |token: &str| -> AuthorizationClaims {
            jws::split(token).expect("should split").unverified_claims().expect("should decode")
        };

        // each call is stamped with the instant it is given
        let first = decode(&issue_at(&ctx, now).expect("should issue"));
        let later = decode(&issue_at(&ctx, now + TimeDelta::seconds(90)).expect("should issue"));
        assert_eq!(later.iat - first.iat, 90);
        assert_eq!(later.exp - later.iat, 1800);
        assert!(later.exp > first.exp);

        // the same instant yields the same claims
        let again = decode(&issue_at(&ctx, now).expect("should issue"));
        assert_eq!((again.iat, again.exp), (first.iat, first.exp));
    }

    #[test]
    fn debug_redacts_key() {
        let debug = format!("{:?}", context(PKCS8));
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("PRIVATE KEY"));
    }
}
