//! Canned keys and envelopes.
//!
//! The counterparty (App Store) signs with the RSA key published as
//! [`COUNTERPARTY_KID`]; the issuer (the app's backend) signs with the P-256
//! key published as [`ISSUER_KID`]. Both public keys appear in [`JWKS`].

use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use storekit_jws::{AuthorizationContext, Jwks};

/// Key id of the counterparty's RSA key.
pub const COUNTERPARTY_KID: &str = "AB12";

/// Key id of the issuer's P-256 key.
pub const ISSUER_KID: &str = "2X9R4HXF34";

/// Issuer id used in authorization fixtures.
pub const ISSUER_ID: &str = "57246542-96fe-1a63-e053-0824d011072a";

/// Bundle id used in authorization fixtures.
pub const BUNDLE_ID: &str = "com.example.testbundleid";

/// PKCS#8 PEM of the counterparty's RSA-2048 key.
pub const COUNTERPARTY_RSA_PEM: &str = include_str!("../fixtures/counterparty_rsa.pem");

/// PKCS#8 PEM of the issuer's P-256 key.
pub const ISSUER_P256_PEM: &str = include_str!("../fixtures/issuer_p256.pem");

/// SEC1 PEM of the issuer's P-256 key.
pub const ISSUER_P256_SEC1_PEM: &str = include_str!("../fixtures/issuer_p256_sec1.pem");

/// Published key set containing both fixture keys.
pub const JWKS: &str = include_str!("../fixtures/jwks.json");

/// Renewal information signed (RS256) by the counterparty key.
pub const RENEWAL_INFO_JWS: &str = include_str!("../fixtures/renewal_info.jws");

/// `originalTransactionId` carried by [`RENEWAL_INFO_JWS`].
pub const ORIGINAL_TRANSACTION_ID: &str = "2000000471230947";

/// The published key set.
///
/// # Panics
///
/// Panics if the fixture is not a valid key set.
#[must_use]
pub fn jwks() -> Jwks {
    serde_json::from_str(JWKS).expect("should deserialize key set")
}

/// The counterparty's private key.
///
/// # Panics
///
/// Panics if the fixture is not a valid PKCS#8 RSA key.
#[must_use]
pub fn counterparty_key() -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(COUNTERPARTY_RSA_PEM).expect("should parse RSA key")
}

/// Authorization context for the issuer's key.
#[must_use]
pub fn issuer_context() -> AuthorizationContext {
    AuthorizationContext {
        key_id: ISSUER_KID.to_string(),
        issuer_id: ISSUER_ID.to_string(),
        bundle_id: BUNDLE_ID.to_string(),
        private_key: ISSUER_P256_PEM.to_string(),
    }
}
