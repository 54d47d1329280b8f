//! # JSON Web Key (JWK)
//!
//! A JWK ([RFC7517]) is a JSON representation of a cryptographic key. The
//! counterparty publishes its current signing keys as a JWK Set (JWKS), each
//! entry selected by its `kid`.
//!
//! Only public material is read: RSA keys as a big-endian modulus (`n`) and
//! exponent (`e`), and P-256 keys as affine coordinates (`x`, `y`). All values
//! are unpadded base64url.
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::VerifyingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::jose::jwa::Algorithm;

/// Published JSON Web Key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key identifier.
    #[serde(default)]
    pub kid: String,

    /// Key type.
    pub kty: KeyType,

    /// Use of the key.
    #[serde(rename = "use")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_: Option<KeyUse>,

    /// Algorithm intended for use with the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Elliptic curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// X coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// Cryptographic key type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub enum KeyType {
    /// RSA key pair
    #[default]
    #[serde(rename = "RSA")]
    Rsa,

    /// Elliptic curve key pair
    #[serde(rename = "EC")]
    Ec,

    /// Octet key pair (Edwards curve)
    #[serde(rename = "OKP")]
    Okp,

    /// Octet string
    #[serde(rename = "oct")]
    Oct,

    /// Any key type not listed above
    #[serde(other)]
    Unknown,
}

/// The intended usage of the public key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum KeyUse {
    /// Public key is to be used for signature verification
    #[default]
    #[serde(rename = "sig")]
    Signature,

    /// Public key is to be used for encryption
    #[serde(rename = "enc")]
    Encryption,

    /// Any other usage
    #[serde(other)]
    Other,
}

/// A set of JWKs.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwks {
    /// The set of public key JWKs
    pub keys: Vec<Jwk>,
}

/// Public key usable for signature verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMaterial {
    /// RSA public key (modulus and exponent).
    Rsa(RsaPublicKey),

    /// P-256 curve point.
    P256(VerifyingKey),
}

impl KeyMaterial {
    /// Returns `true` if `alg` belongs to this key's family.
    #[must_use]
    pub const fn accepts(&self, alg: Algorithm) -> bool {
        match self {
            Self::Rsa(_) => alg.is_rsa(),
            Self::P256(_) => matches!(alg, Algorithm::ES256),
        }
    }
}

impl Jwk {
    /// Publish an RSA public key.
    #[must_use]
    pub fn rsa(kid: impl Into<String>, key: &RsaPublicKey) -> Self {
        Self {
            kid: kid.into(),
            kty: KeyType::Rsa,
            use_: Some(KeyUse::Signature),
            alg: Some(Algorithm::RS256.to_string()),
            n: Some(Base64UrlUnpadded::encode_string(&key.n().to_bytes_be())),
            e: Some(Base64UrlUnpadded::encode_string(&key.e().to_bytes_be())),
            ..Self::default()
        }
    }

    /// Publish a P-256 public key.
    #[must_use]
    pub fn p256(kid: impl Into<String>, key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        Self {
            kid: kid.into(),
            kty: KeyType::Ec,
            use_: Some(KeyUse::Signature),
            alg: Some(Algorithm::ES256.to_string()),
            crv: Some("P-256".into()),
            x: point.x().map(|x| Base64UrlUnpadded::encode_string(x)),
            y: point.y().map(|y| Base64UrlUnpadded::encode_string(y)),
            ..Self::default()
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidKeyEncoding {
            kid: self.kid.clone(),
            reason: reason.into(),
        }
    }

    fn member(&self, name: &str, value: Option<&String>) -> Result<Vec<u8>> {
        let value = value.ok_or_else(|| self.invalid(format!("'{name}' is not set")))?;
        Base64UrlUnpadded::decode_vec(value)
            .map_err(|e| self.invalid(format!("issue decoding '{name}': {e}")))
    }
}

/// Build verification key material from a published JWK.
///
/// # Errors
///
/// Returns [`Error::InvalidKeyEncoding`] when the key type is unsupported,
/// its members are missing or malformed, it is published for a use other than
/// signing, or its `alg` is not one this key can verify.
pub fn reconstruct(jwk: &Jwk) -> Result<KeyMaterial> {
    match &jwk.use_ {
        None | Some(KeyUse::Signature) => {}
        Some(other) => return Err(jwk.invalid(format!("not a signing key: use {other:?}"))),
    }

    let material = match jwk.kty {
        KeyType::Rsa => rsa_key(jwk)?,
        KeyType::Ec => p256_key(jwk)?,
        _ => return Err(jwk.invalid(format!("unsupported key type {:?}", jwk.kty))),
    };

    // a declared algorithm must be one we support for this key type
    if let Some(alg) = &jwk.alg {
        match alg.parse::<Algorithm>() {
            Ok(parsed) if material.accepts(parsed) => {}
            _ => return Err(jwk.invalid(format!("algorithm {alg} cannot be used with this key"))),
        }
    }

    Ok(material)
}

fn rsa_key(jwk: &Jwk) -> Result<KeyMaterial> {
    let n = jwk.member("n", jwk.n.as_ref())?;
    let e = jwk.member("e", jwk.e.as_ref())?;
    let e = decode_exponent(&e).map_err(|reason| jwk.invalid(reason))?;

    let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from(u64::from(e)))
        .map_err(|e| jwk.invalid(format!("unusable RSA key: {e}")))?;
    Ok(KeyMaterial::Rsa(key))
}

fn p256_key(jwk: &Jwk) -> Result<KeyMaterial> {
    match jwk.crv.as_deref() {
        Some("P-256") => {}
        other => return Err(jwk.invalid(format!("unsupported curve {other:?}"))),
    }

    let mut x = jwk.member("x", jwk.x.as_ref())?;
    let mut y = jwk.member("y", jwk.y.as_ref())?;
    if x.len() != 32 || y.len() != 32 {
        return Err(jwk.invalid("P-256 coordinates must be 32 bytes"));
    }

    let mut sec1 = vec![0x04]; // uncompressed format
    sec1.append(&mut x);
    sec1.append(&mut y);

    let key = VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| jwk.invalid(format!("point is not on P-256: {e}")))?;
    Ok(KeyMaterial::P256(key))
}

/// Decode a big-endian RSA public exponent.
///
/// Only the 1-byte and 3-byte encodings used by published keys are accepted.
///
/// # Errors
///
/// Returns a description of the problem for any other length.
pub fn decode_exponent(bytes: &[u8]) -> Result<u32, String> {
    match bytes {
        [e] => Ok(u32::from(*e)),
        [a, b, c] => Ok((u32::from(*a) << 16) | (u32::from(*b) << 8) | u32::from(*c)),
        _ => Err(format!("unexpected exponent length {}", bytes.len())),
    }
}
