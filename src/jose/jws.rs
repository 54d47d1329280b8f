//! # JSON Web Signature (JWS)
//!
//! JWS ([RFC7515]) represents content secured with digital signatures using
//! JSON-based data structures. Only the compact serialization is supported:
//!
//! ```text
//! base64url(header) '.' base64url(payload) '.' base64url(signature)
//! ```
//!
//! Splitting and decoding an envelope never checks its signature. Use
//! [`verify`] (or the higher-level functions in [`crate::verify`]) before
//! trusting anything in the payload.
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515

use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::signature::Verifier as _;
use rsa::pkcs1v15;
use rsa::signature::Verifier as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::digest::const_oid::AssociatedOid;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Error, Result};
use crate::jose::jwa::Algorithm;
use crate::jose::jwk::KeyMaterial;
use crate::Signer;

/// Index of the header segment.
pub const HEADER: usize = 0;
/// Index of the payload segment.
pub const PAYLOAD: usize = 1;
/// Index of the signature segment.
pub const SIGNATURE: usize = 2;

/// Represents the JOSE header.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Header {
    /// Digital signature algorithm identifier as per IANA "JSON Web Signature
    /// and Encryption Algorithms" registry. Kept as declared so that
    /// unsupported values can be reported.
    #[serde(default)]
    pub alg: String,

    /// Identifies the key in the counterparty's key set used to sign. A
    /// value that is not a string is treated as absent.
    #[serde(default, deserialize_with = "string_or_none")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Media type of the complete JWS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Certificate chain of the signing key. Carried for inspection only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
}

fn string_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

impl Header {
    /// The declared algorithm, if it is one this crate supports.
    #[must_use]
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.alg.parse().ok()
    }

    /// The declared key identifier, ignoring an empty value.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref().filter(|kid| !kid.is_empty())
    }
}

/// A compact JWS split into its parts. Nothing here has been verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactJws<'a> {
    /// Parsed header.
    pub header: Header,

    /// Encoded header segment.
    header_b64: &'a str,

    /// Encoded payload segment.
    payload_b64: &'a str,

    /// Decoded payload.
    payload: Vec<u8>,

    /// Decoded signature.
    signature: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    /// The bytes covered by the signature: `header '.' payload`.
    #[must_use]
    pub fn signing_input(&self) -> Vec<u8> {
        format!("{}.{}", self.header_b64, self.payload_b64).into_bytes()
    }

    /// Raw signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Decoded payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload into `T` without checking the signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEnvelope`] if the payload is not JSON of the
    /// expected shape.
    pub fn unverified_claims<T: DeserializeOwned>(&self) -> Result<T> {
        decode_json(&self.payload, PAYLOAD)
    }

    /// The encoded header and payload segments.
    #[must_use]
    pub const fn segments(&self) -> (&'a str, &'a str) {
        (self.header_b64, self.payload_b64)
    }
}

/// Split a compact envelope into header, payload and signature.
///
/// All three segments are base64url decoded. Only the header is parsed; the
/// payload is deserialized on demand.
///
/// # Errors
///
/// Returns [`Error::MalformedEnvelope`] unless there are exactly three
/// non-empty segments and the header is a JSON object, and
/// [`Error::InvalidEncoding`] if a segment is not valid base64url.
pub fn split(envelope: &str) -> Result<CompactJws<'_>> {
    let parts = envelope.split('.').collect::<Vec<&str>>();
    if parts.len() != 3 {
        return Err(Error::MalformedEnvelope {
            segment: None,
            reason: format!("expected 3 segments, found {}", parts.len()),
        });
    }
    if let Some(empty) = parts.iter().position(|p| p.is_empty()) {
        return Err(Error::MalformedEnvelope {
            segment: Some(empty),
            reason: "segment is empty".into(),
        });
    }

    let header = decode_json(&decode_segment(parts[HEADER], HEADER)?, HEADER)?;

    let payload = decode_segment(parts[PAYLOAD], PAYLOAD)?;
    let signature = decode_segment(parts[SIGNATURE], SIGNATURE)?;

    Ok(CompactJws {
        header,
        header_b64: parts[HEADER],
        payload_b64: parts[PAYLOAD],
        payload,
        signature,
    })
}

/// Decode an unpadded base64url segment.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] on a bad alphabet or length.
pub fn decode_segment(segment: &str, index: usize) -> Result<Vec<u8>> {
    Base64UrlUnpadded::decode_vec(segment).map_err(|e| Error::InvalidEncoding {
        segment: index,
        reason: e.to_string(),
    })
}

/// Encode bytes as an unpadded base64url segment.
#[must_use]
pub fn encode_segment(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

/// Deserialize a decoded segment. Unknown fields are ignored.
///
/// # Errors
///
/// Returns [`Error::MalformedEnvelope`] if the bytes are not JSON of the
/// expected shape.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8], index: usize) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::MalformedEnvelope {
        segment: Some(index),
        reason: format!("issue deserializing: {e}"),
    })
}

/// Join encoded segments into a compact envelope.
#[must_use]
pub fn join(header: &str, payload: &str, signature: &str) -> String {
    format!("{header}.{payload}.{signature}")
}

/// Encode the provided header and claims and sign, returning a JWT in compact
/// JWS form. The header's `alg` and `kid` are taken from the signer.
///
/// # Errors
///
/// Returns [`Error::SigningFailed`] if serialization or signing fails.
pub fn encode<T>(typ: Option<&str>, claims: &T, signer: &impl Signer) -> Result<String>
where
    T: Serialize,
{
    tracing::debug!("jws::encode");

    let header = Header {
        alg: signer.algorithm().to_string(),
        kid: Some(signer.key_id()),
        typ: typ.map(ToString::to_string),
        ..Header::default()
    };

    let header_enc = encode_segment(&to_json(&header)?);
    let claims_enc = encode_segment(&to_json(claims)?);
    let payload = format!("{header_enc}.{claims_enc}");

    let sig = signer
        .try_sign(payload.as_bytes())
        .map_err(|source| Error::SigningFailed { source })?;

    Ok(format!("{payload}.{}", encode_segment(&sig)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::SigningFailed { source: e.into() })
}

/// Verify the signature of the provided message with the given key and
/// algorithm.
///
/// # Errors
///
/// Will return an error if the algorithm does not belong to the key's family,
/// the signature is malformed, or it does not verify.
pub fn verify(key: &KeyMaterial, alg: Algorithm, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    match (key, alg) {
        (KeyMaterial::Rsa(pk), Algorithm::RS256) => verify_rsa::<Sha256>(pk, msg, sig),
        (KeyMaterial::Rsa(pk), Algorithm::RS384) => verify_rsa::<Sha384>(pk, msg, sig),
        (KeyMaterial::Rsa(pk), Algorithm::RS512) => verify_rsa::<Sha512>(pk, msg, sig),
        (KeyMaterial::P256(vk), Algorithm::ES256) => verify_es256(vk, msg, sig),
        (_, alg) => Err(anyhow!("{alg} cannot be used with this key")),
    }
}

// Verify an RSASSA-PKCS1-v1_5 signature.
fn verify_rsa<D>(key: &rsa::RsaPublicKey, msg: &[u8], sig: &[u8]) -> anyhow::Result<()>
where
    D: Digest + AssociatedOid,
{
    let verifying_key = pkcs1v15::VerifyingKey::<D>::new(key.clone());
    let signature = pkcs1v15::Signature::try_from(sig)
        .map_err(|e| anyhow!("unable to build signature: {e}"))?;

    verifying_key
        .verify(msg, &signature)
        .map_err(|e| anyhow!("unable to verify signature: {e}"))
}

// Verify an ES256 signature (fixed-width r || s).
fn verify_es256(key: &p256::ecdsa::VerifyingKey, msg: &[u8], sig: &[u8]) -> anyhow::Result<()> {
    let signature = p256::ecdsa::Signature::from_slice(sig)
        .map_err(|e| anyhow!("unable to build signature: {e}"))?;

    key.verify(msg, &signature).map_err(|e| anyhow!("unable to verify signature: {e}"))
}

#[cfg(test)]
mod test {
    use assert_let_bind::assert_let;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{SignatureEncoding, Signer as _};
    use rsa::RsaPrivateKey;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    const RSA_KEY: &str = include_str!("../../crates/test-utils/fixtures/counterparty_rsa.pem");

    fn sign_rsa(alg: Algorithm, msg: &[u8]) -> Vec<u8> {
        let key = RsaPrivateKey::from_pkcs8_pem(RSA_KEY).expect("should parse key");
        match alg {
            Algorithm::RS256 => pkcs1v15::SigningKey::<Sha256>::new(key).sign(msg).to_vec(),
            Algorithm::RS384 => pkcs1v15::SigningKey::<Sha384>::new(key).sign(msg).to_vec(),
            Algorithm::RS512 => pkcs1v15::SigningKey::<Sha512>::new(key).sign(msg).to_vec(),
            Algorithm::ES256 => panic!("not an RSA algorithm"),
        }
    }

    fn rsa_key() -> KeyMaterial {
        let key = RsaPrivateKey::from_pkcs8_pem(RSA_KEY).expect("should parse key");
        KeyMaterial::Rsa(key.to_public_key())
    }

    fn envelope(header: &Value, payload: &Value) -> String {
        join(
            &encode_segment(header.to_string().as_bytes()),
            &encode_segment(payload.to_string().as_bytes()),
            &encode_segment(b"not a real signature"),
        )
    }

    #[test]
    fn split_valid() {
        let token = envelope(&json!({"alg": "RS256", "kid": "AB12"}), &json!({"sub": "x"}));
        let jws = split(&token).expect("should split");

        assert_eq!(jws.header.algorithm(), Some(Algorithm::RS256));
        assert_eq!(jws.header.key_id(), Some("AB12"));
        assert_eq!(jws.signature(), b"not a real signature");

        let claims: Value = jws.unverified_claims().expect("should decode");
        assert_eq!(claims["sub"], "x");
        assert_eq!(jws.payload(), br#"{"sub":"x"}"#);

        let (h, p) = jws.segments();
        assert_eq!(jws.signing_input(), format!("{h}.{p}").into_bytes());
    }

    #[test]
    fn split_segment_count() {
        assert_let!(Err(Error::MalformedEnvelope { segment: None, .. }), split("a.b"));
        assert_let!(Err(Error::MalformedEnvelope { segment: None, .. }), split("a.b.c.d"));
        assert_let!(Err(Error::MalformedEnvelope { segment: None, .. }), split(""));
    }

    #[test]
    fn split_empty_segment() {
        let token = envelope(&json!({"alg": "RS256"}), &json!({}));
        let (h, p) = split(&token).expect("should split").segments();
        let token = format!("{h}.{p}.");
        assert_let!(Err(Error::MalformedEnvelope { segment: Some(2), .. }), split(&token));
    }

    #[test]
    fn split_bad_encoding() {
        assert_let!(Err(Error::InvalidEncoding { segment: 0, .. }), split("e30=.e30.c2ln"));
        assert_let!(Err(Error::InvalidEncoding { segment: 1, .. }), split("e30.e3*.c2ln"));
        assert_let!(Err(Error::InvalidEncoding { segment: 2, .. }), split("e30.e30.c2l+"));
    }

    #[test]
    fn split_bad_header() {
        let token = join(&encode_segment(b"not json"), "e30", "c2ln");
        assert_let!(Err(Error::MalformedEnvelope { segment: Some(0), .. }), split(&token));
    }

    #[test]
    fn header_without_kid() {
        let token = envelope(&json!({"alg": "ES256", "kid": ""}), &json!({}));
        let jws = split(&token).expect("should split");
        assert_eq!(jws.header.key_id(), None);
    }

    #[rstest]
    #[case(json!(12))]
    #[case(json!(null))]
    #[case(json!(["AB12"]))]
    #[case(json!({"id": "AB12"}))]
    fn non_string_kid(#[case] kid: Value) {
        let token = envelope(&json!({"alg": "RS256", "kid": kid}), &json!({}));
        let jws = split(&token).expect("should split");
        assert_eq!(jws.header.kid, None);
        assert_eq!(jws.header.key_id(), None);
    }

    #[rstest]
    #[case(Algorithm::RS256)]
    #[case(Algorithm::RS384)]
    #[case(Algorithm::RS512)]
    fn rsa_algorithms(#[case] alg: Algorithm) {
        let msg = b"header.payload";
        let sig = sign_rsa(alg, msg);

        verify(&rsa_key(), alg, msg, &sig).expect("should verify");
        assert!(verify(&rsa_key(), alg, b"header.tampered", &sig).is_err());
    }

    #[rstest]
    #[case(Algorithm::RS256, Algorithm::RS384)]
    #[case(Algorithm::RS256, Algorithm::RS512)]
    #[case(Algorithm::RS384, Algorithm::RS256)]
    #[case(Algorithm::RS512, Algorithm::RS384)]
    fn rsa_digest_mismatch(#[case] signed: Algorithm, #[case] declared: Algorithm) {
        let msg = b"header.payload";
        let sig = sign_rsa(signed, msg);
        assert!(verify(&rsa_key(), declared, msg, &sig).is_err());
    }

    #[test]
    fn rsa_key_rejects_es256() {
        let sig = sign_rsa(Algorithm::RS256, b"msg");
        assert!(verify(&rsa_key(), Algorithm::ES256, b"msg", &sig).is_err());
    }

    #[test]
    fn unknown_fields_ignored() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Partial {
            sub: String,
            count: i64,
        }

        let token = envelope(&json!({"alg": "ES256"}), &json!({"sub": "s", "extra": true}));
        let jws = split(&token).expect("should split");
        let claims: Partial = jws.unverified_claims().expect("should decode");
        assert_eq!(claims.sub, "s");
        assert_eq!(claims.count, 0);
    }
}
