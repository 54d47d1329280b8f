//! # Envelope Verification
//!
//! Verifies compact envelopes signed by the App Store and decodes their
//! payload. Verification is a single algorithm parameterised by the claim type:
//!
//! 1. split the envelope and decode its header;
//! 2. resolve the key named by the header's `kid`;
//! 3. check the header's `alg` belongs to the key's family and verify the
//!    signature over `header '.' payload`;
//! 4. decode the payload.
//!
//! Nothing in the payload is looked at before step 3 succeeds. Expiry is not
//! enforced here; see [`ClaimSet::is_expired`].

use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::claims::{ClaimSet, Claims, RenewalInfoClaims, TransactionClaims};
use crate::error::{Error, Result};
use crate::jose::jwk::KeyMaterial;
use crate::jose::jws::{self, CompactJws};
use crate::key_directory::KeyResolver;

/// Verify `compact` and decode its payload as `T`.
///
/// # Errors
///
/// Returns [`Error::MalformedEnvelope`] or [`Error::InvalidEncoding`] for
/// envelopes that cannot be parsed, [`Error::MissingKeyId`] when the header
/// names no key, any key resolution error unchanged,
/// [`Error::AlgorithmMismatch`] when the header algorithm cannot be used with
/// the key, and [`Error::SignatureInvalid`] when the signature does not match.
#[instrument(level = "debug", skip(compact, resolver))]
pub async fn verify<T>(compact: &str, resolver: &impl KeyResolver) -> Result<T>
where
    T: ClaimSet + DeserializeOwned,
{
    tracing::debug!("verify::verify");

    let jws = jws::split(compact)?;
    let kid = jws.header.key_id().ok_or(Error::MissingKeyId)?;
    let key = resolver.resolve(kid).await?;

    check_signature(&jws, kid, &key)?;
    jws.unverified_claims()
}

/// Verify a signed transaction (`signedTransactionInfo`).
///
/// # Errors
///
/// See [`verify`].
pub async fn verify_transaction(
    compact: &str, resolver: &impl KeyResolver,
) -> Result<TransactionClaims> {
    verify(compact, resolver).await
}

/// Verify signed renewal information (`signedRenewalInfo`).
///
/// # Errors
///
/// See [`verify`].
pub async fn verify_renewal_info(
    compact: &str, resolver: &impl KeyResolver,
) -> Result<RenewalInfoClaims> {
    verify(compact, resolver).await
}

/// Verify an envelope whose payload shape is not known, returning the raw
/// claim map.
///
/// # Errors
///
/// See [`verify`].
pub async fn verify_signature(compact: &str, resolver: &impl KeyResolver) -> Result<Claims> {
    verify(compact, resolver).await
}

/// Decode the payload of `compact` WITHOUT checking its signature.
///
/// The result must only be used for logging or triage, never to make a
/// business decision.
///
/// # Errors
///
/// Returns an error if the envelope or its payload is malformed.
pub fn decode_unverified<T: DeserializeOwned>(compact: &str) -> Result<T> {
    tracing::debug!("verify::decode_unverified");
    jws::split(compact)?.unverified_claims()
}

fn check_signature(jws: &CompactJws<'_>, kid: &str, key: &KeyMaterial) -> Result<()> {
    let mismatch = || Error::AlgorithmMismatch {
        kid: kid.to_string(),
        alg: jws.header.alg.clone(),
    };

    let alg = jws.header.algorithm().ok_or_else(mismatch)?;
    if !key.accepts(alg) {
        return Err(mismatch());
    }

    jws::verify(key, alg, &jws.signing_input(), jws.signature()).map_err(|e| {
        tracing::debug!(kid, "signature rejected: {e}");
        Error::SignatureInvalid { kid: kid.to_string() }
    })
}
