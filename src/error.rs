//! # Errors
//!
//! Every failure in issuing, fetching keys for, or verifying a compact
//! envelope is reported as one of the variants below. Variants carry the
//! context needed to act on the failure (key id, segment index, underlying
//! cause) rather than a pre-formatted message.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of failures for envelope issuance and verification.
#[derive(Error, Debug)]
pub enum Error {
    /// The envelope is not three non-empty, dot-separated segments, or a
    /// segment does not contain the JSON expected of it.
    #[error("malformed envelope{}: {reason}", segment_hint(.segment))]
    MalformedEnvelope {
        /// Index of the offending segment (0 header, 1 payload, 2 signature),
        /// when the failure is tied to one.
        segment: Option<usize>,

        /// What was wrong.
        reason: String,
    },

    /// A segment is not valid unpadded base64url.
    #[error("invalid encoding in segment {segment}: {reason}")]
    InvalidEncoding {
        /// Index of the offending segment.
        segment: usize,

        /// Decoder error.
        reason: String,
    },

    /// The envelope header carries no `kid`.
    #[error("envelope header has no key identifier")]
    MissingKeyId,

    /// The published key set could not be retrieved or parsed.
    #[error("failed to fetch key set: {source}")]
    KeyFetchFailed {
        /// Underlying network or decoding error.
        #[source]
        source: anyhow::Error,
    },

    /// The key set was fetched but does not contain the requested key.
    #[error("no published key for kid {kid:?}")]
    KeyNotFound {
        /// Requested key identifier.
        kid: String,
    },

    /// The published material for a key could not be turned into a public
    /// key.
    #[error("invalid key encoding for kid {kid:?}: {reason}")]
    InvalidKeyEncoding {
        /// Key identifier of the rejected entry.
        kid: String,

        /// What was wrong with the material.
        reason: String,
    },

    /// The signature does not match the signing input.
    #[error("signature does not verify against kid {kid:?}")]
    SignatureInvalid {
        /// Key identifier used for verification.
        kid: String,
    },

    /// The header algorithm is unsupported or incompatible with the resolved
    /// key.
    #[error("algorithm {alg:?} cannot be used with kid {kid:?}")]
    AlgorithmMismatch {
        /// Key identifier from the header.
        kid: String,

        /// Algorithm declared by the header.
        alg: String,
    },

    /// The signing key is not a PEM encoded P-256 private key.
    #[error("invalid private key: {reason}")]
    InvalidPrivateKey {
        /// Parser error.
        reason: String,
    },

    /// The signer failed to produce a signature.
    #[error("signing failed: {source}")]
    SigningFailed {
        /// Underlying signer error.
        #[source]
        source: anyhow::Error,
    },

    /// A subscription-status request failed or returned an unusable response.
    #[error("request to {url} failed: {reason}")]
    RequestFailed {
        /// Requested URL.
        url: String,

        /// Transport error or response status.
        reason: String,
    },
}

#[allow(clippy::ref_option)]
fn segment_hint(segment: &Option<usize>) -> String {
    segment.map_or_else(String::new, |i| format!(" (segment {i})"))
}

impl Error {
    /// Key identifier the error relates to, if any.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        match self {
            Self::KeyNotFound { kid }
            | Self::InvalidKeyEncoding { kid, .. }
            | Self::SignatureInvalid { kid }
            | Self::AlgorithmMismatch { kid, .. } => Some(kid.as_str()),
            _ => None,
        }
    }

    /// Returns `true` when refreshing the key set and retrying may succeed.
    #[must_use]
    pub const fn is_key_resolution(&self) -> bool {
        matches!(
            self,
            Self::KeyFetchFailed { .. } | Self::KeyNotFound { .. } | Self::InvalidKeyEncoding { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::MalformedEnvelope {
            segment: Some(1),
            reason: "expected value".into(),
        };
        assert_eq!(err.to_string(), "malformed envelope (segment 1): expected value");

        let err = Error::MalformedEnvelope {
            segment: None,
            reason: "expected 3 segments, found 2".into(),
        };
        assert_eq!(err.to_string(), "malformed envelope: expected 3 segments, found 2");
    }

    #[test]
    fn kid_accessor() {
        let err = Error::KeyNotFound { kid: "AB12".into() };
        assert_eq!(err.kid(), Some("AB12"));
        assert!(err.is_key_resolution());
        assert_eq!(Error::MissingKeyId.kid(), None);
        assert!(!Error::MissingKeyId.is_key_resolution());
    }
}
