//! # App Store Signed Envelopes
//!
//! Issuance and verification of the compact JWS envelopes exchanged with the
//! App Store Server API.
//!
//! Outbound, [`issue::issue`] mints the short-lived ES256 bearer token that
//! authenticates requests to the subscription-status API. Inbound,
//! [`verify::verify`] checks the signature of an envelope sent by the App Store
//! against its published (rotating) keys, held in a [`KeyDirectory`], and
//! decodes the payload into typed claims.
//!
//! ```rust,ignore
//! let keys = Arc::new(KeyDirectory::default());
//! let renewal = verify::verify_renewal_info(&signed_renewal_info, &keys).await?;
//! ```
//!
//! [`client::Client`] ties both halves together for the subscription-status
//! endpoint.

pub mod claims;
pub mod client;
pub mod error;
pub mod issue;
pub mod jose;
pub mod key_directory;
pub mod subscription;
pub mod verify;

pub use crate::claims::{ClaimSet, Claims, RenewalInfoClaims, Timestamp, TransactionClaims};
pub use crate::error::{Error, Result};
pub use crate::issue::{AuthorizationContext, Es256Signer};
pub use crate::jose::{Algorithm, Jwk, Jwks, KeyMaterial};
pub use crate::key_directory::{HttpKeySource, KeyDirectory, KeyResolver, KeySource};

/// Signer provides the signing functionality used to issue envelopes.
pub trait Signer: Send + Sync {
    /// Algorithm returns the algorithm used by the signer.
    fn algorithm(&self) -> Algorithm;

    /// Identifier of the signing key, published as the envelope's `kid`.
    fn key_id(&self) -> String;

    /// Sign `msg`, returning the raw signature in the form the algorithm
    /// requires (`r || s` for ES256).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying key cannot sign.
    fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>>;
}
