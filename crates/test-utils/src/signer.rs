//! RS256 signer standing in for the counterparty.

use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use storekit_jws::{Algorithm, Signer};

use crate::fixtures;

/// Signs envelopes the way the counterparty does.
#[derive(Clone, Debug)]
pub struct Rs256Signer {
    signing_key: SigningKey<Sha256>,
    key_id: String,
}

impl Rs256Signer {
    /// Sign with `key`, published as `key_id`.
    #[must_use]
    pub fn new(key: RsaPrivateKey, key_id: impl Into<String>) -> Self {
        Self {
            signing_key: SigningKey::<Sha256>::new(key),
            key_id: key_id.into(),
        }
    }

    /// Sign with the fixture counterparty key.
    #[must_use]
    pub fn counterparty() -> Self {
        Self::new(fixtures::counterparty_key(), fixtures::COUNTERPARTY_KID)
    }
}

impl Signer for Rs256Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RS256
    }

    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    fn try_sign(&self, msg: &[u8]) -> anyhow::Result<Vec<u8>> {
        let signature = self.signing_key.try_sign(msg)?;
        Ok(signature.to_vec())
    }
}
