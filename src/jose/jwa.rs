//! # JSON Web Algorithms (JWA)
//!
//! Signature algorithms from [RFC7518] that this crate signs or verifies with.
//! Anything else, including `none` and the HMAC family, fails to parse.
//!
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518#section-3.1

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Digital signature algorithm identifier.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA using P-256 and SHA-256.
    #[default]
    ES256,

    /// RSASSA-PKCS1-v1_5 using SHA-256.
    RS256,

    /// RSASSA-PKCS1-v1_5 using SHA-384.
    RS384,

    /// RSASSA-PKCS1-v1_5 using SHA-512.
    RS512,
}

impl Algorithm {
    /// The `alg` value as it appears in a JOSE header.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
        }
    }

    /// Returns `true` for the RSASSA-PKCS1-v1_5 family.
    #[must_use]
    pub const fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384 | Self::RS512)
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256" => Ok(Self::ES256),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            other => Err(format!("unsupported algorithm {other:?}")),
        }
    }
}
