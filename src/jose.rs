//! # JSON Object Signing and Encryption (JOSE)
//!
//! The subset of JOSE needed to talk to the App Store Server API: compact JWS
//! ([RFC7515]) envelopes, the algorithms used to sign them ([RFC7518]), and the
//! JWK ([RFC7517]) shapes in which the counterparty publishes its keys.
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518

pub mod jwa;
pub mod jwk;
pub mod jws;

pub use self::jwa::Algorithm;
pub use self::jwk::{Jwk, Jwks, KeyMaterial};
pub use self::jws::{CompactJws, Header};
