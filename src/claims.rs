//! # Claim Sets
//!
//! Typed payloads decoded from verified envelopes. Each implements
//! [`ClaimSet`] so that temporal and identity claims can be read the same way
//! whatever the business payload.
//!
//! Payload decoding is permissive: unknown fields are ignored and missing
//! fields take their default (zero or absent) value.

mod renewal_info;
mod transaction;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use self::renewal_info::{OfferIdentifier, RenewalInfoClaims};
pub use self::transaction::TransactionClaims;

/// Issuer reported for payloads signed by the App Store, which do not carry an
/// `iss` claim of their own.
pub const APPLE_ISSUER: &str = "Apple";

/// Accessors for the standard temporal and identity claims.
///
/// Expiry is not enforced on decode; callers decide how to treat
/// [`ClaimSet::expires_at`].
pub trait ClaimSet {
    /// When the claims were issued (or signed).
    fn issued_at(&self) -> Option<DateTime<Utc>>;

    /// When the claims stop being valid.
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    /// When the claims start being valid.
    fn not_before(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Who issued the claims.
    fn issuer(&self) -> Option<&str>;

    /// Who the claims are about.
    fn subject(&self) -> Option<&str>;

    /// Who the claims are intended for.
    fn audience(&self) -> Vec<&str>;

    /// Returns `true` if `now` is at or past the expiry. Claims without an
    /// expiry never expire.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// UNIX time in milliseconds, as used by App Store payloads. Zero means unset.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Whether a value was provided.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0 != 0
    }

    /// Convert to a UTC date-time. Returns `None` when unset or out of range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.is_set() {
            return None;
        }
        DateTime::from_timestamp_millis(self.0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

/// Claims of the outbound authorization token.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorizationClaims {
    /// Issuer id from App Store Connect.
    pub iss: String,

    /// Issued at, in seconds since the epoch.
    pub iat: i64,

    /// Expiry, in seconds since the epoch.
    pub exp: i64,

    /// Target API.
    pub aud: String,

    /// Bundle id of the app.
    pub bid: String,
}

impl ClaimSet for AuthorizationClaims {
    fn issued_at(&self) -> Option<DateTime<Utc>> {
        seconds(self.iat)
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        seconds(self.exp)
    }

    fn issuer(&self) -> Option<&str> {
        non_empty(&self.iss)
    }

    fn subject(&self) -> Option<&str> {
        non_empty(&self.bid)
    }

    fn audience(&self) -> Vec<&str> {
        non_empty(&self.aud).into_iter().collect()
    }
}

/// Generic claim map, used when the payload shape is not known up front.
/// Registered claims are read with their JWT meaning (times in seconds).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Claims(pub Map<String, Value>);

impl Claims {
    /// Look up a claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn time(&self, name: &str) -> Option<DateTime<Utc>> {
        let value = self.0.get(name)?;
        // fractional NumericDate values are truncated
        #[allow(clippy::cast_possible_truncation)]
        let secs = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
        seconds(secs)
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str).and_then(non_empty)
    }
}

impl ClaimSet for Claims {
    fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.time("iat")
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.time("exp")
    }

    fn not_before(&self) -> Option<DateTime<Utc>> {
        self.time("nbf")
    }

    fn issuer(&self) -> Option<&str> {
        self.string("iss")
    }

    fn subject(&self) -> Option<&str> {
        self.string("sub")
    }

    fn audience(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => non_empty(aud).into_iter().collect(),
            Some(Value::Array(auds)) => auds.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

fn seconds(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}
