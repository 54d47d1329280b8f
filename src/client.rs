//! # Subscription Status Client
//!
//! Thin client for the App Store Server API's subscription-status endpoint.
//! It issues (and caches) its own bearer token, so a single [`Client`] can be
//! shared for the life of the process.
//!
//! ```rust,ignore
//! let client = Client::new(&config);
//! let response = client.subscription_statuses("2000000471230947", &[SubscriptionStatus::Active]).await?;
//! for item in response.data.iter().flat_map(|group| &group.last_transactions) {
//!     let renewal = item.renewal_info(&keys).await?;
//! }
//! ```

use std::fmt::{self, Debug};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::issue::{self, AuthorizationContext, TOKEN_VALIDITY};
use crate::subscription::{StatusResponse, SubscriptionStatus};

/// Production API base URL.
pub const PRODUCTION_URL: &str = "https://api.storekit.itunes.apple.com";

/// Sandbox API base URL.
pub const SANDBOX_URL: &str = "https://api.storekit-sandbox.itunes.apple.com";

// a cached token is replaced this many seconds before it expires
const REFRESH_MARGIN_SECS: i64 = 60;

/// App Store server environment.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Environment {
    /// Live purchases.
    #[default]
    Production,

    /// Sandbox purchases.
    Sandbox,
}

impl Environment {
    /// Base URL of the environment's API.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_URL,
            Self::Sandbox => SANDBOX_URL,
        }
    }
}

/// Client settings, typically deserialized from the application's
/// configuration.
#[derive(Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// API environment.
    pub environment: Environment,

    /// Private key id from App Store Connect (e.g. `2X9R4HXF34`).
    pub key_id: String,

    /// Issuer id from the Keys page in App Store Connect.
    pub issuer_id: String,

    /// Bundle id of the app.
    pub bundle_id: String,

    /// PEM encoded P-256 private key for `key_id`.
    pub private_key: String,
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("key_id", &self.key_id)
            .field("issuer_id", &self.issuer_id)
            .field("bundle_id", &self.bundle_id)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

impl Config {
    /// The issuance context for this configuration.
    #[must_use]
    pub fn context(&self) -> AuthorizationContext {
        AuthorizationContext {
            key_id: self.key_id.clone(),
            issuer_id: self.issuer_id.clone(),
            bundle_id: self.bundle_id.clone(),
            private_key: self.private_key.clone(),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Subscription-status API client.
pub struct Client {
    context: AuthorizationContext,
    base_url: String,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("context", &self.context)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with a default HTTP client.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a client that sends requests with `http`.
    #[must_use]
    pub fn with_http_client(config: &Config, http: reqwest::Client) -> Self {
        Self {
            context: config.context(),
            base_url: config.environment.base_url().to_string(),
            http,
            token: Mutex::new(None),
        }
    }

    /// Send requests to `base_url` instead of the environment's URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL of the subscription statuses for `transaction_id`, optionally
    /// filtered to `statuses`.
    #[must_use]
    pub fn subscription_url(&self, transaction_id: &str, statuses: &[SubscriptionStatus]) -> String {
        let base = self.base_url.trim_end_matches('/');
        let mut url = format!("{base}/inApps/v1/subscriptions/{transaction_id}");
        if !statuses.is_empty() {
            url.push('?');
            url.push_str(&status_query(statuses));
        }
        url
    }

    /// Get the statuses of every subscription in the customer's subscription
    /// groups, identified by any of the customer's transaction ids.
    ///
    /// # Errors
    ///
    /// Returns a token issuance error, or [`Error::RequestFailed`] if the
    /// request fails or does not return a decodable response.
    #[instrument(level = "debug", skip(self, statuses))]
    pub async fn subscription_statuses(
        &self, transaction_id: &str, statuses: &[SubscriptionStatus],
    ) -> Result<StatusResponse> {
        tracing::debug!("client::subscription_statuses");

        let url = self.subscription_url(transaction_id, statuses);
        let failed = |reason: String| Error::RequestFailed {
            url: url.clone(),
            reason,
        };

        let token = self.token()?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| failed(format!("issue sending request: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_token();
        }
        if !status.is_success() {
            return Err(failed(status.to_string()));
        }

        response
            .json::<StatusResponse>()
            .await
            .map_err(|e| failed(format!("issue deserializing response: {e}")))
    }

    /// The current bearer token, issuing a new one when none is cached or the
    /// cached one is about to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if a new token cannot be issued.
    pub fn token(&self) -> Result<String> {
        self.token_at(Utc::now())
    }

    fn token_at(&self, now: DateTime<Utc>) -> Result<String> {
        if let Some(cached) = self.lock_token().as_ref() {
            if now < cached.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS) {
                return Ok(cached.value.clone());
            }
        }

        let value = issue::issue_at(&self.context, now)?;
        let validity = TimeDelta::from_std(TOKEN_VALIDITY).unwrap_or(TimeDelta::zero());
        *self.lock_token() = Some(CachedToken {
            value: value.clone(),
            expires_at: now + validity,
        });
        tracing::debug!("issued new bearer token");

        Ok(value)
    }

    fn clear_token(&self) {
        self.lock_token().take();
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, Option<CachedToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Query string selecting `statuses`, e.g. `status=1&status=4`.
#[must_use]
pub fn status_query(statuses: &[SubscriptionStatus]) -> String {
    statuses.iter().map(|s| format!("status={}", s.code())).collect::<Vec<_>>().join("&")
}

#[cfg(test)]
mod test {
    use assert_let_bind::assert_let;
    use serde_json::json;

    use super::*;

    const PKCS8: &str = include_str!("../crates/test-utils/fixtures/issuer_p256.pem");

    fn config(environment: Environment) -> Config {
        Config {
            environment,
            key_id: "2X9R4HXF34".into(),
            issuer_id: "57246542-96fe-1a63-e053-0824d011072a".into(),
            bundle_id: "com.example.testbundleid".into(),
            private_key: PKCS8.into(),
        }
    }

    #[test]
    fn query_string() {
        assert_eq!(status_query(&[]), "");
        assert_eq!(
            status_query(&[SubscriptionStatus::Active, SubscriptionStatus::BillingGracePeriod]),
            "status=1&status=4"
        );
    }

    #[test]
    fn urls() {
        let client = Client::new(&config(Environment::Production));
        assert_eq!(
            client.subscription_url("2000000471230947", &[]),
            "https://api.storekit.itunes.apple.com/inApps/v1/subscriptions/2000000471230947"
        );

        let client = Client::new(&config(Environment::Sandbox));
        assert_eq!(
            client.subscription_url("123", &[SubscriptionStatus::Active, SubscriptionStatus::BillingGracePeriod]),
            "https://api.storekit-sandbox.itunes.apple.com/inApps/v1/subscriptions/123?status=1&status=4"
        );

        let client = client.with_base_url("http://localhost:8080/");
        assert_eq!(
            client.subscription_url("123", &[SubscriptionStatus::Expired]),
            "http://localhost:8080/inApps/v1/subscriptions/123?status=2"
        );
    }

    #[test]
    fn token_reuse() {
        let client = Client::new(&config(Environment::Sandbox));
        let now = Utc::now();

        let first = client.token_at(now).expect("should issue");
        let reused = client.token_at(now + TimeDelta::minutes(28)).expect("should issue");
        assert_eq!(first, reused);

        // within a minute of expiry a new token is issued
        let renewed = client.token_at(now + TimeDelta::minutes(29)).expect("should issue");
        assert_ne!(first, renewed);
    }

    #[test]
    fn token_with_bad_key() {
        let client = Client::new(&Config {
            private_key: "nope".into(),
            ..config(Environment::Sandbox)
        });
        assert_let!(Err(Error::InvalidPrivateKey { .. }), client.token());
    }

    #[test]
    fn config_from_json() {
        let config: Config = serde_json::from_value(json!({
            "environment": "Sandbox",
            "key_id": "2X9R4HXF34",
            "issuer_id": "57246542-96fe-1a63-e053-0824d011072a",
            "bundle_id": "com.example.testbundleid",
            "private_key": PKCS8
        }))
        .expect("should deserialize");

        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.context().key_id, "2X9R4HXF34");

        let debug = format!("{config:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("PRIVATE KEY"));
    }

    #[tokio::test]
    async fn unreachable_endpoint() {
        let client = Client::new(&config(Environment::Sandbox)).with_base_url("http://127.0.0.1:1");
        let result = client.subscription_statuses("123", &[]).await;
        assert_let!(Err(Error::RequestFailed { url, .. }), result);
        assert_eq!(url, "http://127.0.0.1:1/inApps/v1/subscriptions/123");
    }
}
