//! # Subscription Status
//!
//! Response shapes of the App Store Server API's "Get All Subscription
//! Statuses" endpoint. Transaction and renewal details arrive as signed
//! envelopes and are only trusted once verified.

use serde::{Deserialize, Serialize};

use crate::claims::{RenewalInfoClaims, TransactionClaims};
use crate::error::Result;
use crate::key_directory::KeyResolver;
use crate::verify;

/// Statuses for every auto-renewable subscription of a customer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusResponse {
    /// Subscription information grouped by subscription group.
    pub data: Vec<SubscriptionGroupIdentifierItem>,

    /// The server environment, `Sandbox` or `Production`, that generated the
    /// response.
    pub environment: String,

    /// The app's App Store identifier.
    pub app_apple_id: i64,

    /// The app's bundle identifier.
    pub bundle_id: String,
}

/// Most recent transactions for one subscription group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionGroupIdentifierItem {
    /// The subscription group identifier.
    pub subscription_group_identifier: String,

    /// The most recent signed transaction and renewal information for each
    /// subscription in the group.
    pub last_transactions: Vec<LastTransactionsItem>,
}

/// Latest signed state of one subscription.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LastTransactionsItem {
    /// Original transaction identifier of the subscription.
    pub original_transaction_id: String,

    /// Numeric subscription status. See [`SubscriptionStatus`].
    pub status: i32,

    /// Renewal information signed by the App Store.
    pub signed_renewal_info: String,

    /// Transaction information signed by the App Store.
    pub signed_transaction_info: String,
}

impl LastTransactionsItem {
    /// The status, if it is one of the documented values.
    #[must_use]
    pub fn subscription_status(&self) -> Option<SubscriptionStatus> {
        SubscriptionStatus::try_from(self.status).ok()
    }

    /// Verify and decode `signed_transaction_info`.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope does not verify.
    pub async fn transaction_info(&self, resolver: &impl KeyResolver) -> Result<TransactionClaims> {
        verify::verify_transaction(&self.signed_transaction_info, resolver).await
    }

    /// Verify and decode `signed_renewal_info`.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope does not verify.
    pub async fn renewal_info(&self, resolver: &impl KeyResolver) -> Result<RenewalInfoClaims> {
        verify::verify_renewal_info(&self.signed_renewal_info, resolver).await
    }
}

/// Status of an auto-renewable subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// The subscription is active.
    Active = 1,

    /// The subscription is expired.
    Expired = 2,

    /// The subscription is in a billing retry period.
    BillingRetry = 3,

    /// The subscription is in a billing grace period.
    BillingGracePeriod = 4,

    /// The subscription is revoked.
    Revoked = 5,
}

impl SubscriptionStatus {
    /// Wire value, as used in the `status` query parameter.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for SubscriptionStatus {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Active),
            2 => Ok(Self::Expired),
            3 => Ok(Self::BillingRetry),
            4 => Ok(Self::BillingGracePeriod),
            5 => Ok(Self::Revoked),
            other => Err(other),
        }
    }
}
