//! Transaction information signed by the App Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_empty, ClaimSet, Timestamp, APPLE_ISSUER};

/// Decoded payload of a `signedTransactionInfo` envelope.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionClaims {
    /// Unique identifier of the transaction.
    pub transaction_id: String,

    /// Transaction identifier of the original purchase.
    pub original_transaction_id: String,

    /// Identifier of subscription purchase events across devices.
    pub web_order_line_item_id: String,

    /// Server environment, `Sandbox` or `Production`.
    pub environment: String,

    /// App Store identifier of the app.
    pub app_apple_id: i64,

    /// Bundle identifier of the app.
    pub bundle_id: String,

    /// Product identifier of the in-app purchase.
    pub product_id: String,

    /// Subscription group the subscription belongs to.
    pub subscription_group_identifier: String,

    /// Product type of the in-app purchase.
    #[serde(rename = "type")]
    pub type_: String,

    /// Number of consumable products purchased.
    pub quantity: Option<i32>,

    /// UUID associating the transaction with a customer of your service.
    pub app_account_token: Option<String>,

    /// Three-letter code of the storefront country or region.
    pub storefront: String,

    /// Apple-defined storefront identifier.
    pub storefront_id: String,

    /// When the App Store charged the customer.
    pub purchase_date: Timestamp,

    /// Purchase date of the original transaction.
    pub original_purchase_date: Timestamp,

    /// When the subscription expires or renews.
    pub expires_date: Timestamp,

    /// Whether the customer upgraded to another subscription.
    pub is_upgraded: Option<bool>,

    /// Type of subscription offer.
    pub offer_type: Option<i32>,

    /// Offer code or promotional offer identifier.
    pub offer_identifier: Option<String>,

    /// Payment mode of a discount offer.
    pub offer_discount_type: Option<String>,

    /// Whether the purchase was made by the customer or shared via Family
    /// Sharing.
    pub in_app_ownership_type: String,

    /// Price of the purchase, in milliunits.
    pub price: Option<i64>,

    /// Currency code of `price`.
    pub currency: String,

    /// When the App Store refunded or revoked the transaction.
    pub revocation_date: Timestamp,

    /// Reason the transaction was refunded.
    pub revocation_reason: Option<i32>,

    /// Customer purchase or system-initiated renewal.
    pub transaction_reason: String,

    /// When the App Store signed the envelope.
    pub signed_date: Timestamp,
}

impl TransactionClaims {
    /// Returns `true` if the transaction was refunded or revoked.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revocation_date.is_set()
    }
}

impl ClaimSet for TransactionClaims {
    fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.signed_date.to_datetime()
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_date.to_datetime()
    }

    fn issuer(&self) -> Option<&str> {
        Some(APPLE_ISSUER)
    }

    fn subject(&self) -> Option<&str> {
        non_empty(&self.bundle_id)
    }

    fn audience(&self) -> Vec<&str> {
        non_empty(&self.product_id).into_iter().collect()
    }
}
