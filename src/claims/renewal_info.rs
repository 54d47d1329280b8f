//! Subscription renewal information signed by the App Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_empty, ClaimSet, Timestamp, APPLE_ISSUER};

/// Identifier of a subscription offer.
pub type OfferIdentifier = String;

/// Decoded payload of a `signedRenewalInfo` envelope.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RenewalInfoClaims {
    /// Transaction identifier of the original purchase.
    pub original_transaction_id: String,

    /// Identifier of a transaction (purchase, restore or renewal).
    pub transaction_id: String,

    /// Identifier of subscription purchase events across devices.
    pub web_order_line_item_id: String,

    /// Bundle identifier of the app.
    pub bundle_id: String,

    /// UUID associating the transaction with a customer of your service.
    pub app_account_token: Option<String>,

    /// Product identifier of the in-app purchase.
    pub product_id: String,

    /// Product type of the in-app purchase.
    #[serde(rename = "type")]
    pub type_: String,

    /// Subscription group the subscription belongs to.
    pub subscription_group_identifier: String,

    /// Number of consumable products purchased.
    pub quantity: Option<i32>,

    /// Price of the purchase, in milliunits.
    pub price: Option<i64>,

    /// Currency code of `renewal_price`.
    pub currency: String,

    /// Three-letter code of the storefront country or region.
    pub storefront: String,

    /// Apple-defined storefront identifier.
    pub storefront_id: String,

    /// Win-back offers the customer is eligible for.
    pub eligible_win_back_offer_ids: Vec<OfferIdentifier>,

    /// Type of subscription offer.
    pub offer_type: i32,

    /// Payment mode of a discount offer.
    pub offer_discount_type: String,

    /// Offer code or promotional offer identifier.
    pub offer_identifier: String,

    /// Purchase date of the original transaction.
    pub original_purchase_date: Timestamp,

    /// When the App Store charged the customer.
    pub purchase_date: Timestamp,

    /// Earliest start date of the subscription in a series of purchases,
    /// ignoring lapses of 60 days or less.
    pub recent_subscription_start_date: Timestamp,

    /// Whether the App Store is attempting to renew an expired subscription.
    pub is_in_billing_retry_period: bool,

    /// When the billing grace period ends.
    pub grace_period_expires_date: Timestamp,

    /// Renewal status: 0 off, 1 on.
    pub auto_renew_status: i32,

    /// Product that renews at the next billing period.
    pub auto_renew_product_id: String,

    /// Reason the subscription expired.
    pub expiration_intent: i32,

    /// When the subscription expires or renews.
    pub expires_date: Timestamp,

    /// Whether the customer upgraded to another subscription.
    pub is_upgraded: bool,

    /// When the most recent auto-renewable subscription purchase expires.
    pub renewal_date: Timestamp,

    /// Renewal price at the next billing period, in milliunits.
    pub renewal_price: i64,

    /// Whether the purchase was made by the customer or shared via Family
    /// Sharing.
    pub in_app_ownership_type: String,

    /// Whether the subscription will increase in price.
    pub price_increase_status: i32,

    /// When the App Store refunded or revoked the transaction.
    pub revocation_date: Timestamp,

    /// Reason the transaction was refunded.
    pub revocation_reason: String,

    /// Customer purchase or system-initiated renewal.
    pub transaction_reason: String,

    /// When the App Store signed the envelope.
    pub signed_date: Timestamp,

    /// Server environment, `Sandbox` or `Production`.
    pub environment: String,
}

impl ClaimSet for RenewalInfoClaims {
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

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn permissive_decode() {
        let claims: RenewalInfoClaims = serde_json::from_value(json!({
            "originalTransactionId": "2000000471230947",
            "autoRenewStatus": 1,
            "signedDate": 1_729_070_000_000_i64,
            "type": "Auto-Renewable Subscription",
            "somethingNew": [1, 2, 3]
        }))
        .expect("should decode");

        assert_eq!(claims.original_transaction_id, "2000000471230947");
        assert_eq!(claims.type_, "Auto-Renewable Subscription");
        assert_eq!(claims.auto_renew_status, 1);
        assert_eq!(claims.quantity, None);
        assert!(claims.eligible_win_back_offer_ids.is_empty());

        assert_eq!(claims.issuer(), Some(APPLE_ISSUER));
        assert_eq!(claims.subject(), None);
        assert!(claims.audience().is_empty());
        assert_eq!(claims.expires_at(), None);
        assert_eq!(claims.issued_at().map(|d| d.timestamp_millis()), Some(1_729_070_000_000));
    }
}
