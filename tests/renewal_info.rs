//! Signed Renewal Information Tests

use std::sync::Arc;

use assert_let_bind::assert_let;
use storekit_jws::claims::Timestamp;
use storekit_jws::jose::jws;
use storekit_jws::subscription::LastTransactionsItem;
use storekit_jws::{verify, ClaimSet, Error, KeyDirectory, RenewalInfoClaims, TransactionClaims};
use test_utils::fixtures::{self, COUNTERPARTY_KID, ORIGINAL_TRANSACTION_ID, RENEWAL_INFO_JWS};
use test_utils::{Rs256Signer, StaticKeySource};

fn directory() -> (StaticKeySource, KeyDirectory<StaticKeySource>) {
    let source = StaticKeySource::new(fixtures::jwks());
    (source.clone(), KeyDirectory::new(source))
}

// Should verify the fixture envelope against the published RSA key.
#[tokio::test]
async fn verify_fixture() {
    test_utils::init_tracer();
    let (source, keys) = directory();

    let renewal =
        verify::verify_renewal_info(RENEWAL_INFO_JWS, &keys).await.expect("should verify");

    assert_eq!(renewal.original_transaction_id, ORIGINAL_TRANSACTION_ID);
    assert_eq!(renewal.auto_renew_product_id, "com.example.monthly");
    assert_eq!(renewal.auto_renew_status, 1);
    assert_eq!(renewal.renewal_price, 9990);
    assert_eq!(renewal.currency, "USD");
    assert_eq!(renewal.eligible_win_back_offer_ids, vec!["winback.1".to_string()]);
    assert_eq!(renewal.renewal_date, Timestamp(1_731_748_400_000));

    assert_eq!(renewal.issued_at().map(|dt| dt.timestamp_millis()), Some(1_729_070_000_000));
    assert_eq!(renewal.issuer(), Some("Apple"));
    assert_eq!(renewal.subject(), Some("com.example.app"));
    assert_eq!(renewal.audience(), vec!["com.example.monthly"]);

    assert_eq!(source.calls(), 1);
}

// Should reject the envelope when a single signature byte changes.
#[tokio::test]
async fn tampered_signature() {
    test_utils::init_tracer();
    let (_, keys) = directory();

    let parsed = jws::split(RENEWAL_INFO_JWS).expect("should split");
    let mut signature = parsed.signature().to_vec();
    signature[0] ^= 0x80;
    let (header, payload) = parsed.segments();
    let tampered = jws::join(header, payload, &jws::encode_segment(&signature));

    let result = verify::verify_renewal_info(&tampered, &keys).await;
    assert_let!(Err(Error::SignatureInvalid { kid }), result);
    assert_eq!(kid, COUNTERPARTY_KID);

    // inspection still works without a valid signature
    let unverified: RenewalInfoClaims =
        verify::decode_unverified(&tampered).expect("should decode");
    assert_eq!(unverified.original_transaction_id, ORIGINAL_TRANSACTION_ID);
}

// Should report a kid that is not published.
#[tokio::test]
async fn unpublished_kid() {
    test_utils::init_tracer();

    let mut published = fixtures::jwks();
    published.keys.retain(|jwk| jwk.kid != COUNTERPARTY_KID);
    let source = StaticKeySource::new(published);
    let keys = KeyDirectory::new(source.clone());

    let result = verify::verify_renewal_info(RENEWAL_INFO_JWS, &keys).await;
    assert_let!(Err(Error::KeyNotFound { kid }), result);
    assert_eq!(kid, COUNTERPARTY_KID);
    assert_eq!(source.calls(), 1);
}

// Should surface key set fetch failures.
#[tokio::test]
async fn fetch_failure() {
    test_utils::init_tracer();
    let keys = KeyDirectory::new(StaticKeySource::failing());

    let result = verify::verify_renewal_info(RENEWAL_INFO_JWS, &keys).await;
    assert_let!(Err(Error::KeyFetchFailed { .. }), result);
}

// Should verify both envelopes of a subscription status item through a
// shared directory.
#[tokio::test]
async fn status_item() {
    test_utils::init_tracer();
    let (source, keys) = directory();
    let keys = Arc::new(keys);

    let transaction = TransactionClaims {
        transaction_id: "2000000471230950".into(),
        original_transaction_id: ORIGINAL_TRANSACTION_ID.into(),
        bundle_id: "com.example.app".into(),
        product_id: "com.example.monthly".into(),
        expires_date: Timestamp(1_731_748_400_000),
        signed_date: Timestamp(1_729_070_000_000),
        ..TransactionClaims::default()
    };
    let signed_transaction_info = jws::encode(None, &transaction, &Rs256Signer::counterparty())
        .expect("should sign");

    let item = LastTransactionsItem {
        original_transaction_id: ORIGINAL_TRANSACTION_ID.into(),
        status: 1,
        signed_renewal_info: RENEWAL_INFO_JWS.into(),
        signed_transaction_info,
    };

    let decoded = item.transaction_info(&keys).await.expect("should verify");
    assert_eq!(decoded, transaction);
    assert_eq!(decoded.expires_at().map(|dt| dt.timestamp_millis()), Some(1_731_748_400_000));

    let renewal = item.renewal_info(&keys).await.expect("should verify");
    assert_eq!(renewal.original_transaction_id, item.original_transaction_id);

    // one fetch served both envelopes
    assert_eq!(source.calls(), 1);
}
