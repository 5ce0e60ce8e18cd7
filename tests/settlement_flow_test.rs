//! End-to-end settlement over the in-memory store: notifications in,
//! order state and fulfillment emissions out.

mod common;

use common::*;
use settlement_backend::database::models::{Coupon, CouponDiscount, NewOrder, OrderStatus};
use settlement_backend::database::repository::{CouponStore, OrderStore};
use settlement_backend::error::CouponRejection;
use settlement_backend::settlement::RedemptionRequest;

const UNUSED_BASE_URL: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn test_paid_notification_settles_order_once() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-1", 249_000).await;

    let body = midtrans_body("TB-TEST-1", "200", "249000.00", "settlement", MIDTRANS_SERVER_KEY);
    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    assert!(ack.received);
    assert_eq!(ack.result, "settled");

    let order = app.store.find_by_reference("TB-TEST-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_method.as_deref(), Some("bank_transfer"));
    assert!(order.paid_at.is_some());
    assert_eq!(
        order.provider_transaction_id.as_deref(),
        Some("9aed5972-5b6a-401e-894b-a32c91ed1a3a")
    );

    let emitted = app.fulfillment.emitted();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].reference_id, "TB-TEST-1");
    assert_eq!(emitted[0].status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_duplicate_delivery_has_no_side_effects() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-1", 249_000).await;
    let body = midtrans_body("TB-TEST-1", "200", "249000.00", "settlement", MIDTRANS_SERVER_KEY);

    app.state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();
    let writes_after_first = app.store.order_writes().await;

    let second = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    assert_eq!(second.result, "already_final");
    assert_eq!(app.store.order_writes().await, writes_after_first);
    assert_eq!(app.fulfillment.count(), 1);
}

#[tokio::test]
async fn test_tampered_signature_is_rejected_without_mutation() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-1", 249_000).await;
    let writes_before = app.store.order_writes().await;

    let body = midtrans_body("TB-TEST-1", "200", "249000.00", "settlement", MIDTRANS_SERVER_KEY);
    let err = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&tamper_signature(&body)))
        .await
        .err()
        .unwrap();

    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    let order = app.store.find_by_reference("TB-TEST-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(app.store.order_writes().await, writes_before);
    assert_eq!(app.fulfillment.count(), 0);

    let audit = app.store.webhook_events().await;
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].processed);
    assert!(audit[0].last_error.is_some());
}

#[tokio::test]
async fn test_unknown_reference_is_acknowledged() {
    let app = test_app(UNUSED_BASE_URL);
    let body = midtrans_body("TB-GHOST", "200", "249000.00", "settlement", MIDTRANS_SERVER_KEY);

    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    assert_eq!(ack.result, "order_not_found");
    assert_eq!(app.store.order_writes().await, 0);
    assert_eq!(app.fulfillment.count(), 0);

    let audit = app.store.webhook_events().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].processed);
}

#[tokio::test]
async fn test_failed_order_never_becomes_paid() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-4", 249_000).await;

    let expired = midtrans_body("TB-TEST-4", "407", "249000.00", "expire", MIDTRANS_SERVER_KEY);
    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&expired))
        .await
        .unwrap();
    assert_eq!(ack.result, "marked_failed");

    let paid = midtrans_body("TB-TEST-4", "200", "249000.00", "settlement", MIDTRANS_SERVER_KEY);
    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&paid))
        .await
        .unwrap();
    assert_eq!(ack.result, "already_final");

    let order = app.store.find_by_reference("TB-TEST-4").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(app.fulfillment.count(), 0);
}

#[tokio::test]
async fn test_pending_notification_keeps_order_pending() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-5", 249_000).await;

    let body = midtrans_body("TB-TEST-5", "201", "249000.00", "pending", MIDTRANS_SERVER_KEY);
    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    assert_eq!(ack.result, "still_pending");
    let order = app.store.find_by_reference("TB-TEST-5").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_tripay_callback_is_detected_on_generic_endpoint() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-3", 249_000).await;

    let body = r#"{"reference":"DEV-T0001123","merchant_ref":"TB-TEST-3","payment_method_code":"QRIS","total_amount":249000,"status":"PAID","paid_at":1717236000}"#;
    let ack = app
        .state
        .webhooks
        .process(None, tripay_request(body, TRIPAY_PRIVATE_KEY))
        .await
        .unwrap();

    assert_eq!(ack.provider.as_str(), "tripay");
    assert_eq!(ack.result, "settled");
    let order = app.store.find_by_reference("TB-TEST-3").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_method.as_deref(), Some("QRIS"));
}

#[tokio::test]
async fn test_doku_notification_settles_order() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-2", 249_000).await;

    let body = r#"{"order":{"invoice_number":"TB-TEST-2","amount":249000},"transaction":{"status":"SUCCESS","date":"2024-06-01T10:00:00Z","original_request_id":"req-77"},"channel":{"id":"VIRTUAL_ACCOUNT_BCA"}}"#;
    let ack = app
        .state
        .webhooks
        .process(Some("doku"), doku_request(body, DOKU_SECRET_KEY))
        .await
        .unwrap();

    assert_eq!(ack.result, "settled");
    assert_eq!(app.fulfillment.count(), 1);
}

#[tokio::test]
async fn test_amount_mismatch_is_acknowledged_but_not_applied() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-6", 249_000).await;

    let body = midtrans_body("TB-TEST-6", "200", "1000.00", "settlement", MIDTRANS_SERVER_KEY);
    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    assert_eq!(ack.result, "amount_mismatch");
    let order = app.store.find_by_reference("TB-TEST-6").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(app.fulfillment.count(), 0);
}

#[tokio::test]
async fn test_tripay_callback_with_customer_fee_settles_order() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-FEE-1", 249_000).await;

    let body = r#"{"reference":"DEV-T0001124","merchant_ref":"TB-FEE-1","payment_method_code":"BRIVA","total_amount":253250,"fee_merchant":0,"fee_customer":4250,"amount_received":249000,"status":"PAID","paid_at":1717236000}"#;
    let ack = app
        .state
        .webhooks
        .process(Some("tripay"), tripay_request(body, TRIPAY_PRIVATE_KEY))
        .await
        .unwrap();

    assert_eq!(ack.result, "settled");
    let order = app.store.find_by_reference("TB-FEE-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(app.fulfillment.count(), 1);
}

#[tokio::test]
async fn test_fractional_gross_amount_is_not_applied() {
    let app = test_app(UNUSED_BASE_URL);
    insert_pending(&app.store, "TB-TEST-7", 249_000).await;

    let body = midtrans_body("TB-TEST-7", "200", "249000.50", "settlement", MIDTRANS_SERVER_KEY);
    let ack = app
        .state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    assert_eq!(ack.result, "amount_mismatch");
    let order = app.store.find_by_reference("TB-TEST-7").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(app.fulfillment.count(), 0);
}

fn coupon(code: &str, discount: CouponDiscount, current_uses: i32, max_uses: i32) -> Coupon {
    Coupon {
        code: code.to_string(),
        discount,
        is_active: true,
        current_uses,
        max_uses,
        expires_at: None,
    }
}

fn redemption(code: &str) -> RedemptionRequest {
    RedemptionRequest {
        coupon_code: code.to_string(),
        customer_name: "Ayu Lestari".to_string(),
        customer_email: "ayu@example.com".to_string(),
        customer_phone: None,
        product_name: "Full Reading".to_string(),
        reference_id: None,
        metadata: serde_json::json!({ "profile_id": "profile-1" }),
    }
}

#[tokio::test]
async fn test_free_coupon_creates_paid_order() {
    let app = test_app(UNUSED_BASE_URL);
    app.store
        .put_coupon(coupon("GRATIS", CouponDiscount::Free, 0, 5))
        .await;

    let result = app.state.redemptions.redeem(redemption("gratis")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.order.status, OrderStatus::Paid);
    assert_eq!(result.order.amount, 0);
    assert_eq!(result.order.payment_method.as_deref(), Some("coupon"));
    assert!(result.reference_id.starts_with("TB-"));

    let stored = app
        .store
        .find_by_reference(&result.reference_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(stored.coupon_code(), Some("GRATIS"));

    let coupon = app.store.find_by_code("GRATIS").await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 1);
    assert_eq!(app.fulfillment.count(), 1);
}

#[tokio::test]
async fn test_exhausted_coupon_is_rejected() {
    let app = test_app(UNUSED_BASE_URL);
    app.store
        .put_coupon(coupon("GRATIS", CouponDiscount::Free, 5, 5))
        .await;

    let err = app.state.redemptions.redeem(redemption("GRATIS")).await.err().unwrap();

    assert_eq!(err.coupon_rejection(), Some(CouponRejection::Exhausted));
    assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.store.order_writes().await, 0);
    assert_eq!(app.fulfillment.count(), 0);
}

#[tokio::test]
async fn test_discount_coupon_cannot_be_redeemed() {
    let app = test_app(UNUSED_BASE_URL);
    app.store
        .put_coupon(coupon("HEMAT10", CouponDiscount::Percentage(10), 0, 100))
        .await;

    let err = app.state.redemptions.redeem(redemption("HEMAT10")).await.err().unwrap();
    assert_eq!(err.coupon_rejection(), Some(CouponRejection::NotFreeRedeemable));
    assert_eq!(app.store.order_writes().await, 0);
}

#[tokio::test]
async fn test_unknown_coupon_is_rejected() {
    let app = test_app(UNUSED_BASE_URL);
    let err = app.state.redemptions.redeem(redemption("NOPE")).await.err().unwrap();
    assert_eq!(err.coupon_rejection(), Some(CouponRejection::NotFound));
}

#[tokio::test]
async fn test_discount_coupon_counted_when_order_is_paid() {
    let app = test_app(UNUSED_BASE_URL);
    app.store
        .put_coupon(coupon("HEMAT10", CouponDiscount::Percentage(10), 0, 100))
        .await;

    let preview = app.state.coupons.preview("hemat10", 249_000).await.unwrap();
    assert_eq!(preview.final_amount, 224_100);
    assert!(!preview.is_free);

    app.store
        .insert(NewOrder {
            reference_id: "TB-TEST-8".to_string(),
            customer_name: "Ayu Lestari".to_string(),
            customer_email: "ayu@example.com".to_string(),
            customer_phone: None,
            amount: preview.final_amount,
            product_name: "Full Reading".to_string(),
            metadata: serde_json::json!({ "coupon_code": "HEMAT10", "original_amount": 249_000 }),
            status: OrderStatus::Pending,
            payment_provider: Some("midtrans".to_string()),
            payment_method: None,
            paid_at: None,
        })
        .await
        .unwrap();

    let body = midtrans_body("TB-TEST-8", "200", "224100.00", "settlement", MIDTRANS_SERVER_KEY);
    app.state
        .webhooks
        .process(Some("midtrans"), midtrans_request(&body))
        .await
        .unwrap();

    let coupon = app.store.find_by_code("HEMAT10").await.unwrap().unwrap();
    assert_eq!(coupon.current_uses, 1);
}
