//! Shared fixtures for integration tests
#![allow(dead_code)]

use axum::http::{HeaderMap, HeaderValue};
use settlement_backend::api::AppState;
use settlement_backend::database::memory::MemoryStore;
use settlement_backend::database::models::{NewOrder, Order, OrderStatus};
use settlement_backend::database::repository::OrderStore;
use settlement_backend::database::Stores;
use settlement_backend::payments::providers::{
    DokuConfig, DokuProvider, MidtransConfig, MidtransProvider, TripayConfig, TripayProvider,
};
use settlement_backend::payments::signature::{
    doku_digest, doku_signature, midtrans_signature, tripay_callback_signature,
    DokuSignatureComponents,
};
use settlement_backend::payments::{ProviderRegistry, WebhookRequest};
use settlement_backend::settlement::{CheckoutSettings, FulfillmentDispatcher};
use std::sync::{Arc, Mutex};

pub const MIDTRANS_SERVER_KEY: &str = "SB-Mid-server-test";
pub const DOKU_CLIENT_ID: &str = "MCH-0001";
pub const DOKU_SECRET_KEY: &str = "SK-doku-test";
pub const TRIPAY_PRIVATE_KEY: &str = "tripay-private-test";
pub const TRIPAY_MERCHANT_CODE: &str = "T0001";

/// Records every emitted order instead of calling out
#[derive(Default)]
pub struct RecordingDispatcher {
    emitted: Mutex<Vec<Order>>,
}

impl RecordingDispatcher {
    pub fn count(&self) -> usize {
        self.emitted.lock().unwrap().len()
    }

    pub fn emitted(&self) -> Vec<Order> {
        self.emitted.lock().unwrap().clone()
    }
}

impl FulfillmentDispatcher for RecordingDispatcher {
    fn emit(&self, order: &Order) {
        self.emitted.lock().unwrap().push(order.clone());
    }
}

/// All three providers, pointed at `base_url` and never retrying
pub fn registry(base_url: &str) -> ProviderRegistry {
    let midtrans = MidtransProvider::new(MidtransConfig {
        server_key: MIDTRANS_SERVER_KEY.to_string(),
        base_url: base_url.to_string(),
        timeout_secs: 5,
        max_retries: 0,
    })
    .unwrap();
    let doku = DokuProvider::new(DokuConfig {
        client_id: DOKU_CLIENT_ID.to_string(),
        secret_key: DOKU_SECRET_KEY.to_string(),
        base_url: base_url.to_string(),
        timeout_secs: 5,
        max_retries: 0,
        ..Default::default()
    })
    .unwrap();
    let tripay = TripayProvider::new(TripayConfig {
        api_key: "DEV-api-key".to_string(),
        private_key: TRIPAY_PRIVATE_KEY.to_string(),
        merchant_code: TRIPAY_MERCHANT_CODE.to_string(),
        base_url: base_url.to_string(),
        timeout_secs: 5,
        max_retries: 0,
        ..Default::default()
    })
    .unwrap();

    ProviderRegistry::new()
        .with(Arc::new(midtrans))
        .with(Arc::new(doku))
        .with(Arc::new(tripay))
}

pub struct TestApp {
    pub store: MemoryStore,
    pub fulfillment: Arc<RecordingDispatcher>,
    pub state: AppState,
}

pub fn test_app(base_url: &str) -> TestApp {
    let store = MemoryStore::new();
    let fulfillment = Arc::new(RecordingDispatcher::default());
    let state = AppState::new(
        "development",
        Stores::memory(store.clone()),
        registry(base_url),
        fulfillment.clone(),
        CheckoutSettings::default(),
        None,
    );
    TestApp {
        store,
        fulfillment,
        state,
    }
}

pub async fn insert_pending(store: &MemoryStore, reference_id: &str, amount: i64) -> Order {
    store
        .insert(NewOrder {
            reference_id: reference_id.to_string(),
            customer_name: "Ayu Lestari".to_string(),
            customer_email: "ayu@example.com".to_string(),
            customer_phone: Some("081234567890".to_string()),
            amount,
            product_name: "Full Reading".to_string(),
            metadata: serde_json::json!({ "profile_id": "profile-1" }),
            status: OrderStatus::Pending,
            payment_provider: Some("midtrans".to_string()),
            payment_method: None,
            paid_at: None,
        })
        .await
        .unwrap()
}

/// Midtrans notification body signed with `server_key`
pub fn midtrans_body(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    transaction_status: &str,
    server_key: &str,
) -> String {
    serde_json::json!({
        "order_id": order_id,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "signature_key": midtrans_signature(order_id, status_code, gross_amount, server_key),
        "transaction_status": transaction_status,
        "fraud_status": "accept",
        "transaction_id": "9aed5972-5b6a-401e-894b-a32c91ed1a3a",
        "payment_type": "bank_transfer",
        "transaction_time": "2024-06-01 10:00:00",
        "settlement_time": "2024-06-01 10:05:00",
    })
    .to_string()
}

pub fn midtrans_request(body: &str) -> WebhookRequest {
    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    WebhookRequest::new(headers, body.to_string())
}

/// Replace the last character of the `signature_key` value
pub fn tamper_signature(body: &str) -> String {
    let mut value: serde_json::Value = serde_json::from_str(body).unwrap();
    let signature = value["signature_key"].as_str().unwrap().to_string();
    let last = signature.chars().last().unwrap();
    let replacement = if last == '0' { '1' } else { '0' };
    let tampered = format!("{}{}", &signature[..signature.len() - 1], replacement);
    value["signature_key"] = serde_json::Value::String(tampered);
    value.to_string()
}

pub fn tripay_request(body: &str, private_key: &str) -> WebhookRequest {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Callback-Signature",
        HeaderValue::from_str(&tripay_callback_signature(body.as_bytes(), private_key)).unwrap(),
    );
    headers.insert("X-Callback-Event", HeaderValue::from_static("payment_status"));
    WebhookRequest::new(headers, body.to_string())
}

pub fn doku_request(body: &str, secret_key: &str) -> WebhookRequest {
    let digest = doku_digest(body.as_bytes());
    let signature = doku_signature(
        &DokuSignatureComponents {
            client_id: DOKU_CLIENT_ID,
            request_id: "notif-1",
            request_timestamp: "2024-06-01T10:00:00Z",
            request_target: "/webhooks/doku",
            digest: Some(&digest),
        },
        secret_key,
    );

    let mut headers = HeaderMap::new();
    headers.insert("Client-Id", HeaderValue::from_static(DOKU_CLIENT_ID));
    headers.insert("Request-Id", HeaderValue::from_static("notif-1"));
    headers.insert("Request-Timestamp", HeaderValue::from_static("2024-06-01T10:00:00Z"));
    headers.insert("Signature", HeaderValue::from_str(&signature).unwrap());
    WebhookRequest::new(headers, body.to_string())
}
