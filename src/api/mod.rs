//! HTTP surface

pub mod checkout;
pub mod coupons;
pub mod health;
pub mod orders;
pub mod webhooks;

use crate::database::repository::OrderStore;
use crate::database::Stores;
use crate::payments::registry::ProviderRegistry;
use crate::settlement::{
    CheckoutService, CheckoutSettings, CouponRedemptionService, CouponService,
    FulfillmentDispatcher, OrderReconciler, WebhookProcessor,
};
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub environment: String,
    pub providers: ProviderRegistry,
    pub orders: Arc<dyn OrderStore>,
    pub checkout: Arc<CheckoutService>,
    pub coupons: CouponService,
    pub redemptions: Arc<CouponRedemptionService>,
    pub webhooks: Arc<WebhookProcessor>,
    /// `None` when running on the in-memory store
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        environment: impl Into<String>,
        stores: Stores,
        providers: ProviderRegistry,
        fulfillment: Arc<dyn FulfillmentDispatcher>,
        settings: CheckoutSettings,
        pool: Option<PgPool>,
    ) -> Self {
        let coupons = CouponService::new(stores.coupons.clone());
        let reconciler = OrderReconciler::new(
            stores.orders.clone(),
            stores.coupons.clone(),
            fulfillment.clone(),
        );

        Self {
            environment: environment.into(),
            checkout: Arc::new(CheckoutService::new(
                stores.orders.clone(),
                coupons.clone(),
                providers.clone(),
                settings.clone(),
            )),
            redemptions: Arc::new(CouponRedemptionService::new(
                stores.coupons.clone(),
                stores.orders.clone(),
                fulfillment,
                settings.reference_prefix,
            )),
            webhooks: Arc::new(WebhookProcessor::new(
                providers.clone(),
                reconciler,
                stores.webhooks,
            )),
            orders: stores.orders,
            coupons,
            providers,
            pool,
        }
    }
}

#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let request_id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/checkout/:provider", post(checkout::create_checkout))
        .route("/webhooks", post(webhooks::receive_detected))
        .route("/webhooks/:provider", post(webhooks::receive))
        .route("/coupons/preview", post(coupons::preview))
        .route("/coupons/redeem", post(coupons::redeem))
        .route("/orders/:reference_id", get(orders::order_status))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
