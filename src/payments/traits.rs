//! Payment provider trait definitions
//!
//! Defines the common interface that all payment providers must implement.

use crate::error::{AppError, AppResult, DomainError};
use crate::payments::signature::SignatureError;
use crate::payments::types::{
    CheckoutRequest, PaymentEvent, PaymentSession, PhoneFormat, ProviderName, WebhookRequest,
};
use async_trait::async_trait;
use thiserror::Error;

/// Why an inbound notification was refused
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature is absent or wrong; nothing in the payload can be trusted
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The payload cannot be parsed into a payment event
    #[error("{0}")]
    Malformed(String),
}

impl WebhookError {
    pub fn malformed(message: impl Into<String>) -> Self {
        WebhookError::Malformed(message.into())
    }

    pub fn into_app_error(self, provider: ProviderName) -> AppError {
        match self {
            WebhookError::Signature(e) => AppError::from(e),
            WebhookError::Malformed(message) => AppError::from(DomainError::MalformedWebhook {
                provider: provider.to_string(),
                message,
            }),
        }
    }
}

/// Trait for payment provider implementations
///
/// Each gateway (Midtrans, DOKU, Tripay) implements this trait once. Business
/// logic only ever talks to `dyn PaymentProvider`.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Phone format the gateway validates customer numbers against
    fn phone_format(&self) -> PhoneFormat;

    /// Open a hosted payment session for an order that is already stored as
    /// `PENDING`.
    ///
    /// # Returns
    /// * `PaymentSession` - redirect URL and the provider's session reference
    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<PaymentSession>;

    /// Authenticate an inbound notification and normalize it.
    ///
    /// The signature is checked before any field of the payload is used.
    fn parse_webhook(&self, request: &WebhookRequest) -> Result<PaymentEvent, WebhookError>;

    /// Cheap structural check used by the provider-agnostic webhook endpoint.
    /// Says nothing about authenticity.
    fn recognizes(&self, request: &WebhookRequest) -> bool;
}
