//! Payment provider integration module
//!
//! This module provides a unified interface for Indonesian payment gateways
//! (Midtrans, DOKU, Tripay): opening hosted checkouts and authenticating the
//! notifications they send back.

pub mod http;
pub mod phone;
pub mod providers;
pub mod registry;
pub mod signature;
pub mod traits;
pub mod types;

pub use registry::ProviderRegistry;
pub use traits::{PaymentProvider, WebhookError};
pub use types::{
    CheckoutRequest, CustomerDetails, PaymentEvent, PaymentOutcome, PaymentSession, PhoneFormat,
    ProviderName, ReportedAmount, WebhookRequest,
};
