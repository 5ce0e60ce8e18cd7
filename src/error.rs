//! Application error taxonomy
//!
//! Every fallible operation in the service returns [`AppResult`]. The kind
//! decides the HTTP status a handler answers with.

use crate::database::error::DatabaseError;
use crate::payments::signature::SignatureError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppErrorKind {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: String },

    #[error("{field} is invalid: {message}")]
    InvalidField { field: String, message: String },
}

/// Why a coupon cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRejection {
    NotFound,
    Inactive,
    Expired,
    Exhausted,
    NotFreeRedeemable,
    CoversFullAmount,
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CouponRejection::NotFound => "Coupon code does not exist",
            CouponRejection::Inactive => "Coupon is no longer active",
            CouponRejection::Expired => "Coupon has expired",
            CouponRejection::Exhausted => "Coupon has reached its usage limit",
            CouponRejection::NotFreeRedeemable => {
                "Coupon only gives a discount and must be used at checkout"
            }
            CouponRejection::CoversFullAmount => {
                "Coupon covers the full price; redeem it instead of paying"
            }
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Coupon '{code}' rejected: {reason}")]
    CouponRejected {
        code: String,
        reason: CouponRejection,
    },

    #[error("An order with reference '{reference_id}' already exists")]
    DuplicateReference { reference_id: String },

    #[error("Order '{reference_id}' not found")]
    OrderNotFound { reference_id: String },

    #[error("Unknown payment provider '{provider}'")]
    UnknownProvider { provider: String },

    #[error("Webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("Malformed {provider} notification: {message}")]
    MalformedWebhook { provider: String, message: String },
}

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },

    #[error("{service} rate limit exceeded")]
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },

    #[error("{service} did not answer within {seconds} seconds")]
    Timeout { service: String, seconds: u64 },
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidField {
            field: field.into(),
            message: message.into(),
        }))
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::new(AppErrorKind::External(ExternalError::PaymentProvider {
            provider: provider.into(),
            message: message.into(),
            is_retryable,
        }))
    }

    pub fn coupon_rejected(code: impl Into<String>, reason: CouponRejection) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::CouponRejected {
            code: code.into(),
            reason,
        }))
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::External(ExternalError::PaymentProvider { is_retryable, .. }) => {
                *is_retryable
            }
            AppErrorKind::External(_) => true,
            AppErrorKind::Infrastructure(InfrastructureError::Database(e)) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn coupon_rejection(&self) -> Option<CouponRejection> {
        match &self.kind {
            AppErrorKind::Domain(DomainError::CouponRejected { reason, .. }) => Some(*reason),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::Domain(domain) => match domain {
                DomainError::CouponRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::DuplicateReference { .. } => StatusCode::CONFLICT,
                DomainError::OrderNotFound { .. } | DomainError::UnknownProvider { .. } => {
                    StatusCode::NOT_FOUND
                }
                DomainError::Signature(_) => StatusCode::FORBIDDEN,
                DomainError::MalformedWebhook { .. } => StatusCode::BAD_REQUEST,
            },
            AppErrorKind::External(external) => match external {
                ExternalError::PaymentProvider { .. } => StatusCode::BAD_GATEWAY,
                ExternalError::RateLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ExternalError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            },
            AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Validation(_) => "validation_error",
            AppErrorKind::Domain(DomainError::CouponRejected { .. }) => "coupon_rejected",
            AppErrorKind::Domain(DomainError::DuplicateReference { .. }) => "duplicate_reference",
            AppErrorKind::Domain(DomainError::OrderNotFound { .. }) => "order_not_found",
            AppErrorKind::Domain(DomainError::UnknownProvider { .. }) => "unknown_provider",
            AppErrorKind::Domain(DomainError::Signature(_)) => "invalid_signature",
            AppErrorKind::Domain(DomainError::MalformedWebhook { .. }) => "malformed_webhook",
            AppErrorKind::External(_) => "payment_provider_unavailable",
            AppErrorKind::Infrastructure(InfrastructureError::Configuration { .. }) => {
                "configuration_error"
            }
            AppErrorKind::Infrastructure(InfrastructureError::Database(_)) => "internal_error",
        }
    }

    /// Message safe to show to a caller
    fn public_message(&self) -> String {
        match &self.kind {
            AppErrorKind::External(_) => {
                "Payment could not be started. Please try again in a moment.".to_string()
            }
            AppErrorKind::Infrastructure(InfrastructureError::Database(_)) => {
                "Internal error while processing the request".to_string()
            }
            AppErrorKind::Domain(DomainError::CouponRejected { reason, .. }) => reason.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

macro_rules! impl_from_for_app_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for AppError {
                fn from(err: $source) -> Self {
                    AppError::new(err.into())
                }
            }
        )*
    };
}

impl_from_for_app_error!(
    AppErrorKind,
    ValidationError,
    DomainError,
    ExternalError,
    InfrastructureError,
    DatabaseError,
    SignatureError,
);

impl From<DatabaseError> for AppErrorKind {
    fn from(err: DatabaseError) -> Self {
        AppErrorKind::Infrastructure(InfrastructureError::Database(err))
    }
}

impl From<SignatureError> for AppErrorKind {
    fn from(err: SignatureError) -> Self {
        AppErrorKind::Domain(DomainError::Signature(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.public_message(),
                "retryable": self.is_retryable(),
            }
        }));
        (status, body).into_response()
    }
}
