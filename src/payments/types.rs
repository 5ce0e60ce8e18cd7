//! Payment provider types and data structures
//!
//! Normalized shapes shared by every provider adapter.

use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported payment gateways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Midtrans,
    Doku,
    Tripay,
}

impl ProviderName {
    pub const ALL: [ProviderName; 3] = [ProviderName::Midtrans, ProviderName::Doku, ProviderName::Tripay];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Midtrans => "midtrans",
            ProviderName::Doku => "doku",
            ProviderName::Tripay => "tripay",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "midtrans" => Ok(ProviderName::Midtrans),
            "doku" => Ok(ProviderName::Doku),
            "tripay" => Ok(ProviderName::Tripay),
            other => Err(other.to_string()),
        }
    }
}

/// How a provider wants customer phone numbers written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneFormat {
    /// `08123456789`
    National,
    /// `628123456789`
    International,
}

/// Customer details sent to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    /// Already normalized to the provider's [`PhoneFormat`]
    pub phone: Option<String>,
}

/// Order data a provider needs to open a payment session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Our reference id; the provider echoes it back in notifications
    pub reference_id: String,
    /// Whole Rupiah
    pub amount: i64,
    pub product_name: String,
    pub customer: CustomerDetails,
    /// Where the provider sends the buyer after paying
    pub return_url: Option<String>,
}

/// Payment session opened at the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Hosted payment page the buyer is redirected to
    pub payment_url: String,
    /// Provider-side token or transaction reference
    pub session_id: String,
}

/// Settlement outcome reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentOutcome {
    Success,
    Pending,
    Failed,
}

/// Authenticated, provider-independent view of one notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub provider: ProviderName,
    pub provider_transaction_id: Option<String>,
    pub order_reference_id: String,
    pub outcome: PaymentOutcome,
    /// Amount the notification reports for the order, if it carries one
    pub amount: Option<ReportedAmount>,
    pub payment_method_label: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
    /// Untouched provider payload, for audit
    pub raw_payload: serde_json::Value,
}

/// Order amount as read from a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedAmount {
    /// Whole Rupiah
    Whole(i64),
    /// Present but not a whole Rupiah value, kept verbatim
    Unreadable(String),
}

impl ReportedAmount {
    pub fn parse(raw: &str) -> Self {
        parse_whole_amount(raw)
            .map(ReportedAmount::Whole)
            .unwrap_or_else(|| ReportedAmount::Unreadable(raw.to_string()))
    }

    /// `None` for an absent (`null`) value
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        Some(
            amount_from_json(value)
                .map(ReportedAmount::Whole)
                .unwrap_or_else(|| ReportedAmount::Unreadable(value.to_string())),
        )
    }

    pub fn whole(&self) -> Option<i64> {
        match self {
            ReportedAmount::Whole(amount) => Some(*amount),
            ReportedAmount::Unreadable(_) => None,
        }
    }
}

impl fmt::Display for ReportedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportedAmount::Whole(amount) => write!(f, "{}", amount),
            ReportedAmount::Unreadable(raw) => f.write_str(raw),
        }
    }
}

/// Inbound HTTP notification as received
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WebhookRequest {
    pub fn new(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as JSON, or as a JSON string when it is not valid JSON
    pub fn payload_for_audit(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// Parse a provider amount such as `"249000.00"` or `249000` into whole Rupiah
pub fn parse_whole_amount(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (raw, ""),
    };
    if !fraction.chars().all(|c| c == '0') {
        return None;
    }
    whole.parse().ok()
}

/// Same as [`parse_whole_amount`] for JSON fields that may be numbers or strings
pub fn amount_from_json(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        serde_json::Value::String(s) => parse_whole_amount(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name_parsing() {
        assert_eq!("Midtrans".parse::<ProviderName>(), Ok(ProviderName::Midtrans));
        assert_eq!(" doku ".parse::<ProviderName>(), Ok(ProviderName::Doku));
        assert!("stripe".parse::<ProviderName>().is_err());
    }

    #[test]
    fn test_parse_whole_amount() {
        assert_eq!(parse_whole_amount("249000.00"), Some(249_000));
        assert_eq!(parse_whole_amount("249000"), Some(249_000));
        assert_eq!(parse_whole_amount("249000.50"), None);
        assert_eq!(parse_whole_amount("abc"), None);
    }

    #[test]
    fn test_amount_from_json() {
        assert_eq!(amount_from_json(&serde_json::json!(249000)), Some(249_000));
        assert_eq!(amount_from_json(&serde_json::json!(249000.0)), Some(249_000));
        assert_eq!(amount_from_json(&serde_json::json!("249000.00")), Some(249_000));
        assert_eq!(amount_from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_reported_amount() {
        assert_eq!(ReportedAmount::parse("249000.00"), ReportedAmount::Whole(249_000));
        assert_eq!(
            ReportedAmount::parse("249000.50"),
            ReportedAmount::Unreadable("249000.50".to_string())
        );
        assert_eq!(ReportedAmount::from_json(&serde_json::json!(null)), None);
        assert_eq!(
            ReportedAmount::from_json(&serde_json::json!(249000)),
            Some(ReportedAmount::Whole(249_000))
        );
        assert_eq!(
            ReportedAmount::from_json(&serde_json::json!("12,5")).and_then(|a| a.whole()),
            None
        );
        assert_eq!(
            serde_json::to_value(ReportedAmount::Whole(249_000)).unwrap(),
            serde_json::json!(249000)
        );
    }

    #[test]
    fn test_payload_for_audit_keeps_non_json_bodies() {
        let request = WebhookRequest::new(HeaderMap::new(), "a=1&b=2");
        assert_eq!(request.payload_for_audit(), serde_json::json!("a=1&b=2"));
    }
}
