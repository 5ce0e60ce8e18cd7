//! Inbound provider notifications
//!
//! Every notification is written to the audit log first, then authenticated
//! by its provider adapter, then reconciled. A rejected signature never
//! reaches the reconciler.

use crate::database::repository::WebhookLog;
use crate::error::{AppError, AppResult};
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{ProviderName, WebhookRequest};
use crate::settlement::reconciler::{OrderReconciler, ReconcileOutcome};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const EVENT_TYPE: &str = "payment_notification";

/// Body returned to the provider when a notification should not be retried
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub provider: ProviderName,
    pub reference_id: String,
    pub result: &'static str,
}

pub struct WebhookProcessor {
    providers: ProviderRegistry,
    reconciler: OrderReconciler,
    log: Arc<dyn WebhookLog>,
}

impl WebhookProcessor {
    pub fn new(providers: ProviderRegistry, reconciler: OrderReconciler, log: Arc<dyn WebhookLog>) -> Self {
        Self {
            providers,
            reconciler,
            log,
        }
    }

    /// Handle one delivery. `provider` comes from the route; `None` means the
    /// provider is detected from the request itself.
    pub async fn process(&self, provider: Option<&str>, request: WebhookRequest) -> AppResult<WebhookAck> {
        let provider = match provider {
            Some(name) => self.providers.get_by_name(name)?,
            None => self.providers.detect(&request).ok_or_else(|| {
                AppError::validation("provider", "notification does not match any configured provider")
            })?,
        };
        let name = provider.name();

        let audit_id = match self
            .log
            .log_event(EVENT_TYPE, name.as_str(), request.payload_for_audit())
            .await
        {
            Ok(event) => Some(event.id),
            Err(e) => {
                warn!(provider = %name, error = %e, "Failed to write webhook audit entry");
                None
            }
        };

        let event = match provider.parse_webhook(&request) {
            Ok(event) => event,
            Err(e) => {
                warn!(provider = %name, error = %e, "Rejected payment notification");
                self.record_failure(audit_id.as_deref(), &e.to_string()).await;
                return Err(e.into_app_error(name));
            }
        };

        let outcome = match self.reconciler.reconcile(&event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    provider = %name,
                    reference_id = %event.order_reference_id,
                    error = %e,
                    "Failed to reconcile payment notification"
                );
                self.record_failure(audit_id.as_deref(), &e.to_string()).await;
                return Err(e);
            }
        };

        if let Some(id) = audit_id.as_deref() {
            if let Err(e) = self.log.mark_processed(id).await {
                warn!(audit_id = %id, error = %e, "Failed to mark webhook audit entry processed");
            }
        }

        if !matches!(outcome, ReconcileOutcome::Settled | ReconcileOutcome::MarkedFailed) {
            info!(
                provider = %name,
                reference_id = %event.order_reference_id,
                result = outcome.as_str(),
                "Notification acknowledged without changes"
            );
        }

        Ok(WebhookAck {
            received: true,
            provider: name,
            reference_id: event.order_reference_id,
            result: outcome.as_str(),
        })
    }

    async fn record_failure(&self, audit_id: Option<&str>, message: &str) {
        if let Some(id) = audit_id {
            if let Err(e) = self.log.record_failure(id, message).await {
                warn!(audit_id = %id, error = %e, "Failed to annotate webhook audit entry");
            }
        }
    }
}
