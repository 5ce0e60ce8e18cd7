//! Provider registry
//!
//! Holds one adapter per configured gateway. Gateways without credentials are
//! simply absent; asking for them is a configuration error, not a panic.

use crate::error::{AppError, AppResult, DomainError};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{ProviderName, WebhookRequest};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own [`PaymentProvider::name`]
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: ProviderName) -> AppResult<Arc<dyn PaymentProvider>> {
        self.providers.get(&name).cloned().ok_or_else(|| {
            AppError::configuration(format!("payment provider '{}' is not configured", name))
        })
    }

    /// Resolve a provider from a path segment such as `"midtrans"`
    pub fn get_by_name(&self, name: &str) -> AppResult<Arc<dyn PaymentProvider>> {
        let name: ProviderName = name.parse().map_err(|provider| {
            AppError::from(DomainError::UnknownProvider { provider })
        })?;
        self.get(name)
    }

    /// First configured provider whose notification shape matches the request
    pub fn detect(&self, request: &WebhookRequest) -> Option<Arc<dyn PaymentProvider>> {
        ProviderName::ALL
            .iter()
            .filter_map(|name| self.providers.get(name))
            .find(|provider| provider.recognizes(request))
            .cloned()
    }

    pub fn configured(&self) -> Vec<ProviderName> {
        ProviderName::ALL
            .iter()
            .copied()
            .filter(|name| self.providers.contains_key(name))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("configured", &self.configured())
            .finish()
    }
}
