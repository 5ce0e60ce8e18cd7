//! HTTP plumbing shared by the provider adapters

use crate::error::{AppError, AppErrorKind, AppResult, ExternalError};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{error, warn};

/// Raw provider answer: status plus body text
#[derive(Debug)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ProviderResponse {
    /// Decode a JSON body, mapping parse failures to a provider error
    pub fn json<T>(&self, provider: &str) -> AppResult<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        serde_json::from_str(&self.body).map_err(|e| {
            error!(provider, error = %e, "Failed to parse provider response");
            AppError::provider(provider, format!("Invalid response format: {}", e), false)
        })
    }
}

/// Client with a bounded timeout and the retry policy every adapter uses
#[derive(Debug, Clone)]
pub struct ProviderHttp {
    client: Client,
    timeout_secs: u64,
    max_retries: u32,
}

impl ProviderHttp {
    pub fn new(timeout_secs: u64, max_retries: u32) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs,
            max_retries,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request, retrying rate limits and transport errors with
    /// exponential backoff. Any other status is returned to the caller.
    pub async fn send(&self, provider: &str, request: RequestBuilder) -> AppResult<ProviderResponse> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let req = request.try_clone().ok_or_else(|| {
                AppError::provider(provider, "Failed to clone request", false)
            })?;

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt < self.max_retries {
                            let backoff = 2_u64.pow(attempt);
                            warn!(provider, backoff, attempt = attempt + 1, "Rate limited, retrying");
                            tokio::time::sleep(Duration::from_secs(backoff)).await;
                            continue;
                        }
                        return Err(AppError::new(AppErrorKind::External(ExternalError::RateLimit {
                            service: provider.to_string(),
                            retry_after: Some(60),
                        })));
                    }

                    return Ok(ProviderResponse { status, body });
                }
                Err(e) if e.is_timeout() => {
                    error!(provider, error = %e, "Provider request timed out");
                    return Err(AppError::new(AppErrorKind::External(ExternalError::Timeout {
                        service: provider.to_string(),
                        seconds: self.timeout_secs,
                    })));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let backoff = 2_u64.pow(attempt);
                        warn!(provider, backoff, attempt = attempt + 1, error = %e, "Request error, retrying");
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                        last_error = Some(e);
                        continue;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::provider(
            provider,
            format!(
                "Request failed after {} retries: {}",
                self.max_retries,
                last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Unknown error".to_string())
            ),
            true,
        ))
    }
}

/// Build the error for a non-2xx provider answer
pub fn unexpected_status(provider: &str, response: &ProviderResponse) -> AppError {
    error!(provider, status = %response.status, body = %response.body, "Provider returned an error");
    AppError::provider(
        provider,
        format!("HTTP {}: {}", response.status, response.body),
        response.status.is_server_error(),
    )
}
