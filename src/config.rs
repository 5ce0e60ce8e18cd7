use crate::payments::providers::{doku, midtrans, tripay, DokuConfig, MidtransConfig, TripayConfig};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub midtrans: Option<MidtransConfig>,
    pub doku: Option<DokuConfig>,
    pub tripay: Option<TripayConfig>,
    pub fulfillment: FulfillmentConfig,
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `None` runs on the in-memory store
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    pub reference_prefix: String,
    pub return_url: Option<String>,
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid number", name))
}

/// All of `names` set, or none of them. Half-configured gateways are refused.
fn credentials<const N: usize>(names: [&str; N]) -> Result<Option<[String; N]>> {
    let values = names.map(optional);
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if let Some(i) = values.iter().position(Option::is_none) {
        return Err(anyhow!(
            "{} not set while other {} credentials are",
            names[i],
            names[0].split('_').next().unwrap_or_default()
        ));
    }
    Ok(Some(values.map(Option::unwrap_or_default)))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", "8080")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };
        let production = server.is_production();

        let database = DatabaseConfig {
            url: optional("DATABASE_URL"),
            max_connections: parsed("DATABASE_MAX_CONNECTIONS", "20")?,
        };

        let timeout_secs: u64 = parsed("PROVIDER_TIMEOUT_SECS", "30")?;
        let max_retries: u32 = parsed("PROVIDER_MAX_RETRIES", "2")?;
        let base_url = |name: &str, sandbox: &str, live: &str| {
            let default = if production { live } else { sandbox };
            optional(name).unwrap_or_else(|| default.to_string())
        };

        let midtrans = credentials(["MIDTRANS_SERVER_KEY"])?.map(|[server_key]| MidtransConfig {
            server_key,
            base_url: base_url(
                "MIDTRANS_BASE_URL",
                midtrans::SANDBOX_BASE_URL,
                midtrans::PRODUCTION_BASE_URL,
            ),
            timeout_secs,
            max_retries,
        });

        let doku = match credentials(["DOKU_CLIENT_ID", "DOKU_SECRET_KEY"])? {
            Some([client_id, secret_key]) => Some(DokuConfig {
                client_id,
                secret_key,
                base_url: base_url("DOKU_BASE_URL", doku::SANDBOX_BASE_URL, doku::PRODUCTION_BASE_URL),
                notification_target: optional("DOKU_NOTIFICATION_PATH")
                    .unwrap_or_else(|| "/webhooks/doku".to_string()),
                payment_due_minutes: parsed("DOKU_PAYMENT_DUE_MINUTES", "60")?,
                timeout_secs,
                max_retries,
            }),
            None => None,
        };

        let tripay = match credentials(["TRIPAY_API_KEY", "TRIPAY_PRIVATE_KEY", "TRIPAY_MERCHANT_CODE"])? {
            Some([api_key, private_key, merchant_code]) => Some(TripayConfig {
                api_key,
                private_key,
                merchant_code,
                base_url: base_url(
                    "TRIPAY_BASE_URL",
                    tripay::SANDBOX_BASE_URL,
                    tripay::PRODUCTION_BASE_URL,
                ),
                default_method: optional("TRIPAY_PAYMENT_METHOD").unwrap_or_else(|| "QRIS".to_string()),
                expiry_hours: parsed("TRIPAY_EXPIRY_HOURS", "24")?,
                timeout_secs,
                max_retries,
            }),
            None => None,
        };

        let fulfillment = FulfillmentConfig {
            endpoint: optional("FULFILLMENT_WEBHOOK_URL"),
            timeout_secs: parsed("FULFILLMENT_TIMEOUT_SECS", "10")?,
        };

        let checkout = CheckoutConfig {
            reference_prefix: optional("ORDER_REFERENCE_PREFIX").unwrap_or_else(|| "TB".to_string()),
            return_url: optional("CHECKOUT_RETURN_URL"),
        };

        let config = Config {
            server,
            database,
            midtrans,
            doku,
            tripay,
            fulfillment,
            checkout,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate port range
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.is_none() && self.server.is_production() {
            return Err(anyhow!("DATABASE_URL is required in production"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.midtrans.is_none() && self.doku.is_none() && self.tripay.is_none() {
            return Err(anyhow!(
                "At least one payment provider must be configured (MIDTRANS_*, DOKU_* or TRIPAY_*)"
            ));
        }

        if let Some(doku) = &self.doku {
            if !doku.notification_target.starts_with('/') {
                return Err(anyhow!("DOKU_NOTIFICATION_PATH must start with '/'"));
            }
        }

        if self.fulfillment.timeout_secs == 0 {
            return Err(anyhow!("FULFILLMENT_TIMEOUT_SECS must be greater than 0"));
        }

        if self.checkout.reference_prefix.is_empty()
            || !self
                .checkout
                .reference_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(anyhow!("ORDER_REFERENCE_PREFIX must be alphanumeric"));
        }

        Ok(())
    }
}
