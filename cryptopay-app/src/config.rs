//! Configuration from command-line flags and environment.

use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration. Every flag falls back to its environment
/// variable, which `.env` may supply.
#[derive(Debug, Parser)]
#[command(name = "cryptopay-server")]
#[command(author, version, about = "Crypto payment lifecycle service", long_about = None)]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// `postgres://...` or `sqlite:...`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(
        long,
        env = "GATEWAY_API_URL",
        default_value = "https://api.nowpayments.io/v1"
    )]
    pub gateway_api_url: String,

    #[arg(long, env = "GATEWAY_API_KEY", hide_env_values = true)]
    pub gateway_api_key: String,

    /// Secret the gateway signs notifications with
    #[arg(long, env = "GATEWAY_IPN_SECRET", hide_env_values = true)]
    pub gateway_ipn_secret: String,

    #[arg(long, env = "GATEWAY_TIMEOUT_SECS", default_value_t = 5)]
    pub gateway_timeout_secs: u64,

    /// Fiat currency prices are quoted to the gateway in
    #[arg(long, env = "GATEWAY_PRICE_CURRENCY", default_value = "usd")]
    pub gateway_price_currency: String,

    /// Hosted payment page prefix; the payment id is appended
    #[arg(
        long,
        env = "PAYMENT_PAGE_URL",
        default_value = "https://nowpayments.io/payment/?iid="
    )]
    pub payment_page_url: String,

    /// Externally reachable URL of this service
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:3000")]
    pub public_base_url: String,

    #[arg(
        long,
        env = "RATES_API_URL",
        default_value = "https://open.er-api.com/v6/latest"
    )]
    pub rates_api_url: String,

    #[arg(long, env = "RATE_REFRESH_INTERVAL_SECS", default_value_t = 3600)]
    pub rate_refresh_interval_secs: u64,

    #[arg(long, env = "EXPIRY_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub expiry_sweep_interval_secs: u64,

    /// Order service notified when a payment finishes; logged only when unset
    #[arg(long, env = "ORDER_FULFILLMENT_URL")]
    pub order_fulfillment_url: Option<String>,

    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = 100)]
    pub rate_limit_per_minute: u32,

    /// Rate-limit by the first X-Forwarded-For hop; set only behind a proxy
    #[arg(long, env = "TRUST_FORWARDED_FOR", default_value_t = false)]
    pub trust_forwarded_for: bool,

    /// Key for refunds and currency writes; those endpoints are closed when unset
    #[arg(long, env = "ADMIN_API_KEY", hide_env_values = true)]
    pub admin_api_key: Option<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Where the gateway posts status notifications.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/crypto/webhook",
            self.public_base_url.trim_end_matches('/')
        )
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn rate_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.rate_refresh_interval_secs.max(1))
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs.max(1))
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
