use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Top-level configuration for the order entry service
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    #[serde(default)]
    pub trading: TradingRules,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Exchange rules applied while composing an order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradingRules {
    /// Minimum tradable multiple (shares)
    #[serde(default = "default_lot_size")]
    pub lot_size: i64,

    /// Flat trading fee rate applied to the order value.
    /// No tiering and no minimum fee.
    #[serde(default = "default_fee_rate")]
    #[schema(value_type = String, example = "0.0015")]
    pub fee_rate: Decimal,

    /// Number of digits in a confirmation OTP
    #[serde(default = "default_otp_length")]
    pub otp_length: usize,

    /// Quantity a fresh draft starts with
    #[serde(default = "default_lot_size")]
    pub default_quantity: i64,

    /// Last price at or above which the large price tick applies
    #[serde(default = "default_tick_threshold")]
    pub tick_threshold: i64,

    #[serde(default = "default_tick_large")]
    pub tick_large: i64,

    #[serde(default = "default_tick_small")]
    pub tick_small: i64,
}

/// Confirmation protocol settings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationConfig {
    /// Upper bound on one submission service call
    #[serde(default = "default_submission_timeout")]
    pub submission_timeout_ms: u64,

    /// How long a settled session stays visible before it is closed
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Sessions idle for longer than this are evicted, unless a submission is in flight
    #[serde(default = "default_session_ttl")]
    pub session_ttl_ms: u64,

    /// How often the idle-session sweep runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Re-check price band and buying power against fresh snapshots before submitting
    #[serde(default)]
    pub revalidate_on_submit: bool,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

/// Settings for the in-memory collaborators used when running standalone
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimulationConfig {
    #[serde(default = "default_submission_latency")]
    pub submission_latency_ms: u64,

    #[serde(default = "default_opening_balance")]
    pub opening_balance: i64,

    /// Quantity held of every listed symbol
    #[serde(default = "default_holding")]
    pub default_holding: i64,
}

impl Default for TradingRules {
    fn default() -> Self {
        Self {
            lot_size: default_lot_size(),
            fee_rate: default_fee_rate(),
            otp_length: default_otp_length(),
            default_quantity: default_lot_size(),
            tick_threshold: default_tick_threshold(),
            tick_large: default_tick_large(),
            tick_small: default_tick_small(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            submission_timeout_ms: default_submission_timeout(),
            settle_delay_ms: default_settle_delay(),
            session_ttl_ms: default_session_ttl(),
            sweep_interval_ms: default_sweep_interval(),
            revalidate_on_submit: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            submission_latency_ms: default_submission_latency(),
            opening_balance: default_opening_balance(),
            default_holding: default_holding(),
        }
    }
}

impl ConfirmationConfig {
    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_millis(self.session_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

// Default value functions for serde
fn default_lot_size() -> i64 {
    100
}

fn default_fee_rate() -> Decimal {
    dec!(0.0015)
}

fn default_otp_length() -> usize {
    6
}

fn default_tick_threshold() -> i64 {
    50_000
}

fn default_tick_large() -> i64 {
    100
}

fn default_tick_small() -> i64 {
    50
}

fn default_submission_timeout() -> u64 {
    30_000
}

fn default_settle_delay() -> u64 {
    2_500
}

fn default_session_ttl() -> u64 {
    15 * 60 * 1000
}

fn default_sweep_interval() -> u64 {
    60 * 1000
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_submission_latency() -> u64 {
    2_000
}

fn default_opening_balance() -> i64 {
    50_000_000
}

fn default_holding() -> i64 {
    500
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl EngineConfig {
    /// Build configuration from environment variables, falling back to defaults.
    ///
    /// `.env` loading is left to the caller (`dotenvy::dotenv()` in `main`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let trading = TradingRules {
            lot_size: parse_or(&lookup, "ORDER_LOT_SIZE", defaults.trading.lot_size)?,
            fee_rate: parse_or(&lookup, "ORDER_FEE_RATE", defaults.trading.fee_rate)?,
            otp_length: parse_or(&lookup, "ORDER_OTP_LENGTH", defaults.trading.otp_length)?,
            default_quantity: parse_or(
                &lookup,
                "ORDER_DEFAULT_QUANTITY",
                defaults.trading.default_quantity,
            )?,
            ..defaults.trading
        };

        let confirmation = ConfirmationConfig {
            submission_timeout_ms: parse_or(
                &lookup,
                "SUBMISSION_TIMEOUT_MS",
                defaults.confirmation.submission_timeout_ms,
            )?,
            settle_delay_ms: parse_or(
                &lookup,
                "SETTLE_DELAY_MS",
                defaults.confirmation.settle_delay_ms,
            )?,
            session_ttl_ms: parse_or(
                &lookup,
                "SESSION_TTL_MS",
                defaults.confirmation.session_ttl_ms,
            )?,
            sweep_interval_ms: parse_or(
                &lookup,
                "SESSION_SWEEP_INTERVAL_MS",
                defaults.confirmation.sweep_interval_ms,
            )?,
            revalidate_on_submit: parse_or(
                &lookup,
                "REVALIDATE_ON_SUBMIT",
                defaults.confirmation.revalidate_on_submit,
            )?,
        };

        let server = ServerConfig {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.server.bind_addr),
        };

        let simulation = SimulationConfig {
            submission_latency_ms: parse_or(
                &lookup,
                "SIM_SUBMISSION_LATENCY_MS",
                defaults.simulation.submission_latency_ms,
            )?,
            opening_balance: parse_or(
                &lookup,
                "SIM_OPENING_BALANCE",
                defaults.simulation.opening_balance,
            )?,
            default_holding: parse_or(
                &lookup,
                "SIM_DEFAULT_HOLDING",
                defaults.simulation.default_holding,
            )?,
        };

        let config = EngineConfig {
            trading,
            confirmation,
            server,
            simulation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.lot_size <= 0 {
            return Err(ConfigError::Invalid("lot_size must be positive".to_string()));
        }
        if self.trading.fee_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid("fee_rate must not be negative".to_string()));
        }
        if self.trading.otp_length == 0 {
            return Err(ConfigError::Invalid("otp_length must be positive".to_string()));
        }
        if self.trading.tick_large <= 0 || self.trading.tick_small <= 0 {
            return Err(ConfigError::Invalid("price ticks must be positive".to_string()));
        }
        if self.confirmation.session_ttl_ms == 0 || self.confirmation.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "session_ttl_ms and sweep_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
