use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// When a booking URL matches no credit block, rebind the first available
    /// block instead of rejecting the booking. See `BookingAttacher`.
    #[serde(default = "default_rebind_fallback")]
    pub rebind_fallback: bool,
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,
    #[serde(default = "default_otp_ttl_seconds")]
    pub otp_ttl_seconds: u64,
    /// Inbox for entitlement conditions that need a human (exhausted plans,
    /// bookings without a purchase).
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
}

fn default_rebind_fallback() -> bool {
    true
}

fn default_sweep_interval_hours() -> u64 {
    24
}

fn default_otp_ttl_seconds() -> u64 {
    300
}

fn default_admin_email() -> String {
    "ops@tutora.example".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, never checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // TUTORA__SERVER__PORT=9090 style environment overrides.
            .add_source(config::Environment::with_prefix("TUTORA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
