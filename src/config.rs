use std::env;
use log::warn;

// Server Configuration
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_API_BIND_ADDRESS: &str = "127.0.0.1:8081";

// Feed Configuration
pub const DEFAULT_RATE_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_RATE_FETCH_TIMEOUT_SECS: u64 = 3;
pub const RATE_BACKOFF_MS: u64 = 500;
pub const DEFAULT_QUOTE_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_QUOTE_FETCH_TIMEOUT_SECS: u64 = 10;
pub const QUOTE_BACKOFF_SECS: u64 = 2;
pub const POLL_SLEEP_FLOOR_MS: u64 = 10;

// Retention Configuration
pub const RATE_HISTORY_CAPACITY: usize = 1441;
pub const QUOTE_HISTORY_CAPACITY: usize = 11;
pub const SEEN_SET_CAPACITY: usize = 2000;

// Broadcast Configuration
pub const BROADCAST_CHANNEL_SIZE: usize = 100;
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;
pub const WRITE_TIMEOUT_SECS: u64 = 10;

// Feed endpoints
pub const RATE_API_URL: &str = "https://api.treasury.id/api/v1/antigrvty/gold/rate";
pub const QUOTE_URL: &str = "https://www.google.com/finance/quote/USD-IDR";

pub struct Config {
    pub bind_address: String,
    pub api_bind_address: String,
    pub rate_poll_interval_ms: u64,
    pub rate_fetch_timeout_secs: u64,
    pub quote_poll_interval_secs: u64,
    pub quote_fetch_timeout_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string()),
            api_bind_address: env::var("API_BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_API_BIND_ADDRESS.to_string()),
            rate_poll_interval_ms: parse_env("RATE_POLL_INTERVAL_MS", DEFAULT_RATE_POLL_INTERVAL_MS),
            rate_fetch_timeout_secs: parse_env("RATE_FETCH_TIMEOUT_SECS", DEFAULT_RATE_FETCH_TIMEOUT_SECS),
            quote_poll_interval_secs: parse_env("QUOTE_POLL_INTERVAL_SECS", DEFAULT_QUOTE_POLL_INTERVAL_SECS),
            quote_fetch_timeout_secs: parse_env("QUOTE_FETCH_TIMEOUT_SECS", DEFAULT_QUOTE_FETCH_TIMEOUT_SECS),
            log_level: env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.bind_address));
        }

        if self.api_bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid API bind address: {}", self.api_bind_address));
        }

        if self.bind_address == self.api_bind_address {
            return Err("WebSocket and API servers cannot share a bind address".to_string());
        }

        if self.rate_poll_interval_ms == 0 || self.quote_poll_interval_secs == 0 {
            return Err("Poll intervals must be non-zero".to_string());
        }

        if self.rate_fetch_timeout_secs == 0 || self.quote_fetch_timeout_secs == 0 {
            return Err("Fetch timeouts must be non-zero".to_string());
        }

        Ok(())
    }

    pub fn log_config(&self) {
        println!("Server Configuration:");
        println!("  WebSocket Bind Address: {}", self.bind_address);
        println!("  API Bind Address: {}", self.api_bind_address);
        println!("  Rate Poll Interval: {}ms", self.rate_poll_interval_ms);
        println!("  Quote Poll Interval: {}s", self.quote_poll_interval_secs);
        println!("  Log Level: {}", self.log_level);
    }
}

fn parse_env(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {}: {:?}, using default {}", key, value, default);
            default
        }),
        Err(_) => default,
    }
}
