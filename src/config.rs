use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub pricing: Pricing,
    pub payment_return_url: String,
    /// Seed the demo zone, customer address and courier at startup.
    pub seed_demo: bool,
}

/// Per-bag money rates, in whole KZT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    /// What a customer pays for one bag on a one-time order.
    pub price_per_bag: i64,
    /// What a courier earns for one bag of a completed order.
    pub courier_rate_per_bag: i64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            price_per_bag: 249,
            courier_rate_per_bag: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Pricing::default();

        let pricing = Pricing {
            price_per_bag: parse_or_default("PRICE_PER_BAG", defaults.price_per_bag)?,
            courier_rate_per_bag: parse_or_default(
                "COURIER_RATE_PER_BAG",
                defaults.courier_rate_per_bag,
            )?,
        };
        if pricing.price_per_bag < 0 || pricing.courier_rate_per_bag < 0 {
            return Err(AppError::Internal(
                "per-bag rates must not be negative".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 8080)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            pricing,
            payment_return_url: env::var("PAYMENT_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:8080/payments/return".to_string()),
            seed_demo: parse_or_default("SEED_DEMO", false)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
