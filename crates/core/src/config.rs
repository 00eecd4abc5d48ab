//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the stores. Environment variables are read by the binary only; the core never
//! consults process-wide state while handling an operation.

use crate::constants::{
    DEFAULT_PAYMENT_SUCCESS_RATE, DEFAULT_SIMULATED_DELAY_MS, DEFAULT_USER_ID,
    PHARMACY_SERVICE_FEE,
};
use crate::error::{StoreError, StoreResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    user_id: String,
    service_fee: f64,
    payment_success_rate: f64,
    simulated_delay: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with the default fee, success rate and delays.
    pub fn new(data_dir: PathBuf, user_id: String) -> StoreResult<Self> {
        if user_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("user_id cannot be empty".into()));
        }

        Ok(Self {
            data_dir,
            user_id,
            service_fee: PHARMACY_SERVICE_FEE,
            payment_success_rate: DEFAULT_PAYMENT_SUCCESS_RATE,
            simulated_delay: Duration::from_millis(DEFAULT_SIMULATED_DELAY_MS),
        })
    }

    /// Override the probability that a simulated payment succeeds.
    pub fn with_payment_success_rate(mut self, rate: f64) -> StoreResult<Self> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(StoreError::InvalidInput(format!(
                "payment success rate must be within [0, 1], got {rate}"
            )));
        }
        self.payment_success_rate = rate;
        Ok(self)
    }

    /// Override the latency of every simulated external service.
    pub fn with_simulated_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = delay;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The signed-in user; owner of notifications, ratings and the wallet.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn service_fee(&self) -> f64 {
        self.service_fee
    }

    pub fn payment_success_rate(&self) -> f64 {
        self.payment_success_rate
    }

    pub fn simulated_delay(&self) -> Duration {
        self.simulated_delay
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(crate::constants::DEFAULT_DATA_DIR),
            user_id: DEFAULT_USER_ID.to_owned(),
            service_fee: PHARMACY_SERVICE_FEE,
            payment_success_rate: DEFAULT_PAYMENT_SUCCESS_RATE,
            simulated_delay: Duration::from_millis(DEFAULT_SIMULATED_DELAY_MS),
        }
    }
}

/// Parse the payment success rate from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default rate.
pub fn payment_success_rate_from_env_value(value: Option<String>) -> StoreResult<f64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_PAYMENT_SUCCESS_RATE),
        Some(v) => v.parse::<f64>().map_err(|_| {
            StoreError::InvalidInput(format!("SEHATI_PAYMENT_SUCCESS_RATE is not a number: {v}"))
        }),
    }
}

/// Parse the simulated delay (milliseconds) from an optional string value.
pub fn simulated_delay_from_env_value(value: Option<String>) -> StoreResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(Duration::from_millis(DEFAULT_SIMULATED_DELAY_MS)),
        Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            StoreError::InvalidInput(format!(
                "SEHATI_SIMULATED_DELAY_MS is not a whole number: {v}"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_user() {
        let result = CoreConfig::new(PathBuf::from("data"), "  ".into());
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_success_rate_bounds() {
        let cfg = CoreConfig::default();
        assert!(cfg.clone().with_payment_success_rate(1.5).is_err());
        assert!(cfg.clone().with_payment_success_rate(-0.1).is_err());
        assert_eq!(
            cfg.with_payment_success_rate(0.25).unwrap().payment_success_rate(),
            0.25
        );
    }

    #[test]
    fn test_env_values_default_when_blank() {
        assert_eq!(
            payment_success_rate_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_PAYMENT_SUCCESS_RATE
        );
        assert_eq!(
            simulated_delay_from_env_value(None).unwrap(),
            Duration::from_millis(DEFAULT_SIMULATED_DELAY_MS)
        );
    }

    #[test]
    fn test_env_values_parse() {
        assert_eq!(
            payment_success_rate_from_env_value(Some("0.5".into())).unwrap(),
            0.5
        );
        assert_eq!(
            simulated_delay_from_env_value(Some("0".into())).unwrap(),
            Duration::ZERO
        );
        assert!(simulated_delay_from_env_value(Some("fast".into())).is_err());
    }
}
