//! Configuration module for the order management system.
//!
//! This module provides structures and utilities for managing marketplace
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set. Storage backend
//! sections are kept as raw TOML values so each implementation can validate
//! its own schema.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the marketplace core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration for this marketplace instance.
	pub marketplace: MarketplaceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for courier dispatch policies.
	#[serde(default)]
	pub dispatch: DispatchConfig,
	/// Configuration for settlement and payouts.
	#[serde(default)]
	pub settlement: SettlementConfig,
	/// Configuration for the external payment processor.
	pub payments: Option<PaymentsConfig>,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration for this marketplace instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketplaceConfig {
	/// Unique identifier for this instance.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for courier dispatch policies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
	/// Whether couriers may claim orders still in preparation.
	/// The canonical policy is claiming only ready orders.
	#[serde(default)]
	pub claim_from_preparing: bool,
	/// Maximum failed security-code submissions before the handoff locks.
	/// None means unlimited retries.
	#[serde(default)]
	pub max_code_attempts: Option<u32>,
	/// Minutes before readiness at which the imminent alert fires.
	#[serde(default = "default_imminent_threshold_minutes")]
	pub imminent_threshold_minutes: u32,
}

impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			claim_from_preparing: false,
			max_code_attempts: None,
			imminent_threshold_minutes: default_imminent_threshold_minutes(),
		}
	}
}

/// Returns the default imminent-alert threshold in minutes.
fn default_imminent_threshold_minutes() -> u32 {
	5
}

/// Configuration for settlement and payouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementConfig {
	/// Platform commission rate applied to restaurant revenue.
	#[serde(default = "default_commission_rate")]
	pub commission_rate: f64,
	/// Restaurant exempt from commission (the platform's own kitchen).
	#[serde(default)]
	pub internal_restaurant_id: Option<String>,
	/// Earliest complaint filing time, in minutes after delivery.
	#[serde(default = "default_complaint_window_open_minutes")]
	pub complaint_window_open_minutes: i64,
	/// Latest complaint filing time, in hours after delivery.
	#[serde(default = "default_complaint_window_close_hours")]
	pub complaint_window_close_hours: i64,
}

impl Default for SettlementConfig {
	fn default() -> Self {
		Self {
			commission_rate: default_commission_rate(),
			internal_restaurant_id: None,
			complaint_window_open_minutes: default_complaint_window_open_minutes(),
			complaint_window_close_hours: default_complaint_window_close_hours(),
		}
	}
}

/// Returns the default platform commission rate.
fn default_commission_rate() -> f64 {
	0.20
}

/// Returns the default complaint window opening delay in minutes.
fn default_complaint_window_open_minutes() -> i64 {
	60
}

/// Returns the default complaint window closing bound in hours.
fn default_complaint_window_close_hours() -> i64 {
	48
}

/// Configuration for the external payment processor.
///
/// When absent, refunds are recorded locally and flagged for manual
/// processing instead of being sent to a processor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentsConfig {
	/// Base URL of the payment processor's refund API.
	pub endpoint: String,
	/// Bearer token presented to the processor, if required.
	#[serde(default)]
	pub api_key: Option<String>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Static bearer tokens mapped to `role:user_id` pairs.
	/// Placeholder auth for deployments without an identity provider.
	#[serde(default)]
	pub tokens: HashMap<String, String>,
	/// Webhook URL the notifier posts to, if any.
	#[serde(default)]
	pub notify_webhook_url: Option<String>,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

impl Config {
	/// Loads configuration from a TOML file and validates it.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		Self::from_toml_str(&contents)
	}

	/// Parses configuration from a TOML string and validates it.
	pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(contents)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates cross-field constraints.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.marketplace.id.is_empty() {
			return Err(ConfigError::Validation(
				"marketplace.id must not be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"storage.primary '{}' has no matching implementation section",
				self.storage.primary
			)));
		}
		let rate = self.settlement.commission_rate;
		if !(0.0..=1.0).contains(&rate) {
			return Err(ConfigError::Validation(format!(
				"settlement.commission_rate must be between 0 and 1, got {}",
				rate
			)));
		}
		if self.settlement.complaint_window_open_minutes < 0 {
			return Err(ConfigError::Validation(
				"settlement.complaint_window_open_minutes must not be negative".into(),
			));
		}
		if self.settlement.complaint_window_close_hours * 60
			<= self.settlement.complaint_window_open_minutes
		{
			return Err(ConfigError::Validation(
				"complaint window must close after it opens".into(),
			));
		}
		Ok(())
	}

	/// Returns the configuration section of the primary storage backend.
	pub fn primary_storage(&self) -> Result<(&str, &toml::Value), ConfigError> {
		let name = self.storage.primary.as_str();
		let value = self.storage.implementations.get(name).ok_or_else(|| {
			ConfigError::Validation(format!(
				"primary storage '{}' has no implementation section",
				name
			))
		})?;
		Ok((name, value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE: &str = r#"
		[marketplace]
		id = "oms-test"

		[storage]
		primary = "memory"

		[storage.implementations.memory]
	"#;

	#[test]
	fn parses_minimal_config_with_defaults() {
		let config = Config::from_toml_str(BASE).unwrap();
		assert_eq!(config.marketplace.id, "oms-test");
		assert!(!config.dispatch.claim_from_preparing);
		assert_eq!(config.dispatch.imminent_threshold_minutes, 5);
		assert_eq!(config.settlement.commission_rate, 0.20);
		assert_eq!(config.settlement.complaint_window_open_minutes, 60);
		assert_eq!(config.settlement.complaint_window_close_hours, 48);
		assert!(config.api.is_none());
	}

	#[test]
	fn rejects_missing_primary_implementation() {
		let raw = r#"
			[marketplace]
			id = "oms-test"

			[storage]
			primary = "file"

			[storage.implementations.memory]
		"#;
		assert!(matches!(
			Config::from_toml_str(raw),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn primary_storage_errors_on_hand_built_config_without_section() {
		// Fields are public, so a Config can exist without passing
		// validate(); the accessor must not index blindly.
		let config = Config {
			marketplace: MarketplaceConfig {
				id: "oms-test".into(),
			},
			storage: StorageConfig {
				primary: "memory".into(),
				implementations: HashMap::new(),
			},
			dispatch: DispatchConfig::default(),
			settlement: SettlementConfig::default(),
			payments: None,
			api: None,
		};
		assert!(matches!(
			config.primary_storage(),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn rejects_out_of_range_commission() {
		let raw = format!("{}\n[settlement]\ncommission_rate = 1.5\n", BASE);
		assert!(matches!(
			Config::from_toml_str(&raw),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn rejects_inverted_complaint_window() {
		let raw = format!(
			"{}\n[settlement]\ncomplaint_window_open_minutes = 120\ncomplaint_window_close_hours = 1\n",
			BASE
		);
		assert!(matches!(
			Config::from_toml_str(&raw),
			Err(ConfigError::Validation(_))
		));
	}
}
