//! Factory-based builder for constructing engine instances.
//!
//! Callers register storage factories by implementation name and supply the
//! external collaborators; `build` resolves the primary storage backend from
//! configuration, validates its section against the backend's schema, and
//! wires up the services.

use crate::engine::{Engine, EngineError};
use crate::event_bus::EventBus;
use oms_config::Config;
use oms_dispatch::DispatchService;
use oms_settlement::{PaymentGateway, SettlementService};
use oms_storage::{StorageFactory, StorageService};
use oms_types::Notifier;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for [`Engine`] instances.
pub struct EngineBuilder {
	config: Config,
	storage_factories: HashMap<String, StorageFactory>,
	notifier: Option<Arc<dyn Notifier>>,
	payment_gateway: Option<Arc<dyn PaymentGateway>>,
}

impl EngineBuilder {
	/// Creates a builder from a validated configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factories: HashMap::new(),
			notifier: None,
			payment_gateway: None,
		}
	}

	/// Registers a storage factory under an implementation name.
	///
	/// The name must match the key under `[storage.implementations]`.
	pub fn with_storage_factory(mut self, name: &str, factory: StorageFactory) -> Self {
		self.storage_factories.insert(name.to_string(), factory);
		self
	}

	/// Sets the notification collaborator.
	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	/// Sets the payment processor collaborator.
	pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
		self.payment_gateway = Some(gateway);
		self
	}

	/// Builds the engine, wiring storage, dispatch and settlement together.
	pub fn build(self) -> Result<Engine, EngineError> {
		let (primary, storage_config) = self
			.config
			.primary_storage()
			.map_err(|e| EngineError::Config(e.to_string()))?;
		let factory = self.storage_factories.get(primary).ok_or_else(|| {
			EngineError::Config(format!("No storage factory registered for '{}'", primary))
		})?;
		let backend = factory(storage_config).map_err(|e| {
			tracing::error!(component = "storage", implementation = %primary, error = %e, "Failed to create storage backend");
			EngineError::Config(format!(
				"Failed to create storage backend '{}': {}",
				primary, e
			))
		})?;
		backend.config_schema().validate(storage_config).map_err(|e| {
			tracing::error!(component = "storage", implementation = %primary, error = %e, "Invalid storage configuration");
			EngineError::Config(format!(
				"Invalid configuration for storage backend '{}': {}",
				primary, e
			))
		})?;
		let storage = Arc::new(StorageService::new(backend));
		tracing::info!(component = "storage", implementation = %primary, "Loaded");

		let notifier = self
			.notifier
			.ok_or_else(|| EngineError::Config("Notifier not provided".to_string()))?;
		let payment_gateway = self
			.payment_gateway
			.ok_or_else(|| EngineError::Config("Payment gateway not provided".to_string()))?;

		let dispatch = Arc::new(DispatchService::new(
			storage.clone(),
			&self.config.dispatch,
		));
		let settlement = Arc::new(SettlementService::new(
			storage.clone(),
			payment_gateway,
			&self.config.settlement,
		));

		Ok(Engine {
			config: self.config,
			storage,
			dispatch,
			settlement,
			notifier,
			event_bus: EventBus::new(1000),
		})
	}
}
