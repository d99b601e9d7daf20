//! Common types module for the order management system.
//!
//! This module defines the core data types and structures shared by all
//! marketplace components. It provides a centralized location for the domain
//! model to ensure consistency across storage, dispatch, settlement and the
//! HTTP service.

/// Actor and role types for authorization checks.
pub mod actor;
/// API error envelope for HTTP endpoints.
pub mod api;
/// Complaint types for the post-delivery dispute workflow.
pub mod complaint;
/// Event types for inter-service communication.
pub mod events;
/// Money comparison helpers.
pub mod money;
/// Notification collaborator port.
pub mod notify;
/// Order types including line items and status enums.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Storage namespaces for persisted collections.
pub mod storage;
/// Restaurant payout ledger types.
pub mod transfer;
/// Configuration validation types for type-safe TOML configurations.
pub mod validation;

// Re-export all types for convenient access
pub use actor::*;
pub use api::*;
pub use complaint::*;
pub use events::*;
pub use money::*;
pub use notify::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use transfer::*;
pub use validation::*;
