//! Configuration validation types for the order management system.
//!
//! This module provides a small framework for validating the raw TOML
//! sections that configure pluggable implementations. Each implementation
//! declares a [`Schema`] of required and optional fields with types and
//! optional custom validators.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when a field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}")]
	TypeMismatch { field: String, expected: String },
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	/// A floating-point value.
	Float,
	/// A boolean value.
	Boolean,
}

/// Type alias for field validator functions.
///
/// Validators perform additional checks beyond type checking and return an
/// error message when validation fails.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		match &self.field_type {
			FieldType::String => {
				if !value.is_str() {
					return Err(ValidationError::TypeMismatch {
						field: self.name.clone(),
						expected: "string".into(),
					});
				}
			}
			FieldType::Integer { min, max } => {
				let n = value.as_integer().ok_or_else(|| ValidationError::TypeMismatch {
					field: self.name.clone(),
					expected: "integer".into(),
				})?;
				if let Some(min) = min {
					if n < *min {
						return Err(ValidationError::InvalidValue {
							field: self.name.clone(),
							message: format!("must be >= {}", min),
						});
					}
				}
				if let Some(max) = max {
					if n > *max {
						return Err(ValidationError::InvalidValue {
							field: self.name.clone(),
							message: format!("must be <= {}", max),
						});
					}
				}
			}
			FieldType::Float => {
				if value.as_float().is_none() && value.as_integer().is_none() {
					return Err(ValidationError::TypeMismatch {
						field: self.name.clone(),
						expected: "float".into(),
					});
				}
			}
			FieldType::Boolean => {
				if !value.is_bool() {
					return Err(ValidationError::TypeMismatch {
						field: self.name.clone(),
						expected: "boolean".into(),
					});
				}
			}
		}

		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}

		Ok(())
	}
}

/// Defines a validation schema for a TOML configuration section.
///
/// A schema consists of required fields that must be present and optional
/// fields that may be present.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = match config.as_table() {
			Some(table) => table,
			None => {
				// Empty schemas accept any shape, including non-tables.
				if self.required.is_empty() {
					return Ok(());
				}
				return Err(ValidationError::TypeMismatch {
					field: "<root>".into(),
					expected: "table".into(),
				});
			}
		};

		for field in &self.required {
			match table.get(&field.name) {
				Some(value) => field.check(value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

/// Trait implemented by each pluggable implementation to expose its schema.
pub trait ConfigSchema: Send + Sync {
	/// Validates the given configuration section.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
