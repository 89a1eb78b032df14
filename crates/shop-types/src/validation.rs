//! Configuration validation for implementation-specific TOML tables.
//!
//! Each pluggable implementation (storage backend, auth provider) describes
//! its table with a [`Schema`] and checks it before it is constructed.

use async_trait::async_trait;
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
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// Error that occurs when deserialization fails.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer value with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	/// A string restricted to a fixed set of values.
	OneOf(&'static [&'static str]),
	/// An array of values, all of the same type.
	Array(Box<FieldType>),
	/// A nested table with its own schema.
	Table(Schema),
	/// A table with arbitrary keys whose values all share one type.
	Map(Box<FieldType>),
}

/// Type alias for field validator functions.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a configuration schema.
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
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator that runs after the type check passes.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Defines a validation schema for a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Required fields must be present; optional fields are only checked
	/// when present. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn type_mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

/// Prefixes the field path of a nested validation error.
fn nest(prefix: &str, err: ValidationError) -> ValidationError {
	match err {
		ValidationError::MissingField(f) => ValidationError::MissingField(format!("{}.{}", prefix, f)),
		ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
			field: format!("{}.{}", prefix, field),
			message,
		},
		ValidationError::TypeMismatch {
			field,
			expected,
			actual,
		} => ValidationError::TypeMismatch {
			field: format!("{}.{}", prefix, field),
			expected,
			actual,
		},
		other => other,
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(type_mismatch(field_name, "string", value));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| type_mismatch(field_name, "integer", value))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(type_mismatch(field_name, "boolean", value));
			}
		},
		FieldType::OneOf(allowed) => {
			let s = value
				.as_str()
				.ok_or_else(|| type_mismatch(field_name, "string", value))?;
			if !allowed.contains(&s) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("'{}' is not one of {}", s, allowed.join(", ")),
				});
			}
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| type_mismatch(field_name, "array", value))?;
			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| nest(field_name, e))?;
		},
		FieldType::Map(inner_type) => {
			let table = value
				.as_table()
				.ok_or_else(|| type_mismatch(field_name, "table", value))?;
			for (key, item) in table {
				validate_field_type(&format!("{}.{}", field_name, key), item, inner_type)?;
			}
		},
	}

	Ok(())
}

/// A configuration schema that can validate TOML values.
#[async_trait]
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
