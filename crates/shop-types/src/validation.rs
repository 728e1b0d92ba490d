//! Schema validation for implementation-specific configuration tables.
//!
//! Each pluggable backend receives its raw `toml::Value` table and checks it
//! against a [`Schema`] before construction, so a typo in `config.toml`
//! fails at startup with the offending field path.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path with the enclosing table name.
	fn within(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(field) => {
				ValidationError::MissingField(format!("{}.{}", parent, field))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	/// Integer or float, optionally bounded below.
	Number {
		min: Option<f64>,
	},
	Boolean,
	/// Array whose elements all have the inner type.
	Array(Box<FieldType>),
	/// Nested table with its own schema.
	Table(Schema),
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Number { .. } => "number",
			FieldType::Boolean => "boolean",
			FieldType::Array(_) => "array",
			FieldType::Table(_) => "table",
		}
	}

	fn check(&self, field: &str, value: &toml::Value) -> Result<(), ValidationError> {
		let mismatch = || ValidationError::TypeMismatch {
			field: field.to_string(),
			expected: self.name().to_string(),
			actual: value.type_str().to_string(),
		};
		let out_of_range = |message: String| ValidationError::InvalidValue {
			field: field.to_string(),
			message,
		};

		match self {
			FieldType::String => value.as_str().map(|_| ()).ok_or_else(mismatch),
			FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
			FieldType::Integer { min, max } => {
				let n = value.as_integer().ok_or_else(mismatch)?;
				if let Some(min) = min.filter(|min| n < *min) {
					return Err(out_of_range(format!("Value {} is less than minimum {}", n, min)));
				}
				if let Some(max) = max.filter(|max| n > *max) {
					return Err(out_of_range(format!(
						"Value {} is greater than maximum {}",
						n, max
					)));
				}
				Ok(())
			},
			FieldType::Number { min } => {
				let n = value
					.as_float()
					.or_else(|| value.as_integer().map(|i| i as f64))
					.ok_or_else(mismatch)?;
				match min.filter(|min| n < *min) {
					Some(min) => Err(out_of_range(format!(
						"Value {} is less than minimum {}",
						n, min
					))),
					None => Ok(()),
				}
			},
			FieldType::Array(inner) => {
				let items = value.as_array().ok_or_else(mismatch)?;
				items
					.iter()
					.enumerate()
					.try_for_each(|(i, item)| inner.check(&format!("{}[{}]", field, i), item))
			},
			FieldType::Table(schema) => schema.validate(value).map_err(|e| e.within(field)),
		}
	}
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named, typed field of a schema.
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

	/// Attaches a custom check returning an error message on failure.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		self.field_type.check(&self.name, value)?;
		match &self.validator {
			Some(validator) => validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// Required and optional fields of a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates `config`, which must be a table.
	///
	/// Required fields must be present; optional ones are only checked when
	/// present. Unknown keys are ignored.
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

/// Implemented by every backend that accepts a configuration table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn webhook_schema() -> Schema {
		Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http") => Ok(()),
					_ => Err("must be an http(s) url".to_string()),
				}
			})],
			vec![
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: Some(60_000),
					},
				),
				Field::new(
					"headers",
					FieldType::Table(Schema::new(
						vec![Field::new("authorization", FieldType::String)],
						vec![],
					)),
				),
			],
		)
	}

	fn parse(text: &str) -> toml::Value {
		toml::from_str(text).unwrap()
	}

	#[test]
	fn test_valid_table_passes() {
		let config = parse("url = \"https://push.example\"\ntimeout_ms = 500");
		assert!(webhook_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_and_bounds() {
		let schema = webhook_schema();
		assert_eq!(
			schema.validate(&parse("timeout_ms = 5")),
			Err(ValidationError::MissingField("url".into()))
		);
		assert!(matches!(
			schema.validate(&parse("url = \"https://x\"\ntimeout_ms = 0")),
			Err(ValidationError::InvalidValue { .. })
		));
		assert!(matches!(
			schema.validate(&parse("url = \"ftp://x\"")),
			Err(ValidationError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_nested_errors_carry_path() {
		let config = parse("url = \"https://x\"\n[headers]\nother = 1");
		assert_eq!(
			webhook_schema().validate(&config),
			Err(ValidationError::MissingField("headers.authorization".into()))
		);
	}

	#[test]
	fn test_number_accepts_integers() {
		let schema = Schema::new(vec![Field::new("spf", FieldType::Number { min: Some(0.0) })], vec![]);
		assert!(schema.validate(&parse("spf = 100")).is_ok());
		assert!(schema.validate(&parse("spf = 99.5")).is_ok());
		assert!(schema.validate(&parse("spf = -1")).is_err());
	}
}
