//! Configuration error types

use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration from {source_name}: {message}")]
    LoadFailed {
        source_name: String,
        message: String,
    },
}

impl ConfigurationError {
    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn load_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
