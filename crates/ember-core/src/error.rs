//! Error types for Ember

use thiserror::Error;

/// The main error type for Ember operations
#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Effect not found: {0}")]
    EffectNotFound(String),

    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Factory error: {0}")]
    FactoryError(String),

    #[error("Activation error: {0}")]
    ActivationError(String),

    #[error("Invalid field type: expected {expected}, got {got}")]
    InvalidFieldType { expected: String, got: String },

    #[error("Value out of range: {field} must be between {min} and {max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Engine error: {0}")]
    EngineError(String),
}

/// Result type alias for Ember operations
pub type Result<T> = std::result::Result<T, EmberError>;

impl From<toml::de::Error> for EmberError {
    fn from(err: toml::de::Error) -> Self {
        EmberError::TomlParseError(err.to_string())
    }
}
