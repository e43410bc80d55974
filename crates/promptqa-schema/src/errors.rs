use thiserror::Error;

/// Errors raised while constructing or validating a boundary record.
///
/// Every cross-boundary type in this crate is validated at construction; a
/// `SchemaError` always names the offending field so callers can surface a
/// precise message without re-deriving context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl SchemaError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
