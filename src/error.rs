// Runtime error taxonomy shared by every phase of the engine.
use serde_json::{Map, Value};
use thiserror::Error;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub type ApiResult<T> = Result<T, ApiError>;

/// Field-keyed validation messages.
///
/// Every message is normalized on insertion so that it ends in `.` or `!`,
/// which keeps response bodies uniform no matter which hook produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: Map<String, Value>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }

    /// Append a message under a field, creating the field entry on first use.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let entry = self
            .fields
            .entry(field.into())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(messages) = entry {
            messages.push(Value::String(normalize_message(&message.into())));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn messages(&self, field: &str) -> Vec<&str> {
        match self.fields.get(field) {
            Some(Value::Array(messages)) => {
                messages.iter().filter_map(Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Response body shape: `{"<field>": ["<message>", ...], ...}`.
    pub fn to_body(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Terminate a message with `.` unless it already ends in `.` or `!`.
fn normalize_message(message: &str) -> String {
    if message.is_empty() || message.ends_with('.') || message.ends_with('!') {
        message.to_string()
    } else {
        format!("{message}.")
    }
}

/// The error kinds a hook, filter or handler may signal.
///
/// Validation, permission and not-found errors propagate unmodified up to the
/// dispatcher's single mapping boundary. `Contract` marks a programmer error
/// (wrong use of the engine) and is never converted into a quiet response.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("contract violation: {0}")]
    Contract(String),
}

impl ApiError {
    /// Status code this error maps to. Permission errors depend on whether
    /// the caller is authenticated.
    pub fn status_code(&self, authenticated: bool) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::PermissionDenied => {
                if authenticated {
                    403
                } else {
                    401
                }
            }
            ApiError::NotFound(_) => 404,
            ApiError::Contract(_) => 500,
        }
    }

    /// Response body for the mapped status, `Null` when the body is empty.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => errors.to_body(),
            ApiError::NotFound(message) => ValidationErrors::non_field(message.clone()).to_body(),
            ApiError::PermissionDenied | ApiError::Contract(_) => Value::Null,
        }
    }
}

/// Shortcut for a single-field validation failure.
pub fn fail(field: impl Into<String>, message: impl Into<String>) -> ApiError {
    ApiError::Validation(ValidationErrors::field(field, message))
}

/// Raise a single-field validation failure when `condition` holds.
pub fn fail_if(condition: bool, field: &str, message: &str) -> ApiResult<()> {
    if condition {
        Err(fail(field, message))
    } else {
        Ok(())
    }
}

/// Shortcut for a validation failure that belongs to no particular field.
pub fn fail_non_field(message: impl Into<String>) -> ApiError {
    ApiError::Validation(ValidationErrors::non_field(message))
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    ApiError::NotFound(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_gain_terminal_punctuation() {
        let errors = ValidationErrors::field("title", "Too short");
        assert_eq!(errors.to_body(), json!({"title": ["Too short."]}));
    }

    #[test]
    fn existing_punctuation_is_kept() {
        let mut errors = ValidationErrors::field("title", "Boom.");
        errors.push("title", "No!");
        assert_eq!(errors.to_body(), json!({"title": ["Boom.", "No!"]}));
    }

    #[test]
    fn non_field_errors_use_the_reserved_key() {
        let errors = ValidationErrors::non_field("Nothing matched");
        assert_eq!(
            errors.to_body(),
            json!({"non_field_errors": ["Nothing matched."]})
        );
    }

    #[test]
    fn permission_status_depends_on_authentication() {
        assert_eq!(ApiError::PermissionDenied.status_code(false), 401);
        assert_eq!(ApiError::PermissionDenied.status_code(true), 403);
    }

    #[test]
    fn fail_if_only_fails_on_condition() {
        assert!(fail_if(false, "x", "nope").is_ok());
        let err = fail_if(true, "x", "nope").unwrap_err();
        assert_eq!(err.status_code(false), 400);
    }
}
