//! The routable [`Error`] attached to an event once a failure is classified.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::failure::Failure;
use crate::types::{CoreErrorType, ErrorType};

struct ErrorInner {
    error_type: ErrorType,
    cause: Failure,
    description: String,
    detailed_description: String,
    child_errors: Vec<Error>,
}

/// A classified failure. Immutable; clones share the same instance.
#[derive(Clone)]
pub struct Error(Arc<ErrorInner>);

impl Error {
    pub fn builder(cause: impl Into<Failure>) -> ErrorBuilder {
        ErrorBuilder::new(cause)
    }

    pub fn error_type(&self) -> &ErrorType {
        &self.0.error_type
    }

    pub fn cause(&self) -> &Failure {
        &self.0.cause
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }

    pub fn detailed_description(&self) -> &str {
        &self.0.detailed_description
    }

    /// Errors of the individual routes when this error comes from a
    /// composite routing failure; empty otherwise.
    pub fn child_errors(&self) -> &[Error] {
        &self.0.child_errors
    }

    /// `true` only for the very same error instance.
    pub fn same_as(&self, other: &Error) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.description())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("error_type", &self.error_type().to_string())
            .field("description", &self.description())
            .field("cause", self.cause())
            .field("child_errors", &self.child_errors().len())
            .finish()
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Error", 5)?;
        s.serialize_field("errorType", self.error_type())?;
        s.serialize_field("description", self.description())?;
        s.serialize_field("detailedDescription", self.detailed_description())?;
        s.serialize_field("causeKind", self.cause().kind())?;
        s.serialize_field("childErrors", self.child_errors())?;
        s.end()
    }
}

/// Builds an [`Error`] from a raw cause.
///
/// Description defaults to the cause's message, the detailed description to
/// the full cause chain, the type to `MULE:UNKNOWN`. Child errors are taken
/// from the cause when it is a composite failure.
pub struct ErrorBuilder {
    cause: Failure,
    error_type: Option<ErrorType>,
    description: Option<String>,
    detailed_description: Option<String>,
}

impl ErrorBuilder {
    pub fn new(cause: impl Into<Failure>) -> Self {
        Self {
            cause: cause.into(),
            error_type: None,
            description: None,
            detailed_description: None,
        }
    }

    pub fn error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn detailed_description(mut self, detailed: impl Into<String>) -> Self {
        self.detailed_description = Some(detailed.into());
        self
    }

    pub fn build(self) -> Error {
        let description = self.description.unwrap_or_else(|| self.cause.message());
        let detailed_description = self
            .detailed_description
            .unwrap_or_else(|| self.cause.display_chain());
        Error(Arc::new(ErrorInner {
            error_type: self
                .error_type
                .unwrap_or_else(|| CoreErrorType::Unknown.error_type()),
            child_errors: self.cause.child_errors(),
            cause: self.cause,
            description,
            detailed_description,
        }))
    }
}
