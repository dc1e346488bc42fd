//! Component-level error mappings: retarget a resolved error type.

use serde::{Deserialize, Serialize};

use crate::matcher::ErrorTypeMatcher;
use crate::repository::{ErrorTypeRepository, RepositoryError};
use crate::types::{CoreErrorType, ErrorType, CORE_NAMESPACE};

/// One `source → target` rule.
#[derive(Debug, Clone)]
pub struct ErrorMapping {
    source: ErrorTypeMatcher,
    target: ErrorType,
}

impl ErrorMapping {
    pub fn new(source: ErrorTypeMatcher, target: ErrorType) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> &ErrorTypeMatcher {
        &self.source
    }

    pub fn target(&self) -> &ErrorType {
        &self.target
    }

    /// Critical types are never selected, whatever the source matcher says.
    pub fn matches(&self, error_type: &ErrorType) -> bool {
        !error_type.is_critical() && self.source.matches(error_type)
    }
}

/// Apply an ordered mapping list: the first matching rule wins, no match
/// leaves the type as is.
pub fn apply_mappings(mappings: &[ErrorMapping], error_type: &ErrorType) -> ErrorType {
    match mappings.iter().find(|m| m.matches(error_type)) {
        Some(mapping) => {
            tracing::debug!(
                from = %error_type,
                to = %mapping.target(),
                "error mapping applied"
            );
            mapping.target().clone()
        }
        None => error_type.clone(),
    }
}

/// Serialized form of a mapping, e.g. `{"source": "HTTP:*", "target": "APP:UPSTREAM"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMappingConfig {
    /// Matcher expression. Defaults to `ANY`.
    #[serde(default = "default_source")]
    pub source: String,
    /// Target type reference. Unknown non-core targets are registered under `MULE:ANY`.
    pub target: String,
}

fn default_source() -> String {
    CoreErrorType::Any.identifier().to_string()
}

impl ErrorMappingConfig {
    pub fn build(&self, repo: &ErrorTypeRepository) -> Result<ErrorMapping, RepositoryError> {
        let source = ErrorTypeMatcher::parse(&self.source, repo)?;
        let target = match repo.resolve(&self.target) {
            Ok(t) => t,
            Err(RepositoryError::UnknownType(_)) => {
                let (namespace, identifier) = self
                    .target
                    .split_once(':')
                    .map(|(ns, id)| (ns.trim(), id.trim()))
                    .unwrap_or((CORE_NAMESPACE, self.target.trim()));
                repo.register(namespace, identifier, &repo.core(CoreErrorType::Any))?
            }
            Err(e) => return Err(e),
        };
        Ok(ErrorMapping::new(source, target))
    }
}
