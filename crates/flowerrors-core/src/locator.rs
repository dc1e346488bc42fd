//! Error type locators: classify a raw failure into an [`ErrorType`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::component::ComponentIdentifier;
use crate::failure::{kinds, Failure};
use crate::repository::{ErrorTypeRepository, RepositoryError};
use crate::types::{CoreErrorType, ErrorType};

/// Maps failures to error types.
///
/// Lookups are total: anything without a mapping classifies as
/// `MULE:UNKNOWN`. Implementations must be `Send + Sync`.
pub trait ErrorTypeLocator: Send + Sync {
    fn lookup_error_type(&self, failure: &Failure) -> ErrorType;

    /// Classification as seen from a specific component kind. Falls back to
    /// [`ErrorTypeLocator::lookup_error_type`] when the component declares
    /// nothing for this failure.
    fn lookup_component_error_type(
        &self,
        component: &ComponentIdentifier,
        failure: &Failure,
    ) -> ErrorType;
}

/// A locator rule in configuration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorMapping {
    /// Failure kind, e.g. `"ConnectionException"`.
    pub kind: String,
    /// Error type reference, e.g. `"HTTP:CONNECTIVITY"`.
    pub error_type: String,
    /// Restrict the rule to one component kind (`ns:name`).
    #[serde(default)]
    pub component: Option<String>,
}

/// In-memory locator keyed by failure kind.
pub struct MemoryErrorTypeLocator {
    unknown: ErrorType,
    defaults: RwLock<HashMap<String, ErrorType>>,
    by_component: RwLock<HashMap<ComponentIdentifier, HashMap<String, ErrorType>>>,
}

impl MemoryErrorTypeLocator {
    /// A locator preloaded with the built-in failure kinds.
    pub fn new(repo: &ErrorTypeRepository) -> Self {
        let locator = Self::empty(repo);
        let builtin = [
            (kinds::CONNECTION, CoreErrorType::Connectivity),
            (kinds::RESPONSE_TIMEOUT, CoreErrorType::Timeout),
            (kinds::COMPOSITE_ROUTING, CoreErrorType::CompositeRouting),
            (kinds::ROUTING, CoreErrorType::Routing),
            (kinds::RETRY_EXHAUSTED, CoreErrorType::RetryExhausted),
            (kinds::EXPRESSION, CoreErrorType::Expression),
            (kinds::TRANSFORMER, CoreErrorType::Transformation),
            (kinds::SECURITY, CoreErrorType::Security),
            (kinds::OUT_OF_MEMORY, CoreErrorType::FatalJvmError),
            (kinds::STACK_OVERFLOW, CoreErrorType::FatalJvmError),
        ];
        for (kind, core) in builtin {
            locator.add_default(kind, repo.core(core));
        }
        locator
    }

    /// A locator that maps nothing.
    pub fn empty(repo: &ErrorTypeRepository) -> Self {
        Self {
            unknown: repo.core(CoreErrorType::Unknown),
            defaults: RwLock::new(HashMap::new()),
            by_component: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_default(&self, kind: impl Into<String>, error_type: ErrorType) {
        self.defaults.write().unwrap().insert(kind.into(), error_type);
    }

    pub fn add_component(
        &self,
        component: ComponentIdentifier,
        kind: impl Into<String>,
        error_type: ErrorType,
    ) {
        self.by_component
            .write()
            .unwrap()
            .entry(component)
            .or_default()
            .insert(kind.into(), error_type);
    }

    pub fn add_mapping(
        &self,
        mapping: &LocatorMapping,
        repo: &ErrorTypeRepository,
    ) -> Result<(), RepositoryError> {
        let error_type = repo.resolve(&mapping.error_type)?;
        match &mapping.component {
            Some(component) => self.add_component(
                ComponentIdentifier::parse(component),
                mapping.kind.clone(),
                error_type,
            ),
            None => self.add_default(mapping.kind.clone(), error_type),
        }
        Ok(())
    }

    /// Load rules from a JSON array of [`LocatorMapping`]s.
    pub fn load_json(&self, json: &str, repo: &ErrorTypeRepository) -> Result<usize, RepositoryError> {
        let mappings: Vec<LocatorMapping> = serde_json::from_str(json)
            .map_err(|e| RepositoryError::InvalidReference(e.to_string()))?;
        for mapping in &mappings {
            self.add_mapping(mapping, repo)?;
        }
        Ok(mappings.len())
    }
}

impl ErrorTypeLocator for MemoryErrorTypeLocator {
    fn lookup_error_type(&self, failure: &Failure) -> ErrorType {
        if let Some(declared) = failure.error_type() {
            return declared;
        }
        self.defaults
            .read()
            .unwrap()
            .get(failure.kind())
            .cloned()
            .unwrap_or_else(|| self.unknown.clone())
    }

    fn lookup_component_error_type(
        &self,
        component: &ComponentIdentifier,
        failure: &Failure,
    ) -> ErrorType {
        if let Some(declared) = failure.error_type() {
            return declared;
        }
        let specific = self
            .by_component
            .read()
            .unwrap()
            .get(component)
            .and_then(|m| m.get(failure.kind()))
            .cloned();
        specific.unwrap_or_else(|| self.lookup_error_type(failure))
    }
}
