//! Error type repository: the set of error types known to a runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::types::{CoreErrorType, ErrorType, CORE_NAMESPACE};

/// Errors raised while registering or resolving error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Error type already registered: {namespace}:{identifier}")]
    AlreadyRegistered { namespace: String, identifier: String },

    #[error("Unknown error type: {0}")]
    UnknownType(String),

    #[error("Namespace {0} is reserved for core error types")]
    ReservedNamespace(String),

    #[error("Error type {child} cannot extend the critical type {parent}")]
    CriticalParent { child: String, parent: String },

    #[error("Invalid error type reference: '{0}'")]
    InvalidReference(String),
}

/// Declaration of an extension error type, as found in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorTypeDefinition {
    pub namespace: String,
    pub identifier: String,
    /// Parent reference in `NAMESPACE:IDENTIFIER` form. Defaults to `MULE:ANY`.
    #[serde(default)]
    pub parent: Option<String>,
}

/// Registry of every error type a runtime can raise or match on.
///
/// Pre-populated with the core namespace. Extension namespaces (connectors,
/// modules) register their own types under an existing parent.
pub struct ErrorTypeRepository {
    by_id: RwLock<HashMap<(String, String), ErrorType>>,
}

impl ErrorTypeRepository {
    /// Create a repository containing the core error types.
    pub fn new() -> Self {
        let by_id = CoreErrorType::ALL
            .iter()
            .map(|kind| {
                let t = kind.error_type();
                ((t.namespace().to_string(), t.identifier().to_string()), t)
            })
            .collect();
        Self {
            by_id: RwLock::new(by_id),
        }
    }

    /// Register a new type under `parent`.
    pub fn register(
        &self,
        namespace: &str,
        identifier: &str,
        parent: &ErrorType,
    ) -> Result<ErrorType, RepositoryError> {
        let namespace = namespace.to_uppercase();
        let identifier = identifier.to_uppercase();
        if namespace == CORE_NAMESPACE {
            return Err(RepositoryError::ReservedNamespace(namespace));
        }
        if parent.is_critical() {
            return Err(RepositoryError::CriticalParent {
                child: format!("{namespace}:{identifier}"),
                parent: parent.to_string(),
            });
        }
        if self.lookup(parent.namespace(), parent.identifier()).is_none() {
            return Err(RepositoryError::UnknownType(parent.to_string()));
        }

        let mut by_id = self.by_id.write().unwrap();
        let key = (namespace, identifier);
        if by_id.contains_key(&key) {
            return Err(RepositoryError::AlreadyRegistered {
                namespace: key.0,
                identifier: key.1,
            });
        }
        let t = ErrorType::new(key.0.clone(), key.1.clone(), Some(parent.clone()));
        by_id.insert(key, t.clone());
        tracing::debug!(error_type = %t, parent = %parent, "registered error type");
        Ok(t)
    }

    /// Register a declared type, resolving its parent reference first.
    pub fn register_definition(
        &self,
        def: &ErrorTypeDefinition,
    ) -> Result<ErrorType, RepositoryError> {
        let parent = match &def.parent {
            Some(reference) => self.resolve(reference)?,
            None => self.core(CoreErrorType::Any),
        };
        self.register(&def.namespace, &def.identifier, &parent)
    }

    /// Load definitions from a JSON array string, in order.
    /// Returns the number of types registered.
    pub fn load_json(&self, json: &str) -> Result<usize, RepositoryError> {
        let defs: Vec<ErrorTypeDefinition> = serde_json::from_str(json)
            .map_err(|e| RepositoryError::InvalidReference(e.to_string()))?;
        for def in &defs {
            self.register_definition(def)?;
        }
        Ok(defs.len())
    }

    pub fn lookup(&self, namespace: &str, identifier: &str) -> Option<ErrorType> {
        self.by_id
            .read()
            .unwrap()
            .get(&(namespace.to_uppercase(), identifier.to_uppercase()))
            .cloned()
    }

    /// Resolve a `NAMESPACE:IDENTIFIER` reference. A bare identifier refers
    /// to the core namespace.
    pub fn resolve(&self, reference: &str) -> Result<ErrorType, RepositoryError> {
        let reference = reference.trim();
        let (namespace, identifier) = match reference.split_once(':') {
            Some((ns, id)) => (ns.trim(), id.trim()),
            None => (CORE_NAMESPACE, reference),
        };
        if namespace.is_empty() || identifier.is_empty() {
            return Err(RepositoryError::InvalidReference(reference.to_string()));
        }
        self.lookup(namespace, identifier)
            .ok_or_else(|| RepositoryError::UnknownType(reference.to_string()))
    }

    /// The registered instance of a core type.
    pub fn core(&self, kind: CoreErrorType) -> ErrorType {
        self.lookup(CORE_NAMESPACE, kind.identifier())
            .unwrap_or_else(|| kind.error_type())
    }

    /// All registered types, sorted by namespace then identifier.
    pub fn all(&self) -> Vec<ErrorType> {
        let mut types: Vec<_> = self.by_id.read().unwrap().values().cloned().collect();
        types.sort_by(|a, b| {
            (a.namespace(), a.identifier()).cmp(&(b.namespace(), b.identifier()))
        });
        types
    }

    pub fn len(&self) -> usize {
        self.by_id.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ErrorTypeRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_types_preloaded() {
        let repo = ErrorTypeRepository::new();
        assert_eq!(repo.len(), CoreErrorType::ALL.len());
        let t = repo.resolve("CONNECTIVITY").unwrap();
        assert_eq!(t.to_string(), "MULE:CONNECTIVITY");
    }

    #[test]
    fn register_and_resolve_extension_type() {
        let repo = ErrorTypeRepository::new();
        let parent = repo.core(CoreErrorType::Connectivity);
        let t = repo.register("http", "not_found", &parent).unwrap();
        assert_eq!(t.to_string(), "HTTP:NOT_FOUND");
        assert!(repo.resolve("HTTP:NOT_FOUND").unwrap().matches(&parent));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let repo = ErrorTypeRepository::new();
        let any = repo.core(CoreErrorType::Any);
        repo.register("DB", "QUERY", &any).unwrap();
        let err = repo.register("DB", "QUERY", &any).unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyRegistered { .. }));
    }

    #[test]
    fn critical_parent_rejected() {
        let repo = ErrorTypeRepository::new();
        let critical = repo.core(CoreErrorType::Critical);
        let err = repo.register("APP", "FATAL", &critical).unwrap_err();
        assert!(matches!(err, RepositoryError::CriticalParent { .. }));
    }

    #[test]
    fn core_namespace_reserved() {
        let repo = ErrorTypeRepository::new();
        let any = repo.core(CoreErrorType::Any);
        assert_eq!(
            repo.register("mule", "MINE", &any).unwrap_err(),
            RepositoryError::ReservedNamespace("MULE".into())
        );
    }

    #[test]
    fn load_json_resolves_parents_in_order() {
        let repo = ErrorTypeRepository::new();
        let json = r#"[
            {"namespace": "HTTP", "identifier": "CONNECTIVITY", "parent": "MULE:CONNECTIVITY"},
            {"namespace": "HTTP", "identifier": "TIMEOUT", "parent": "HTTP:CONNECTIVITY"},
            {"namespace": "APP", "identifier": "BUSINESS"}
        ]"#;
        assert_eq!(repo.load_json(json).unwrap(), 3);
        let timeout = repo.resolve("HTTP:TIMEOUT").unwrap();
        assert!(timeout.matches(&repo.core(CoreErrorType::Connectivity)));
        assert!(repo.resolve("APP:BUSINESS").unwrap().matches(&repo.core(CoreErrorType::Any)));
    }

    #[test]
    fn invalid_reference() {
        let repo = ErrorTypeRepository::new();
        assert!(matches!(
            repo.resolve("HTTP:"),
            Err(RepositoryError::InvalidReference(_))
        ));
        assert!(matches!(
            repo.resolve("NOPE:NOTHING"),
            Err(RepositoryError::UnknownType(_))
        ));
    }
}
