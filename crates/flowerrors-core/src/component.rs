//! Components: the processors and routers a failure can be attributed to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::mapping::ErrorMapping;

/// `namespace:name` of a component kind, e.g. `http:request`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentIdentifier {
    pub namespace: String,
    pub name: String,
}

impl ComponentIdentifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse `ns:name`; a bare name lands in the `mule` namespace.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((ns, name)) => Self::new(ns.trim(), name.trim()),
            None => Self::new("mule", s.trim()),
        }
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Capability of components that declare error mappings.
pub trait HasErrorMappings {
    fn error_mappings(&self) -> &[ErrorMapping];
}

/// A configured processor, router or connector operation.
///
/// The error subsystem never owns components; it only reads their identity
/// and, through [`HasErrorMappings`], their mappings.
pub trait Component: Send + Sync + fmt::Debug {
    /// Component kind, used for component-specific classification.
    fn identifier(&self) -> Option<&ComponentIdentifier>;

    /// Location path inside the application, e.g. `orders/processors/2`.
    fn location(&self) -> &str;

    fn as_error_mapped(&self) -> Option<&dyn HasErrorMappings> {
        None
    }
}

pub type ComponentRef = Arc<dyn Component>;

/// The mappings a component declares, or none.
pub fn error_mappings_of(component: &dyn Component) -> &[ErrorMapping] {
    component
        .as_error_mapped()
        .map(|m| m.error_mappings())
        .unwrap_or(&[])
}

/// A plain processor definition.
#[derive(Debug, Clone)]
pub struct Processor {
    identifier: Option<ComponentIdentifier>,
    location: String,
    mappings: Vec<ErrorMapping>,
}

impl Processor {
    pub fn new(identifier: ComponentIdentifier, location: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier),
            location: location.into(),
            mappings: Vec::new(),
        }
    }

    /// A component with a location but no declared kind.
    pub fn anonymous(location: impl Into<String>) -> Self {
        Self {
            identifier: None,
            location: location.into(),
            mappings: Vec::new(),
        }
    }

    pub fn with_error_mapping(mut self, mapping: ErrorMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_error_mappings(mut self, mappings: impl IntoIterator<Item = ErrorMapping>) -> Self {
        self.mappings.extend(mappings);
        self
    }

    pub fn into_ref(self) -> ComponentRef {
        Arc::new(self)
    }
}

impl Component for Processor {
    fn identifier(&self) -> Option<&ComponentIdentifier> {
        self.identifier.as_ref()
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn as_error_mapped(&self) -> Option<&dyn HasErrorMappings> {
        Some(self)
    }
}

impl HasErrorMappings for Processor {
    fn error_mappings(&self) -> &[ErrorMapping] {
        &self.mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::ErrorTypeMatcher;
    use crate::types::{CoreErrorType, ErrorType};

    #[derive(Debug)]
    struct Bare;

    impl Component for Bare {
        fn identifier(&self) -> Option<&ComponentIdentifier> {
            None
        }
        fn location(&self) -> &str {
            "flow/processors/0"
        }
    }

    #[test]
    fn parse_identifier() {
        assert_eq!(
            ComponentIdentifier::parse("http:request"),
            ComponentIdentifier::new("http", "request")
        );
        assert_eq!(ComponentIdentifier::parse("logger").to_string(), "mule:logger");
    }

    #[test]
    fn mappings_through_capability() {
        let p = Processor::new(ComponentIdentifier::parse("http:request"), "f/0")
            .with_error_mapping(ErrorMapping::new(
                ErrorTypeMatcher::Any,
                ErrorType::core(CoreErrorType::Routing),
            ));
        assert_eq!(error_mappings_of(&p).len(), 1);
        assert!(error_mappings_of(&Bare).is_empty());
    }
}
