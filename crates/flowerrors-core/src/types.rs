//! Core types for the FlowErrors error taxonomy.

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Namespace of the built-in error types.
pub const CORE_NAMESPACE: &str = "MULE";

// ─── CoreErrorType ────────────────────────────────────────────────────────────

/// The error types every runtime knows about, in the core namespace.
///
/// `ANY` and `CRITICAL` are the two roots of the hierarchy. Nothing under
/// `CRITICAL` is reachable from `ANY`, which is what keeps critical failures
/// out of catch-all handlers and mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreErrorType {
    Any,
    Critical,
    Overload,
    FatalJvmError,
    Unknown,
    Connectivity,
    RetryExhausted,
    Routing,
    CompositeRouting,
    Timeout,
    Expression,
    Transformation,
    Security,
    Validation,
    StreamMaximumSizeExceeded,
}

impl CoreErrorType {
    /// Every core type, parents before children.
    pub const ALL: [CoreErrorType; 15] = [
        Self::Any,
        Self::Critical,
        Self::Overload,
        Self::FatalJvmError,
        Self::Unknown,
        Self::Connectivity,
        Self::RetryExhausted,
        Self::Routing,
        Self::CompositeRouting,
        Self::Timeout,
        Self::Expression,
        Self::Transformation,
        Self::Security,
        Self::Validation,
        Self::StreamMaximumSizeExceeded,
    ];

    pub fn identifier(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Critical => "CRITICAL",
            Self::Overload => "OVERLOAD",
            Self::FatalJvmError => "FATAL_JVM_ERROR",
            Self::Unknown => "UNKNOWN",
            Self::Connectivity => "CONNECTIVITY",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::Routing => "ROUTING",
            Self::CompositeRouting => "COMPOSITE_ROUTING",
            Self::Timeout => "TIMEOUT",
            Self::Expression => "EXPRESSION",
            Self::Transformation => "TRANSFORMATION",
            Self::Security => "SECURITY",
            Self::Validation => "VALIDATION",
            Self::StreamMaximumSizeExceeded => "STREAM_MAXIMUM_SIZE_EXCEEDED",
        }
    }

    pub fn parent(self) -> Option<CoreErrorType> {
        match self {
            Self::Any | Self::Critical => None,
            Self::Overload | Self::FatalJvmError => Some(Self::Critical),
            Self::CompositeRouting => Some(Self::Routing),
            _ => Some(Self::Any),
        }
    }

    /// Build the full `ErrorType`, parent chain included.
    pub fn error_type(self) -> ErrorType {
        ErrorType::new(
            CORE_NAMESPACE,
            self.identifier(),
            self.parent().map(CoreErrorType::error_type),
        )
    }
}

// ─── ErrorType ────────────────────────────────────────────────────────────────

struct ErrorTypeInner {
    namespace: String,
    identifier: String,
    parent: Option<ErrorType>,
}

/// A namespaced error classification with an optional parent.
///
/// Identity is the `(namespace, identifier)` pair; the parent is fixed at
/// construction, so the hierarchy can never contain a cycle.
#[derive(Clone)]
pub struct ErrorType(Arc<ErrorTypeInner>);

impl ErrorType {
    pub fn new(
        namespace: impl Into<String>,
        identifier: impl Into<String>,
        parent: Option<ErrorType>,
    ) -> Self {
        Self(Arc::new(ErrorTypeInner {
            namespace: namespace.into(),
            identifier: identifier.into(),
            parent,
        }))
    }

    /// Shorthand for `kind.error_type()`.
    pub fn core(kind: CoreErrorType) -> Self {
        kind.error_type()
    }

    pub fn namespace(&self) -> &str {
        &self.0.namespace
    }

    pub fn identifier(&self) -> &str {
        &self.0.identifier
    }

    pub fn parent(&self) -> Option<&ErrorType> {
        self.0.parent.as_ref()
    }

    /// This type followed by each of its ancestors, nearest first.
    pub fn lineage(&self) -> Lineage<'_> {
        Lineage { next: Some(self) }
    }

    /// `true` if `other` is a strict ancestor of this type.
    pub fn is_child_of(&self, other: &ErrorType) -> bool {
        self.lineage().skip(1).any(|t| t == other)
    }

    /// `true` if this type is `other` or one of its descendants.
    pub fn matches(&self, other: &ErrorType) -> bool {
        self.lineage().any(|t| t == other)
    }

    pub fn is_core(&self, kind: CoreErrorType) -> bool {
        self.namespace() == CORE_NAMESPACE && self.identifier() == kind.identifier()
    }

    /// `true` for `MULE:CRITICAL` and everything below it.
    pub fn is_critical(&self) -> bool {
        self.lineage().any(|t| t.is_core(CoreErrorType::Critical))
    }

    pub fn is_unknown(&self) -> bool {
        self.is_core(CoreErrorType::Unknown)
    }
}

/// Iterator over an [`ErrorType`] and its ancestors.
pub struct Lineage<'a> {
    next: Option<&'a ErrorType>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a ErrorType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

impl PartialEq for ErrorType {
    fn eq(&self, other: &Self) -> bool {
        self.namespace() == other.namespace() && self.identifier() == other.identifier()
    }
}

impl Eq for ErrorType {}

impl Hash for ErrorType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace().hash(state);
        self.identifier().hash(state);
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace(), self.identifier())
    }
}

impl fmt::Debug for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ErrorType");
        s.field("id", &self.to_string());
        if let Some(parent) = self.parent() {
            s.field("parent", &parent.to_string());
        }
        s.finish()
    }
}

impl Serialize for ErrorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_namespace_colon_identifier() {
        let t = ErrorType::core(CoreErrorType::Connectivity);
        assert_eq!(t.to_string(), "MULE:CONNECTIVITY");
    }

    #[test]
    fn identity_ignores_parent() {
        let a = ErrorType::new("HTTP", "NOT_FOUND", None);
        let b = ErrorType::new(
            "HTTP",
            "NOT_FOUND",
            Some(ErrorType::core(CoreErrorType::Connectivity)),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn child_matches_parent_but_not_reverse() {
        let connectivity = ErrorType::core(CoreErrorType::Connectivity);
        let http = ErrorType::new("HTTP", "CONNECTIVITY", Some(connectivity.clone()));
        assert!(http.matches(&connectivity));
        assert!(http.is_child_of(&connectivity));
        assert!(!connectivity.matches(&http));
        assert!(http.matches(&ErrorType::core(CoreErrorType::Any)));
    }

    #[test]
    fn critical_family_is_outside_any() {
        let overload = ErrorType::core(CoreErrorType::Overload);
        assert!(overload.is_critical());
        assert!(!overload.matches(&ErrorType::core(CoreErrorType::Any)));
        assert!(!ErrorType::core(CoreErrorType::Unknown).is_critical());
    }

    #[test]
    fn lineage_walks_to_root() {
        let t = ErrorType::core(CoreErrorType::CompositeRouting);
        let ids: Vec<_> = t.lineage().map(|t| t.identifier().to_string()).collect();
        assert_eq!(ids, ["COMPOSITE_ROUTING", "ROUTING", "ANY"]);
    }

    #[test]
    fn serializes_as_string() {
        let t = ErrorType::core(CoreErrorType::Timeout);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"MULE:TIMEOUT\"");
    }
}
