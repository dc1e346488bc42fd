//! Failures and their cause chains.
//!
//! A [`Failure`] is either a plain raised failure or a [`MessagingException`]
//! that wraps one together with the in-flight event. Causes are shared by
//! reference, so a chain can be re-wrapped any number of times, and (like the
//! systems that hand them to us) can even point back at an ancestor.
//! [`cause_chain`] therefore walks by identity and never trusts a missing
//! cause alone to terminate.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::exception::MessagingException;
use crate::types::ErrorType;

/// Upper bound on the number of links [`cause_chain`] will follow.
pub const MAX_CAUSE_DEPTH: usize = 256;

/// Well-known failure kinds.
pub mod kinds {
    pub const CONNECTION: &str = "ConnectionException";
    pub const RESPONSE_TIMEOUT: &str = "ResponseTimeoutException";
    pub const COMPOSITE_ROUTING: &str = "CompositeRoutingException";
    pub const ROUTING: &str = "RoutingException";
    pub const RETRY_EXHAUSTED: &str = "RetryPolicyExhaustedException";
    pub const EXPRESSION: &str = "ExpressionException";
    pub const TRANSFORMER: &str = "TransformerException";
    pub const SECURITY: &str = "SecurityException";
    pub const OUT_OF_MEMORY: &str = "OutOfMemoryError";
    pub const STACK_OVERFLOW: &str = "StackOverflowError";
    pub const RUNTIME: &str = "RuntimeException";
    pub const UNSUPPORTED_OPERATION: &str = "UnsupportedOperationException";
}

// ─── PlainFailure ─────────────────────────────────────────────────────────────

struct PlainInner {
    kind: String,
    message: String,
    error_type: Option<ErrorType>,
    child_errors: Vec<Error>,
    cause: RwLock<Option<Failure>>,
}

/// A raised failure: a kind name, a message and an optional cause.
///
/// A failure may carry its own [`ErrorType`]; locators classify such
/// failures as that type without consulting their tables.
#[derive(Clone)]
pub struct PlainFailure(Arc<PlainInner>);

impl PlainFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(kind.into(), message.into(), None, Vec::new())
    }

    /// A failure that already knows its error type.
    pub fn typed(
        kind: impl Into<String>,
        message: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Self::build(kind.into(), message.into(), Some(error_type), Vec::new())
    }

    /// A typed failure aggregating the errors of several routes.
    pub fn composite(
        kind: impl Into<String>,
        message: impl Into<String>,
        error_type: ErrorType,
        child_errors: Vec<Error>,
    ) -> Self {
        Self::build(kind.into(), message.into(), Some(error_type), child_errors)
    }

    fn build(
        kind: String,
        message: String,
        error_type: Option<ErrorType>,
        child_errors: Vec<Error>,
    ) -> Self {
        Self(Arc::new(PlainInner {
            kind,
            message,
            error_type,
            child_errors,
            cause: RwLock::new(None),
        }))
    }

    pub fn with_cause(self, cause: impl Into<Failure>) -> Self {
        self.set_cause(cause);
        self
    }

    /// Replace the cause after construction. Nothing stops `cause` from
    /// being an ancestor of `self`: chain walks stop at the first repeat,
    /// but the links hold each other strongly, so a cyclic chain is never
    /// freed until one of its causes is replaced.
    pub fn set_cause(&self, cause: impl Into<Failure>) {
        *self.0.cause.write().unwrap() = Some(cause.into());
    }

    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn error_type(&self) -> Option<&ErrorType> {
        self.0.error_type.as_ref()
    }

    pub fn child_errors(&self) -> &[Error] {
        &self.0.child_errors
    }

    pub fn cause(&self) -> Option<Failure> {
        self.0.cause.read().unwrap().clone()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

// ─── Failure ──────────────────────────────────────────────────────────────────

/// One link of a cause chain.
#[derive(Clone)]
pub enum Failure {
    Plain(PlainFailure),
    Messaging(MessagingException),
}

impl Failure {
    /// Shorthand for `PlainFailure::new(kind, message).into()`.
    pub fn plain(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plain(PlainFailure::new(kind, message))
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Plain(p) => p.kind(),
            Self::Messaging(m) => m.kind().name(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Plain(p) => p.message().to_string(),
            Self::Messaging(m) => m.message().to_string(),
        }
    }

    pub fn cause(&self) -> Option<Failure> {
        match self {
            Self::Plain(p) => p.cause(),
            Self::Messaging(m) => m.cause().cloned(),
        }
    }

    /// The error type this failure declares for itself, if any.
    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            Self::Plain(p) => p.error_type().cloned(),
            Self::Messaging(_) => None,
        }
    }

    pub fn child_errors(&self) -> Vec<Error> {
        match self {
            Self::Plain(p) => p.child_errors().to_vec(),
            Self::Messaging(_) => Vec::new(),
        }
    }

    pub fn as_messaging(&self) -> Option<&MessagingException> {
        match self {
            Self::Messaging(m) => Some(m),
            Self::Plain(_) => None,
        }
    }

    /// Identity comparison: `true` only for the very same failure instance.
    pub fn same_as(&self, other: &Failure) -> bool {
        self.identity() == other.identity()
    }

    pub(crate) fn identity(&self) -> usize {
        match self {
            Self::Plain(p) => p.identity(),
            Self::Messaging(m) => m.identity(),
        }
    }

    /// This failure and all of its causes, one per line.
    pub fn display_chain(&self) -> String {
        let mut chain = cause_chain(self).into_iter();
        let mut result = chain.next().map(|f| f.to_string()).unwrap_or_default();
        for cause in chain {
            result.push_str(&format!("\n  ↳ caused by: {cause}"));
        }
        result
    }
}

impl From<PlainFailure> for Failure {
    fn from(p: PlainFailure) -> Self {
        Self::Plain(p)
    }
}

impl From<MessagingException> for Failure {
    fn from(m: MessagingException) -> Self {
        Self::Messaging(m)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind())
            .field("message", &self.message())
            .field("error_type", &self.error_type().map(|t| t.to_string()))
            .finish()
    }
}

impl fmt::Debug for PlainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Failure::Plain(self.clone()), f)
    }
}

impl std::error::Error for Failure {}

// ─── Chain walking ────────────────────────────────────────────────────────────

/// Unwrap `root` and its causes, outermost first.
///
/// Stops at the first failure already visited, or after
/// [`MAX_CAUSE_DEPTH`] links.
pub fn cause_chain(root: &Failure) -> Vec<Failure> {
    let mut seen = HashSet::new();
    let mut chain = Vec::new();
    let mut current = Some(root.clone());

    while let Some(failure) = current {
        if !seen.insert(failure.identity()) {
            tracing::trace!(kind = failure.kind(), "cause chain revisits a failure, stopping");
            break;
        }
        if chain.len() == MAX_CAUSE_DEPTH {
            tracing::warn!(depth = MAX_CAUSE_DEPTH, "cause chain truncated");
            break;
        }
        current = failure.cause();
        chain.push(failure);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_outermost_first() {
        let inner = PlainFailure::new("IOException", "socket closed");
        let outer = PlainFailure::new(kinds::CONNECTION, "cannot reach host").with_cause(inner);
        let chain = cause_chain(&outer.into());
        let kinds: Vec<_> = chain.iter().map(|f| f.kind().to_string()).collect();
        assert_eq!(kinds, ["ConnectionException", "IOException"]);
    }

    #[test]
    fn self_cause_terminates() {
        let f = PlainFailure::new(kinds::RUNTIME, "loop");
        f.set_cause(f.clone());
        assert_eq!(cause_chain(&f.into()).len(), 1);
    }

    #[test]
    fn cyclic_cause_is_held_until_replaced() {
        let f = PlainFailure::new(kinds::RUNTIME, "loop");
        f.set_cause(f.clone());
        assert_eq!(Arc::strong_count(&f.0), 2);
        f.set_cause(PlainFailure::new(kinds::RUNTIME, "cause"));
        assert_eq!(Arc::strong_count(&f.0), 1);
    }

    #[test]
    fn cycle_to_ancestor_terminates() {
        let a = PlainFailure::new("A", "a");
        let b = PlainFailure::new("B", "b");
        let c = PlainFailure::new("C", "c");
        a.set_cause(b.clone());
        b.set_cause(c.clone());
        c.set_cause(a.clone());
        let chain = cause_chain(&a.into());
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].kind(), "C");
    }

    #[test]
    fn clones_share_identity() {
        let f: Failure = Failure::plain("X", "x");
        let g = f.clone();
        assert!(f.same_as(&g));
        assert!(!f.same_as(&Failure::plain("X", "x")));
    }

    #[test]
    fn display_chain_lists_causes() {
        let f = PlainFailure::new("Outer", "o").with_cause(PlainFailure::new("Inner", "i"));
        let text = Failure::from(f).display_chain();
        assert_eq!(text, "Outer: o\n  ↳ caused by: Inner: i");
    }
}
