//! Root-cause selection over a cause chain.
//!
//! Selection order:
//! 1. A `MessagingException` in the chain that already carries an `Error`
//!    → returned as is
//! 2. Causes classified as something other than UNKNOWN or CRITICAL
//!    → the outermost one whose type subsumes the innermost classified type
//! 3. Otherwise the first CRITICAL cause, outermost first
//! 4. Otherwise nothing

use crate::component::Component;
use crate::exception::MessagingException;
use crate::failure::{cause_chain, Failure};
use crate::locator::ErrorTypeLocator;
use crate::types::ErrorType;

/// Outcome of [`find_root`].
#[derive(Debug, Clone)]
pub enum RootCause {
    /// An exception in the chain was resolved earlier.
    Resolved(MessagingException),
    /// The cause that best represents the failure, with its type.
    Classified {
        failure: Failure,
        error_type: ErrorType,
    },
    /// Nothing in the chain carries a usable classification.
    NotFound,
}

/// Classify one failure, as seen from `component` when it has a kind.
///
/// A `MessagingException` that already carries an `Error` classifies as
/// that error's type.
pub fn classify(
    failure: &Failure,
    component: Option<&dyn Component>,
    locator: &dyn ErrorTypeLocator,
) -> ErrorType {
    if let Some(error) = failure.as_messaging().and_then(MessagingException::error) {
        return error.error_type().clone();
    }
    match component.and_then(|c| c.identifier()) {
        Some(id) => locator.lookup_component_error_type(id, failure),
        None => locator.lookup_error_type(failure),
    }
}

/// Pick the root cause of `exception`. Never fails.
pub fn find_root(
    exception: &MessagingException,
    component: Option<&dyn Component>,
    locator: &dyn ErrorTypeLocator,
) -> RootCause {
    let chain = cause_chain(&Failure::Messaging(exception.clone()));

    if let Some(resolved) = chain
        .iter()
        .filter_map(Failure::as_messaging)
        .find(|m| m.has_error())
    {
        tracing::debug!(exception = %resolved, "chain already resolved upstream");
        return RootCause::Resolved(resolved.clone());
    }

    let classified: Vec<(Failure, ErrorType)> = chain
        .iter()
        .map(|f| (f.clone(), classify(f, component, locator)))
        .collect();

    let candidates: Vec<&(Failure, ErrorType)> = classified
        .iter()
        .filter(|(_, t)| !t.is_unknown() && !t.is_critical())
        .collect();

    let Some(innermost) = candidates.last().copied() else {
        // Outermost critical cause; the classified path below prefers the
        // innermost type instead.
        return match classified.iter().find(|(_, t)| t.is_critical()) {
            Some((failure, error_type)) => {
                tracing::debug!(%error_type, kind = failure.kind(), "critical root cause");
                RootCause::Classified {
                    failure: failure.clone(),
                    error_type: error_type.clone(),
                }
            }
            None => RootCause::NotFound,
        };
    };
    let pivot = &innermost.1;

    let (failure, error_type) = candidates
        .iter()
        .copied()
        .find(|(_, t)| pivot.matches(t))
        .unwrap_or(innermost);
    let (failure, error_type) = (failure.clone(), error_type.clone());

    tracing::debug!(
        %error_type,
        pivot = %pivot,
        kind = failure.kind(),
        depth = chain.len(),
        "root cause selected"
    );
    RootCause::Classified { failure, error_type }
}
