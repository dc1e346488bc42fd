//! Router-level error types.

use serde_json::{Map, Value};
use thiserror::Error;

use flowerrors_core::{
    kinds, ComponentRef, CoreErrorType, Event, Failure, MessagingException, PlainFailure,
};

use crate::aggregation::RoutingResult;

/// Info key listing the payloads of the routes that succeeded in a
/// composite failure, keyed by route index.
pub const INFO_SUCCESSFUL_ROUTES_KEY: &str = "successfulRoutes";

/// Some routes of a fan-out failed.
#[derive(Debug, Clone, Error)]
#[error("{}", .result.summary())]
pub struct CompositeRoutingException {
    result: RoutingResult,
}

impl CompositeRoutingException {
    pub fn new(result: RoutingResult) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &RoutingResult {
        &self.result
    }

    pub fn into_result(self) -> RoutingResult {
        self.result
    }

    /// The typed failure standing for the whole composite, with one child
    /// error per failed route.
    pub fn to_failure(&self) -> PlainFailure {
        PlainFailure::composite(
            kinds::COMPOSITE_ROUTING,
            self.to_string(),
            CoreErrorType::CompositeRouting.error_type(),
            self.result.failures().values().cloned().collect(),
        )
    }
}

/// Errors returned by the routers.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Composite(#[from] CompositeRoutingException),

    /// The aggregation strategy failed; the exception's cause is the
    /// strategy's own failure.
    #[error("Aggregation failed: {0}")]
    Aggregation(MessagingException),

    #[error("All {attempted} routes failed, last: {last}")]
    AllRoutesFailed {
        attempted: usize,
        last: MessagingException,
    },

    #[error("Retries exhausted after {attempts} attempts, last: {last}")]
    RetryExhausted {
        attempts: u32,
        last: MessagingException,
    },

    #[error("No routes configured")]
    NoRoutes,

    /// A single route failed and the router does not add anything to it.
    #[error(transparent)]
    Messaging(MessagingException),
}

impl RoutingError {
    /// Convert into the exception a flow propagates. Router-made failures
    /// come out already resolved, so resolving them again keeps their type.
    pub fn into_messaging_exception(
        self,
        event: &Event,
        component: Option<ComponentRef>,
    ) -> MessagingException {
        match self {
            Self::Composite(composite) => {
                let ex = resolved(event, composite.to_failure(), component);
                let successes: Map<String, Value> = composite
                    .result()
                    .successes()
                    .iter()
                    .map(|(index, ev)| (index.to_string(), ev.payload().clone()))
                    .collect();
                ex.add_info(INFO_SUCCESSFUL_ROUTES_KEY, Value::Object(successes));
                ex
            }
            Self::AllRoutesFailed { attempted, last } => {
                let failure = PlainFailure::typed(
                    kinds::ROUTING,
                    format!("All {attempted} routes failed"),
                    CoreErrorType::Routing.error_type(),
                );
                resolved(event, with_underlying_cause(failure, &last), component)
            }
            Self::RetryExhausted { attempts, last } => {
                let failure = PlainFailure::typed(
                    kinds::RETRY_EXHAUSTED,
                    format!("'until-successful' retries exhausted after {attempts} attempts"),
                    CoreErrorType::RetryExhausted.error_type(),
                );
                resolved(event, with_underlying_cause(failure, &last), component)
            }
            Self::NoRoutes => {
                let failure = PlainFailure::typed(
                    kinds::ROUTING,
                    "No routes configured",
                    CoreErrorType::Routing.error_type(),
                );
                resolved(event, failure, component)
            }
            Self::Aggregation(ex) | Self::Messaging(ex) => ex,
        }
    }
}

/// What actually failed inside `ex`, skipping the wrapper itself. Wrapping
/// the wrapper would let its already-attached error win resolution.
pub(crate) fn underlying_failure(ex: &MessagingException) -> Failure {
    ex.error()
        .map(|e| e.cause().clone())
        .or_else(|| ex.cause().cloned())
        .unwrap_or_else(|| Failure::plain(ex.kind().name(), ex.message()))
}

fn with_underlying_cause(failure: PlainFailure, last: &MessagingException) -> PlainFailure {
    failure.with_cause(underlying_failure(last))
}

/// An exception whose event already carries the failure's declared type.
pub(crate) fn resolved(
    event: &Event,
    failure: PlainFailure,
    component: Option<ComponentRef>,
) -> MessagingException {
    let error_type = failure
        .error_type()
        .cloned()
        .unwrap_or_else(|| CoreErrorType::Routing.error_type());
    let error = flowerrors_core::Error::builder(failure.clone())
        .error_type(error_type)
        .build();
    MessagingException::builder(event.clone().with_error(error))
        .cause(failure)
        .failing_component(component)
        .build()
}
