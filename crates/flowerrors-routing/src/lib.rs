//! flowerrors-routing: fan-out and retry routers built on `flowerrors-core`.
//!
//! # Routers
//!
//! | Router | Behaviour on failure |
//! |--------|----------------------|
//! | [`ScatterGather`] | `MULE:COMPOSITE_ROUTING` with per-route errors |
//! | [`FirstSuccessful`] | `MULE:ROUTING` wrapping the last failure |
//! | [`RoundRobin`] | the selected route's failure, unchanged |
//! | [`UntilSuccessful`] | `MULE:RETRY_EXHAUSTED`, or the dead-letter route |
//!
//! Every router implements [`Route`], so routers nest.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod first_successful;
pub mod retry;
pub mod round_robin;
pub mod route;
pub mod scatter_gather;
pub mod until_successful;

use std::sync::Arc;

pub use aggregation::{
    AggregationContext, AggregationStrategy, CollectListStrategy, CollectMapStrategy,
    FirstSuccessfulStrategy, RouteOutcome, RoutingResult,
};
pub use config::{
    ExecutionMode, RouterConfig, ScatterGatherConfig, StrategyKind, UntilSuccessfulConfig,
    DEFAULT_MAX_BACKOFF_MS,
};
pub use error::{CompositeRoutingException, RoutingError, INFO_SUCCESSFUL_ROUTES_KEY};
pub use first_successful::FirstSuccessful;
pub use retry::{RetryConfig, RetryPolicy};
pub use round_robin::RoundRobin;
pub use route::{FnRoute, Route, RouteErrors};
pub use scatter_gather::ScatterGather;
pub use until_successful::UntilSuccessful;

/// Build a router from its configuration.
///
/// `until_successful` retries the first route only. Returns
/// [`RoutingError::NoRoutes`] when `routes` is empty.
pub fn build_router(
    config: &RouterConfig,
    routes: Vec<Arc<dyn Route>>,
    errors: RouteErrors,
) -> Result<Arc<dyn Route>, RoutingError> {
    if routes.is_empty() {
        return Err(RoutingError::NoRoutes);
    }
    let component = errors.component().cloned();
    let router: Arc<dyn Route> = match config {
        RouterConfig::ScatterGather(sg) => {
            Arc::new(ScatterGather::with_config(routes, errors, sg.clone()))
        }
        RouterConfig::FirstSuccessful => Arc::new(FirstSuccessful::new(routes, component)),
        RouterConfig::RoundRobin => Arc::new(RoundRobin::new(routes, component)),
        RouterConfig::UntilSuccessful(us) => {
            let mut routes = routes.into_iter();
            let Some(route) = routes.next() else {
                return Err(RoutingError::NoRoutes);
            };
            if !routes.as_slice().is_empty() {
                tracing::warn!(ignored = routes.len(), "until-successful uses only its first route");
            }
            Arc::new(UntilSuccessful::from_config(route, us, component))
        }
    };
    Ok(router)
}
