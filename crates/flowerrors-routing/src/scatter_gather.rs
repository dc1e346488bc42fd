//! Scatter-gather: send a copy of the event down every route, then
//! aggregate what comes back.
//!
//! In parallel mode each route runs on its own Tokio task, bounded by a
//! semaphore. Completions are counted down over a channel; once every
//! route reported, or the deadline passed, the collected slots are handed
//! to aggregation. Routes still running at the deadline are recorded as
//! `MULE:TIMEOUT` failures and their late results are discarded.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

use flowerrors_core::{kinds, CoreErrorType, Error, Event, MessagingException, PlainFailure};

use crate::aggregation::{
    AggregationContext, AggregationStrategy, CollectListStrategy, CollectMapStrategy,
    FirstSuccessfulStrategy, RouteOutcome,
};
use crate::config::{ExecutionMode, ScatterGatherConfig, StrategyKind};
use crate::error::{CompositeRoutingException, RoutingError};
use crate::route::{Route, RouteErrors};

pub struct ScatterGather {
    routes: Vec<Arc<dyn Route>>,
    config: ScatterGatherConfig,
    strategy: Arc<dyn AggregationStrategy>,
    errors: RouteErrors,
}

impl ScatterGather {
    pub fn new(routes: Vec<Arc<dyn Route>>, errors: RouteErrors) -> Self {
        Self::with_config(routes, errors, ScatterGatherConfig::default())
    }

    pub fn with_config(
        routes: Vec<Arc<dyn Route>>,
        errors: RouteErrors,
        config: ScatterGatherConfig,
    ) -> Self {
        let strategy: Arc<dyn AggregationStrategy> = match config.strategy {
            StrategyKind::CollectMap => Arc::new(CollectMapStrategy),
            StrategyKind::CollectList => Arc::new(CollectListStrategy),
            StrategyKind::FirstSuccessful => Arc::new(FirstSuccessfulStrategy),
        };
        Self {
            routes,
            config,
            strategy,
            errors,
        }
    }

    /// Replace the configured strategy with a custom one.
    pub fn with_strategy(mut self, strategy: Arc<dyn AggregationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &ScatterGatherConfig {
        &self.config
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Route `event` and aggregate the outcomes.
    pub async fn route(&self, event: Event) -> Result<Event, RoutingError> {
        if self.routes.is_empty() {
            return Err(RoutingError::NoRoutes);
        }
        tracing::debug!(
            routes = self.routes.len(),
            mode = ?self.config.mode,
            strategy = self.strategy.name(),
            "scatter-gather dispatch"
        );
        let outcomes = match self.config.mode {
            ExecutionMode::Parallel => self.run_parallel(&event).await,
            ExecutionMode::Sequential => self.run_sequential(&event).await,
        };
        self.aggregate(event, outcomes)
    }

    async fn run_parallel(&self, event: &Event) -> Vec<(usize, RouteOutcome)> {
        let total = self.routes.len();
        let slots: Arc<Mutex<Vec<Option<RouteOutcome>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<bool>(total);

        for (slot, route) in self.routes.iter().enumerate() {
            let route = Arc::clone(route);
            let event = event.clone();
            let slots = Arc::clone(&slots);
            let semaphore = Arc::clone(&semaphore);
            let errors = self.errors.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = match route.process(event).await {
                    Ok(ev) => RouteOutcome::Success(ev),
                    Err(ex) => {
                        tracing::debug!(route = route.name(), error = %ex, "route failed");
                        RouteOutcome::Failure(errors.error_of(&ex))
                    }
                };
                let failed = outcome.is_failure();
                slots.lock().unwrap()[slot] = Some(outcome);
                let _ = tx.send(failed).await;
            });
        }
        drop(tx);

        let deadline = self.config.timeout().map(|t| Instant::now() + t);
        let mut remaining = total;
        let mut timed_out = false;
        let mut stopped_early = false;
        while remaining > 0 {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => rx.recv().await,
            };
            match next {
                Some(failed) => {
                    remaining -= 1;
                    if failed && self.config.fail_fast {
                        tracing::debug!(remaining, "fail-fast: stopped collecting");
                        stopped_early = true;
                        break;
                    }
                }
                // Every sender is gone: the remaining tasks panicked.
                None => break,
            }
        }
        if timed_out {
            tracing::warn!(remaining, total, "scatter-gather timed out");
        }

        let mut slots = slots.lock().unwrap();
        let mut outcomes = Vec::with_capacity(total);
        for (slot, entry) in slots.iter_mut().enumerate() {
            let index = slot + 1;
            match entry.take() {
                Some(outcome) => outcomes.push((index, outcome)),
                None if timed_out => outcomes.push((index, self.timeout_outcome(index))),
                None if stopped_early => {}
                None => outcomes.push((index, abandoned_outcome(index))),
            }
        }
        outcomes
    }

    async fn run_sequential(&self, event: &Event) -> Vec<(usize, RouteOutcome)> {
        let mut outcomes = Vec::with_capacity(self.routes.len());
        for (slot, route) in self.routes.iter().enumerate() {
            let index = slot + 1;
            let result = match self.config.timeout() {
                Some(limit) => tokio::time::timeout(limit, route.process(event.clone())).await,
                None => Ok(route.process(event.clone()).await),
            };
            let outcome = match result {
                Ok(Ok(ev)) => RouteOutcome::Success(ev),
                Ok(Err(ex)) => {
                    tracing::debug!(route = route.name(), error = %ex, "route failed");
                    RouteOutcome::Failure(self.errors.error_of(&ex))
                }
                Err(_) => {
                    tracing::warn!(route = route.name(), index, "route timed out");
                    self.timeout_outcome(index)
                }
            };
            let failed = outcome.is_failure();
            outcomes.push((index, outcome));
            if failed && self.config.fail_fast {
                break;
            }
        }
        outcomes
    }

    fn timeout_outcome(&self, index: usize) -> RouteOutcome {
        let limit = self.config.timeout().unwrap_or(Duration::ZERO);
        let failure = PlainFailure::typed(
            kinds::RESPONSE_TIMEOUT,
            format!("Route {index} did not complete within {}ms", limit.as_millis()),
            CoreErrorType::Timeout.error_type(),
        );
        let error = Error::builder(failure)
            .error_type(CoreErrorType::Timeout.error_type())
            .build();
        RouteOutcome::Failure(error)
    }

    fn aggregate(
        &self,
        original: Event,
        outcomes: Vec<(usize, RouteOutcome)>,
    ) -> Result<Event, RoutingError> {
        let context = AggregationContext::new(original, outcomes);
        if context.has_failures() && !self.config.tolerate_failures {
            let composite = CompositeRoutingException::new(context.into_result());
            tracing::debug!(failed = ?composite.result().failed_indexes(), "composite routing failure");
            return Err(composite.into());
        }
        self.strategy.aggregate(&context).map_err(|failure| {
            tracing::debug!(strategy = self.strategy.name(), error = %failure, "aggregation failed");
            RoutingError::Aggregation(
                MessagingException::builder(context.original_event().clone())
                    .cause(failure)
                    .failing_component(self.errors.component().cloned())
                    .build(),
            )
        })
    }
}

fn abandoned_outcome(index: usize) -> RouteOutcome {
    let failure = PlainFailure::typed(
        kinds::ROUTING,
        format!("Route {index} terminated without a result"),
        CoreErrorType::Routing.error_type(),
    );
    let error = Error::builder(failure)
        .error_type(CoreErrorType::Routing.error_type())
        .build();
    RouteOutcome::Failure(error)
}

#[async_trait]
impl Route for ScatterGather {
    async fn process(&self, event: Event) -> Result<Event, MessagingException> {
        self.route(event.clone()).await.map_err(|e| {
            e.into_messaging_exception(&event, self.errors.component().cloned())
        })
    }

    fn name(&self) -> &str {
        "scatter-gather"
    }
}
