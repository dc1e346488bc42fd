//! Aggregation of per-route outcomes into one event.
//!
//! Route indexes are 1-based and follow route declaration order.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use flowerrors_core::{kinds, CoreErrorType, Error, Event, Failure, PlainFailure};

/// What one route produced. Never both an event and an error.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Success(Event),
    Failure(Error),
}

impl RouteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// Successes and failures of a fan-out, keyed by route index.
#[derive(Debug, Clone, Default)]
pub struct RoutingResult {
    successes: BTreeMap<usize, Event>,
    failures: BTreeMap<usize, Error>,
}

impl RoutingResult {
    pub fn successes(&self) -> &BTreeMap<usize, Event> {
        &self.successes
    }

    pub fn failures(&self) -> &BTreeMap<usize, Error> {
        &self.failures
    }

    pub fn failed_indexes(&self) -> Vec<usize> {
        self.failures.keys().copied().collect()
    }

    /// Number of routes that reported an outcome.
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn summary(&self) -> String {
        let failed: Vec<String> = self
            .failures
            .iter()
            .map(|(index, error)| format!("route {index}: {error}"))
            .collect();
        format!(
            "{} of {} routes failed [{}]",
            self.failures.len(),
            self.len(),
            failed.join("; ")
        )
    }
}

/// Everything an [`AggregationStrategy`] sees.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    original: Event,
    outcomes: Vec<(usize, RouteOutcome)>,
}

impl AggregationContext {
    /// `outcomes` must be sorted by route index.
    pub fn new(original: Event, outcomes: Vec<(usize, RouteOutcome)>) -> Self {
        Self { original, outcomes }
    }

    pub fn original_event(&self) -> &Event {
        &self.original
    }

    pub fn outcomes(&self) -> &[(usize, RouteOutcome)] {
        &self.outcomes
    }

    pub fn successful_events(&self) -> impl Iterator<Item = (usize, &Event)> {
        self.outcomes.iter().filter_map(|(i, o)| match o {
            RouteOutcome::Success(ev) => Some((*i, ev)),
            RouteOutcome::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.outcomes.iter().filter_map(|(i, o)| match o {
            RouteOutcome::Failure(err) => Some((*i, err)),
            RouteOutcome::Success(_) => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_failure())
    }

    pub fn into_result(self) -> RoutingResult {
        let mut result = RoutingResult::default();
        for (index, outcome) in self.outcomes {
            match outcome {
                RouteOutcome::Success(ev) => {
                    result.successes.insert(index, ev);
                }
                RouteOutcome::Failure(err) => {
                    result.failures.insert(index, err);
                }
            }
        }
        result
    }
}

/// Combines route outcomes into the event the router continues with.
///
/// A returned `Err` becomes the cause of the router's exception unchanged.
pub trait AggregationStrategy: Send + Sync {
    fn aggregate(&self, context: &AggregationContext) -> Result<Event, Failure>;

    fn name(&self) -> &'static str;
}

/// Copy the variables of every successful route onto `base`, later routes
/// winning on conflicts.
fn merge_variables(base: Event, context: &AggregationContext) -> Event {
    context
        .successful_events()
        .flat_map(|(_, ev)| ev.variables().iter())
        .fold(base, |acc, (name, value)| {
            acc.with_variable(name.clone(), value.clone())
        })
}

/// Payload becomes an object keyed by route index, each value holding the
/// route's payload and attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectMapStrategy;

impl AggregationStrategy for CollectMapStrategy {
    fn aggregate(&self, context: &AggregationContext) -> Result<Event, Failure> {
        let map: Map<String, Value> = context
            .successful_events()
            .map(|(index, ev)| {
                let message = json!({
                    "payload": ev.payload(),
                    "attributes": ev.message().attributes,
                });
                (index.to_string(), message)
            })
            .collect();
        let base = context.original_event().clone().with_payload(Value::Object(map));
        Ok(merge_variables(base, context))
    }

    fn name(&self) -> &'static str {
        "collect-map"
    }
}

/// Payload becomes an array of the successful payloads in route order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectListStrategy;

impl AggregationStrategy for CollectListStrategy {
    fn aggregate(&self, context: &AggregationContext) -> Result<Event, Failure> {
        let payloads: Vec<Value> = context
            .successful_events()
            .map(|(_, ev)| ev.payload().clone())
            .collect();
        let base = context.original_event().clone().with_payload(Value::Array(payloads));
        Ok(merge_variables(base, context))
    }

    fn name(&self) -> &'static str {
        "collect-list"
    }
}

/// The lowest-indexed successful event wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSuccessfulStrategy;

impl AggregationStrategy for FirstSuccessfulStrategy {
    fn aggregate(&self, context: &AggregationContext) -> Result<Event, Failure> {
        match context.successful_events().next() {
            Some((_, ev)) => Ok(ev.clone()),
            None => Err(PlainFailure::typed(
                kinds::ROUTING,
                "No route produced a result",
                CoreErrorType::Routing.error_type(),
            )
            .into()),
        }
    }

    fn name(&self) -> &'static str {
        "first-successful"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success(index: usize, payload: Value) -> (usize, RouteOutcome) {
        (
            index,
            RouteOutcome::Success(
                Event::new("ev", payload).with_variable(format!("route{index}"), json!(true)),
            ),
        )
    }

    fn failure(index: usize) -> (usize, RouteOutcome) {
        let err = Error::builder(Failure::plain(kinds::RUNTIME, "boom")).build();
        (index, RouteOutcome::Failure(err))
    }

    fn context(outcomes: Vec<(usize, RouteOutcome)>) -> AggregationContext {
        AggregationContext::new(Event::new("ev", json!("in")), outcomes)
    }

    #[test]
    fn collect_map_keys_by_index() {
        let ctx = context(vec![success(1, json!("a")), success(2, json!("b"))]);
        let out = CollectMapStrategy.aggregate(&ctx).unwrap();
        assert_eq!(out.payload()["1"]["payload"], json!("a"));
        assert_eq!(out.payload()["2"]["payload"], json!("b"));
        assert_eq!(out.variable("route1"), Some(&json!(true)));
        assert_eq!(out.variable("route2"), Some(&json!(true)));
    }

    #[test]
    fn collect_list_skips_failures() {
        let ctx = context(vec![success(1, json!(1)), failure(2), success(3, json!(3))]);
        let out = CollectListStrategy.aggregate(&ctx).unwrap();
        assert_eq!(out.payload(), &json!([1, 3]));
    }

    #[test]
    fn first_successful_picks_lowest_index() {
        let ctx = context(vec![failure(1), success(2, json!("two")), success(3, json!("three"))]);
        let out = FirstSuccessfulStrategy.aggregate(&ctx).unwrap();
        assert_eq!(out.payload(), &json!("two"));
    }

    #[test]
    fn first_successful_without_success_fails_with_routing() {
        let ctx = context(vec![failure(1)]);
        let err = FirstSuccessfulStrategy.aggregate(&ctx).unwrap_err();
        assert!(err.error_type().unwrap().is_core(CoreErrorType::Routing));
    }

    #[test]
    fn into_result_splits_outcomes() {
        let result = context(vec![success(1, json!(1)), failure(2), success(3, json!(3))])
            .into_result();
        assert_eq!(result.failed_indexes(), vec![2]);
        assert_eq!(result.successes().keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert!(result.summary().starts_with("1 of 3 routes failed"));
    }
}
