//! Until-successful: retry one route until it succeeds or retries run out.

use std::sync::Arc;

use async_trait::async_trait;

use flowerrors_core::{ComponentRef, Event, MessagingException};

use crate::config::UntilSuccessfulConfig;
use crate::error::RoutingError;
use crate::retry::RetryPolicy;
use crate::route::Route;

pub struct UntilSuccessful {
    route: Arc<dyn Route>,
    policy: RetryPolicy,
    dead_letter: Option<Arc<dyn Route>>,
    component: Option<ComponentRef>,
}

impl UntilSuccessful {
    pub fn new(route: Arc<dyn Route>, policy: RetryPolicy, component: Option<ComponentRef>) -> Self {
        Self {
            route,
            policy,
            dead_letter: None,
            component,
        }
    }

    pub fn from_config(
        route: Arc<dyn Route>,
        config: &UntilSuccessfulConfig,
        component: Option<ComponentRef>,
    ) -> Self {
        Self::new(route, config.policy(), component)
    }

    /// Send exhausted events here instead of failing. The event carries the
    /// `MULE:RETRY_EXHAUSTED` error.
    pub fn with_dead_letter(mut self, route: Arc<dyn Route>) -> Self {
        self.dead_letter = Some(route);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Every attempt gets the event as it was first received.
    pub async fn route(&self, event: Event) -> Result<Event, RoutingError> {
        let mut attempt = 0u32;
        loop {
            let last = match self.route.process(event.clone()).await {
                Ok(ev) => {
                    if attempt > 0 {
                        tracing::info!(route = self.route.name(), retries = attempt, "succeeded after retry");
                    }
                    return Ok(ev);
                }
                Err(ex) => ex,
            };
            attempt += 1;
            match self.policy.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        route = self.route.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %last,
                        "route failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return self.exhausted(event, attempt, last).await,
            }
        }
    }

    async fn exhausted(
        &self,
        event: Event,
        attempts: u32,
        last: MessagingException,
    ) -> Result<Event, RoutingError> {
        tracing::warn!(route = self.route.name(), attempts, "retries exhausted");
        let err = RoutingError::RetryExhausted { attempts, last };
        let Some(dead_letter) = &self.dead_letter else {
            return Err(err);
        };
        let failed = err.into_messaging_exception(&event, self.component.clone());
        tracing::debug!(dead_letter = dead_letter.name(), "routing exhausted event to dead letter");
        dead_letter
            .process(failed.event())
            .await
            .map_err(RoutingError::Messaging)
    }
}

#[async_trait]
impl Route for UntilSuccessful {
    async fn process(&self, event: Event) -> Result<Event, MessagingException> {
        self.route(event.clone())
            .await
            .map_err(|e| e.into_messaging_exception(&event, self.component.clone()))
    }

    fn name(&self) -> &str {
        "until-successful"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::FnRoute;
    use flowerrors_core::{kinds, CoreErrorType, Failure};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> Arc<dyn Route> {
        FnRoute::shared("flaky", move |ev: Event| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(MessagingException::new(ev, Failure::plain(kinds::CONNECTION, "refused")))
                } else {
                    Ok(ev.with_payload(json!(n)))
                }
            }
        })
    }

    #[tokio::test]
    async fn succeeds_after_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = UntilSuccessful::new(
            flaky(2, Arc::clone(&calls)),
            RetryPolicy::fixed(3, Duration::from_millis(1)),
            None,
        );
        let out = router.route(Event::new("ev", json!(null))).await.unwrap();
        assert_eq!(out.payload(), &json!(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_is_retry_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = UntilSuccessful::new(
            flaky(10, Arc::clone(&calls)),
            RetryPolicy::fixed(2, Duration::from_millis(1)),
            None,
        );
        let ex = router.process(Event::new("ev", json!(null))).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let error = ex.error().expect("resolved");
        assert!(error.error_type().is_core(CoreErrorType::RetryExhausted));
        assert_eq!(error.cause().cause().unwrap().kind(), kinds::CONNECTION);
    }

    #[tokio::test]
    async fn dead_letter_receives_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let dlq = FnRoute::shared("dlq", |ev: Event| async move {
            let error_type = ev.error().map(|e| e.error_type().to_string());
            Ok(ev.with_payload(json!({ "deadLettered": error_type })))
        });
        let router = UntilSuccessful::new(
            flaky(10, Arc::clone(&calls)),
            RetryPolicy::fixed(0, Duration::from_millis(1)),
            None,
        )
        .with_dead_letter(dlq);
        let out = router.route(Event::new("ev", json!(null))).await.unwrap();
        assert_eq!(out.payload(), &json!({ "deadLettered": "MULE:RETRY_EXHAUSTED" }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
