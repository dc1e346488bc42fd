//! Round-robin: each event goes to the next route in turn.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use flowerrors_core::{ComponentRef, Event, MessagingException};

use crate::error::RoutingError;
use crate::route::Route;

/// Rotates through its routes. A route failure is returned unchanged.
pub struct RoundRobin {
    routes: Vec<Arc<dyn Route>>,
    cursor: AtomicUsize,
    component: Option<ComponentRef>,
}

impl RoundRobin {
    pub fn new(routes: Vec<Arc<dyn Route>>, component: Option<ComponentRef>) -> Self {
        Self {
            routes,
            cursor: AtomicUsize::new(0),
            component,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn next_route(&self) -> Option<&Arc<dyn Route>> {
        if self.routes.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.routes.len();
        self.routes.get(idx)
    }

    pub async fn route(&self, event: Event) -> Result<Event, RoutingError> {
        let route = self.next_route().ok_or(RoutingError::NoRoutes)?;
        tracing::trace!(route = route.name(), "round-robin selected");
        route.process(event).await.map_err(RoutingError::Messaging)
    }
}

#[async_trait]
impl Route for RoundRobin {
    async fn process(&self, event: Event) -> Result<Event, MessagingException> {
        self.route(event.clone())
            .await
            .map_err(|e| e.into_messaging_exception(&event, self.component.clone()))
    }

    fn name(&self) -> &str {
        "round-robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::FnRoute;
    use flowerrors_core::Failure;
    use serde_json::json;

    fn named(value: &'static str) -> Arc<dyn Route> {
        FnRoute::shared(value, move |ev: Event| async move { Ok(ev.with_payload(json!(value))) })
    }

    #[tokio::test]
    async fn rotates_through_routes() {
        let rr = RoundRobin::new(vec![named("a"), named("b"), named("c")], None);
        let mut seen = Vec::new();
        for _ in 0..4 {
            let out = rr.route(Event::new("ev", json!(null))).await.unwrap();
            seen.push(out.payload().as_str().unwrap().to_string());
        }
        assert_eq!(seen, vec!["a", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn failure_passes_through() {
        let failing = FnRoute::shared("x", |ev: Event| async move {
            Err(MessagingException::new(ev, Failure::plain("X", "nope")))
        });
        let rr = RoundRobin::new(vec![failing], None);
        let err = rr.process(Event::new("ev", json!(null))).await.unwrap_err();
        assert_eq!(err.cause().unwrap().kind(), "X");
    }

    #[tokio::test]
    async fn empty_rejected() {
        let rr = RoundRobin::new(vec![], None);
        assert!(matches!(
            rr.route(Event::new("ev", json!(null))).await,
            Err(RoutingError::NoRoutes)
        ));
    }
}
