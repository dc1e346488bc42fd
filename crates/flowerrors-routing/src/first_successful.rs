//! First-successful: try routes in order until one succeeds.

use std::sync::Arc;

use async_trait::async_trait;

use flowerrors_core::{ComponentRef, Event, MessagingException};

use crate::error::RoutingError;
use crate::route::Route;

pub struct FirstSuccessful {
    routes: Vec<Arc<dyn Route>>,
    component: Option<ComponentRef>,
}

impl FirstSuccessful {
    pub fn new(routes: Vec<Arc<dyn Route>>, component: Option<ComponentRef>) -> Self {
        Self { routes, component }
    }

    /// Each route sees the original event. When all fail, the last failure
    /// becomes the cause of a `MULE:ROUTING` error.
    pub async fn route(&self, event: Event) -> Result<Event, RoutingError> {
        let mut last = None;
        for (i, route) in self.routes.iter().enumerate() {
            match route.process(event.clone()).await {
                Ok(ev) => {
                    tracing::debug!(route = route.name(), index = i + 1, "route succeeded");
                    return Ok(ev);
                }
                Err(ex) => {
                    tracing::debug!(route = route.name(), index = i + 1, error = %ex, "route failed, trying next");
                    last = Some(ex);
                }
            }
        }
        match last {
            Some(last) => Err(RoutingError::AllRoutesFailed {
                attempted: self.routes.len(),
                last,
            }),
            None => Err(RoutingError::NoRoutes),
        }
    }
}

#[async_trait]
impl Route for FirstSuccessful {
    async fn process(&self, event: Event) -> Result<Event, MessagingException> {
        self.route(event.clone())
            .await
            .map_err(|e| e.into_messaging_exception(&event, self.component.clone()))
    }

    fn name(&self) -> &str {
        "first-successful"
    }
}
