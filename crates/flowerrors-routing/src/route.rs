//! The `Route` trait: anything an event can be sent through.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use flowerrors_core::{
    ComponentRef, CoreErrorType, Error, ErrorTypeLocator, Event, MessagingException,
    MessagingExceptionResolver,
};

/// A processing path: a processor chain, a sub-flow, or another router.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; scatter-gather runs routes on
/// separate Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn Route>`.
#[async_trait]
pub trait Route: Send + Sync + 'static {
    /// Process `event`, returning the resulting event or the failure.
    async fn process(&self, event: Event) -> Result<Event, MessagingException>;

    /// A name for logs.
    fn name(&self) -> &str;
}

/// A route backed by an async closure.
pub struct FnRoute<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnRoute<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Event, MessagingException>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn shared(name: impl Into<String>, f: F) -> Arc<dyn Route> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Route for FnRoute<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Event, MessagingException>> + Send + 'static,
{
    async fn process(&self, event: Event) -> Result<Event, MessagingException> {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Turns route failures into `Error`s on behalf of a router.
#[derive(Clone)]
pub struct RouteErrors {
    locator: Arc<dyn ErrorTypeLocator>,
    resolver: MessagingExceptionResolver,
}

impl RouteErrors {
    /// `component` is the router itself; its mappings apply to route errors.
    pub fn new(locator: Arc<dyn ErrorTypeLocator>, component: Option<ComponentRef>) -> Self {
        Self {
            locator,
            resolver: MessagingExceptionResolver::new(component),
        }
    }

    pub fn component(&self) -> Option<&ComponentRef> {
        self.resolver.component()
    }

    /// The error a failed route reports: its own if already resolved,
    /// otherwise the result of resolving it here.
    pub fn error_of(&self, exception: &MessagingException) -> Error {
        if let Some(error) = exception.error() {
            return error;
        }
        let resolved = match self.resolver.resolve(exception, self.locator.as_ref(), &[]) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, "route failure could not be resolved");
                exception.clone()
            }
        };
        resolved.error().unwrap_or_else(|| {
            let cause = exception
                .cause()
                .cloned()
                .unwrap_or_else(|| exception.clone().into());
            Error::builder(cause)
                .error_type(CoreErrorType::Unknown.error_type())
                .build()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowerrors_core::{kinds, ErrorTypeRepository, Failure, MemoryErrorTypeLocator};
    use serde_json::json;

    fn errors() -> RouteErrors {
        let repo = ErrorTypeRepository::new();
        RouteErrors::new(Arc::new(MemoryErrorTypeLocator::new(&repo)), None)
    }

    #[tokio::test]
    async fn fn_route_processes() {
        let route = FnRoute::new("upper", |ev: Event| async move {
            let text = ev.payload().as_str().unwrap_or_default().to_uppercase();
            Ok(ev.with_payload(json!(text)))
        });
        let out = route.process(Event::new("ev", json!("abc"))).await.unwrap();
        assert_eq!(out.payload(), &json!("ABC"));
        assert_eq!(route.name(), "upper");
    }

    #[test]
    fn error_of_classifies_unresolved_failure() {
        let ex = MessagingException::new(
            Event::new("ev", json!(null)),
            Failure::plain(kinds::CONNECTION, "refused"),
        );
        let err = errors().error_of(&ex);
        assert!(err.error_type().is_core(CoreErrorType::Connectivity));
    }

    #[test]
    fn error_of_keeps_existing_error() {
        let ex = MessagingException::new(Event::new("ev", json!(null)), Failure::plain("X", "x"));
        let existing = Error::builder(Failure::plain("X", "x")).build();
        ex.set_processed_event(ex.event().with_error(existing.clone()));
        assert!(errors().error_of(&ex).same_as(&existing));
    }
}
