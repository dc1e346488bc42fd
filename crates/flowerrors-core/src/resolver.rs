//! `MessagingExceptionResolver`: turns a raised exception into one that
//! carries a typed, routable [`Error`].

use serde_json::Value;
use std::sync::Arc;

use crate::component::{error_mappings_of, ComponentRef};
use crate::context::{ContextProviderError, ExceptionContextProvider};
use crate::error::{Error, ErrorBuilder};
use crate::exception::{MessagingException, INFO_ALREADY_LOGGED_KEY, INFO_LOCATION_KEY};
use crate::failure::Failure;
use crate::locator::ErrorTypeLocator;
use crate::mapping::apply_mappings;
use crate::root_cause::{classify, find_root, RootCause};
use crate::types::ErrorType;

/// Errors that abort a resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    ContextProvider(#[from] ContextProviderError),
}

/// Resolves exceptions raised by (or on behalf of) one component.
///
/// The component's error mappings are applied to every resolved type; its
/// kind drives component-specific classification.
#[derive(Debug, Clone, Default)]
pub struct MessagingExceptionResolver {
    component: Option<ComponentRef>,
}

impl MessagingExceptionResolver {
    pub fn new(component: Option<ComponentRef>) -> Self {
        Self { component }
    }

    pub fn for_component(component: ComponentRef) -> Self {
        Self::new(Some(component))
    }

    pub fn component(&self) -> Option<&ComponentRef> {
        self.component.as_ref()
    }

    /// Resolve `exception` into an exception whose event carries an `Error`.
    ///
    /// The returned exception is either `exception` itself, an exception
    /// found in its cause chain, or a new exception of the same kind
    /// wrapping the root cause. Only a failing context provider makes this
    /// return `Err`.
    pub fn resolve(
        &self,
        exception: &MessagingException,
        locator: &dyn ErrorTypeLocator,
        providers: &[Arc<dyn ExceptionContextProvider>],
    ) -> Result<MessagingException, ResolveError> {
        let component = self.component.as_deref();

        match find_root(exception, component, locator) {
            RootCause::Resolved(existing) => {
                copy_logged_flag(exception, &existing);
                let failing = existing
                    .failing_component()
                    .cloned()
                    .or_else(|| self.component.clone());
                enrich(existing, failing.as_ref(), providers)
            }
            RootCause::NotFound => self.update_current(exception, locator, providers),
            RootCause::Classified { failure, error_type } => {
                let failing = failure
                    .as_messaging()
                    .and_then(MessagingException::failing_component)
                    .or_else(|| exception.failing_component())
                    .cloned()
                    .or_else(|| self.component.clone());

                let error = ErrorBuilder::new(underlying_cause(&failure))
                    .error_type(self.mapped(&error_type))
                    .build();
                let event = exception.event().with_error(error);

                let result = match &failure {
                    Failure::Messaging(root) => {
                        root.set_processed_event(event);
                        root.clone()
                    }
                    Failure::Plain(_) => {
                        let wrapper = MessagingException::builder(event)
                            .kind(exception.kind())
                            .cause(failure.clone())
                            .failing_component(failing.clone())
                            .build();
                        for (key, value) in exception.info() {
                            wrapper.add_info(key, value);
                        }
                        wrapper
                    }
                };
                copy_logged_flag(exception, &result);
                enrich(result, failing.as_ref(), providers)
            }
        }
    }

    /// No usable root: classify the exception's own cause and attach the
    /// error to its own event.
    fn update_current(
        &self,
        exception: &MessagingException,
        locator: &dyn ErrorTypeLocator,
        providers: &[Arc<dyn ExceptionContextProvider>],
    ) -> Result<MessagingException, ResolveError> {
        let cause = exception
            .cause()
            .cloned()
            .unwrap_or_else(|| Failure::Messaging(exception.clone()));
        let failing = exception
            .failing_component()
            .cloned()
            .or_else(|| self.component.clone());

        let error_type = classify(&cause, self.component.as_deref(), locator);
        let error: Error = ErrorBuilder::new(cause)
            .error_type(self.mapped(&error_type))
            .build();
        tracing::debug!(error_type = %error.error_type(), "no root cause, resolved in place");

        exception.set_processed_event(exception.event().with_error(error));
        enrich(exception.clone(), failing.as_ref(), providers)
    }

    fn mapped(&self, error_type: &ErrorType) -> ErrorType {
        match self.component.as_deref() {
            Some(component) => apply_mappings(error_mappings_of(component), error_type),
            None => error_type.clone(),
        }
    }
}

/// The failure an `Error` should report: a wrapper's own cause, else itself.
fn underlying_cause(failure: &Failure) -> Failure {
    match failure {
        Failure::Messaging(m) => m.cause().cloned().unwrap_or_else(|| failure.clone()),
        Failure::Plain(_) => failure.clone(),
    }
}

fn copy_logged_flag(from: &MessagingException, to: &MessagingException) {
    if let Some(logged) = from.info_value(INFO_ALREADY_LOGGED_KEY) {
        to.add_info(INFO_ALREADY_LOGGED_KEY, logged);
    }
}

/// Add the failing location and every provider's pairs, keeping keys that
/// are already present.
fn enrich(
    exception: MessagingException,
    failing: Option<&ComponentRef>,
    providers: &[Arc<dyn ExceptionContextProvider>],
) -> Result<MessagingException, ResolveError> {
    if let Some(component) = failing {
        exception.add_info_if_absent(
            INFO_LOCATION_KEY,
            Value::String(component.location().to_string()),
        );
    }
    let event = exception.event();
    for provider in providers {
        let info = provider.context_info(&event, failing.map(|c| &**c))?;
        for (key, value) in info {
            exception.add_info_if_absent(key, value);
        }
    }
    Ok(exception)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentIdentifier, Processor};
    use crate::context::EventContextProvider;
    use crate::event::Event;
    use crate::failure::{kinds, PlainFailure};
    use crate::locator::MemoryErrorTypeLocator;
    use crate::mapping::ErrorMappingConfig;
    use crate::repository::ErrorTypeRepository;
    use crate::types::CoreErrorType;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn setup() -> (ErrorTypeRepository, MemoryErrorTypeLocator) {
        let repo = ErrorTypeRepository::new();
        let locator = MemoryErrorTypeLocator::new(&repo);
        (repo, locator)
    }

    fn event() -> Event {
        Event::new("ev-1", json!({"id": 7}))
    }

    struct FailingProvider;

    impl ExceptionContextProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        fn context_info(
            &self,
            _event: &Event,
            _component: Option<&dyn crate::component::Component>,
        ) -> Result<BTreeMap<String, Value>, ContextProviderError> {
            Err(ContextProviderError {
                provider: self.name().into(),
                reason: "misconfigured".into(),
            })
        }
    }

    struct OverwritingProvider;

    impl ExceptionContextProvider for OverwritingProvider {
        fn name(&self) -> &str {
            "overwriting"
        }
        fn context_info(
            &self,
            _event: &Event,
            _component: Option<&dyn crate::component::Component>,
        ) -> Result<BTreeMap<String, Value>, ContextProviderError> {
            Ok(BTreeMap::from([
                ("K".to_string(), json!("provider")),
                ("extra".to_string(), json!(true)),
            ]))
        }
    }

    #[test]
    fn wraps_classified_root() {
        let (_, locator) = setup();
        let root = PlainFailure::new(kinds::CONNECTION, "refused");
        let ex = MessagingException::new(event(), PlainFailure::new("Mystery", "wrapper").with_cause(root.clone()));

        let resolved = MessagingExceptionResolver::default()
            .resolve(&ex, &locator, &[])
            .unwrap();
        let error = resolved.error().unwrap();
        assert!(error.error_type().is_core(CoreErrorType::Connectivity));
        assert!(error.cause().same_as(&root.into()));
        assert!(!resolved.same_as(&ex));
        assert!(ex.original_event().error().is_none());
    }

    #[test]
    fn flow_execution_kind_preserved() {
        let (_, locator) = setup();
        let ex = MessagingException::flow_execution(event(), Failure::plain(kinds::SECURITY, "denied"));
        let resolved = MessagingExceptionResolver::default()
            .resolve(&ex, &locator, &[])
            .unwrap();
        assert!(resolved.is_flow_execution());
    }

    #[test]
    fn unknown_chain_resolves_in_place() {
        let (_, locator) = setup();
        let ex = MessagingException::new(event(), Failure::plain("Mystery", "???"));
        let resolved = MessagingExceptionResolver::default()
            .resolve(&ex, &locator, &[])
            .unwrap();
        assert!(resolved.same_as(&ex));
        assert!(resolved.error().unwrap().error_type().is_unknown());
        assert_eq!(resolved.error().unwrap().cause().kind(), "Mystery");
    }

    #[test]
    fn resolving_twice_keeps_the_same_error() {
        let (_, locator) = setup();
        let resolver = MessagingExceptionResolver::default();
        let ex = MessagingException::new(event(), Failure::plain(kinds::EXPRESSION, "bad expr"));
        let first = resolver.resolve(&ex, &locator, &[]).unwrap();
        let second = resolver.resolve(&first, &locator, &[]).unwrap();
        assert!(first.error().unwrap().same_as(&second.error().unwrap()));
    }

    #[test]
    fn component_mappings_first_match_wins() {
        let (repo, locator) = setup();
        let mappings = [("ANY", "APP:X"), ("CONNECTIVITY", "APP:Z")]
            .iter()
            .map(|(source, target)| {
                ErrorMappingConfig {
                    source: source.to_string(),
                    target: target.to_string(),
                }
                .build(&repo)
                .unwrap()
            });
        let component = Processor::new(ComponentIdentifier::parse("http:request"), "orders/processors/0")
            .with_error_mappings(mappings)
            .into_ref();
        let ex = MessagingException::new(event(), Failure::plain(kinds::CONNECTION, "refused"));

        let resolved = MessagingExceptionResolver::for_component(component)
            .resolve(&ex, &locator, &[])
            .unwrap();
        assert_eq!(resolved.error().unwrap().error_type().to_string(), "APP:X");
        assert_eq!(
            resolved.info_value(INFO_LOCATION_KEY),
            Some(json!("orders/processors/0"))
        );
    }

    #[test]
    fn root_component_preferred_over_resolver_component() {
        let (_, locator) = setup();
        locator.add_default("FlowExecutionException", ErrorType::core(CoreErrorType::Routing));
        let inner_component = Processor::anonymous("sub/processors/3").into_ref();
        let inner = MessagingException::builder(event())
            .kind(crate::exception::ExceptionKind::FlowExecution)
            .cause(Failure::plain("Mystery", "deep"))
            .failing_component(Some(inner_component))
            .build();
        let outer = MessagingException::new(event(), inner.clone());
        let resolver = MessagingExceptionResolver::for_component(Processor::anonymous("main/processors/0").into_ref());

        let resolved = resolver.resolve(&outer, &locator, &[]).unwrap();
        assert!(resolved.same_as(&inner));
        assert_eq!(resolved.info_value(INFO_LOCATION_KEY), Some(json!("sub/processors/3")));
        assert_eq!(resolved.error().unwrap().cause().kind(), "Mystery");
    }

    #[test]
    fn logged_flag_is_sticky() {
        let (_, locator) = setup();
        let ex = MessagingException::new(event(), Failure::plain(kinds::CONNECTION, "refused"));
        ex.mark_logged();
        let resolved = MessagingExceptionResolver::default()
            .resolve(&ex, &locator, &[])
            .unwrap();
        assert!(!resolved.same_as(&ex));
        assert!(resolved.is_already_logged());
    }

    #[test]
    fn enrichment_never_overwrites() {
        let (_, locator) = setup();
        let ex = MessagingException::new(event(), Failure::plain(kinds::CONNECTION, "refused"));
        ex.add_info("K", json!("original"));
        let providers: Vec<Arc<dyn ExceptionContextProvider>> =
            vec![Arc::new(OverwritingProvider), Arc::new(EventContextProvider)];

        let resolved = MessagingExceptionResolver::default()
            .resolve(&ex, &locator, &providers)
            .unwrap();
        assert_eq!(resolved.info_value("K"), Some(json!("original")));
        assert_eq!(resolved.info_value("extra"), Some(json!(true)));
        assert_eq!(resolved.info_value("Event"), Some(json!("ev-1")));
    }

    #[test]
    fn failing_provider_aborts() {
        let (_, locator) = setup();
        let ex = MessagingException::new(event(), Failure::plain(kinds::CONNECTION, "refused"));
        let providers: Vec<Arc<dyn ExceptionContextProvider>> = vec![Arc::new(FailingProvider)];
        let err = MessagingExceptionResolver::default()
            .resolve(&ex, &locator, &providers)
            .unwrap_err();
        assert!(err.to_string().contains("misconfigured"));
    }
}
