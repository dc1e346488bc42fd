//! Exception context providers: contribute diagnostic pairs to an
//! exception's `info` map during resolution.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::component::Component;
use crate::event::Event;

#[derive(Debug, Error)]
#[error("Context provider '{provider}' failed: {reason}")]
pub struct ContextProviderError {
    pub provider: String,
    pub reason: String,
}

/// Supplies extra diagnostic context for a failure.
///
/// Keys already present on the exception are never overwritten, so a
/// provider only fills gaps.
pub trait ExceptionContextProvider: Send + Sync {
    fn name(&self) -> &str;

    fn context_info(
        &self,
        event: &Event,
        component: Option<&dyn Component>,
    ) -> Result<BTreeMap<String, Value>, ContextProviderError>;
}

/// Adds the event id and the failing component kind.
#[derive(Debug, Default)]
pub struct EventContextProvider;

impl ExceptionContextProvider for EventContextProvider {
    fn name(&self) -> &str {
        "event"
    }

    fn context_info(
        &self,
        event: &Event,
        component: Option<&dyn Component>,
    ) -> Result<BTreeMap<String, Value>, ContextProviderError> {
        let mut info = BTreeMap::new();
        info.insert("Event".to_string(), Value::String(event.id().to_string()));
        if let Some(id) = component.and_then(|c| c.identifier()) {
            info.insert("Component".to_string(), Value::String(id.to_string()));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentIdentifier, Processor};
    use serde_json::json;

    #[test]
    fn event_provider_reports_id_and_component() {
        let ev = Event::new("ev-9", json!(null));
        let p = Processor::new(ComponentIdentifier::parse("db:select"), "f/1");
        let info = EventContextProvider.context_info(&ev, Some(&p)).unwrap();
        assert_eq!(info["Event"], json!("ev-9"));
        assert_eq!(info["Component"], json!("db:select"));
    }
}
