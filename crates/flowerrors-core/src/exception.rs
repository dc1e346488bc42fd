//! `MessagingException`: a failure together with the event it interrupted.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use crate::component::ComponentRef;
use crate::error::Error;
use crate::event::Event;
use crate::failure::Failure;

/// Info key of the sticky "already logged" flag.
pub const INFO_ALREADY_LOGGED_KEY: &str = "logged";
/// Info key holding the location of the failing component.
pub const INFO_LOCATION_KEY: &str = "Element";

/// Which boundary raised the exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Raised while a processor handled the event.
    Generic,
    /// Raised out of a whole flow execution.
    FlowExecution,
}

impl ExceptionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Generic => "MessagingException",
            Self::FlowExecution => "FlowExecutionException",
        }
    }
}

struct Inner {
    kind: ExceptionKind,
    message: String,
    cause: Option<Failure>,
    event: Event,
    processed_event: RwLock<Option<Event>>,
    failing_component: Option<ComponentRef>,
    info: Mutex<BTreeMap<String, Value>>,
}

/// A failure wrapped with the in-flight event, the failing component and a
/// diagnostic `info` map.
///
/// Clones are handles to the same exception: the processed event and the
/// info map are shared. Only the thread currently handling the exception
/// is expected to update them.
#[derive(Clone)]
pub struct MessagingException(Arc<Inner>);

impl MessagingException {
    /// Wrap `cause`, taking its message.
    pub fn new(event: Event, cause: impl Into<Failure>) -> Self {
        Self::builder(event).cause(cause).build()
    }

    /// Same as [`MessagingException::new`] for the flow boundary.
    pub fn flow_execution(event: Event, cause: impl Into<Failure>) -> Self {
        Self::builder(event)
            .kind(ExceptionKind::FlowExecution)
            .cause(cause)
            .build()
    }

    pub fn builder(event: Event) -> MessagingExceptionBuilder {
        MessagingExceptionBuilder {
            kind: ExceptionKind::Generic,
            message: None,
            cause: None,
            event,
            failing_component: None,
        }
    }

    pub fn kind(&self) -> ExceptionKind {
        self.0.kind
    }

    pub fn is_flow_execution(&self) -> bool {
        self.0.kind == ExceptionKind::FlowExecution
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn cause(&self) -> Option<&Failure> {
        self.0.cause.as_ref()
    }

    /// The event as it was when the exception was raised.
    pub fn original_event(&self) -> &Event {
        &self.0.event
    }

    /// The processed event if one was set, else the original event.
    pub fn event(&self) -> Event {
        self.0
            .processed_event
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| self.0.event.clone())
    }

    pub fn set_processed_event(&self, event: Event) {
        *self.0.processed_event.write().unwrap() = Some(event);
    }

    /// The error attached to [`MessagingException::event`], if resolved.
    pub fn error(&self) -> Option<Error> {
        self.event().error().cloned()
    }

    pub fn has_error(&self) -> bool {
        self.error().is_some()
    }

    pub fn failing_component(&self) -> Option<&ComponentRef> {
        self.0.failing_component.as_ref()
    }

    /// A snapshot of the info map.
    pub fn info(&self) -> BTreeMap<String, Value> {
        self.0.info.lock().unwrap().clone()
    }

    pub fn info_value(&self, key: &str) -> Option<Value> {
        self.0.info.lock().unwrap().get(key).cloned()
    }

    pub fn contains_info(&self, key: &str) -> bool {
        self.0.info.lock().unwrap().contains_key(key)
    }

    pub fn add_info(&self, key: impl Into<String>, value: Value) {
        self.0.info.lock().unwrap().insert(key.into(), value);
    }

    /// Insert only when `key` is not present yet. Returns `true` if inserted.
    pub fn add_info_if_absent(&self, key: impl Into<String>, value: Value) -> bool {
        let mut info = self.0.info.lock().unwrap();
        let key = key.into();
        if info.contains_key(&key) {
            return false;
        }
        info.insert(key, value);
        true
    }

    pub fn is_already_logged(&self) -> bool {
        matches!(
            self.info_value(INFO_ALREADY_LOGGED_KEY),
            Some(Value::Bool(true))
        )
    }

    pub fn mark_logged(&self) {
        self.add_info(INFO_ALREADY_LOGGED_KEY, Value::Bool(true));
    }

    /// `true` only for handles to the same exception.
    pub fn same_as(&self, other: &MessagingException) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Display for MessagingException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind().name(), self.message())
    }
}

impl fmt::Debug for MessagingException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingException")
            .field("kind", &self.kind())
            .field("message", &self.message())
            .field("cause", &self.cause())
            .field("error", &self.error())
            .field("info", &self.info())
            .finish()
    }
}

impl std::error::Error for MessagingException {}

/// Builder for [`MessagingException`].
pub struct MessagingExceptionBuilder {
    kind: ExceptionKind,
    message: Option<String>,
    cause: Option<Failure>,
    event: Event,
    failing_component: Option<ComponentRef>,
}

impl MessagingExceptionBuilder {
    pub fn kind(mut self, kind: ExceptionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn cause(mut self, cause: impl Into<Failure>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn failing_component(mut self, component: Option<ComponentRef>) -> Self {
        self.failing_component = component;
        self
    }

    pub fn build(self) -> MessagingException {
        let message = self
            .message
            .or_else(|| self.cause.as_ref().map(Failure::message))
            .unwrap_or_else(|| "Message processing failed".to_string());
        MessagingException(Arc::new(Inner {
            kind: self.kind,
            message,
            cause: self.cause,
            event: self.event,
            processed_event: RwLock::new(None),
            failing_component: self.failing_component,
            info: Mutex::new(BTreeMap::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::kinds;
    use serde_json::json;

    fn event() -> Event {
        Event::new("ev-1", json!("payload"))
    }

    #[test]
    fn message_taken_from_cause() {
        let ex = MessagingException::new(event(), Failure::plain(kinds::RUNTIME, "boom"));
        assert_eq!(ex.message(), "boom");
        assert_eq!(ex.to_string(), "MessagingException: boom");
        assert!(!ex.has_error());
    }

    #[test]
    fn processed_event_replaces_view_not_original() {
        let ex = MessagingException::flow_execution(event(), Failure::plain("X", "x"));
        let err = Error::builder(Failure::plain("X", "x")).build();
        ex.set_processed_event(ex.event().with_error(err.clone()));
        assert!(ex.error().unwrap().same_as(&err));
        assert!(ex.original_event().error().is_none());
        assert!(ex.is_flow_execution());
    }

    #[test]
    fn info_if_absent_keeps_first_value() {
        let ex = MessagingException::new(event(), Failure::plain("X", "x"));
        assert!(ex.add_info_if_absent("k", json!(1)));
        assert!(!ex.add_info_if_absent("k", json!(2)));
        assert_eq!(ex.info_value("k"), Some(json!(1)));
    }

    #[test]
    fn logged_flag_is_shared_by_clones() {
        let ex = MessagingException::new(event(), Failure::plain("X", "x"));
        let handle = ex.clone();
        assert!(!ex.is_already_logged());
        handle.mark_logged();
        assert!(ex.is_already_logged());
        assert!(ex.same_as(&handle));
    }
}
