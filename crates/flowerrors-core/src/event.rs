//! The event carried through a flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Error;

/// Payload plus attributes, as produced by a source or processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Value,
    #[serde(default)]
    pub attributes: Value,
}

impl Message {
    pub fn of(payload: Value) -> Self {
        Self {
            payload,
            attributes: Value::Null,
        }
    }
}

/// An in-flight event. Builders consume and return `Self`, so updating an
/// event always yields a new value and the original stays untouched.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    id: String,
    message: Message,
    variables: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl Event {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self::with_message(id, Message::of(payload))
    }

    pub fn with_message(id: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            message,
            variables: BTreeMap::new(),
            error: None,
        }
    }

    /// Correlation id, shared by every copy of the event.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn payload(&self) -> &Value {
        &self.message.payload
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.message.payload = payload;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn without_error(mut self) -> Self {
        self.error = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::Failure;
    use serde_json::json;

    #[test]
    fn with_error_leaves_original_untouched() {
        let original = Event::new("ev-1", json!({"order": 42}));
        let err = Error::builder(Failure::plain("X", "x")).build();
        let copy = original.clone().with_error(err.clone());
        assert!(original.error().is_none());
        assert!(copy.error().unwrap().same_as(&err));
        assert_eq!(copy.id(), "ev-1");
    }

    #[test]
    fn variables_and_payload() {
        let ev = Event::new("ev-2", json!("in"))
            .with_variable("attempt", json!(1))
            .with_payload(json!("out"));
        assert_eq!(ev.payload(), &json!("out"));
        assert_eq!(ev.variable("attempt"), Some(&json!(1)));
    }
}
