//! flowerrors-core: error classification and root-cause resolution for
//! integration flows.
//!
//! # Overview
//!
//! Every router and processor in a flow hands its failures to this crate to
//! turn them into typed, routable errors. The crate defines:
//!
//! - [`ErrorType`] / [`ErrorTypeRepository`]: the namespaced error hierarchy
//! - [`ErrorTypeMatcher`] / [`ErrorMapping`]: handler and mapping predicates
//! - [`Failure`] / [`MessagingException`]: cause chains and the exception
//!   that carries the in-flight [`Event`]
//! - [`ErrorTypeLocator`]: classifies raw failures
//! - [`root_cause`]: picks the failure that best represents a chain
//! - [`MessagingExceptionResolver`]: attaches a typed [`Error`] to the event
//!   and enriches the exception through [`ExceptionContextProvider`]s

pub mod component;
pub mod context;
pub mod error;
pub mod event;
pub mod exception;
pub mod failure;
pub mod locator;
pub mod logging;
pub mod mapping;
pub mod matcher;
pub mod repository;
pub mod resolver;
pub mod root_cause;
pub mod types;

pub use component::{Component, ComponentIdentifier, ComponentRef, HasErrorMappings, Processor};
pub use context::{ContextProviderError, EventContextProvider, ExceptionContextProvider};
pub use error::{Error, ErrorBuilder};
pub use event::{Event, Message};
pub use exception::{
    ExceptionKind, MessagingException, INFO_ALREADY_LOGGED_KEY, INFO_LOCATION_KEY,
};
pub use failure::{cause_chain, kinds, Failure, PlainFailure};
pub use locator::{ErrorTypeLocator, LocatorMapping, MemoryErrorTypeLocator};
pub use logging::log_once;
pub use mapping::{apply_mappings, ErrorMapping, ErrorMappingConfig};
pub use matcher::ErrorTypeMatcher;
pub use repository::{ErrorTypeDefinition, ErrorTypeRepository, RepositoryError};
pub use resolver::{MessagingExceptionResolver, ResolveError};
pub use root_cause::{find_root, RootCause};
pub use types::{CoreErrorType, ErrorType, CORE_NAMESPACE};
