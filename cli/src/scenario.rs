//! Failure scenarios: a JSON description of a cause chain, the component
//! that raised it and the registry/locator setup, resolved end to end.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use flowerrors_core::{
    ComponentIdentifier, ComponentRef, ErrorMappingConfig, ErrorTypeDefinition,
    ErrorTypeRepository, Event, EventContextProvider, ExceptionContextProvider, LocatorMapping,
    MemoryErrorTypeLocator, MessagingException, MessagingExceptionResolver, PlainFailure,
    Processor,
};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub error_types: Vec<ErrorTypeDefinition>,
    #[serde(default)]
    pub locator: Vec<LocatorMapping>,
    #[serde(default)]
    pub component: Option<ScenarioComponent>,
    /// Outermost first.
    pub chain: Vec<ChainLink>,
    #[serde(default)]
    pub expected_error_type: Option<String>,
    #[serde(default)]
    pub expected_cause_kind: Option<String>,
    #[serde(default)]
    pub expected_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioComponent {
    pub identifier: String,
    pub location: String,
    #[serde(default)]
    pub error_mappings: Vec<ErrorMappingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// What resolving a scenario produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub error_type: String,
    pub description: String,
    pub detailed_description: String,
    pub cause_kind: String,
    pub exception: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub info: serde_json::Map<String, serde_json::Value>,
    /// Empty when every expectation in the scenario held.
    pub mismatches: Vec<String>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn repository(&self) -> Result<ErrorTypeRepository> {
        let repo = ErrorTypeRepository::new();
        for def in &self.error_types {
            repo.register_definition(def)
                .with_context(|| format!("registering {}:{}", def.namespace, def.identifier))?;
        }
        Ok(repo)
    }

    fn component(&self, repo: &ErrorTypeRepository) -> Result<Option<ComponentRef>> {
        let Some(c) = &self.component else {
            return Ok(None);
        };
        let mut mappings = Vec::with_capacity(c.error_mappings.len());
        for m in &c.error_mappings {
            mappings.push(
                m.build(repo)
                    .with_context(|| format!("error mapping {} -> {}", m.source, m.target))?,
            );
        }
        let processor = Processor::new(ComponentIdentifier::parse(&c.identifier), &c.location)
            .with_error_mappings(mappings);
        Ok(Some(processor.into_ref()))
    }

    fn chain(&self, repo: &ErrorTypeRepository) -> Result<PlainFailure> {
        let mut current: Option<PlainFailure> = None;
        for link in self.chain.iter().rev() {
            let failure = match &link.error_type {
                Some(t) => PlainFailure::typed(&link.kind, &link.message, repo.resolve(t)?),
                None => PlainFailure::new(&link.kind, &link.message),
            };
            current = Some(match current {
                Some(cause) => failure.with_cause(cause),
                None => failure,
            });
        }
        match current {
            Some(chain) => Ok(chain),
            None => bail!("scenario chain is empty"),
        }
    }

    /// Build everything the scenario describes and resolve it.
    pub fn run(&self) -> Result<Resolution> {
        let repo = self.repository()?;
        let locator = MemoryErrorTypeLocator::new(&repo);
        for mapping in &self.locator {
            locator.add_mapping(mapping, &repo)?;
        }
        let component = self.component(&repo)?;
        let exception = MessagingException::new(
            Event::new("scenario", serde_json::json!({ "description": self.description })),
            self.chain(&repo)?,
        );
        tracing::debug!(links = self.chain.len(), "resolving scenario");

        let providers: Vec<Arc<dyn ExceptionContextProvider>> =
            vec![Arc::new(EventContextProvider)];
        let resolved = MessagingExceptionResolver::new(component)
            .resolve(&exception, &locator, &providers)?;
        let Some(error) = resolved.error() else {
            bail!("resolution attached no error");
        };

        let mut resolution = Resolution {
            error_type: error.error_type().to_string(),
            description: error.description().to_string(),
            detailed_description: error.detailed_description().to_string(),
            cause_kind: error.cause().kind().to_string(),
            exception: resolved.kind().name().to_string(),
            location: resolved
                .failing_component()
                .map(|c| c.location().to_string()),
            info: resolved.info().into_iter().collect(),
            mismatches: Vec::new(),
        };
        resolution.mismatches = self.mismatches(&resolution);
        Ok(resolution)
    }

    fn mismatches(&self, r: &Resolution) -> Vec<String> {
        let checks = [
            ("error type", &self.expected_error_type, &r.error_type),
            ("cause kind", &self.expected_cause_kind, &r.cause_kind),
            ("description", &self.expected_description, &r.description),
        ];
        checks
            .into_iter()
            .filter_map(|(what, expected, actual)| match expected {
                Some(e) if e != actual => Some(format!("{what}: expected {e}, got {actual}")),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> std::path::PathBuf {
        let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        p.push("../fixtures/scenarios");
        p.push(name);
        p
    }

    #[test]
    fn fixtures_resolve_as_expected() {
        for name in [
            "connectivity-wrapped.json",
            "family-pivot.json",
            "critical-only.json",
            "all-unknown.json",
            "mapped-http.json",
            "typed-failure.json",
        ] {
            let resolution = Scenario::load(&fixture(name)).unwrap().run().unwrap();
            assert!(resolution.mismatches.is_empty(), "{name}: {:?}", resolution.mismatches);
        }
    }

    #[test]
    fn empty_chain_rejected() {
        let scenario: Scenario = serde_json::from_str(r#"{"chain": []}"#).unwrap();
        assert!(scenario.run().is_err());
    }

    #[test]
    fn mismatch_reported() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "chain": [{"kind": "ConnectionException", "message": "down"}],
                "expectedErrorType": "MULE:TIMEOUT"
            }"#,
        )
        .unwrap();
        let resolution = scenario.run().unwrap();
        assert_eq!(resolution.error_type, "MULE:CONNECTIVITY");
        assert_eq!(resolution.mismatches.len(), 1);
    }
}
