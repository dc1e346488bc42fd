//! Predicates over [`ErrorType`]s, as used by error handlers and mappings.

use crate::repository::{ErrorTypeRepository, RepositoryError};
use crate::types::{CoreErrorType, ErrorType, CORE_NAMESPACE};

const WILDCARD: &str = "*";

/// Decides whether an error type is selected by a handler or mapping.
#[derive(Debug, Clone)]
pub enum ErrorTypeMatcher {
    /// Every type descending from `MULE:ANY`. Critical types never match.
    Any,
    /// The given type or any of its descendants.
    Single(ErrorType),
    /// `NS:*`, `*:ID` or `*:*`; `None` stands for the wildcard side.
    /// Checked against the type and its ancestors, never against critical types.
    Wildcard {
        namespace: Option<String>,
        identifier: Option<String>,
    },
    /// Matches when any of the inner matchers does.
    Disjunctive(Vec<ErrorTypeMatcher>),
}

impl ErrorTypeMatcher {
    pub fn matches(&self, error_type: &ErrorType) -> bool {
        match self {
            Self::Any => error_type.matches(&CoreErrorType::Any.error_type()),
            Self::Single(target) => error_type.matches(target),
            Self::Wildcard {
                namespace,
                identifier,
            } => {
                !error_type.is_critical()
                    && error_type.lineage().any(|t| {
                        namespace.as_deref().map_or(true, |ns| ns == t.namespace())
                            && identifier.as_deref().map_or(true, |id| id == t.identifier())
                    })
            }
            Self::Disjunctive(matchers) => matchers.iter().any(|m| m.matches(error_type)),
        }
    }

    /// Parse the textual form used in configuration: `ANY`, `HTTP:NOT_FOUND`,
    /// `HTTP:*`, `*:TIMEOUT`, or a comma-separated list of those.
    pub fn parse(expr: &str, repo: &ErrorTypeRepository) -> Result<Self, RepositoryError> {
        let mut matchers = expr
            .split(',')
            .map(str::trim)
            .map(|part| Self::parse_one(part, repo))
            .collect::<Result<Vec<_>, _>>()?;
        if matchers.len() == 1 {
            Ok(matchers.remove(0))
        } else {
            Ok(Self::Disjunctive(matchers))
        }
    }

    fn parse_one(part: &str, repo: &ErrorTypeRepository) -> Result<Self, RepositoryError> {
        if part.is_empty() {
            return Err(RepositoryError::InvalidReference(part.to_string()));
        }
        let (namespace, identifier) = match part.split_once(':') {
            Some((ns, id)) => (ns.trim().to_uppercase(), id.trim().to_uppercase()),
            None => (CORE_NAMESPACE.to_string(), part.to_uppercase()),
        };
        if namespace == CORE_NAMESPACE && identifier == CoreErrorType::Any.identifier() {
            return Ok(Self::Any);
        }
        if namespace == WILDCARD || identifier == WILDCARD {
            return Ok(Self::Wildcard {
                namespace: (namespace != WILDCARD).then_some(namespace),
                identifier: (identifier != WILDCARD).then_some(identifier),
            });
        }
        repo.resolve(part).map(Self::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> ErrorTypeRepository {
        let repo = ErrorTypeRepository::new();
        repo.load_json(
            r#"[
                {"namespace": "HTTP", "identifier": "CONNECTIVITY", "parent": "CONNECTIVITY"},
                {"namespace": "HTTP", "identifier": "NOT_FOUND"}
            ]"#,
        )
        .unwrap();
        repo
    }

    #[test]
    fn any_skips_critical() {
        let repo = repo();
        let any = ErrorTypeMatcher::parse("ANY", &repo).unwrap();
        assert!(any.matches(&repo.resolve("HTTP:NOT_FOUND").unwrap()));
        assert!(!any.matches(&repo.core(CoreErrorType::Critical)));
        assert!(!any.matches(&repo.core(CoreErrorType::Overload)));
    }

    #[test]
    fn single_matches_descendants() {
        let repo = repo();
        let m = ErrorTypeMatcher::parse("MULE:CONNECTIVITY", &repo).unwrap();
        assert!(m.matches(&repo.resolve("HTTP:CONNECTIVITY").unwrap()));
        assert!(!m.matches(&repo.resolve("HTTP:NOT_FOUND").unwrap()));
    }

    #[test]
    fn namespace_wildcard() {
        let repo = repo();
        let m = ErrorTypeMatcher::parse("HTTP:*", &repo).unwrap();
        assert!(m.matches(&repo.resolve("HTTP:NOT_FOUND").unwrap()));
        assert!(!m.matches(&repo.core(CoreErrorType::Timeout)));
    }

    #[test]
    fn identifier_wildcard_checks_ancestors() {
        let repo = repo();
        let m = ErrorTypeMatcher::parse("*:CONNECTIVITY", &repo).unwrap();
        assert!(m.matches(&repo.resolve("HTTP:CONNECTIVITY").unwrap()));
        assert!(m.matches(&repo.core(CoreErrorType::Connectivity)));
        assert!(!m.matches(&repo.core(CoreErrorType::Security)));
    }

    #[test]
    fn full_wildcard_still_excludes_critical() {
        let repo = repo();
        let m = ErrorTypeMatcher::parse("*:*", &repo).unwrap();
        assert!(m.matches(&repo.core(CoreErrorType::Unknown)));
        assert!(!m.matches(&repo.core(CoreErrorType::Critical)));
    }

    #[test]
    fn disjunction() {
        let repo = repo();
        let m = ErrorTypeMatcher::parse("TIMEOUT, HTTP:NOT_FOUND", &repo).unwrap();
        assert!(matches!(m, ErrorTypeMatcher::Disjunctive(ref v) if v.len() == 2));
        assert!(m.matches(&repo.core(CoreErrorType::Timeout)));
        assert!(m.matches(&repo.resolve("HTTP:NOT_FOUND").unwrap()));
        assert!(!m.matches(&repo.core(CoreErrorType::Expression)));
    }

    #[test]
    fn unknown_reference_fails() {
        let repo = repo();
        assert!(ErrorTypeMatcher::parse("HTTP:GONE", &repo).is_err());
        assert!(ErrorTypeMatcher::parse("TIMEOUT,", &repo).is_err());
    }
}
