//! Error types for the resolution engine.

use crate::qualifier::Qualifiers;
use crate::types::TypeRef;

/// Resolution and registration errors
///
/// Represents the error conditions that can occur while registering providers,
/// selecting candidates, or materializing the selected provider. Every
/// resolution error carries the requested type and the qualifiers that were
/// attempted so callers can report the failing injection point in full.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{DiError, TypeRef, Qualifiers};
///
/// let err = DiError::AmbiguousCandidate {
///     requested: TypeRef::named("Foo"),
///     qualifiers: Qualifiers::new(),
///     candidates: vec!["p1".to_string(), "p2".to_string()],
/// };
/// assert_eq!(
///     err.to_string(),
///     "Ambiguous dependency of type Foo: expected a single match but found 2: p1, p2"
/// );
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// A provider name (or alias) is already claimed
    #[error("Provider name already registered: {0}")]
    DuplicateName(String),

    /// More than one locally defined candidate is marked primary
    #[error("More than one primary provider of type {requested} found among candidates: {}", .candidates.join(", "))]
    AmbiguousPrimary {
        requested: TypeRef,
        candidates: Vec<String>,
    },

    /// Two candidates share the lowest priority value
    #[error("Multiple providers of type {requested} share the highest priority {priority}: {}", .candidates.join(", "))]
    DuplicatePriority {
        requested: TypeRef,
        priority: i32,
        candidates: Vec<String>,
    },

    /// Required dependency with no matching candidate
    #[error("Unsatisfied dependency of type {requested}{}: no matching provider found", qualifier_suffix(.qualifiers))]
    Unsatisfied {
        requested: TypeRef,
        qualifiers: Qualifiers,
    },

    /// Required dependency with several candidates and no decisive tie-break rule
    #[error("Ambiguous dependency of type {requested}{}: expected a single match but found {}: {}", qualifier_suffix(.qualifiers), .candidates.len(), .candidates.join(", "))]
    AmbiguousCandidate {
        requested: TypeRef,
        qualifiers: Qualifiers,
        candidates: Vec<String>,
    },

    /// Materialized instance does not satisfy the declared type
    #[error("Type mismatch for provider '{provider}': expected {expected}, materialized {actual}")]
    TypeMismatch {
        provider: String,
        expected: TypeRef,
        actual: TypeRef,
    },

    /// Named provider is not present in the catalog
    #[error("Provider not registered: {0}")]
    NotRegistered(String),

    /// Mutation attempted on a frozen catalog
    #[error("Catalog is frozen: cannot {0}")]
    CatalogFrozen(&'static str),

    /// Type descriptor could not be parsed
    #[error("Invalid type descriptor '{input}': {reason}")]
    InvalidType { input: String, reason: String },

    /// The materializer failed to produce an instance
    #[error("Failed to materialize provider '{provider}': {reason}")]
    Materialization { provider: String, reason: String },

    /// A required point failed during bulk resolution
    #[error("Resolution of {owner}#{position} failed: {source}")]
    Batch {
        owner: String,
        position: usize,
        #[source]
        source: Box<DiError>,
    },

    /// Engine configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

fn qualifier_suffix(qualifiers: &Qualifiers) -> String {
    if qualifiers.is_empty() {
        String::new()
    } else {
        format!(" qualified by [{}]", qualifiers)
    }
}

impl DiError {
    /// Returns the requested type for resolution errors.
    pub fn requested_type(&self) -> Option<&TypeRef> {
        match self {
            DiError::AmbiguousPrimary { requested, .. }
            | DiError::DuplicatePriority { requested, .. }
            | DiError::Unsatisfied { requested, .. }
            | DiError::AmbiguousCandidate { requested, .. } => Some(requested),
            DiError::TypeMismatch { expected, .. } => Some(expected),
            DiError::Batch { source, .. } => source.requested_type(),
            _ => None,
        }
    }

    /// Returns the candidate names attached to an ambiguity error.
    pub fn candidates(&self) -> &[String] {
        match self {
            DiError::AmbiguousPrimary { candidates, .. }
            | DiError::DuplicatePriority { candidates, .. }
            | DiError::AmbiguousCandidate { candidates, .. } => candidates,
            DiError::Batch { source, .. } => source.candidates(),
            _ => &[],
        }
    }

    /// True when several providers matched and none could be singled out,
    /// whichever tie-break rule gave up.
    pub fn is_non_unique(&self) -> bool {
        matches!(
            self,
            DiError::AmbiguousCandidate { .. } | DiError::AmbiguousPrimary { .. } | DiError::DuplicatePriority { .. }
        )
    }
}

/// Result type for resolution operations
///
/// A convenience alias for `Result<T, DiError>` used throughout the crate.
///
/// ```rust
/// use ferrous_autowire::{DiResult, DiError};
///
/// fn lookup(name: &str) -> DiResult<()> {
///     Err(DiError::NotRegistered(name.to_string()))
/// }
///
/// assert!(lookup("db").is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
