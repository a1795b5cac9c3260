//! Dry-run validation of injection points.
//!
//! [`ResolutionEngine::validate`](crate::ResolutionEngine::validate) runs
//! candidate discovery and tie-breaking for a set of points without
//! materializing anything, so configuration problems surface at startup
//! rather than on first use.
//!
//! # Validation Rules
//!
//! - **Unsatisfied**: Error - required scalar point with no candidate
//! - **Ambiguous**: Error - required scalar point that no rule disambiguates
//! - **Ambiguous primary / duplicate priority**: Error - always fatal
//! - **Relaxed match**: Warning - qualifiers or generics were ignored to find a candidate
//! - **Self reference**: Warning - the owner satisfies its own dependency
//! - **Optional ambiguity**: Warning - an optional point will resolve to nothing

use std::fmt;

use crate::error::DiError;
use crate::injection::InjectionKey;

/// Result of validating a set of injection points.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    /// Problems that will fail resolution
    pub errors: Vec<ValidationError>,
    /// Configurations that resolve, but probably not as intended
    pub warnings: Vec<ValidationWarning>,
    /// Number of points examined
    pub checked: usize,
}

/// A point that will fail to resolve.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub point: InjectionKey,
    pub error: DiError,
}

/// A point that resolves in a surprising way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Found only after ignoring qualifiers and generic arguments
    RelaxedMatch { point: InjectionKey, candidates: Vec<String> },
    /// Satisfied by its own owner
    SelfReference { point: InjectionKey, provider: String },
    /// Optional point with several undecidable candidates
    OptionalAmbiguity { point: InjectionKey, candidates: Vec<String> },
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub(crate) fn error(&mut self, point: &InjectionKey, error: DiError) {
        self.errors.push(ValidationError { point: point.clone(), error });
    }

    pub(crate) fn warn(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Converts the report into the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, DiError> {
        match self.errors.into_iter().next() {
            Some(first) => Err(first.error),
            None => Ok(self.warnings),
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "checked {} injection points: {} errors, {} warnings",
            self.checked,
            self.errors.len(),
            self.warnings.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  error   {}: {}", e.point, e.error)?;
        }
        for w in &self.warnings {
            match w {
                ValidationWarning::RelaxedMatch { point, candidates } => {
                    writeln!(f, "  warning {}: relaxed match [{}]", point, candidates.join(", "))?
                }
                ValidationWarning::SelfReference { point, provider } => {
                    writeln!(f, "  warning {}: resolved to its own owner '{}'", point, provider)?
                }
                ValidationWarning::OptionalAmbiguity { point, candidates } => {
                    writeln!(f, "  warning {}: optional and ambiguous [{}]", point, candidates.join(", "))?
                }
            }
        }
        Ok(())
    }
}
