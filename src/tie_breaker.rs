//! Single-candidate selection.
//!
//! When a scalar request matches several providers, the tie-breaker applies
//! a fixed precedence and stops at the first decisive rule:
//!
//! 1. explicit qualifier hint matched by exactly one candidate
//! 2. exactly one locally defined primary
//! 3. single lowest priority value
//! 4. declared field/parameter name equal to a candidate name or alias
//!
//! Two local primaries, or two candidates sharing the lowest priority, are
//! hard errors rather than undecided outcomes.

use crate::error::{DiError, DiResult};
use crate::finder::{satisfies_qualifiers, CandidateSet};
use crate::injection::InjectionPoint;
use crate::qualifier::Qualifiers;
use crate::types::TypeRef;

/// Outcome of single-candidate selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TieBreak {
    /// Index of the chosen candidate within the set
    Selected(usize),
    /// No rule decided; carries every candidate name
    Ambiguous(Vec<String>),
    /// Nothing to select
    Absent,
}

/// What the request itself contributes to tie-breaking.
#[derive(Debug, Clone, Copy)]
pub struct SelectionHint<'a> {
    pub requested: &'a TypeRef,
    pub qualifiers: &'a Qualifiers,
    pub declared_name: Option<&'a str>,
    pub required: bool,
}

/// The tie-breaking policy.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{CandidateFinder, InjectionPoint, Provider, ProviderCatalog, TieBreak, TieBreaker, TypeRef};
///
/// let catalog = ProviderCatalog::new();
/// catalog.register(Provider::new("p1", TypeRef::named("Foo")).priority(5)).unwrap();
/// catalog.register(Provider::new("p2", TypeRef::named("Foo")).priority(1)).unwrap();
///
/// let point = InjectionPoint::new("Svc", 0, TypeRef::named("Foo"));
/// let candidates = CandidateFinder::new(&catalog).find(&point, point.declared_type(), false);
/// let chosen = TieBreaker::resolve_single(&candidates, &TieBreaker::hint(&point)).unwrap();
/// assert_eq!(chosen, TieBreak::Selected(1));
/// ```
pub struct TieBreaker;

impl TieBreaker {
    /// Builds the hint for an injection point.
    pub fn hint(point: &InjectionPoint) -> SelectionHint<'_> {
        SelectionHint {
            requested: point.declared_type(),
            qualifiers: point.qualifiers(),
            declared_name: point.declared_name(),
            required: point.is_required(),
        }
    }

    /// Selects at most one candidate.
    pub fn resolve_single(candidates: &CandidateSet, hint: &SelectionHint<'_>) -> DiResult<TieBreak> {
        match candidates.len() {
            0 => return Ok(TieBreak::Absent),
            1 => return Ok(TieBreak::Selected(0)),
            _ => {}
        }

        if let Some(index) = Self::by_qualifier(candidates, hint.qualifiers) {
            return Ok(TieBreak::Selected(index));
        }
        if let Some(index) = Self::by_primary(candidates, hint.requested)? {
            return Ok(TieBreak::Selected(index));
        }
        if let Some(index) = Self::by_priority(candidates, hint.requested)? {
            return Ok(TieBreak::Selected(index));
        }
        if let Some(index) = hint.declared_name.and_then(|name| Self::by_name(candidates, name)) {
            return Ok(TieBreak::Selected(index));
        }

        if hint.required {
            Ok(TieBreak::Ambiguous(candidates.names()))
        } else {
            Ok(TieBreak::Absent)
        }
    }

    /// Candidates explicitly carrying every requested tag (or named after it).
    fn by_qualifier(candidates: &CandidateSet, qualifiers: &Qualifiers) -> Option<usize> {
        if qualifiers.is_empty() {
            return None;
        }
        unique(
            candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| satisfies_qualifiers(c.provider(), qualifiers)),
        )
    }

    /// A local primary wins over inherited ones; two local primaries conflict.
    fn by_primary(candidates: &CandidateSet, requested: &TypeRef) -> DiResult<Option<usize>> {
        let primaries: Vec<(usize, bool)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.provider().is_primary())
            .map(|(i, c)| (i, c.is_local()))
            .collect();

        let local: Vec<usize> = primaries.iter().filter(|(_, local)| *local).map(|(i, _)| *i).collect();
        let pool = if local.is_empty() {
            primaries.iter().map(|(i, _)| *i).collect()
        } else {
            local
        };

        match pool.len() {
            0 => Ok(None),
            1 => Ok(Some(pool[0])),
            _ => Err(DiError::AmbiguousPrimary {
                requested: requested.clone(),
                candidates: names_at(candidates, &pool),
            }),
        }
    }

    /// Lowest priority value wins; unprioritized candidates do not compete.
    fn by_priority(candidates: &CandidateSet, requested: &TypeRef) -> DiResult<Option<usize>> {
        let lowest = match candidates.iter().filter_map(|c| c.provider().priority_value()).min() {
            Some(lowest) => lowest,
            None => return Ok(None),
        };
        let winners: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.provider().priority_value() == Some(lowest))
            .map(|(i, _)| i)
            .collect();

        if winners.len() == 1 {
            Ok(Some(winners[0]))
        } else {
            Err(DiError::DuplicatePriority {
                requested: requested.clone(),
                priority: lowest,
                candidates: names_at(candidates, &winners),
            })
        }
    }

    fn by_name(candidates: &CandidateSet, name: &str) -> Option<usize> {
        candidates.iter().position(|c| c.provider().answers_to(name))
    }
}

fn unique<T>(mut matches: impl Iterator<Item = (usize, T)>) -> Option<usize> {
    let (first, _) = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

fn names_at(candidates: &CandidateSet, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .filter_map(|&i| candidates.get(i))
        .map(|c| c.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Provider, ProviderCatalog};
    use crate::finder::CandidateFinder;
    use std::sync::Arc;

    fn select(catalog: &ProviderCatalog, point: &InjectionPoint) -> DiResult<Option<String>> {
        let candidates = CandidateFinder::new(catalog).find(point, point.declared_type(), false);
        Ok(match TieBreaker::resolve_single(&candidates, &TieBreaker::hint(point))? {
            TieBreak::Selected(i) => Some(candidates.get(i).unwrap().name().to_string()),
            TieBreak::Ambiguous(_) | TieBreak::Absent => None,
        })
    }

    fn foo() -> TypeRef {
        TypeRef::named("Foo")
    }

    #[test]
    fn test_qualifier_hint_matches_tag_or_alias() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("p1", foo()).alias("replica").primary()).unwrap();
        catalog.register(Provider::new("p2", foo()).qualifier("fast")).unwrap();
        let plain = InjectionPoint::new("Svc", 0, foo());
        let candidates = CandidateFinder::new(&catalog).find(&plain, plain.declared_type(), false);

        let by_alias = InjectionPoint::new("Svc", 0, foo()).qualifier("replica");
        let by_tag = InjectionPoint::new("Svc", 0, foo()).qualifier("fast");
        let chosen = |point: &InjectionPoint| match TieBreaker::resolve_single(&candidates, &TieBreaker::hint(point)) {
            Ok(TieBreak::Selected(i)) => Some(candidates.get(i).unwrap().name().to_string()),
            _ => None,
        };
        assert_eq!(chosen(&by_alias).as_deref(), Some("p1"));
        assert_eq!(chosen(&by_tag).as_deref(), Some("p2"));
    }

    #[test]
    fn test_primary_beats_priority_and_name() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("p1", foo()).priority(0)).unwrap();
        catalog.register(Provider::new("p2", foo()).primary().priority(9)).unwrap();

        let point = InjectionPoint::new("Svc", 0, foo()).named("p1");
        assert_eq!(select(&catalog, &point).unwrap().as_deref(), Some("p2"));
    }

    #[test]
    fn test_two_local_primaries_fail() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("p1", foo()).primary()).unwrap();
        catalog.register(Provider::new("p2", foo()).primary()).unwrap();

        let err = select(&catalog, &InjectionPoint::new("Svc", 0, foo())).unwrap_err();
        assert!(matches!(err, DiError::AmbiguousPrimary { .. }));
        assert_eq!(err.candidates(), ["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn test_local_primary_beats_inherited_primary() {
        let parent = Arc::new(ProviderCatalog::new());
        parent.register(Provider::new("remote", foo()).primary()).unwrap();
        let child = ProviderCatalog::with_parent(parent);
        child.register(Provider::new("local", foo()).primary()).unwrap();

        let point = InjectionPoint::new("Svc", 0, foo());
        assert_eq!(select(&child, &point).unwrap().as_deref(), Some("local"));
    }

    #[test]
    fn test_unprioritized_candidates_do_not_compete() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("plain", foo())).unwrap();
        catalog.register(Provider::new("ranked", foo()).priority(7)).unwrap();

        let point = InjectionPoint::new("Svc", 0, foo());
        assert_eq!(select(&catalog, &point).unwrap().as_deref(), Some("ranked"));
    }

    #[test]
    fn test_undecided_outcome_depends_on_required() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("p1", foo())).unwrap();
        catalog.register(Provider::new("p2", foo())).unwrap();

        let required = InjectionPoint::new("Svc", 0, foo());
        let candidates = CandidateFinder::new(&catalog).find(&required, &foo(), false);
        assert_eq!(
            TieBreaker::resolve_single(&candidates, &TieBreaker::hint(&required)).unwrap(),
            TieBreak::Ambiguous(vec!["p1".into(), "p2".into()])
        );

        let optional = required.clone().optional();
        assert_eq!(
            TieBreaker::resolve_single(&candidates, &TieBreaker::hint(&optional)).unwrap(),
            TieBreak::Absent
        );
    }

    #[test]
    fn test_alias_fallback_name_match() {
        let catalog = ProviderCatalog::new();
        catalog.register(Provider::new("p1", foo())).unwrap();
        catalog.register(Provider::new("p2", foo()).alias("legacyFoo")).unwrap();

        let point = InjectionPoint::new("Svc", 0, foo()).named("legacyFoo");
        assert_eq!(select(&catalog, &point).unwrap().as_deref(), Some("p2"));
    }
}
