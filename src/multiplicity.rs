//! Collection-shaped requests.
//!
//! A request whose type is an array, list, set, string-keyed map or stream
//! asks for *every* matching provider instead of one. No tie-breaking is
//! involved; an empty result is a valid, empty collection.

use std::cmp::Ordering;

use crate::catalog::{Instance, Provider};
use crate::finder::{Candidate, CandidateFinder, MatchPass};
use crate::injection::InjectionPoint;
use crate::resolution::Resolved;
use crate::types::TypeRef;

/// Shape of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Multiplicity {
    Scalar,
    Array(TypeRef),
    List(TypeRef),
    Set(TypeRef),
    /// String-keyed map; the element is the value type
    Map(TypeRef),
    Stream(TypeRef),
}

impl Multiplicity {
    /// Classifies a requested type.
    ///
    /// A map whose key is not string-like is not a multiplicity request and
    /// classifies as [`Multiplicity::Scalar`].
    ///
    /// ```rust
    /// use ferrous_autowire::{Multiplicity, TypeRef};
    ///
    /// let ty: TypeRef = "Map<String, Handler>".parse().unwrap();
    /// assert_eq!(Multiplicity::classify(&ty), Multiplicity::Map(TypeRef::named("Handler")));
    ///
    /// let ty: TypeRef = "Map<u64, Handler>".parse().unwrap();
    /// assert_eq!(Multiplicity::classify(&ty), Multiplicity::Scalar);
    /// ```
    pub fn classify(requested: &TypeRef) -> Self {
        match requested {
            TypeRef::Array(e) => Multiplicity::Array((**e).clone()),
            TypeRef::List(e) => Multiplicity::List((**e).clone()),
            TypeRef::Set(e) => Multiplicity::Set((**e).clone()),
            TypeRef::Map(k, v) if k.is_string_like() => Multiplicity::Map((**v).clone()),
            TypeRef::Stream(e) => Multiplicity::Stream((**e).clone()),
            _ => Multiplicity::Scalar,
        }
    }

    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            Multiplicity::Scalar => None,
            Multiplicity::Array(e)
            | Multiplicity::List(e)
            | Multiplicity::Set(e)
            | Multiplicity::Map(e)
            | Multiplicity::Stream(e) => Some(e),
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        !matches!(self, Multiplicity::Scalar)
    }

    /// Whether a configured comparator applies to this shape.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Multiplicity::Array(_) | Multiplicity::List(_) | Multiplicity::Stream(_))
    }
}

/// Orders collection elements.
pub trait DependencyComparator: Send + Sync {
    fn compare(&self, a: &Provider, b: &Provider) -> Ordering;
}

/// Lowest priority first, unprioritized providers last.
///
/// Sorting is stable, so equal priorities keep registration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityComparator;

impl DependencyComparator for PriorityComparator {
    fn compare(&self, a: &Provider, b: &Provider) -> Ordering {
        match (a.priority_value(), b.priority_value()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Gathers and shapes all candidates for a collection request.
pub struct MultiplicityResolver<'a> {
    finder: CandidateFinder<'a>,
    comparator: Option<&'a dyn DependencyComparator>,
}

impl<'a> MultiplicityResolver<'a> {
    pub fn new(finder: CandidateFinder<'a>, comparator: Option<&'a dyn DependencyComparator>) -> Self {
        Self { finder, comparator }
    }

    /// All element candidates and the pass that found them, sorted when the
    /// shape is ordered and a comparator is configured.
    pub fn candidates(&self, point: &InjectionPoint, kind: &Multiplicity) -> (Vec<Candidate>, MatchPass) {
        let element = match kind.element() {
            Some(element) => element,
            None => return (Vec::new(), MatchPass::Strict),
        };
        let found = self.finder.find(point, element, true);
        let pass = found.pass();
        let mut candidates = found.into_vec();
        if kind.is_ordered() {
            if let Some(comparator) = self.comparator {
                sort_candidates(&mut candidates, comparator);
            }
        }
        (candidates, pass)
    }

    /// Builds the collection value from materialized candidates.
    ///
    /// Sets drop repeated instances (by identity); maps are keyed by
    /// provider name in candidate order.
    pub fn assemble(kind: &Multiplicity, items: Vec<(String, Instance)>) -> Option<Resolved> {
        let resolved = match kind {
            Multiplicity::Array(_) => Resolved::Array(items.into_iter().map(|(_, i)| i).collect()),
            Multiplicity::List(_) => Resolved::List(items.into_iter().map(|(_, i)| i).collect()),
            Multiplicity::Set(_) => {
                let mut unique: Vec<Instance> = Vec::with_capacity(items.len());
                for (_, instance) in items {
                    if !unique.iter().any(|seen| seen.ptr_eq(&instance)) {
                        unique.push(instance);
                    }
                }
                Resolved::Set(unique)
            }
            Multiplicity::Map(_) => Resolved::Map(items),
            Multiplicity::Scalar | Multiplicity::Stream(_) => return None,
        };
        Some(resolved)
    }
}

pub(crate) fn sort_candidates(candidates: &mut [Candidate], comparator: &dyn DependencyComparator) {
    candidates.sort_by(|a, b| comparator.compare(a.provider(), b.provider()));
}
