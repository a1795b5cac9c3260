//! Candidate discovery.
//!
//! The finder turns a requested type into an ordered [`CandidateSet`] by
//! querying the catalog in up to three passes:
//!
//! 1. **Strict**: declared type assignable to the request, all qualifiers
//!    satisfied, the owner itself excluded (unless the point allows it).
//! 2. **Relaxed**: only when the strict pass found nothing. Qualifiers and
//!    generic arguments are ignored; the raw type must still match.
//! 3. **Self reference**: scalar requests only. The owner may satisfy its
//!    own dependency as a last resort.
//!
//! Candidates keep catalog order (local definitions, manual instances,
//! inherited entries). Sorting, if any, happens later.

use std::sync::Arc;

use crate::catalog::{CatalogEntry, Instance, Provider, ProviderCatalog};
use crate::injection::InjectionPoint;
use crate::qualifier::Qualifiers;
use crate::types::TypeRef;

/// Which finder pass produced a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPass {
    Strict,
    Relaxed,
    SelfReference,
}

/// A candidate's value: an existing instance, or the type it will be
/// materialized as once selected.
#[derive(Debug, Clone)]
pub enum CandidateValue {
    Instance(Instance),
    Pending(TypeRef),
}

/// A provider that matched a request.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: CatalogEntry,
    pub value: CandidateValue,
}

impl Candidate {
    fn new(entry: CatalogEntry) -> Self {
        let value = match entry.provider.materialized() {
            Some(instance) => CandidateValue::Instance(instance.clone()),
            None => CandidateValue::Pending(entry.provider.declared_type().clone()),
        };
        Self { entry, value }
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn provider(&self) -> &Arc<Provider> {
        &self.entry.provider
    }

    pub fn is_local(&self) -> bool {
        self.entry.is_local()
    }
}

/// Insertion-ordered candidates for one resolution pass.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    pass: MatchPass,
}

impl CandidateSet {
    pub fn empty() -> Self {
        Self { candidates: Vec::new(), pass: MatchPass::Strict }
    }

    pub fn pass(&self) -> MatchPass {
        self.pass
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// True if `provider` satisfies every requested qualifier, either by tag
/// or by name/alias.
pub fn satisfies_qualifiers(provider: &Provider, qualifiers: &Qualifiers) -> bool {
    qualifiers
        .iter()
        .all(|q| provider.qualifiers().contains(q.as_str()) || provider.answers_to(q.as_str()))
}

/// Candidate discovery over a catalog.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{CandidateFinder, InjectionPoint, MatchPass, Provider, ProviderCatalog, TypeRef};
///
/// let catalog = ProviderCatalog::new();
/// catalog.register(Provider::new("fast", TypeRef::named("Cache")).qualifier("fast")).unwrap();
/// catalog.register(Provider::new("slow", TypeRef::named("Cache"))).unwrap();
///
/// let finder = CandidateFinder::new(&catalog);
/// let point = InjectionPoint::new("Svc", 0, TypeRef::named("Cache")).qualifier("fast");
/// let found = finder.find(&point, point.declared_type(), false);
/// assert_eq!(found.names(), vec!["fast"]);
/// assert_eq!(found.pass(), MatchPass::Strict);
/// ```
pub struct CandidateFinder<'a> {
    catalog: &'a ProviderCatalog,
    relaxed_fallback: bool,
    self_reference_fallback: bool,
}

impl<'a> CandidateFinder<'a> {
    pub fn new(catalog: &'a ProviderCatalog) -> Self {
        Self { catalog, relaxed_fallback: true, self_reference_fallback: true }
    }

    /// Enables or disables the relaxed pass, which drops the qualifier filter
    /// but keeps the full requested type.
    pub fn relaxed_fallback(mut self, enabled: bool) -> Self {
        self.relaxed_fallback = enabled;
        self
    }

    /// Enables or disables the final self-reference pass.
    pub fn self_reference_fallback(mut self, enabled: bool) -> Self {
        self.self_reference_fallback = enabled;
        self
    }

    /// Finds candidates for `requested` on behalf of `point`.
    ///
    /// `requested` is the point's declared type for scalar requests, or the
    /// element type for collection requests (`multi_valued = true`).
    pub fn find(&self, point: &InjectionPoint, requested: &TypeRef, multi_valued: bool) -> CandidateSet {
        let owner = point.owner();
        let qualifiers = point.qualifiers();
        let allow_self = point.allows_self_reference();

        let entries = self.catalog.lookup_by_type(requested);
        let strict: Vec<Candidate> = entries
            .iter()
            .filter(|e| e.provider.is_autowire_candidate())
            .filter(|e| allow_self || !e.provider.answers_to(owner))
            .filter(|e| satisfies_qualifiers(&e.provider, qualifiers))
            .cloned()
            .map(Candidate::new)
            .collect();
        if !strict.is_empty() {
            return CandidateSet { candidates: strict, pass: MatchPass::Strict };
        }

        let relax = self.relaxed_fallback && (!multi_valued || !qualifiers.is_empty());
        if relax {
            let relaxed: Vec<Candidate> = entries
                .iter()
                .filter(|e| e.provider.is_autowire_candidate())
                .filter(|e| !e.provider.answers_to(owner))
                .cloned()
                .map(Candidate::new)
                .collect();
            if !relaxed.is_empty() {
                return CandidateSet { candidates: relaxed, pass: MatchPass::Relaxed };
            }
        }

        if self.self_reference_fallback && !multi_valued && !allow_self {
            let own: Vec<Candidate> = entries
                .iter()
                .filter(|e| e.provider.is_autowire_candidate() && e.provider.answers_to(owner))
                .cloned()
                .map(Candidate::new)
                .collect();
            if !own.is_empty() {
                return CandidateSet { candidates: own, pass: MatchPass::SelfReference };
            }
        }

        CandidateSet::empty()
    }
}
