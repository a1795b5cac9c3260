//! The resolution engine.
//!
//! [`ResolutionEngine::resolve`] ties the pieces together:
//!
//! 1. deferred and optional wrappers return a [`DeferredHandle`] without
//!    resolving anything
//! 2. a valid cached shortcut goes straight to materialization
//! 3. collection shapes gather every candidate
//! 4. scalar requests run the finder and the tie-breaker, then cache the
//!    chosen provider as a shortcut
//! 5. the required/optional contract turns "nothing" into an error or
//!    [`Resolution::Absent`]
//!
//! Selection for a cacheable point happens under that point's stripe lock.
//! The materializer is always invoked after every engine lock is released.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheEntry, ResolutionCache, Shortcut};
use crate::catalog::{Instance, Provider, ProviderCatalog};
use crate::config::EngineConfig;
use crate::deferred::{DeferredHandle, LazyStream};
use crate::error::{DiError, DiResult};
use crate::finder::{CandidateFinder, CandidateSet, MatchPass};
use crate::injection::InjectionPoint;
use crate::multiplicity::{DependencyComparator, Multiplicity, MultiplicityResolver, PriorityComparator};
use crate::observer::{Observers, ResolutionObserver};
use crate::resolution::{BatchResolution, Resolution, Resolved};
use crate::tie_breaker::{TieBreak, TieBreaker};
use crate::types::TypeRef;
use crate::validation::{ValidationReport, ValidationWarning};

pub mod materializer;

pub use materializer::{FnMaterializer, InstanceMaterializer, MaterializeRequest, Materializer};

/// Outcome of candidate selection for a scalar point.
#[derive(Debug, Clone)]
enum Selection {
    Provider { provider: Arc<Provider>, expected: TypeRef },
    Absent,
}

struct EngineInner {
    catalog: Arc<ProviderCatalog>,
    cache: Arc<ResolutionCache>,
    materializer: Arc<dyn Materializer>,
    comparator: Option<Arc<dyn DependencyComparator>>,
    config: EngineConfig,
    observers: Observers,
}

/// Builder for [`ResolutionEngine`].
///
/// ```rust
/// use ferrous_autowire::{EngineBuilder, EngineConfig, MetricsObserver, ProviderCatalog};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let engine = EngineBuilder::new(Arc::new(ProviderCatalog::new()))
///     .config(EngineConfig { cache_shortcuts: false, ..EngineConfig::default() })
///     .observer(metrics.clone())
///     .build();
/// assert!(!engine.config().cache_shortcuts);
/// ```
pub struct EngineBuilder {
    catalog: Arc<ProviderCatalog>,
    materializer: Option<Arc<dyn Materializer>>,
    comparator: Option<Arc<dyn DependencyComparator>>,
    config: EngineConfig,
    observers: Observers,
}

impl EngineBuilder {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        Self {
            catalog,
            materializer: None,
            comparator: None,
            config: EngineConfig::default(),
            observers: Observers::new(),
        }
    }

    pub fn materializer(mut self, materializer: impl Materializer + 'static) -> Self {
        self.materializer = Some(Arc::new(materializer));
        self
    }

    pub fn shared_materializer(mut self, materializer: Arc<dyn Materializer>) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Replaces the default [`PriorityComparator`] for collection ordering.
    pub fn comparator(mut self, comparator: Arc<dyn DependencyComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> ResolutionEngine {
        let comparator = if self.config.order_collections {
            Some(self.comparator.unwrap_or_else(|| Arc::new(PriorityComparator)))
        } else {
            None
        };
        let cache = ResolutionCache::new(self.catalog.clone());
        ResolutionEngine {
            inner: Arc::new(EngineInner {
                catalog: self.catalog,
                cache,
                materializer: self.materializer.unwrap_or_else(|| Arc::new(InstanceMaterializer)),
                comparator,
                config: self.config,
                observers: self.observers,
            }),
        }
    }
}

/// Resolves injection points against a catalog.
///
/// Cheap to clone; clones share the cache and configuration.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{
///     FnMaterializer, InjectionPoint, Instance, Provider, ProviderCatalog, ResolutionEngine, TypeRef,
/// };
/// use std::sync::Arc;
///
/// struct Foo(&'static str);
///
/// let catalog = Arc::new(ProviderCatalog::new());
/// catalog.register(Provider::new("p1", TypeRef::named("Foo"))).unwrap();
/// catalog.register(Provider::new("p2", TypeRef::named("Foo")).primary()).unwrap();
///
/// let engine = ResolutionEngine::new(
///     catalog,
///     FnMaterializer::new(|request| {
///         let name = if request.provider_name() == "p1" { "one" } else { "two" };
///         Ok(Instance::new(Foo(name), TypeRef::named("Foo")))
///     }),
/// );
///
/// let point = InjectionPoint::new("Service", 0, TypeRef::named("Foo"));
/// let foo = engine.resolve(&point).unwrap().downcast::<Foo>().unwrap();
/// assert_eq!(foo.0, "two");
/// ```
#[derive(Clone)]
pub struct ResolutionEngine {
    inner: Arc<EngineInner>,
}

impl ResolutionEngine {
    pub fn new(catalog: Arc<ProviderCatalog>, materializer: impl Materializer + 'static) -> Self {
        EngineBuilder::new(catalog).materializer(materializer).build()
    }

    pub fn builder(catalog: Arc<ProviderCatalog>) -> EngineBuilder {
        EngineBuilder::new(catalog)
    }

    pub fn catalog(&self) -> &Arc<ProviderCatalog> {
        &self.inner.catalog
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.inner.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Drops cached shortcuts for every point owned by `owner`.
    pub fn reset_owner(&self, owner: &str) -> usize {
        self.inner.cache.reset_owner(owner)
    }

    /// Resolves one injection point.
    pub fn resolve(&self, point: &InjectionPoint) -> DiResult<Resolution> {
        let observers = &self.inner.observers;
        if !observers.has_observers() {
            return self.resolve_point(point);
        }

        observers.resolving(point);
        let start = Instant::now();
        let result = self.resolve_point(point);
        match &result {
            Ok(_) => observers.resolved(point, start.elapsed()),
            Err(err) => observers.failed(point, err),
        }
        result
    }

    /// Resolves every point of one owner, in order.
    ///
    /// Failures of optional points become [`Resolution::Absent`] and are
    /// recorded in [`BatchResolution::suppressed`]. The first required
    /// failure aborts the batch with [`DiError::Batch`].
    pub fn resolve_all(&self, points: &[InjectionPoint]) -> DiResult<BatchResolution> {
        let mut batch = BatchResolution::default();
        for point in points {
            match self.resolve(point) {
                Ok(resolution) => batch.push(point.clone(), resolution),
                Err(err) if !point.is_required() => {
                    tracing::debug!(target: "ferrous_autowire", point = %point, error = %err, "optional dependency suppressed");
                    batch.suppress(point.clone(), err);
                    batch.push(point.clone(), Resolution::Absent);
                }
                Err(err) => {
                    return Err(DiError::Batch {
                        owner: point.owner().to_string(),
                        position: point.key().position(),
                        source: Box::new(err),
                    })
                }
            }
        }
        Ok(batch)
    }

    /// Checks that every point would resolve, without materializing anything.
    pub fn validate(&self, points: &[InjectionPoint]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for point in points {
            report.checked += 1;
            self.validate_point(point, &mut report);
        }
        report
    }

    fn validate_point(&self, point: &InjectionPoint, report: &mut ValidationReport) {
        let point = match point.declared_type() {
            TypeRef::Optional(inner) | TypeRef::Deferred(inner) => point.nested((**inner).clone()).optional(),
            _ => point.clone(),
        };
        let kind = Multiplicity::classify(point.declared_type());
        if kind.is_multi_valued() {
            let (candidates, pass) = self.multiplicity().candidates(&point, &kind);
            if pass == MatchPass::Relaxed {
                report.warn(ValidationWarning::RelaxedMatch {
                    point: point.key().clone(),
                    candidates: candidates.iter().map(|c| c.name().to_string()).collect(),
                });
            }
            return;
        }

        let candidates = self.finder().find(&point, point.declared_type(), false);
        match TieBreaker::resolve_single(&candidates, &TieBreaker::hint(&point)) {
            Ok(TieBreak::Selected(index)) => {
                let name = candidates.get(index).map(|c| c.name().to_string()).unwrap_or_default();
                match candidates.pass() {
                    MatchPass::Relaxed => report.warn(ValidationWarning::RelaxedMatch {
                        point: point.key().clone(),
                        candidates: candidates.names(),
                    }),
                    MatchPass::SelfReference => report.warn(ValidationWarning::SelfReference {
                        point: point.key().clone(),
                        provider: name,
                    }),
                    MatchPass::Strict => {}
                }
            }
            Ok(TieBreak::Ambiguous(names)) => report.error(
                point.key(),
                DiError::AmbiguousCandidate {
                    requested: point.declared_type().clone(),
                    qualifiers: point.qualifiers().clone(),
                    candidates: names,
                },
            ),
            Ok(TieBreak::Absent) if point.is_required() => report.error(point.key(), self.unsatisfied(&point)),
            Ok(TieBreak::Absent) => {
                if candidates.len() > 1 {
                    report.warn(ValidationWarning::OptionalAmbiguity {
                        point: point.key().clone(),
                        candidates: candidates.names(),
                    });
                }
            }
            Err(err) => report.error(point.key(), err),
        }
    }

    // ----- Pipeline -----

    pub(crate) fn resolve_point(&self, point: &InjectionPoint) -> DiResult<Resolution> {
        match point.declared_type() {
            TypeRef::Optional(inner) => {
                let handle = DeferredHandle::new(self.clone(), point.nested((**inner).clone()).optional());
                return Ok(Resolution::Found(Resolved::Deferred(handle)));
            }
            TypeRef::Deferred(inner) => {
                let handle = DeferredHandle::new(self.clone(), point.nested((**inner).clone()));
                return Ok(Resolution::Found(Resolved::Deferred(handle)));
            }
            _ => {}
        }

        let kind = Multiplicity::classify(point.declared_type());
        if kind.is_multi_valued() {
            self.resolve_multiple(point, &kind)
        } else {
            self.resolve_scalar(point)
        }
    }

    fn finder(&self) -> CandidateFinder<'_> {
        CandidateFinder::new(&self.inner.catalog)
            .relaxed_fallback(!self.inner.config.strict_qualifiers)
            .self_reference_fallback(self.inner.config.self_reference_fallback)
    }

    fn multiplicity(&self) -> MultiplicityResolver<'_> {
        MultiplicityResolver::new(self.finder(), self.inner.comparator.as_deref())
    }

    fn resolve_scalar(&self, point: &InjectionPoint) -> DiResult<Resolution> {
        let cache = &self.inner.cache;
        let cacheable = self.inner.config.cache_shortcuts && point.is_cacheable();

        let selection = if !cacheable {
            self.select(point)?.0
        } else {
            match cache.get(point.key()) {
                Some(CacheEntry::NotCacheable) => self.select(point)?.0,
                entry => match entry.and_then(|e| self.from_cache(point, &e)) {
                    Some(selection) => selection,
                    None => self.select_and_cache(point)?,
                },
            }
        };
        self.finish(point, selection)
    }

    /// Slow path: re-check under the stripe lock, then compute and store.
    fn select_and_cache(&self, point: &InjectionPoint) -> DiResult<Selection> {
        let cache = &self.inner.cache;
        let _stripe = cache.lock_stripe(point.key());

        match cache.get(point.key()) {
            Some(CacheEntry::NotCacheable) => return Ok(self.select(point)?.0),
            Some(entry) => {
                if let Some(selection) = self.from_cache(point, &entry) {
                    return Ok(selection);
                }
            }
            None => {}
        }

        let generation = self.inner.catalog.generation();
        let (selection, entry) = self.select(point)?;
        if !cache.store(point.key().clone(), point.declared_type().clone(), entry, generation) {
            tracing::trace!(target: "ferrous_autowire", point = %point.key(), "catalog changed during selection; shortcut not stored");
        }
        Ok(selection)
    }

    /// Turns a cache entry into a selection, or invalidates it if stale.
    fn from_cache(&self, point: &InjectionPoint, entry: &CacheEntry) -> Option<Selection> {
        match entry {
            CacheEntry::Shortcut(Shortcut { provider, expected }) => {
                let catalog = &self.inner.catalog;
                match catalog.get(provider) {
                    Some(p) if p.is_autowire_candidate() && catalog.is_assignable(p.declared_type(), expected) => {
                        self.inner.observers.shortcut_hit(point, provider);
                        Some(Selection::Provider { provider: p, expected: expected.clone() })
                    }
                    _ => {
                        tracing::debug!(target: "ferrous_autowire", point = %point.key(), provider = %provider, "stale shortcut invalidated");
                        self.inner.cache.invalidate_stale(point.key(), entry);
                        None
                    }
                }
            }
            CacheEntry::NoneFound if !point.is_required() => Some(Selection::Absent),
            CacheEntry::NoneFound | CacheEntry::NotCacheable => None,
        }
    }

    /// Candidate discovery and tie-breaking for a scalar point.
    fn select(&self, point: &InjectionPoint) -> DiResult<(Selection, CacheEntry)> {
        let candidates = self.finder().find(point, point.declared_type(), false);
        self.report_candidates(point, &candidates);

        match TieBreaker::resolve_single(&candidates, &TieBreaker::hint(point))? {
            TieBreak::Selected(index) => {
                let candidate = candidates.get(index).ok_or_else(|| self.unsatisfied(point))?;
                let expected = point.declared_type().clone();
                let entry = match candidates.pass() {
                    MatchPass::SelfReference => CacheEntry::NotCacheable,
                    _ => CacheEntry::Shortcut(Shortcut {
                        provider: candidate.name().to_string(),
                        expected: expected.clone(),
                    }),
                };
                Ok((Selection::Provider { provider: candidate.provider().clone(), expected }, entry))
            }
            TieBreak::Ambiguous(names) => Err(DiError::AmbiguousCandidate {
                requested: point.declared_type().clone(),
                qualifiers: point.qualifiers().clone(),
                candidates: names,
            }),
            TieBreak::Absent if point.is_required() => Err(self.unsatisfied(point)),
            TieBreak::Absent => Ok((Selection::Absent, CacheEntry::NoneFound)),
        }
    }

    fn report_candidates(&self, point: &InjectionPoint, candidates: &CandidateSet) {
        if self.inner.observers.has_observers() {
            self.inner.observers.candidates_found(point, candidates.pass(), &candidates.names());
        }
    }

    fn unsatisfied(&self, point: &InjectionPoint) -> DiError {
        DiError::Unsatisfied {
            requested: point.declared_type().clone(),
            qualifiers: point.qualifiers().clone(),
        }
    }

    fn finish(&self, point: &InjectionPoint, selection: Selection) -> DiResult<Resolution> {
        match selection {
            Selection::Absent => Ok(Resolution::Absent),
            Selection::Provider { provider, expected } => self
                .materialize(&provider, &expected, Some(point))
                .map(|instance| Resolution::Found(Resolved::Single(instance))),
        }
    }

    fn resolve_multiple(&self, point: &InjectionPoint, kind: &Multiplicity) -> DiResult<Resolution> {
        if let Multiplicity::Stream(_) = kind {
            let stream = LazyStream::new(self.clone(), point.clone(), self.inner.config.order_collections);
            return Ok(Resolution::Found(Resolved::Stream(stream)));
        }

        let (candidates, pass) = self.multiplicity().candidates(point, kind);
        if self.inner.observers.has_observers() {
            let names: Vec<String> = candidates.iter().map(|c| c.name().to_string()).collect();
            self.inner.observers.candidates_found(point, pass, &names);
        }

        if candidates.is_empty() {
            if let Some(direct) = self.resolve_collection_provider(point)? {
                return Ok(Resolution::Found(Resolved::Single(direct)));
            }
        }

        let element = match kind.element() {
            Some(element) => element.clone(),
            None => return Ok(Resolution::Absent),
        };
        let items = candidates
            .iter()
            .map(|c| Ok((c.name().to_string(), self.materialize(c.provider(), &element, Some(point))?)))
            .collect::<DiResult<Vec<_>>>()?;

        Ok(match MultiplicityResolver::assemble(kind, items) {
            Some(resolved) => Resolution::Found(resolved),
            None => Resolution::Absent,
        })
    }

    /// A provider declared as the collection type itself, e.g. a registered
    /// `List<Handler>`. Returned as-is when no element candidate exists.
    fn resolve_collection_provider(&self, point: &InjectionPoint) -> DiResult<Option<Instance>> {
        let lookup = point.clone().optional().uncached();
        let finder = self.finder().self_reference_fallback(false).relaxed_fallback(false);
        let candidates = finder.find(&lookup, lookup.declared_type(), false);
        if candidates.is_empty() {
            return Ok(None);
        }
        match TieBreaker::resolve_single(&candidates, &TieBreaker::hint(&lookup))? {
            TieBreak::Selected(index) => match candidates.get(index) {
                Some(c) => self.materialize(c.provider(), lookup.declared_type(), Some(point)).map(Some),
                None => Ok(None),
            },
            TieBreak::Ambiguous(_) | TieBreak::Absent => Ok(None),
        }
    }

    /// Materializes one element of a stream.
    pub(crate) fn materialize_element(
        &self,
        provider: &Provider,
        element: &TypeRef,
        point: &InjectionPoint,
    ) -> DiResult<Instance> {
        self.materialize(provider, element, Some(point))
    }

    /// Stream candidates, re-discovered on every call.
    pub(crate) fn stream_candidates(&self, point: &InjectionPoint, ordered: bool) -> (Vec<Arc<Provider>>, TypeRef) {
        let kind = Multiplicity::classify(point.declared_type());
        let element = match kind.element() {
            Some(element) => element.clone(),
            None => return (Vec::new(), point.declared_type().clone()),
        };
        let resolver = if ordered {
            self.multiplicity()
        } else {
            MultiplicityResolver::new(self.finder(), None)
        };
        let (candidates, pass) = resolver.candidates(point, &kind);
        self.report_names(point, pass, &candidates);
        (candidates.into_iter().map(|c| c.entry.provider).collect(), element)
    }

    fn report_names(&self, point: &InjectionPoint, pass: MatchPass, candidates: &[crate::finder::Candidate]) {
        if self.inner.observers.has_observers() {
            let names: Vec<String> = candidates.iter().map(|c| c.name().to_string()).collect();
            self.inner.observers.candidates_found(point, pass, &names);
        }
    }

    fn materialize(&self, provider: &Provider, expected: &TypeRef, point: Option<&InjectionPoint>) -> DiResult<Instance> {
        let instance = match provider.materialized() {
            Some(instance) => instance.clone(),
            None => self
                .inner
                .materializer
                .materialize(&MaterializeRequest::new(provider, expected, point))?,
        };

        if self.inner.config.verify_instance_types && !self.inner.catalog.is_assignable(instance.type_ref(), expected) {
            return Err(DiError::TypeMismatch {
                provider: provider.name().to_string(),
                expected: expected.clone(),
                actual: instance.type_ref().clone(),
            });
        }
        Ok(instance)
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("catalog", &self.inner.catalog)
            .field("cache", &self.inner.cache)
            .field("config", &self.inner.config)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}
