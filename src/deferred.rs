//! Deferred resolution.
//!
//! A [`DeferredHandle`] is what an `Optional<T>` or `Deferred<T>` injection
//! point resolves to. It holds the engine and the point, never a value:
//! every access runs the full resolution again, which is cheap when the
//! shortcut cache already knows the answer.
//!
//! A [`LazyStream`] is the collection counterpart. Each [`LazyStream::iter`]
//! re-runs candidate discovery and materializes elements one at a time.

use std::fmt;
use std::sync::Arc;

use crate::catalog::{Instance, Provider};
use crate::engine::ResolutionEngine;
use crate::error::{DiError, DiResult};
use crate::injection::InjectionPoint;
use crate::resolution::Resolution;
use crate::types::TypeRef;

/// Lazily resolved dependency.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{EngineBuilder, InjectionPoint, Instance, ProviderCatalog, TypeRef};
/// use std::sync::Arc;
///
/// let catalog = Arc::new(ProviderCatalog::new());
/// let engine = EngineBuilder::new(catalog.clone()).build();
///
/// let point = InjectionPoint::new("Svc", 0, TypeRef::deferred(TypeRef::named("Clock")));
/// let handle = engine.resolve(&point).unwrap().deferred().cloned().unwrap();
///
/// // Nothing registered yet: the handle is still fine to hold
/// assert!(handle.get_if_available().unwrap().is_none());
///
/// catalog
///     .register_instance("clock", Instance::new(42u64, TypeRef::named("Clock")))
///     .unwrap();
/// let clock = handle.get().unwrap().downcast::<u64>().unwrap();
/// assert_eq!(*clock, 42);
/// ```
#[derive(Clone)]
pub struct DeferredHandle {
    engine: ResolutionEngine,
    point: InjectionPoint,
}

impl DeferredHandle {
    pub(crate) fn new(engine: ResolutionEngine, point: InjectionPoint) -> Self {
        Self { engine, point }
    }

    /// The point this handle resolves; its type is the wrapped type.
    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    pub fn target_type(&self) -> &TypeRef {
        self.point.declared_type()
    }

    /// Resolves with the point's own required flag.
    pub fn resolve(&self) -> DiResult<Resolution> {
        self.engine.resolve(&self.point)
    }

    /// Resolves as a required dependency.
    pub fn get(&self) -> DiResult<Resolution> {
        if self.point.is_required() {
            self.engine.resolve(&self.point)
        } else {
            self.engine.resolve(&self.point.clone().with_required(true))
        }
    }

    /// Resolves, treating "nothing registered" as `None`.
    ///
    /// Ambiguity is still an error.
    pub fn get_if_available(&self) -> DiResult<Option<Resolution>> {
        match self.get() {
            Ok(resolution) => Ok(Some(resolution)),
            Err(err) if matches!(err, DiError::Unsatisfied { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Resolves, treating both "nothing registered" and "not unique" as `None`.
    ///
    /// Not unique covers every tie-break failure: plain ambiguity, several
    /// primaries, and a shared lowest priority.
    pub fn get_if_unique(&self) -> DiResult<Option<Resolution>> {
        match self.get() {
            Ok(resolution) => Ok(Some(resolution)),
            Err(err) if matches!(err, DiError::Unsatisfied { .. }) || err.is_non_unique() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// All providers of the wrapped type, in registration order.
    pub fn stream(&self) -> LazyStream {
        self.stream_of(false)
    }

    /// All providers of the wrapped type, sorted by priority.
    pub fn ordered_stream(&self) -> LazyStream {
        self.stream_of(true)
    }

    fn stream_of(&self, ordered: bool) -> LazyStream {
        let point = self.point.nested(TypeRef::stream(self.point.declared_type().clone()));
        LazyStream::new(self.engine.clone(), point, ordered)
    }
}

impl fmt::Debug for DeferredHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredHandle").field("point", &self.point).finish()
    }
}

/// Restartable, lazily materialized sequence of providers.
#[derive(Clone)]
pub struct LazyStream {
    engine: ResolutionEngine,
    point: InjectionPoint,
    ordered: bool,
}

impl LazyStream {
    pub(crate) fn new(engine: ResolutionEngine, point: InjectionPoint, ordered: bool) -> Self {
        Self { engine, point, ordered }
    }

    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Starts a fresh pass: discovery runs now, materialization on `next()`.
    pub fn iter(&self) -> LazyIter {
        let (providers, element) = self.engine.stream_candidates(&self.point, self.ordered);
        LazyIter {
            engine: self.engine.clone(),
            point: self.point.clone(),
            element,
            providers: providers.into_iter(),
        }
    }

    /// Materializes every element of a fresh pass.
    pub fn collect_all(&self) -> DiResult<Vec<Instance>> {
        self.iter().collect()
    }

    /// Provider names of a fresh pass, without materializing.
    pub fn names(&self) -> Vec<String> {
        self.iter().providers.map(|p| p.name().to_string()).collect()
    }
}

impl fmt::Debug for LazyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStream")
            .field("point", &self.point)
            .field("ordered", &self.ordered)
            .finish()
    }
}

impl IntoIterator for &LazyStream {
    type Item = DiResult<Instance>;
    type IntoIter = LazyIter;

    fn into_iter(self) -> LazyIter {
        self.iter()
    }
}

/// One pass over a [`LazyStream`].
pub struct LazyIter {
    engine: ResolutionEngine,
    point: InjectionPoint,
    element: TypeRef,
    providers: std::vec::IntoIter<Arc<Provider>>,
}

impl Iterator for LazyIter {
    type Item = DiResult<Instance>;

    fn next(&mut self) -> Option<Self::Item> {
        let provider = self.providers.next()?;
        Some(self.engine.materialize_element(&provider, &self.element, &self.point))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.providers.size_hint()
    }
}

impl ExactSizeIterator for LazyIter {}
