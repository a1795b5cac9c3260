//! The materialization seam.
//!
//! The engine decides *which* provider satisfies a request; building the
//! instance is delegated to a [`Materializer`]. The engine calls it only
//! after selection, never while holding any of its own locks, and passes an
//! explicit [`MaterializeRequest`] carrying the injection point being served.

use crate::catalog::{Instance, Provider};
use crate::error::{DiError, DiResult};
use crate::injection::InjectionPoint;
use crate::types::TypeRef;

/// Everything a materializer gets to know about one request.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeRequest<'a> {
    provider: &'a Provider,
    expected: &'a TypeRef,
    point: Option<&'a InjectionPoint>,
}

impl<'a> MaterializeRequest<'a> {
    pub(crate) fn new(provider: &'a Provider, expected: &'a TypeRef, point: Option<&'a InjectionPoint>) -> Self {
        Self { provider, expected, point }
    }

    pub fn provider_name(&self) -> &'a str {
        self.provider.name()
    }

    pub fn provider(&self) -> &'a Provider {
        self.provider
    }

    /// Type the produced instance must be assignable to.
    pub fn expected_type(&self) -> &'a TypeRef {
        self.expected
    }

    /// The injection point being served, when there is one.
    pub fn point(&self) -> Option<&'a InjectionPoint> {
        self.point
    }
}

/// Builds (or fetches) provider instances.
///
/// Implementations own lifecycle concerns, including detection of cycles
/// between providers that are mid-construction.
pub trait Materializer: Send + Sync {
    fn materialize(&self, request: &MaterializeRequest<'_>) -> DiResult<Instance>;
}

/// Adapts a closure into a [`Materializer`].
///
/// ```rust
/// use ferrous_autowire::{FnMaterializer, Instance, TypeRef};
///
/// let materializer = FnMaterializer::new(|request| {
///     Ok(Instance::new(request.provider_name().to_string(), request.expected_type().clone()))
/// });
/// ```
pub struct FnMaterializer<F> {
    f: F,
}

impl<F> FnMaterializer<F>
where
    F: Fn(&MaterializeRequest<'_>) -> DiResult<Instance> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Materializer for FnMaterializer<F>
where
    F: Fn(&MaterializeRequest<'_>) -> DiResult<Instance> + Send + Sync,
{
    fn materialize(&self, request: &MaterializeRequest<'_>) -> DiResult<Instance> {
        (self.f)(request)
    }
}

/// Serves only pre-materialized instances.
///
/// Used when the engine is built without a materializer: every provider
/// must already carry an instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceMaterializer;

impl Materializer for InstanceMaterializer {
    fn materialize(&self, request: &MaterializeRequest<'_>) -> DiResult<Instance> {
        request.provider().materialized().cloned().ok_or_else(|| DiError::Materialization {
            provider: request.provider_name().to_string(),
            reason: "provider has no instance and no materializer is configured".to_string(),
        })
    }
}
