//! Resolution results.

use std::any::Any;
use std::sync::Arc;

use crate::catalog::Instance;
use crate::deferred::{DeferredHandle, LazyStream};
use crate::error::DiError;
use crate::injection::InjectionPoint;

/// Outcome of resolving one injection point.
///
/// Failures are reported through [`DiError`]; an optional point with no
/// usable candidate resolves to [`Resolution::Absent`].
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Resolved),
    Absent,
}

/// A resolved value, shaped like the request.
#[derive(Debug, Clone)]
pub enum Resolved {
    Single(Instance),
    Array(Vec<Instance>),
    List(Vec<Instance>),
    Set(Vec<Instance>),
    /// Provider name to instance, in candidate order
    Map(Vec<(String, Instance)>),
    Stream(LazyStream),
    Deferred(DeferredHandle),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolution::Absent)
    }

    pub fn resolved(&self) -> Option<&Resolved> {
        match self {
            Resolution::Found(resolved) => Some(resolved),
            Resolution::Absent => None,
        }
    }

    pub fn into_resolved(self) -> Option<Resolved> {
        match self {
            Resolution::Found(resolved) => Some(resolved),
            Resolution::Absent => None,
        }
    }

    /// The instance of a scalar resolution.
    pub fn single(&self) -> Option<&Instance> {
        match self {
            Resolution::Found(Resolved::Single(instance)) => Some(instance),
            _ => None,
        }
    }

    /// Downcasts a scalar resolution.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.single().and_then(|i| i.downcast::<T>())
    }

    /// Elements of an array, list or set resolution (or map values).
    pub fn instances(&self) -> Vec<Instance> {
        match self {
            Resolution::Found(Resolved::Array(v))
            | Resolution::Found(Resolved::List(v))
            | Resolution::Found(Resolved::Set(v)) => v.clone(),
            Resolution::Found(Resolved::Map(entries)) => entries.iter().map(|(_, i)| i.clone()).collect(),
            Resolution::Found(Resolved::Single(i)) => vec![i.clone()],
            _ => Vec::new(),
        }
    }

    pub fn deferred(&self) -> Option<&DeferredHandle> {
        match self {
            Resolution::Found(Resolved::Deferred(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn stream(&self) -> Option<&LazyStream> {
        match self {
            Resolution::Found(Resolved::Stream(stream)) => Some(stream),
            _ => None,
        }
    }

    /// Identity-level equality: same shape, same instances in the same order.
    ///
    /// Streams and deferred handles compare by the point they are bound to.
    pub fn same_outcome(&self, other: &Resolution) -> bool {
        fn same_all(a: &[Instance], b: &[Instance]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
        }
        match (self, other) {
            (Resolution::Absent, Resolution::Absent) => true,
            (Resolution::Found(a), Resolution::Found(b)) => match (a, b) {
                (Resolved::Single(x), Resolved::Single(y)) => x.ptr_eq(y),
                (Resolved::Array(x), Resolved::Array(y))
                | (Resolved::List(x), Resolved::List(y))
                | (Resolved::Set(x), Resolved::Set(y)) => same_all(x, y),
                (Resolved::Map(x), Resolved::Map(y)) => {
                    x.len() == y.len() && x.iter().zip(y).all(|((kx, vx), (ky, vy))| kx == ky && vx.ptr_eq(vy))
                }
                (Resolved::Stream(x), Resolved::Stream(y)) => x.point() == y.point(),
                (Resolved::Deferred(x), Resolved::Deferred(y)) => x.point() == y.point(),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Result of resolving all injection points of one owner.
#[derive(Debug, Clone, Default)]
pub struct BatchResolution {
    resolutions: Vec<(InjectionPoint, Resolution)>,
    suppressed: Vec<(InjectionPoint, DiError)>,
}

impl BatchResolution {
    pub(crate) fn push(&mut self, point: InjectionPoint, resolution: Resolution) {
        self.resolutions.push((point, resolution));
    }

    pub(crate) fn suppress(&mut self, point: InjectionPoint, error: DiError) {
        self.suppressed.push((point, error));
    }

    /// Resolutions in input order.
    pub fn resolutions(&self) -> &[(InjectionPoint, Resolution)] {
        &self.resolutions
    }

    /// Resolution for the point at `position`, if present.
    pub fn get(&self, position: usize) -> Option<&Resolution> {
        self.resolutions
            .iter()
            .find(|(p, _)| p.key().position() == position)
            .map(|(_, r)| r)
    }

    /// Errors from optional points, replaced by [`Resolution::Absent`].
    pub fn suppressed(&self) -> &[(InjectionPoint, DiError)] {
        &self.suppressed
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }
}
