//! Resolution observers.
//!
//! Observers receive a synchronous callback for every step of a resolution.
//! They are registered on the [`EngineBuilder`](crate::EngineBuilder); with
//! none registered the engine skips all observer work, including timing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::finder::MatchPass;
use crate::injection::InjectionPoint;

/// Hooks into the resolution pipeline.
///
/// Keep implementations cheap; they run on the resolving thread.
///
/// # Examples
///
/// ```
/// use ferrous_autowire::{DiError, InjectionPoint, ResolutionObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicUsize);
///
/// impl ResolutionObserver for FailureCounter {
///     fn resolving(&self, _point: &InjectionPoint) {}
///     fn resolved(&self, _point: &InjectionPoint, _duration: Duration) {}
///     fn failed(&self, _point: &InjectionPoint, _error: &DiError) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// Called before anything else happens for a point.
    fn resolving(&self, point: &InjectionPoint);

    /// Called after candidate discovery for a scalar or collection request.
    fn candidates_found(&self, _point: &InjectionPoint, _pass: MatchPass, _names: &[String]) {}

    /// Called when a cached shortcut satisfied the request.
    fn shortcut_hit(&self, _point: &InjectionPoint, _provider: &str) {}

    /// Called when a resolution completed (found or absent).
    fn resolved(&self, point: &InjectionPoint, duration: Duration);

    /// Called when a resolution failed.
    fn failed(&self, point: &InjectionPoint, error: &DiError);
}

/// Registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn resolving(&self, point: &InjectionPoint) {
        for observer in &self.observers {
            observer.resolving(point);
        }
    }

    #[inline]
    pub(crate) fn candidates_found(&self, point: &InjectionPoint, pass: MatchPass, names: &[String]) {
        for observer in &self.observers {
            observer.candidates_found(point, pass, names);
        }
    }

    #[inline]
    pub(crate) fn shortcut_hit(&self, point: &InjectionPoint, provider: &str) {
        for observer in &self.observers {
            observer.shortcut_hit(point, provider);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, point: &InjectionPoint, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(point, duration);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, point: &InjectionPoint, error: &DiError) {
        for observer in &self.observers {
            observer.failed(point, error);
        }
    }
}

/// Emits `tracing` events for every resolution step.
///
/// Events use the `ferrous_autowire` target: `trace` for progress, `debug`
/// for completions and `warn` for failures.
///
/// ```
/// use ferrous_autowire::{EngineBuilder, LoggingObserver, ProviderCatalog};
/// use std::sync::Arc;
///
/// let engine = EngineBuilder::new(Arc::new(ProviderCatalog::new()))
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver {
    label: Option<String>,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self { label: None }
    }

    /// Adds a `label` field to every event, e.g. an application context name.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self { label: Some(label.into()) }
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

impl ResolutionObserver for LoggingObserver {
    fn resolving(&self, point: &InjectionPoint) {
        tracing::trace!(
            target: "ferrous_autowire",
            label = self.label(),
            point = %point,
            "resolving"
        );
    }

    fn candidates_found(&self, point: &InjectionPoint, pass: MatchPass, names: &[String]) {
        tracing::trace!(
            target: "ferrous_autowire",
            label = self.label(),
            point = %point.key(),
            pass = ?pass,
            count = names.len(),
            candidates = ?names,
            "candidates found"
        );
    }

    fn shortcut_hit(&self, point: &InjectionPoint, provider: &str) {
        tracing::trace!(
            target: "ferrous_autowire",
            label = self.label(),
            point = %point.key(),
            provider,
            "shortcut hit"
        );
    }

    fn resolved(&self, point: &InjectionPoint, duration: Duration) {
        tracing::debug!(
            target: "ferrous_autowire",
            label = self.label(),
            point = %point,
            elapsed_us = duration.as_micros() as u64,
            "resolved"
        );
    }

    fn failed(&self, point: &InjectionPoint, error: &DiError) {
        tracing::warn!(
            target: "ferrous_autowire",
            label = self.label(),
            point = %point,
            error = %error,
            "resolution failed"
        );
    }
}

/// Atomic counters over all resolutions.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    resolutions: AtomicU64,
    shortcut_hits: AtomicU64,
    candidate_searches: AtomicU64,
    failures: AtomicU64,
    total_nanos: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed resolutions, found or absent.
    pub fn resolution_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn shortcut_hits(&self) -> u64 {
        self.shortcut_hits.load(Ordering::Relaxed)
    }

    /// Number of times candidate discovery ran.
    pub fn candidate_searches(&self) -> u64 {
        self.candidate_searches.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn total_resolution_time(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    pub fn average_resolution_time(&self) -> Option<Duration> {
        let count = self.resolution_count();
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed) / count))
    }

    pub fn reset(&self) {
        self.resolutions.store(0, Ordering::Relaxed);
        self.shortcut_hits.store(0, Ordering::Relaxed);
        self.candidate_searches.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.total_nanos.store(0, Ordering::Relaxed);
    }
}

impl ResolutionObserver for MetricsObserver {
    fn resolving(&self, _point: &InjectionPoint) {}

    fn candidates_found(&self, _point: &InjectionPoint, _pass: MatchPass, _names: &[String]) {
        self.candidate_searches.fetch_add(1, Ordering::Relaxed);
    }

    fn shortcut_hit(&self, _point: &InjectionPoint, _provider: &str) {
        self.shortcut_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn resolved(&self, _point: &InjectionPoint, duration: Duration) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn failed(&self, _point: &InjectionPoint, _error: &DiError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}
