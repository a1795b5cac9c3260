//! Injection point metadata.
//!
//! Injection points are produced by an external metadata scanner (a derive
//! macro, a build script, a reflection layer) and handed to the engine
//! already extracted. They are immutable once built.

use std::fmt;
use std::sync::Arc;

use crate::qualifier::{Qualifier, Qualifiers};
use crate::types::TypeRef;

const PROGRAMMATIC_OWNER: &str = "<programmatic>";

/// Cache identity of an injection point: owner, position and wrapper nesting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectionKey {
    owner: Arc<str>,
    position: usize,
    nesting: u8,
}

impl InjectionKey {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Depth of deferred/optional wrappers this key sits under.
    pub fn nesting(&self) -> u8 {
        self.nesting
    }
}

impl fmt::Display for InjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nesting == 0 {
            write!(f, "{}#{}", self.owner, self.position)
        } else {
            write!(f, "{}#{}^{}", self.owner, self.position, self.nesting)
        }
    }
}

/// A declared dependency: a field, parameter or constructor argument.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{InjectionPoint, TypeRef};
///
/// let point = InjectionPoint::new("UserService", 0, TypeRef::named("Repository"))
///     .qualifier("postgres")
///     .named("repository");
///
/// assert!(point.is_required());
/// assert!(point.qualifiers().contains("postgres"));
/// assert_eq!(point.declared_name(), Some("repository"));
/// assert_eq!(point.key().to_string(), "UserService#0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    declared_type: TypeRef,
    required: bool,
    qualifiers: Qualifiers,
    declared_name: Option<String>,
    key: InjectionKey,
    cacheable: bool,
    allow_self_reference: bool,
}

impl InjectionPoint {
    /// Creates a required, cacheable injection point.
    pub fn new(owner: impl AsRef<str>, position: usize, declared_type: TypeRef) -> Self {
        Self {
            declared_type,
            required: true,
            qualifiers: Qualifiers::new(),
            declared_name: None,
            key: InjectionKey { owner: Arc::from(owner.as_ref()), position, nesting: 0 },
            cacheable: true,
            allow_self_reference: false,
        }
    }

    /// Creates a one-off lookup that never populates the shortcut cache.
    pub fn programmatic(declared_type: TypeRef) -> Self {
        let mut point = Self::new(PROGRAMMATIC_OWNER, 0, declared_type);
        point.cacheable = false;
        point
    }

    /// Marks the point optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Adds a qualifier tag.
    pub fn qualifier(mut self, tag: impl Into<Qualifier>) -> Self {
        self.qualifiers.insert(tag);
        self
    }

    /// Sets the declared field or parameter name used by the name fallback.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.declared_name = Some(name.into());
        self
    }

    /// Excludes the point from shortcut caching.
    pub fn uncached(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// Lets the owner itself be a candidate in the first matching pass.
    pub fn allow_self_reference(mut self) -> Self {
        self.allow_self_reference = true;
        self
    }

    /// Derives the point for the value inside a wrapper type.
    pub(crate) fn nested(&self, inner: TypeRef) -> Self {
        let mut point = self.clone();
        point.declared_type = inner;
        point.key.nesting = self.key.nesting.saturating_add(1);
        point
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    pub fn declared_name(&self) -> Option<&str> {
        self.declared_name.as_deref()
    }

    pub fn key(&self) -> &InjectionKey {
        &self.key
    }

    /// Owner identity; also the provider name excluded from self-injection.
    pub fn owner(&self) -> &str {
        &self.key.owner
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn allows_self_reference(&self) -> bool {
        self.allow_self_reference
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.key, self.declared_type)?;
        if !self.qualifiers.is_empty() {
            write!(f, " @[{}]", self.qualifiers)?;
        }
        if !self.required {
            f.write_str(", optional")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_point_has_distinct_key() {
        let outer = InjectionPoint::new("Owner", 2, TypeRef::deferred(TypeRef::named("Foo")));
        let inner = outer.nested(TypeRef::named("Foo"));

        assert_ne!(outer.key(), inner.key());
        assert_eq!(inner.key().owner(), "Owner");
        assert_eq!(inner.key().position(), 2);
        assert_eq!(inner.key().nesting(), 1);
        assert_eq!(inner.key().to_string(), "Owner#2^1");
    }

    #[test]
    fn test_programmatic_points_are_uncached() {
        let point = InjectionPoint::programmatic(TypeRef::named("Foo"));
        assert!(!point.is_cacheable());
        assert_eq!(point.owner(), "<programmatic>");
    }

    #[test]
    fn test_display() {
        let point = InjectionPoint::new("Svc", 1, TypeRef::named("Foo")).qualifier("fast").optional();
        assert_eq!(point.to_string(), "Svc#1 (Foo @[fast], optional)");
    }
}
