//! Qualifier tags attached to providers and injection points.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A qualifier tag narrowing which providers satisfy a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Qualifier(Arc<str>);

impl Qualifier {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Qualifier(Arc::from(tag.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Qualifier {
    fn from(tag: &str) -> Self {
        Qualifier::new(tag)
    }
}

impl From<String> for Qualifier {
    fn from(tag: String) -> Self {
        Qualifier(Arc::from(tag))
    }
}

/// Small sorted set of qualifiers.
///
/// Most providers carry zero or one qualifier, so the set lives inline.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::Qualifiers;
///
/// let q: Qualifiers = ["fast", "primary-db", "fast"].into_iter().collect();
/// assert_eq!(q.len(), 2);
/// assert!(q.contains("fast"));
/// assert_eq!(q.to_string(), "fast, primary-db");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Qualifiers(SmallVec<[Qualifier; 2]>);

impl Qualifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tag, keeping the set sorted. Returns false if it was present.
    pub fn insert(&mut self, qualifier: impl Into<Qualifier>) -> bool {
        let qualifier = qualifier.into();
        match self.0.binary_search(&qualifier) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, qualifier);
                true
            }
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|q| q.as_str() == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.0.iter()
    }
}

impl<Q: Into<Qualifier>> FromIterator<Q> for Qualifiers {
    fn from_iter<I: IntoIterator<Item = Q>>(iter: I) -> Self {
        let mut set = Qualifiers::new();
        for q in iter {
            set.insert(q);
        }
        set
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, q) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(q.as_str())?;
        }
        Ok(())
    }
}
