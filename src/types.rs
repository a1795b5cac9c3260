//! Runtime type descriptors and assignability.
//!
//! Injection metadata arrives from an external scanner, so requested and
//! declared types are described at runtime by [`TypeRef`] rather than by Rust
//! generics. A [`TypeHierarchy`] records which named types are declared as
//! subtypes of which, and drives covariant candidate matching.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};
use crate::FastMap;

/// Names treated as string-like map keys.
const STRING_TYPE_NAMES: &[&str] = &["String", "str", "&str", "alloc::string::String"];

/// Runtime descriptor of a requested or declared type.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::TypeRef;
///
/// let repo = TypeRef::generic("Repository", vec![TypeRef::named("User")]);
/// assert_eq!(repo.to_string(), "Repository<User>");
///
/// let parsed: TypeRef = "Map<String, Repository<User>>".parse().unwrap();
/// assert_eq!(parsed, TypeRef::map(TypeRef::string(), repo));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeRef {
    /// Nominal type with optional generic arguments
    Named { name: Arc<str>, args: Vec<TypeRef> },
    /// Fixed array of elements
    Array(Box<TypeRef>),
    /// Ordered sequence
    List(Box<TypeRef>),
    /// Identity-deduplicated set
    Set(Box<TypeRef>),
    /// Keyed map (only string keys make a multiplicity request)
    Map(Box<TypeRef>, Box<TypeRef>),
    /// Restartable lazily evaluated sequence
    Stream(Box<TypeRef>),
    /// Optional-like wrapper; absence resolves to empty
    Optional(Box<TypeRef>),
    /// Provider-of wrapper; resolution is postponed until dereference
    Deferred(Box<TypeRef>),
    /// Unresolved generic, matches anything
    Wildcard,
}

impl TypeRef {
    /// Creates a nominal type without generic arguments.
    pub fn named(name: impl AsRef<str>) -> Self {
        TypeRef::Named { name: Arc::from(name.as_ref()), args: Vec::new() }
    }

    /// Creates a nominal type with generic arguments.
    pub fn generic(name: impl AsRef<str>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named { name: Arc::from(name.as_ref()), args }
    }

    /// Creates a nominal type named after a Rust type.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeRef::named(std::any::type_name::<T>())
    }

    /// The canonical string key type.
    pub fn string() -> Self {
        TypeRef::named("String")
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn list(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    pub fn set(element: TypeRef) -> Self {
        TypeRef::Set(Box::new(element))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Map(Box::new(key), Box::new(value))
    }

    pub fn stream(element: TypeRef) -> Self {
        TypeRef::Stream(Box::new(element))
    }

    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn deferred(inner: TypeRef) -> Self {
        TypeRef::Deferred(Box::new(inner))
    }

    /// Returns the nominal name, if this is a named type.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the generic arguments of a named type (empty for other kinds).
    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            _ => &[],
        }
    }

    /// True if this type can key a string-keyed map request.
    pub fn is_string_like(&self) -> bool {
        match self {
            TypeRef::Named { name, args } => args.is_empty() && STRING_TYPE_NAMES.contains(&&**name),
            _ => false,
        }
    }

    /// The same type with every generic argument erased.
    pub fn raw(&self) -> TypeRef {
        match self {
            TypeRef::Named { name, .. } => TypeRef::Named { name: name.clone(), args: Vec::new() },
            TypeRef::Array(e) => TypeRef::array(e.raw()),
            TypeRef::List(e) => TypeRef::list(e.raw()),
            TypeRef::Set(e) => TypeRef::set(e.raw()),
            TypeRef::Map(k, v) => TypeRef::map(k.raw(), v.raw()),
            TypeRef::Stream(e) => TypeRef::stream(e.raw()),
            TypeRef::Optional(e) => TypeRef::optional(e.raw()),
            TypeRef::Deferred(e) => TypeRef::deferred(e.raw()),
            TypeRef::Wildcard => TypeRef::Wildcard,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeRef::Array(e) => write!(f, "[{}]", e),
            TypeRef::List(e) => write!(f, "List<{}>", e),
            TypeRef::Set(e) => write!(f, "Set<{}>", e),
            TypeRef::Map(k, v) => write!(f, "Map<{}, {}>", k, v),
            TypeRef::Stream(e) => write!(f, "Stream<{}>", e),
            TypeRef::Optional(e) => write!(f, "Option<{}>", e),
            TypeRef::Deferred(e) => write!(f, "Deferred<{}>", e),
            TypeRef::Wildcard => f.write_str("?"),
        }
    }
}

impl FromStr for TypeRef {
    type Err = DiError;

    fn from_str(s: &str) -> DiResult<Self> {
        let mut parser = Parser { input: s, pos: 0, depth: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

/// Deepest type nesting the parser accepts.
const MAX_NESTING: usize = 128;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> DiError {
        DiError::InvalidType {
            input: self.input.to_string(),
            reason: format!("{} at offset {}", reason, self.pos),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> DiResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn ident(&mut self) -> DiResult<&'a str> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == ':' || c == '.' || c == '&' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_args(&mut self) -> DiResult<Vec<TypeRef>> {
        let mut args = Vec::new();
        if !self.eat('<') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_type()?);
            if self.eat(',') {
                continue;
            }
            self.expect('>')?;
            return Ok(args);
        }
    }

    fn parse_type(&mut self) -> DiResult<TypeRef> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("type nesting too deep"));
        }
        self.depth += 1;
        let ty = self.parse_nested();
        self.depth -= 1;
        ty
    }

    fn parse_nested(&mut self) -> DiResult<TypeRef> {
        if self.eat('?') {
            return Ok(TypeRef::Wildcard);
        }
        if self.eat('[') {
            let element = self.parse_type()?;
            self.expect(']')?;
            return Ok(TypeRef::array(element));
        }

        let name = self.ident()?;
        let mut args = self.parse_args()?;
        let arity = |expected: usize, args: &Vec<TypeRef>| args.len() == expected;

        let ty = match name {
            "List" | "Vec" if arity(1, &args) => TypeRef::list(args.remove(0)),
            "Set" | "HashSet" | "BTreeSet" if arity(1, &args) => TypeRef::set(args.remove(0)),
            "Map" | "HashMap" | "BTreeMap" if arity(2, &args) => {
                let value = args.remove(1);
                TypeRef::map(args.remove(0), value)
            }
            "Stream" | "Iter" if arity(1, &args) => TypeRef::stream(args.remove(0)),
            "Option" | "Optional" if arity(1, &args) => TypeRef::optional(args.remove(0)),
            "Deferred" | "Provider" | "Lazy" if arity(1, &args) => TypeRef::deferred(args.remove(0)),
            _ => TypeRef::generic(name, args),
        };
        Ok(ty)
    }
}

/// Source of declared supertypes, consulted during assignability checks.
pub trait SupertypeSource {
    /// Returns the supertypes directly declared for `name`.
    fn supertypes(&self, name: &str) -> Vec<TypeRef>;
}

/// Declared subtype relationships between named types.
///
/// # Examples
///
/// ```rust
/// use ferrous_autowire::{TypeHierarchy, TypeRef};
///
/// let mut types = TypeHierarchy::new();
/// types.declare("PostgresRepo", TypeRef::named("Repository"));
/// types.declare("Repository", TypeRef::named("Component"));
///
/// assert!(types.is_assignable(&TypeRef::named("PostgresRepo"), &TypeRef::named("Component")));
/// assert!(!types.is_assignable(&TypeRef::named("Component"), &TypeRef::named("PostgresRepo")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    supertypes: FastMap<Arc<str>, Vec<TypeRef>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `supertype` as a direct supertype of the named type `subtype`.
    ///
    /// Returns false if the relationship was already known.
    pub fn declare(&mut self, subtype: impl AsRef<str>, supertype: TypeRef) -> bool {
        let entry = self.supertypes.entry(Arc::from(subtype.as_ref())).or_default();
        if entry.contains(&supertype) {
            return false;
        }
        entry.push(supertype);
        true
    }

    /// Number of named types with declared supertypes.
    pub fn len(&self) -> usize {
        self.supertypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }

    /// Checks whether a value of type `from` may be injected where `to` is requested.
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        is_assignable(from, to, self)
    }
}

impl SupertypeSource for TypeHierarchy {
    fn supertypes(&self, name: &str) -> Vec<TypeRef> {
        self.supertypes.get(name).cloned().unwrap_or_default()
    }
}

/// Covariant assignability of `from` to `to` under the given hierarchy.
pub fn is_assignable(from: &TypeRef, to: &TypeRef, source: &dyn SupertypeSource) -> bool {
    let mut visited = HashSet::new();
    assignable(from, to, source, &mut visited)
}

fn assignable(
    from: &TypeRef,
    to: &TypeRef,
    source: &dyn SupertypeSource,
    visited: &mut HashSet<TypeRef>,
) -> bool {
    match (from, to) {
        (TypeRef::Wildcard, _) | (_, TypeRef::Wildcard) => true,
        (TypeRef::Named { name: a, args: a_args }, TypeRef::Named { name: b, args: b_args }) if a == b => {
            args_match(a_args, b_args)
        }
        (TypeRef::Named { name, .. }, _) => {
            // Walk declared supertypes; the visited set keeps cyclic declarations finite.
            if !visited.insert(from.clone()) {
                return false;
            }
            source
                .supertypes(name)
                .iter()
                .any(|sup| assignable(sup, to, source, visited))
        }
        (TypeRef::Array(a), TypeRef::Array(b)) => assignable(a, b, source, visited),
        (TypeRef::List(a), TypeRef::List(b))
        | (TypeRef::Set(a), TypeRef::Set(b))
        | (TypeRef::Stream(a), TypeRef::Stream(b))
        | (TypeRef::Optional(a), TypeRef::Optional(b))
        | (TypeRef::Deferred(a), TypeRef::Deferred(b)) => invariant_match(a, b),
        (TypeRef::Map(ak, av), TypeRef::Map(bk, bv)) => invariant_match(ak, bk) && invariant_match(av, bv),
        _ => false,
    }
}

/// Generic arguments are invariant; a missing argument list is a raw match.
fn args_match(a: &[TypeRef], b: &[TypeRef]) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| invariant_match(x, y))
}

fn invariant_match(a: &TypeRef, b: &TypeRef) -> bool {
    match (a, b) {
        (TypeRef::Wildcard, _) | (_, TypeRef::Wildcard) => true,
        (TypeRef::Named { name: an, args: aa }, TypeRef::Named { name: bn, args: ba }) => {
            an == bn && args_match(aa, ba)
        }
        (TypeRef::Array(x), TypeRef::Array(y))
        | (TypeRef::List(x), TypeRef::List(y))
        | (TypeRef::Set(x), TypeRef::Set(y))
        | (TypeRef::Stream(x), TypeRef::Stream(y))
        | (TypeRef::Optional(x), TypeRef::Optional(y))
        | (TypeRef::Deferred(x), TypeRef::Deferred(y)) => invariant_match(x, y),
        (TypeRef::Map(xk, xv), TypeRef::Map(yk, yv)) => invariant_match(xk, yk) && invariant_match(xv, yv),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_through_parser() {
        let ty = TypeRef::map(
            TypeRef::string(),
            TypeRef::list(TypeRef::generic("Repo", vec![TypeRef::named("User"), TypeRef::Wildcard])),
        );
        let text = ty.to_string();
        assert_eq!(text, "Map<String, List<Repo<User, ?>>>");
        assert_eq!(text.parse::<TypeRef>().unwrap(), ty);
    }

    #[test]
    fn test_parser_aliases_and_arrays() {
        assert_eq!("Vec<Foo>".parse::<TypeRef>().unwrap(), TypeRef::list(TypeRef::named("Foo")));
        assert_eq!("[Foo]".parse::<TypeRef>().unwrap(), TypeRef::array(TypeRef::named("Foo")));
        assert_eq!(
            "Provider<Option<Foo>>".parse::<TypeRef>().unwrap(),
            TypeRef::deferred(TypeRef::optional(TypeRef::named("Foo")))
        );
        // Wrong arity keeps the name nominal
        assert_eq!(
            "List<A, B>".parse::<TypeRef>().unwrap(),
            TypeRef::generic("List", vec![TypeRef::named("A"), TypeRef::named("B")])
        );
    }

    #[test]
    fn test_parser_rejects_garbage() {
        assert!(matches!("Foo<".parse::<TypeRef>(), Err(DiError::InvalidType { .. })));
        assert!(matches!("".parse::<TypeRef>(), Err(DiError::InvalidType { .. })));
        assert!(matches!("Foo>".parse::<TypeRef>(), Err(DiError::InvalidType { .. })));
    }

    #[test]
    fn test_parser_limits_nesting() {
        let deep = format!("{}Foo{}", "[".repeat(200_000), "]".repeat(200_000));
        match deep.parse::<TypeRef>() {
            Err(DiError::InvalidType { reason, .. }) => assert!(reason.starts_with("type nesting too deep")),
            other => panic!("unexpected result: {:?}", other),
        }

        let generic = format!("{}Foo{}", "List<".repeat(1_000), ">".repeat(1_000));
        assert!(matches!(generic.parse::<TypeRef>(), Err(DiError::InvalidType { .. })));

        let allowed = format!("{}Foo{}", "[".repeat(MAX_NESTING - 1), "]".repeat(MAX_NESTING - 1));
        assert!(allowed.parse::<TypeRef>().is_ok());
    }

    #[test]
    fn test_generic_matching() {
        let types = TypeHierarchy::new();
        let user_repo = TypeRef::generic("Repo", vec![TypeRef::named("User")]);
        let order_repo = TypeRef::generic("Repo", vec![TypeRef::named("Order")]);
        let raw_repo = TypeRef::named("Repo");
        let any_repo = TypeRef::generic("Repo", vec![TypeRef::Wildcard]);

        assert!(types.is_assignable(&user_repo, &user_repo));
        assert!(!types.is_assignable(&user_repo, &order_repo));
        assert!(types.is_assignable(&user_repo, &raw_repo));
        assert!(types.is_assignable(&raw_repo, &user_repo));
        assert!(types.is_assignable(&order_repo, &any_repo));
    }

    #[test]
    fn test_supertype_walk_with_generics() {
        let mut types = TypeHierarchy::new();
        types.declare("UserRepo", TypeRef::generic("Repo", vec![TypeRef::named("User")]));

        assert!(types.is_assignable(
            &TypeRef::named("UserRepo"),
            &TypeRef::generic("Repo", vec![TypeRef::named("User")])
        ));
        assert!(!types.is_assignable(
            &TypeRef::named("UserRepo"),
            &TypeRef::generic("Repo", vec![TypeRef::named("Order")])
        ));
    }

    #[test]
    fn test_cyclic_declarations_terminate() {
        let mut types = TypeHierarchy::new();
        types.declare("A", TypeRef::named("B"));
        types.declare("B", TypeRef::named("A"));
        assert!(types.is_assignable(&TypeRef::named("A"), &TypeRef::named("B")));
        assert!(!types.is_assignable(&TypeRef::named("A"), &TypeRef::named("C")));
    }

    #[test]
    fn test_arrays_are_covariant_lists_are_not() {
        let mut types = TypeHierarchy::new();
        types.declare("Cat", TypeRef::named("Animal"));
        let cat = TypeRef::named("Cat");
        let animal = TypeRef::named("Animal");

        assert!(types.is_assignable(&TypeRef::array(cat.clone()), &TypeRef::array(animal.clone())));
        assert!(!types.is_assignable(&TypeRef::list(cat), &TypeRef::list(animal)));
    }

    #[test]
    fn test_string_like() {
        assert!(TypeRef::string().is_string_like());
        assert!(TypeRef::of::<String>().is_string_like());
        assert!(!TypeRef::named("u32").is_string_like());
    }
}
