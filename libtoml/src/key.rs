//! Keys, key paths, and symbol interning.
//!
//! A [`KeyPath`] is the normalized form of a dotted key as it arrives from
//! the grammar: one pair of surrounding quotes is stripped from every
//! segment, so `"fruit"` and `fruit` address the same entry. Paths are
//! normalized exactly once, when they are constructed.
//!
//! A [`Key`] is what the finished tree uses to index its tables. It is either
//! text or an interned [`Symbol`]; both forms compare and hash by their
//! string content, so the choice never changes which declarations conflict.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// How keys are represented in the finished tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyRepresentation {
    /// Keys are owned strings.
    #[default]
    Text,
    /// Keys are interned symbols shared across the document.
    Symbolic,
}

/// An interned key atom.
#[derive(Clone)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// The symbol's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if both symbols came from the same interning.
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key in a table of the finished tree.
#[derive(Clone)]
pub enum Key {
    /// A textual key.
    Text(String),
    /// A symbolic key.
    Symbol(Symbol),
}

impl Key {
    /// The key's name, whatever its representation.
    pub fn as_str(&self) -> &str {
        match self {
            Key::Text(s) => s,
            Key::Symbol(sym) => sym.as_str(),
        }
    }

    /// Returns `true` if this key is a symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self, Key::Symbol(_))
    }
}

// Equality and hashing go through the name so `Borrow<str>` lookups work and
// text and symbolic keys stay interchangeable.
impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => write!(f, "{:?}", s),
            Key::Symbol(sym) => write!(f, "{:?}", sym),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<Symbol> for Key {
    fn from(sym: Symbol) -> Self {
        Key::Symbol(sym)
    }
}

/// Makes output keys in one representation, interning symbols per document.
#[derive(Debug, Default)]
pub(crate) struct KeyFactory {
    representation: KeyRepresentation,
    symbols: HashSet<Arc<str>>,
}

impl KeyFactory {
    pub(crate) fn new(representation: KeyRepresentation) -> Self {
        Self {
            representation,
            symbols: HashSet::new(),
        }
    }

    pub(crate) fn make(&mut self, name: &str) -> Key {
        match self.representation {
            KeyRepresentation::Text => Key::Text(name.to_string()),
            KeyRepresentation::Symbolic => Key::Symbol(self.intern(name)),
        }
    }

    fn intern(&mut self, name: &str) -> Symbol {
        if let Some(atom) = self.symbols.get(name) {
            return Symbol(Arc::clone(atom));
        }
        let atom: Arc<str> = Arc::from(name);
        self.symbols.insert(Arc::clone(&atom));
        Symbol(atom)
    }
}

/// A normalized dotted key path.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Build a path from raw segments, stripping quoting from each.
    pub fn normalize<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeyPath(
            segments
                .into_iter()
                .map(|s| strip_quotes(s.as_ref()).to_string())
                .collect(),
        )
    }

    /// The normalized segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `len` segments as a new path.
    pub fn prefix(&self, len: usize) -> KeyPath {
        KeyPath(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Returns `true` if `prefix` is a leading part of this path.
    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// This path followed by the first `len` segments of `tail`.
    pub fn join_prefix(&self, tail: &KeyPath, len: usize) -> KeyPath {
        let mut segments = self.0.clone();
        segments.extend_from_slice(&tail.0[..len.min(tail.0.len())]);
        KeyPath(segments)
    }
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for KeyPath {
    fn from(segments: [S; N]) -> Self {
        KeyPath::normalize(segments)
    }
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        KeyPath::normalize(segments)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if is_bare(segment) {
                f.write_str(segment)?;
            } else {
                write!(f, "{:?}", segment)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPath({})", self)
    }
}

/// Strip one pair of matching surrounding quotes.
fn strip_quotes(segment: &str) -> &str {
    for quote in ['"', '\''] {
        if segment.len() >= 2 && segment.starts_with(quote) && segment.ends_with(quote) {
            return &segment[1..segment.len() - 1];
        }
    }
    segment
}

fn is_bare(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn quoted_and_bare_segments_normalize_alike() {
        assert_eq!(KeyPath::from(["\"fruit\"", "'color'"]), KeyPath::from(["fruit", "color"]));
        // Only one pair of quotes is stripped, and only when they match.
        assert_eq!(KeyPath::from(["\"a'"]).segments(), ["\"a'"]);
        assert_eq!(KeyPath::from(["\"\""]).segments(), [""]);
    }

    #[test]
    fn display_quotes_segments_that_need_it() {
        assert_eq!(KeyPath::from(["a", "\"b.c\"", "d"]).to_string(), "a.\"b.c\".d");
        assert_eq!(KeyPath::from(["site", "\"\""]).to_string(), "site.\"\"");
    }

    #[test]
    fn text_and_symbol_keys_are_interchangeable() {
        let mut factory = KeyFactory::new(KeyRepresentation::Symbolic);
        let sym = factory.make("name");
        assert!(sym.is_symbol());
        assert_eq!(sym, Key::from("name"));

        let mut table = HashMap::new();
        table.insert(sym, 1);
        assert_eq!(table.get("name"), Some(&1));
        assert_eq!(table.get(&Key::from("name")), Some(&1));
    }

    #[test]
    fn symbols_are_interned_once() {
        let mut factory = KeyFactory::new(KeyRepresentation::Symbolic);
        match (factory.make("a"), factory.make("a")) {
            (Key::Symbol(x), Key::Symbol(y)) => assert!(x.ptr_eq(&y)),
            other => panic!("expected symbols, got {:?}", other),
        }
    }
}
