//! Declaration bookkeeping for conflict detection.
//!
//! The registry is a tree that mirrors every key path declared so far,
//! independent of the values in the output tree. Each node records whether
//! it was reached as a table or a pair, and whether it was the terminal
//! target of a declaration (`declared`) or only implied by a longer one.
//!
//! Whether a new declaration is legal is decided node by node by
//! [`check_child`], a fixed-order rule table. The order is significant: the
//! first rule that matches names the conflict.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, trace};

use crate::error::{BuildError, KeyConflict, Result};
use crate::key::KeyPath;

/// What a registry node was declared as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Table,
    Pair,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Table => f.write_str("table"),
            KeyKind::Pair => f.write_str("pair"),
        }
    }
}

/// The rule that refused a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictRule {
    /// A declaration meets a terminal node of the other kind, or a header
    /// runs through a declared pair.
    KindMismatch,
    /// A plain table header repeats a declared path.
    TableRedeclared,
    /// A table header targets a key implied by a dotted pair key.
    TableOverDottedKey,
    /// A dotted pair key runs through a fully declared pair key.
    PairExtended,
    /// A terminal declaration targets a key that was only implied.
    ImpliedKeyFinalized,
    /// A pair key is assigned a second time.
    PairRedeclared,
}

/// A node in the registry tree.
#[derive(Debug)]
pub struct KeyNode {
    identifier: String,
    kind: KeyKind,
    declared: bool,
    children: HashMap<String, KeyNode>,
}

impl KeyNode {
    fn new(identifier: &str, kind: KeyKind, declared: bool) -> Self {
        Self {
            identifier: identifier.to_string(),
            kind,
            declared,
            children: HashMap::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn is_declared(&self) -> bool {
        self.declared
    }

    pub fn child(&self, identifier: &str) -> Option<&KeyNode> {
        self.children.get(identifier)
    }

    /// Reuse or create the child `identifier` for an incoming declaration.
    fn append(
        &mut self,
        identifier: &str,
        incoming: Declaration,
        check: Rule,
    ) -> std::result::Result<&mut KeyNode, Clash> {
        if let Some(existing) = self.children.get(identifier) {
            check(existing, incoming).map_err(|rule| Clash {
                rule,
                existing: existing.kind,
            })?;
        }
        let child = self
            .children
            .entry(identifier.to_string())
            .or_insert_with(|| {
                trace!(identifier, kind = %incoming.kind, declared = incoming.declared, "new key node");
                KeyNode::new(identifier, incoming.kind, incoming.declared)
            });
        // Never downgrade; an implied table declared explicitly becomes declared.
        child.declared |= incoming.declared;
        Ok(child)
    }
}

/// The shape of a declaration arriving at one node.
#[derive(Clone, Copy, Debug)]
struct Declaration {
    kind: KeyKind,
    declared: bool,
    array_of_tables: bool,
}

type Rule = fn(&KeyNode, Declaration) -> std::result::Result<(), ConflictRule>;

struct Clash {
    rule: ConflictRule,
    existing: KeyKind,
}

/// The generic child-append rule. First match wins.
fn check_child(existing: &KeyNode, incoming: Declaration) -> std::result::Result<(), ConflictRule> {
    use KeyKind::{Pair, Table};

    let Declaration {
        kind,
        declared,
        array_of_tables,
    } = incoming;

    if declared && existing.declared && existing.kind != kind {
        return Err(ConflictRule::KindMismatch);
    }
    // A header may not run through a pair's value, inline composites included.
    if !declared && kind == Table && existing.kind == Pair && existing.declared {
        return Err(ConflictRule::KindMismatch);
    }
    if declared && kind == Table && existing.declared && !array_of_tables {
        return Err(ConflictRule::TableRedeclared);
    }
    if declared && kind == Table && existing.kind == Pair && !existing.declared {
        return Err(ConflictRule::TableOverDottedKey);
    }
    if !declared && kind == Pair && existing.kind == Pair && existing.declared {
        return Err(ConflictRule::PairExtended);
    }
    // A table implied by an earlier header may still be declared once.
    if declared && !existing.declared && !(kind == Table && existing.kind == Table) {
        return Err(ConflictRule::ImpliedKeyFinalized);
    }
    if declared && kind == Pair && existing.declared && existing.kind == Pair {
        return Err(ConflictRule::PairRedeclared);
    }
    Ok(())
}

/// The rule for the first segment of a table header.
fn check_first_table_segment(
    existing: &KeyNode,
    incoming: Declaration,
) -> std::result::Result<(), ConflictRule> {
    if existing.kind == KeyKind::Pair {
        return Err(ConflictRule::KindMismatch);
    }
    if existing.declared && incoming.declared && !incoming.array_of_tables {
        return Err(ConflictRule::TableRedeclared);
    }
    Ok(())
}

/// The shadow tree of declared key paths.
#[derive(Debug)]
pub struct KeyRegistry {
    root: KeyNode,
    arrays_of_tables: HashSet<KeyPath>,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self {
            root: KeyNode::new("", KeyKind::Table, false),
            arrays_of_tables: HashSet::new(),
        }
    }

    /// The implicit root node.
    pub fn root(&self) -> &KeyNode {
        &self.root
    }

    /// Look up the node at `path`, if registered.
    pub fn get(&self, path: &KeyPath) -> Option<&KeyNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| node.child(segment))
    }

    /// Returns `true` if `path` is currently registered as an array of tables.
    pub fn is_array_of_tables(&self, path: &KeyPath) -> bool {
        self.arrays_of_tables.contains(path)
    }

    /// Register a table header.
    ///
    /// The tail is marked declared unless the header is an array of tables.
    /// Appending an array element starts a fresh scope below the array path.
    pub fn register_table_path(&mut self, path: &KeyPath, is_array_of_tables: bool) -> Result<()> {
        if path.is_empty() {
            return Err(BuildError::EmptyKeyPath);
        }
        if !is_array_of_tables && self.arrays_of_tables.contains(path) {
            debug!(key = %path, "table header reuses an array of tables");
            return Err(BuildError::ArrayOfTablesRedeclared {
                key: path.to_string(),
            });
        }

        let last = path.len() - 1;
        let mut node = &mut self.root;
        for (index, segment) in path.segments().iter().enumerate() {
            let incoming = Declaration {
                kind: KeyKind::Table,
                declared: index == last && !is_array_of_tables,
                array_of_tables: is_array_of_tables,
            };
            let check: Rule = if index == 0 {
                check_first_table_segment
            } else {
                check_child
            };
            node = node
                .append(segment, incoming, check)
                .map_err(|clash| conflict(path.prefix(index + 1), clash, KeyKind::Table))?;
        }

        if is_array_of_tables {
            node.children.clear();
            self.arrays_of_tables
                .retain(|other| !(other.len() > path.len() && other.starts_with(path)));
            self.arrays_of_tables.insert(path.clone());
        }
        Ok(())
    }

    /// Register a pair key relative to the current table context.
    pub fn register_pair_path(&mut self, path: &KeyPath, table_context: &KeyPath) -> Result<()> {
        if path.is_empty() {
            return Err(BuildError::EmptyKeyPath);
        }

        let mut node = &mut self.root;
        for segment in table_context.segments() {
            node = node
                .children
                .entry(segment.clone())
                .or_insert_with(|| KeyNode::new(segment, KeyKind::Table, false));
        }

        let last = path.len() - 1;
        for (index, segment) in path.segments().iter().enumerate() {
            let incoming = Declaration {
                kind: KeyKind::Pair,
                declared: index == last,
                array_of_tables: false,
            };
            node = node.append(segment, incoming, check_child).map_err(|clash| {
                conflict(table_context.join_prefix(path, index + 1), clash, KeyKind::Pair)
            })?;
        }
        Ok(())
    }
}

fn conflict(key: KeyPath, clash: Clash, incoming: KeyKind) -> BuildError {
    debug!(key = %key, rule = ?clash.rule, "key conflict");
    BuildError::KeyConflict(KeyConflict {
        key: key.to_string(),
        existing: clash.existing,
        incoming,
        rule: clash.rule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: KeyKind, declared: bool) -> KeyNode {
        KeyNode::new("k", kind, declared)
    }

    fn incoming(kind: KeyKind, declared: bool) -> Declaration {
        Declaration {
            kind,
            declared,
            array_of_tables: false,
        }
    }

    fn rule_of(result: Result<()>) -> ConflictRule {
        match result {
            Err(BuildError::KeyConflict(conflict)) => conflict.rule,
            other => panic!("expected key conflict, got {:?}", other),
        }
    }

    #[test]
    fn rule_table_precedence() {
        use KeyKind::{Pair, Table};

        let cases = [
            (node(Pair, true), incoming(Table, true), Err(ConflictRule::KindMismatch)),
            (node(Table, true), incoming(Pair, true), Err(ConflictRule::KindMismatch)),
            (node(Pair, true), incoming(Table, false), Err(ConflictRule::KindMismatch)),
            (node(Table, true), incoming(Table, true), Err(ConflictRule::TableRedeclared)),
            (node(Pair, false), incoming(Table, true), Err(ConflictRule::TableOverDottedKey)),
            (node(Pair, true), incoming(Pair, false), Err(ConflictRule::PairExtended)),
            (node(Pair, false), incoming(Pair, true), Err(ConflictRule::ImpliedKeyFinalized)),
            (node(Table, false), incoming(Pair, true), Err(ConflictRule::ImpliedKeyFinalized)),
            (node(Pair, true), incoming(Pair, true), Err(ConflictRule::PairRedeclared)),
            (node(Table, false), incoming(Table, true), Ok(())),
            (node(Table, true), incoming(Table, false), Ok(())),
            (node(Pair, false), incoming(Pair, false), Ok(())),
            (node(Table, false), incoming(Pair, false), Ok(())),
            (node(Pair, false), incoming(Table, false), Ok(())),
        ];
        for (existing, decl, expected) in cases {
            assert_eq!(
                check_child(&existing, decl),
                expected,
                "existing {:?}/{} incoming {:?}",
                existing.kind,
                existing.declared,
                decl
            );
        }
    }

    #[test]
    fn array_of_tables_skips_redeclaration_rule() {
        let existing = node(KeyKind::Table, true);
        let decl = Declaration {
            kind: KeyKind::Table,
            declared: true,
            array_of_tables: true,
        };
        assert_eq!(check_child(&existing, decl), Ok(()));
    }

    #[test]
    fn pair_then_table_conflicts_both_ways() {
        let mut registry = KeyRegistry::new();
        registry.register_table_path(&KeyPath::from(["a"]), false).unwrap();
        registry
            .register_pair_path(&KeyPath::from(["b"]), &KeyPath::from(["a"]))
            .unwrap();
        let rule = rule_of(registry.register_table_path(&KeyPath::from(["a", "b"]), false));
        assert_eq!(rule, ConflictRule::KindMismatch);

        let mut registry = KeyRegistry::new();
        registry.register_table_path(&KeyPath::from(["a", "b"]), false).unwrap();
        registry.register_table_path(&KeyPath::from(["a"]), false).unwrap();
        let rule = rule_of(registry.register_pair_path(&KeyPath::from(["b"]), &KeyPath::from(["a"])));
        assert_eq!(rule, ConflictRule::KindMismatch);
    }

    #[test]
    fn dotted_pair_prefix_cannot_become_table() {
        let mut registry = KeyRegistry::new();
        registry.register_table_path(&KeyPath::from(["t"]), false).unwrap();
        registry
            .register_pair_path(&KeyPath::from(["x", "y"]), &KeyPath::from(["t"]))
            .unwrap();
        let rule = rule_of(registry.register_table_path(&KeyPath::from(["t", "x"]), false));
        assert_eq!(rule, ConflictRule::TableOverDottedKey);
    }

    #[test]
    fn first_segment_rules() {
        let mut registry = KeyRegistry::new();
        registry
            .register_pair_path(&KeyPath::from(["a"]), &KeyPath::default())
            .unwrap();
        let err = registry
            .register_table_path(&KeyPath::from(["a", "b"]), false)
            .unwrap_err();
        assert_eq!(err.to_string(), "key `a` is already used as pair key");

        let mut registry = KeyRegistry::new();
        registry.register_table_path(&KeyPath::from(["a"]), false).unwrap();
        let err = registry
            .register_table_path(&KeyPath::from(["a"]), false)
            .unwrap_err();
        assert_eq!(err.to_string(), "key `a` is already used");
    }

    #[test]
    fn implied_table_is_declared_once() {
        let mut registry = KeyRegistry::new();
        registry
            .register_table_path(&KeyPath::from(["x", "a", "b"]), false)
            .unwrap();
        let implied = KeyPath::from(["x", "a"]);
        assert!(!registry.get(&implied).unwrap().is_declared());

        registry.register_table_path(&implied, false).unwrap();
        assert!(registry.get(&implied).unwrap().is_declared());
        let rule = rule_of(registry.register_table_path(&implied, false));
        assert_eq!(rule, ConflictRule::TableRedeclared);
    }

    #[test]
    fn array_element_starts_fresh_scope() {
        let mut registry = KeyRegistry::new();
        let products = KeyPath::from(["products"]);
        let name = KeyPath::from(["name"]);

        registry.register_table_path(&products, true).unwrap();
        registry.register_pair_path(&name, &products).unwrap();
        assert!(registry.register_pair_path(&name, &products).is_err());

        registry.register_table_path(&products, true).unwrap();
        registry.register_pair_path(&name, &products).unwrap();
        assert!(registry.is_array_of_tables(&products));
        assert!(!registry.get(&products).unwrap().is_declared());
    }

    #[test]
    fn nested_arrays_are_forgotten_with_their_element() {
        let mut registry = KeyRegistry::new();
        let outer = KeyPath::from(["a"]);
        let inner = KeyPath::from(["a", "b"]);

        registry.register_table_path(&outer, true).unwrap();
        registry.register_table_path(&inner, true).unwrap();
        assert!(registry.is_array_of_tables(&inner));

        registry.register_table_path(&outer, true).unwrap();
        assert!(!registry.is_array_of_tables(&inner));
        registry.register_table_path(&inner, false).unwrap();
    }

    #[test]
    fn array_of_tables_cannot_become_plain_table() {
        let mut registry = KeyRegistry::new();
        let path = KeyPath::from(["fruit", "variety"]);
        registry.register_table_path(&path, true).unwrap();
        let err = registry.register_table_path(&path, false).unwrap_err();
        assert!(err.is_key_conflict());
        assert!(matches!(err, BuildError::ArrayOfTablesRedeclared { .. }));
    }

    #[test]
    fn header_cannot_run_through_a_pair_value() {
        let mut registry = KeyRegistry::new();
        let t = KeyPath::from(["t"]);
        registry.register_table_path(&t, false).unwrap();
        registry.register_pair_path(&KeyPath::from(["x"]), &t).unwrap();

        let pair = registry.get(&KeyPath::from(["t", "x"])).unwrap();
        assert_eq!(pair.identifier(), "x");
        assert_eq!(pair.kind(), KeyKind::Pair);

        for is_array_of_tables in [false, true] {
            let err = registry
                .register_table_path(&KeyPath::from(["t", "x", "y"]), is_array_of_tables)
                .unwrap_err();
            assert_eq!(err.to_string(), "key `t.x` is already used as pair key");
        }
        let err = registry
            .register_table_path(&KeyPath::from(["t", "x"]), true)
            .unwrap_err();
        assert_eq!(rule_of(Err(err)), ConflictRule::KindMismatch);
    }
}
