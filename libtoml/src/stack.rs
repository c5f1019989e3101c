//! Value accumulation for composite literals.
//!
//! Inline arrays and inline tables are assembled bottom-up on one stack.
//! Opening a composite pushes a marker tagged with its kind; closing pops
//! everything above the marker and hands it back in push order.

use std::fmt;

use crate::error::{BuildError, Result};
use crate::key::KeyPath;
use crate::value::Value;

/// The two kinds of composite literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeKind {
    /// `[ ... ]`
    Array,
    /// `{ ... }`
    InlineTable,
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeKind::Array => f.write_str("array"),
            CompositeKind::InlineTable => f.write_str("inline table"),
        }
    }
}

/// One entry on the stack.
#[derive(Clone, Debug, PartialEq)]
pub enum StackEntry {
    /// Start of an open composite.
    Marker(CompositeKind),
    /// Key of an inline-table entry, awaiting its value.
    Key(KeyPath),
    /// A converted scalar or an assembled composite.
    Value(Value),
}

#[derive(Debug, Default)]
pub struct CompositeStack {
    entries: Vec<StackEntry>,
    open: Vec<CompositeKind>,
}

impl CompositeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.entries.push(StackEntry::Value(value));
    }

    pub fn push_key(&mut self, path: KeyPath) {
        self.entries.push(StackEntry::Key(path));
    }

    /// Pop the top value. Markers and keys are left in place.
    pub fn pop_value(&mut self) -> Option<Value> {
        match self.entries.last() {
            Some(StackEntry::Value(_)) => match self.entries.pop() {
                Some(StackEntry::Value(value)) => Some(value),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn open(&mut self, kind: CompositeKind) {
        self.entries.push(StackEntry::Marker(kind));
        self.open.push(kind);
    }

    /// Pop down to the innermost marker, which must be of `kind`.
    ///
    /// Returns the entries above the marker in push order.
    pub fn close(&mut self, kind: CompositeKind) -> Result<Vec<StackEntry>> {
        match self.open.last() {
            Some(&innermost) if innermost == kind => {}
            innermost => {
                return Err(BuildError::UnclosedComposite {
                    expected: kind,
                    found: innermost.copied(),
                })
            }
        }

        let mut collected = Vec::new();
        loop {
            match self.entries.pop() {
                Some(StackEntry::Marker(_)) => break,
                Some(entry) => collected.push(entry),
                None => {
                    return Err(BuildError::UnclosedComposite {
                        expected: kind,
                        found: None,
                    })
                }
            }
        }
        self.open.pop();
        collected.reverse();
        Ok(collected)
    }

    /// Kind of the innermost open composite.
    pub fn innermost(&self) -> Option<CompositeKind> {
        self.open.last().copied()
    }

    /// Number of open composites.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
