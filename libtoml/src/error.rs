//! Error types for TOML document construction.

use std::fmt;

use thiserror::Error;

use crate::registry::{ConflictRule, KeyKind};
use crate::stack::CompositeKind;

/// Result type for document construction.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Script context carrying the filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ScriptContext {
    pub filename: Option<String>,
}

impl ScriptContext {
    /// Create a new script context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Format a location suffix for error messages.
    pub fn loc_suffix(&self, line: usize) -> String {
        match &self.filename {
            Some(name) => format!(" at line {} of <{}>", line, name),
            None => format!(" at line {}", line),
        }
    }

    /// Format the suffix used for errors raised once the script is exhausted.
    pub fn end_suffix(&self) -> String {
        match &self.filename {
            Some(name) => format!(" at end of <{}>", name),
            None => " at end of script".to_string(),
        }
    }
}

/// A declaration that violates the key-uniqueness rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConflict {
    /// Dotted path of the offending key, as displayed.
    pub key: String,
    /// Kind of the node already registered at that key.
    pub existing: KeyKind,
    /// Kind of the declaration that was refused.
    pub incoming: KeyKind,
    /// The registry rule that refused it.
    pub rule: ConflictRule,
}

impl fmt::Display for KeyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            ConflictRule::TableRedeclared | ConflictRule::PairRedeclared => {
                write!(f, "key `{}` is already used", self.key)
            }
            ConflictRule::KindMismatch
            | ConflictRule::TableOverDottedKey
            | ConflictRule::PairExtended => {
                write!(f, "key `{}` is already used as {} key", self.key, self.existing)
            }
            ConflictRule::ImpliedKeyFinalized => {
                write!(f, "key `{}` is already used as {} key", self.key, self.incoming)
            }
        }
    }
}

impl std::error::Error for KeyConflict {}

/// Error raised while building a document. Every variant is fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// A declaration clashes with an earlier one.
    #[error("{0}")]
    KeyConflict(#[from] KeyConflict),

    /// A plain table header names a path declared as an array of tables.
    #[error("cannot define table `{key}` with the same name as an array of tables")]
    ArrayOfTablesRedeclared { key: String },

    /// A pair would be written through a value that is not a table.
    #[error("cannot overwrite value with key `{key}`")]
    Overwrite { key: String },

    /// A composite was closed without a matching open marker.
    #[error("no open {expected} to close{}", found_suffix(.found))]
    UnclosedComposite {
        expected: CompositeKind,
        found: Option<CompositeKind>,
    },

    /// A composite was still open when the document ended.
    #[error("unterminated {kind}")]
    UnterminatedComposite { kind: CompositeKind },

    /// A header disagrees with the table/array shape already in the tree.
    #[error("cannot use key `{key}` for both table and array of tables")]
    ArrayTableTypeConflict { key: String },

    /// A pair or inline key found nothing to consume.
    #[error("no value to assign to key `{key}`")]
    MissingValue { key: String },

    /// A key appeared where no inline table expects one.
    #[error("key `{key}` is not inside an inline table")]
    StrayKey { key: String },

    /// An inline table received a value with no key before it.
    #[error("inline table value without a key")]
    UnkeyedValue,

    /// Values were pushed but never consumed.
    #[error("{count} value(s) pushed but never assigned")]
    DanglingValue { count: usize },

    /// A header or key with no segments.
    #[error("empty key path")]
    EmptyKeyPath,
}

impl BuildError {
    /// Returns `true` for the key-uniqueness violations.
    pub fn is_key_conflict(&self) -> bool {
        matches!(
            self,
            BuildError::KeyConflict(_) | BuildError::ArrayOfTablesRedeclared { .. }
        )
    }

    /// Returns the conflict details when this is a [`BuildError::KeyConflict`].
    pub fn as_key_conflict(&self) -> Option<&KeyConflict> {
        match self {
            BuildError::KeyConflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

fn found_suffix(found: &Option<CompositeKind>) -> String {
    match found {
        Some(kind) => format!(" (innermost open composite is {})", kind),
        None => String::new(),
    }
}

/// Error raised while reading or replaying an event script.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// A line that is not a well-formed event.
    #[error("{message}{suffix}")]
    Syntax { message: String, suffix: String },

    /// A well-formed event that the builder refused.
    #[error("{source}{suffix}")]
    Build { source: BuildError, suffix: String },
}

impl ScriptError {
    /// The underlying build error, if the script itself was well formed.
    pub fn build_error(&self) -> Option<&BuildError> {
        match self {
            ScriptError::Build { source, .. } => Some(source),
            ScriptError::Syntax { .. } => None,
        }
    }
}
