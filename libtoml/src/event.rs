//! Structural events consumed by the document builder.

use crate::error::Result;
use crate::key::KeyPath;
use crate::stack::CompositeKind;
use crate::value::Value;

/// One matched grammar production, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `[path]` or `[[path]]`.
    TableHeader {
        /// Header key path.
        path: KeyPath,
        /// `true` for `[[path]]`.
        array_of_tables: bool,
    },
    /// `path = <value>`; the value is the top of the composite stack.
    PairKey {
        /// Key path, relative to the current table.
        path: KeyPath,
    },
    /// Key of an entry inside an inline table, pushed before its value.
    InlineKey {
        /// Key path, relative to the inline table.
        path: KeyPath,
    },
    /// A converted scalar.
    PushLiteral {
        /// The value.
        value: Value,
    },
    /// `[` or `{` of a composite literal.
    OpenComposite {
        /// Which composite opens.
        kind: CompositeKind,
    },
    /// `]` or `}` of a composite literal.
    CloseComposite {
        /// Which composite closes.
        kind: CompositeKind,
    },
}

impl Event {
    /// `[path]`
    pub fn table(path: impl Into<KeyPath>) -> Self {
        Event::TableHeader {
            path: path.into(),
            array_of_tables: false,
        }
    }

    /// `[[path]]`
    pub fn array_of_tables(path: impl Into<KeyPath>) -> Self {
        Event::TableHeader {
            path: path.into(),
            array_of_tables: true,
        }
    }

    pub fn pair(path: impl Into<KeyPath>) -> Self {
        Event::PairKey { path: path.into() }
    }

    pub fn inline_key(path: impl Into<KeyPath>) -> Self {
        Event::InlineKey { path: path.into() }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Event::PushLiteral {
            value: value.into(),
        }
    }

    pub fn open(kind: CompositeKind) -> Self {
        Event::OpenComposite { kind }
    }

    pub fn close(kind: CompositeKind) -> Self {
        Event::CloseComposite { kind }
    }
}

/// Receiver of structural events.
pub trait EventSink {
    /// Process one event. An error is fatal for the whole document.
    fn event(&mut self, event: Event) -> Result<()>;
}
