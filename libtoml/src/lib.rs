//! Semantic document construction for TOML.
//!
//! A TOML grammar recognizes table headers, key/value pairs, and composite
//! literals; this crate decides whether the declarations it recognized are
//! legal together and builds the document tree from them.
//!
//! # Construction Pipeline
//!
//! 1. **Events**: the grammar driver reports each matched production as an
//!    [`Event`], in document order.
//!
//! 2. **Key registry**: before anything is written, every table header and
//!    pair key is registered in a [`KeyRegistry`], a shadow tree of declared
//!    paths that enforces the key-uniqueness rules.
//!
//! 3. **Document builder**: the [`DocumentBuilder`] moves its cursor on table
//!    headers, assembles inline arrays and inline tables on a
//!    [`CompositeStack`], and writes pairs into the output tree.
//!
//! The first error aborts construction; there is no partial result.
//!
//! # Example
//!
//! ```
//! use libtoml::{build_events, Event, Options};
//!
//! let doc = build_events(
//!     [
//!         Event::table(["fruit"]),
//!         Event::literal("apple"),
//!         Event::pair(["name"]),
//!     ],
//!     &Options::default(),
//! )
//! .unwrap();
//! assert_eq!(doc.get_path(["fruit", "name"]).and_then(|v| v.as_str()), Some("apple"));
//! ```

mod builder;
mod error;
mod event;
mod key;
mod options;
mod registry;
pub mod script;
mod stack;
mod value;

pub use builder::DocumentBuilder;
pub use error::{BuildError, KeyConflict, Result, ScriptContext, ScriptError};
pub use event::{Event, EventSink};
pub use key::{Key, KeyPath, KeyRepresentation, Symbol};
pub use options::Options;
pub use registry::{ConflictRule, KeyKind, KeyNode, KeyRegistry};
pub use stack::{CompositeKind, CompositeStack, StackEntry};
pub use value::{Table, Value};

/// Build a document from a complete event stream.
pub fn build_events<I>(events: I, options: &Options) -> Result<Value>
where
    I: IntoIterator<Item = Event>,
{
    let mut builder = DocumentBuilder::with_options(options);
    for event in events {
        builder.event(event)?;
    }
    builder.finish()
}

/// Replay an event script with default options.
pub fn replay_script(input: &str) -> std::result::Result<Value, ScriptError> {
    script::replay(input, &Options::default())
}

/// Replay an event script with the given options.
pub fn replay_script_with_options(
    input: &str,
    options: &Options,
) -> std::result::Result<Value, ScriptError> {
    script::replay(input, options)
}
