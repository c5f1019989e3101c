//! Construction options.

use crate::key::KeyRepresentation;

/// Options fixed for the lifetime of one document.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Representation of keys in the finished tree.
    pub key_representation: KeyRepresentation,
    /// Name reported in script error locations.
    pub filename: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use interned symbols for keys in the finished tree.
    pub fn symbolic_keys(mut self) -> Self {
        self.key_representation = KeyRepresentation::Symbolic;
        self
    }

    /// Set the key representation.
    pub fn with_key_representation(mut self, representation: KeyRepresentation) -> Self {
        self.key_representation = representation;
        self
    }

    /// Set the filename used in error locations.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}
