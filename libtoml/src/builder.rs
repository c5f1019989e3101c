//! Document construction from structural events.
//!
//! The builder owns two trees that are never merged: the output [`Table`]
//! holding values, and the [`KeyRegistry`] holding declaration bookkeeping.
//! Every mutation of the output is preceded by a registry check, so the
//! output only ever receives legal declarations.
//!
//! The cursor is the path of the current table header. It is resolved from
//! the root whenever a pair is written; array-of-tables steps resolve to the
//! last element, which is always the one the latest header appended.

use tracing::{debug, trace};

use crate::error::{BuildError, Result};
use crate::event::{Event, EventSink};
use crate::key::{KeyFactory, KeyPath};
use crate::options::Options;
use crate::registry::KeyRegistry;
use crate::stack::{CompositeKind, CompositeStack, StackEntry};
use crate::value::{Table, Value};

/// Builds one document from a stream of structural events.
#[derive(Debug)]
pub struct DocumentBuilder {
    root: Table,
    current_table: KeyPath,
    registry: KeyRegistry,
    stack: CompositeStack,
    keys: KeyFactory,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// Create a builder with text keys.
    pub fn new() -> Self {
        Self::with_options(&Options::default())
    }

    pub fn with_options(options: &Options) -> Self {
        Self {
            root: Table::new(),
            current_table: KeyPath::default(),
            registry: KeyRegistry::new(),
            stack: CompositeStack::new(),
            keys: KeyFactory::new(options.key_representation),
        }
    }

    /// Path of the most recent table header.
    pub fn current_table(&self) -> &KeyPath {
        &self.current_table
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Dispatch one event.
    pub fn apply(&mut self, event: Event) -> Result<()> {
        trace!(?event, "apply");
        match event {
            Event::TableHeader {
                path,
                array_of_tables,
            } => self.begin_table(&path, array_of_tables),
            Event::PairKey { path } => self.assign_pair(&path),
            Event::InlineKey { path } => self.push_key(path),
            Event::PushLiteral { value } => {
                self.push_literal(value);
                Ok(())
            }
            Event::OpenComposite { kind } => {
                self.begin_composite(kind);
                Ok(())
            }
            Event::CloseComposite { kind } => self.end_composite(kind),
        }
    }

    /// Handle `[path]` or `[[path]]` and move the cursor there.
    pub fn begin_table(&mut self, path: &KeyPath, is_array_of_tables: bool) -> Result<()> {
        self.ensure_no_open_composite()?;
        self.registry
            .register_table_path(path, is_array_of_tables)?;
        self.current_table = path.clone();

        let last = path.len() - 1;
        let registry = &self.registry;
        let keys = &mut self.keys;
        let mut table = &mut self.root;
        for depth in 0..last {
            table = descend(table, path, depth, registry, keys)?;
        }

        let name = &path.segments()[last];
        if is_array_of_tables {
            let slot = table
                .entry(keys.make(name))
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(Value::Table(Table::new())),
                _ => return Err(array_table_conflict(path)),
            }
        } else {
            match table.get(name.as_str()) {
                None => {
                    table.insert(keys.make(name), Value::Table(Table::new()));
                }
                Some(Value::Table(_)) => {}
                Some(Value::Array(_)) => return Err(array_table_conflict(path)),
                Some(_) => {
                    return Err(BuildError::Overwrite {
                        key: path.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Handle `path = <value>`, consuming the value on top of the stack.
    pub fn assign_pair(&mut self, path: &KeyPath) -> Result<()> {
        self.ensure_no_open_composite()?;
        let value = self
            .stack
            .pop_value()
            .ok_or_else(|| BuildError::MissingValue {
                key: path.to_string(),
            })?;
        self.assign_pair_value(path, value)
    }

    /// Handle `path = <value>` with the value passed in.
    pub fn assign_pair_value(&mut self, path: &KeyPath, value: Value) -> Result<()> {
        self.registry
            .register_pair_path(path, &self.current_table)?;
        let cursor = resolve(&mut self.root, &self.current_table)?;
        insert_dotted(cursor, &self.current_table, path, value, &mut self.keys)
    }

    /// Push a converted scalar or an assembled composite.
    pub fn push_literal(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Push the key of the next inline-table entry.
    pub fn push_key(&mut self, path: KeyPath) -> Result<()> {
        if path.is_empty() {
            return Err(BuildError::EmptyKeyPath);
        }
        if self.stack.innermost() != Some(CompositeKind::InlineTable) {
            return Err(BuildError::StrayKey {
                key: path.to_string(),
            });
        }
        self.stack.push_key(path);
        Ok(())
    }

    pub fn begin_composite(&mut self, kind: CompositeKind) {
        self.stack.open(kind);
    }

    /// Close the innermost composite and push the assembled value back.
    pub fn end_composite(&mut self, kind: CompositeKind) -> Result<()> {
        let entries = self.stack.close(kind)?;
        let value = match kind {
            CompositeKind::Array => collect_array(entries)?,
            CompositeKind::InlineTable => collect_inline_table(entries, &mut self.keys)?,
        };
        self.stack.push(value);
        Ok(())
    }

    /// Return the finished root table.
    pub fn finish(self) -> Result<Value> {
        if let Some(kind) = self.stack.innermost() {
            return Err(BuildError::UnterminatedComposite { kind });
        }
        if !self.stack.is_empty() {
            return Err(BuildError::DanglingValue {
                count: self.stack.len(),
            });
        }
        debug!(keys = self.root.len(), "document complete");
        Ok(Value::Table(self.root))
    }

    fn ensure_no_open_composite(&self) -> Result<()> {
        match self.stack.innermost() {
            Some(kind) => Err(BuildError::UnterminatedComposite { kind }),
            None => Ok(()),
        }
    }
}

impl EventSink for DocumentBuilder {
    fn event(&mut self, event: Event) -> Result<()> {
        self.apply(event)
    }
}

/// Step into the entry for `path[depth]`, creating a table if absent.
///
/// An array of tables resolves to its last element. Any other array is a
/// pair's value and is never entered.
fn descend<'t>(
    table: &'t mut Table,
    path: &KeyPath,
    depth: usize,
    registry: &KeyRegistry,
    keys: &mut KeyFactory,
) -> Result<&'t mut Table> {
    let name = &path.segments()[depth];
    let prefix = path.prefix(depth + 1);
    let slot = table
        .entry(keys.make(name))
        .or_insert_with(|| Value::Table(Table::new()));
    match slot {
        Value::Table(inner) => Ok(inner),
        Value::Array(items) if registry.is_array_of_tables(&prefix) => match items.last_mut() {
            Some(Value::Table(inner)) => Ok(inner),
            _ => Err(array_table_conflict(&prefix)),
        },
        Value::Array(_) => Err(array_table_conflict(&prefix)),
        _ => Err(BuildError::Overwrite {
            key: prefix.to_string(),
        }),
    }
}

/// Find the table the cursor points at.
fn resolve<'t>(root: &'t mut Table, cursor: &KeyPath) -> Result<&'t mut Table> {
    let mut table = root;
    for (depth, name) in cursor.segments().iter().enumerate() {
        let inner = match table.get_mut(name.as_str()) {
            Some(Value::Table(inner)) => Some(inner),
            Some(Value::Array(items)) => match items.last_mut() {
                Some(Value::Table(inner)) => Some(inner),
                _ => None,
            },
            _ => None,
        };
        table = inner.ok_or_else(|| BuildError::Overwrite {
            key: cursor.prefix(depth + 1).to_string(),
        })?;
    }
    Ok(table)
}

/// Write `value` at the dotted `path` below `table`, creating intermediate
/// tables. `context` only decorates error keys.
fn insert_dotted(
    table: &mut Table,
    context: &KeyPath,
    path: &KeyPath,
    value: Value,
    keys: &mut KeyFactory,
) -> Result<()> {
    let last = path.len() - 1;
    let mut table = table;
    for (depth, name) in path.segments()[..last].iter().enumerate() {
        let slot = table
            .entry(keys.make(name))
            .or_insert_with(|| Value::Table(Table::new()));
        table = match slot {
            Value::Table(inner) => inner,
            _ => {
                return Err(BuildError::Overwrite {
                    key: context.join_prefix(path, depth + 1).to_string(),
                })
            }
        };
    }
    table.insert(keys.make(&path.segments()[last]), value);
    Ok(())
}

fn collect_array(entries: Vec<StackEntry>) -> Result<Value> {
    entries
        .into_iter()
        .map(|entry| match entry {
            StackEntry::Value(value) => Ok(value),
            StackEntry::Key(path) => Err(BuildError::StrayKey {
                key: path.to_string(),
            }),
            StackEntry::Marker(kind) => Err(BuildError::UnterminatedComposite { kind }),
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

/// Pair up interleaved keys and values into a table.
///
/// Keys are checked against a registry local to this literal, so the pair
/// rules hold inside it exactly as they do in the document.
fn collect_inline_table(entries: Vec<StackEntry>, keys: &mut KeyFactory) -> Result<Value> {
    let mut registry = KeyRegistry::new();
    let context = KeyPath::default();
    let mut table = Table::new();

    let mut entries = entries.into_iter().peekable();
    while let Some(entry) = entries.next() {
        let path = match entry {
            StackEntry::Key(path) => path,
            StackEntry::Value(_) => return Err(BuildError::UnkeyedValue),
            StackEntry::Marker(kind) => return Err(BuildError::UnterminatedComposite { kind }),
        };
        let value = match entries.next_if(|next| matches!(next, StackEntry::Value(_))) {
            Some(StackEntry::Value(value)) => value,
            _ => {
                return Err(BuildError::MissingValue {
                    key: path.to_string(),
                })
            }
        };
        registry.register_pair_path(&path, &context)?;
        insert_dotted(&mut table, &context, &path, value, keys)?;
    }
    Ok(Value::Table(table))
}

fn array_table_conflict(path: &KeyPath) -> BuildError {
    debug!(key = %path, "table and array of tables clash");
    BuildError::ArrayTableTypeConflict {
        key: path.to_string(),
    }
}
