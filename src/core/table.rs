//! Purpose: Table descriptors, rows, and the accumulator that correlates column walks.
//! Exports: `Column`, `Table`, `Row`, `RowAccumulator`, `Rows`.
//! Role: Caller-facing description of what to fetch plus the per-key row store.
//! Invariants: Rows are created on the first leaf seen for a key and never re-decoded.
//! Invariants: Correlation uses `RowKey` equality only; formatting never affects it.
use crate::core::index::{IndexFault, RowKey};
use crate::core::schema::{ColumnNode, TableNode};
use crate::core::value::{Format, RawValue, Value, resolve_format};
use serde::Serialize;
use std::collections::BTreeMap;

pub type Rows = BTreeMap<RowKey, Row>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Column {
    pub name: String,
    pub node: ColumnNode,
    pub format: Format,
}

impl Column {
    pub fn format_value(&self, raw: &RawValue) -> Value {
        self.node.ty.format(raw, self.format)
    }
}

#[derive(Clone, Debug)]
pub struct Table {
    pub node: TableNode,
    pub index_format: Format,
    pub column_format: Option<Format>,
    columns: Vec<Column>,
}

impl Table {
    /// Index values render with `index_format`, or raw when none is given.
    pub fn new(node: TableNode, index_format: Option<Format>) -> Self {
        Self {
            node,
            index_format: resolve_format(index_format, Some(Format::NONE)),
            column_format: None,
            columns: Vec::new(),
        }
    }

    pub fn with_column_format(mut self, format: Format) -> Self {
        self.column_format = Some(format);
        self
    }

    pub fn column(&mut self, node: ColumnNode, format: Option<Format>) {
        let name = node.name.clone();
        self.named_column(name, node, format);
    }

    pub fn named_column(&mut self, name: impl Into<String>, node: ColumnNode, format: Option<Format>) {
        self.columns.push(Column {
            name: name.into(),
            node,
            format: resolve_format(format, self.column_format),
        });
    }

    /// Requested columns, or every declared column when none were added.
    pub fn columns(&self) -> Vec<Column> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }
        self.node
            .columns()
            .iter()
            .map(|node| Column {
                name: node.name.clone(),
                node: node.clone(),
                format: resolve_format(None, self.column_format),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    pub index: Vec<Value>,
    pub values: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_fault: Option<IndexFault>,
}

impl Row {
    pub fn new(index: Vec<Value>) -> Self {
        Self {
            index,
            values: BTreeMap::new(),
            index_fault: None,
        }
    }
}

/// Key-to-row map fed one leaf at a time by sequential column walks.
#[derive(Debug, Default)]
pub struct RowAccumulator {
    rows: Rows,
}

impl RowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for `key`, building it with `make` only when the key is new.
    pub fn row_mut(&mut self, key: RowKey, make: impl FnOnce() -> Row) -> &mut Row {
        self.rows.entry(key).or_insert_with(make)
    }

    pub fn record(&mut self, key: RowKey, column: &str, value: Value, make: impl FnOnce() -> Row) {
        self.row_mut(key, make)
            .values
            .insert(column.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Rows {
        self.rows
    }
}
