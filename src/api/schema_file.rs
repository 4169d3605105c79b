//! Purpose: Load scalar and table definitions from a JSON schema description.
//! Exports: `Schema`.
//! Role: Stands in for a MIB compiler; produces the typed nodes the engine consumes.
//! Invariants: Index column names resolve against the owning table first, then all tables.
//! Invariants: Unknown index names and duplicate object names are usage errors.
//! Invariants: Object names (scalars and columns of every table) share one namespace.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::oid::Oid;
use crate::core::schema::{BaseType, ColumnNode, NamedNumber, Range, ScalarNode, TableNode, Type};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

type ApiResult<T> = Result<T, Error>;

#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    scalars: Vec<ObjectSpec>,
    #[serde(default)]
    tables: Vec<TableSpec>,
}

#[derive(Deserialize)]
struct ObjectSpec {
    name: String,
    oid: Oid,
    #[serde(rename = "type")]
    ty: TypeSpec,
}

#[derive(Deserialize)]
struct TypeSpec {
    base: BaseType,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    named: Vec<NamedNumber>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    ranges: Vec<Range>,
}

#[derive(Deserialize)]
struct TableSpec {
    name: String,
    oid: Oid,
    index: Vec<String>,
    #[serde(default)]
    implied: bool,
    columns: Vec<ObjectSpec>,
}

impl From<TypeSpec> for Type {
    fn from(spec: TypeSpec) -> Self {
        Type {
            base: spec.base,
            name: spec.name,
            display_hint: spec.hint,
            named_numbers: spec.named,
            units: spec.units,
            ranges: spec.ranges,
        }
    }
}

/// Named scalars and tables available to queries.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    scalars: BTreeMap<String, ScalarNode>,
    tables: BTreeMap<String, TableNode>,
}

impl Schema {
    pub fn load(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            let kind = if err.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to read schema file")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }

    pub fn from_json_str(text: &str) -> ApiResult<Self> {
        let file: SchemaFile = serde_json::from_str(text).map_err(|err| {
            Error::usage("failed to parse schema json").with_source(err)
        })?;

        let mut schema = Schema::default();
        for spec in file.scalars {
            let node = ScalarNode::new(spec.name.clone(), spec.oid, spec.ty.into());
            if schema.scalars.insert(spec.name.clone(), node).is_some() {
                return Err(Error::usage(format!("duplicate scalar {}", spec.name)));
            }
        }

        let mut columns_by_table: BTreeMap<String, Vec<ColumnNode>> = BTreeMap::new();
        let mut column_names = BTreeSet::new();
        let mut pending = Vec::new();
        for spec in file.tables {
            for column in &spec.columns {
                if schema.scalars.contains_key(&column.name)
                    || !column_names.insert(column.name.clone())
                {
                    return Err(Error::usage(format!(
                        "duplicate object {} in table {}",
                        column.name, spec.name
                    ))
                    .with_column(column.name.clone())
                    .with_hint("Object names must be unique across scalars and every table."));
                }
            }
            let columns: Vec<ColumnNode> = spec
                .columns
                .into_iter()
                .map(|column| ColumnNode::new(column.name, column.oid, column.ty.into(), &spec.name))
                .collect();
            if columns_by_table.insert(spec.name.clone(), columns).is_some() {
                return Err(Error::usage(format!("duplicate table {}", spec.name)));
            }
            pending.push((spec.name, spec.oid, spec.index, spec.implied));
        }

        for (name, oid, index_names, implied) in pending {
            let index = index_names
                .iter()
                .map(|index_name| resolve_index_column(&columns_by_table, &name, index_name))
                .collect::<ApiResult<Vec<_>>>()?;
            let columns = columns_by_table.get(&name).cloned().unwrap_or_default();
            let node = TableNode::new(name.clone(), oid, columns, index, implied)?;
            schema.tables.insert(name, node);
        }
        Ok(schema)
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarNode> {
        self.scalars.get(name)
    }

    pub fn table(&self, name: &str) -> Option<&TableNode> {
        self.tables.get(name)
    }

    /// Finds a column by name across every table; names are unique per schema.
    pub fn column(&self, name: &str) -> Option<(&TableNode, &ColumnNode)> {
        self.tables
            .values()
            .find_map(|table| table.column(name).map(|column| (table, column)))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn resolve_index_column(
    columns_by_table: &BTreeMap<String, Vec<ColumnNode>>,
    table: &str,
    index_name: &str,
) -> ApiResult<ColumnNode> {
    let own = columns_by_table
        .get(table)
        .and_then(|columns| columns.iter().find(|column| column.name == index_name));
    let found = own.or_else(|| {
        columns_by_table
            .values()
            .flat_map(|columns| columns.iter())
            .find(|column| column.name == index_name)
    });
    found.cloned().ok_or_else(|| {
        Error::usage(format!("table {table} is indexed by unknown column {index_name}"))
            .with_column(index_name)
    })
}
