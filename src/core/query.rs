//! Purpose: Flat batches of named object reads executed in one round trip.
//! Exports: `Query`, `QueryItem`, `read_batch`.
//! Role: Builder for scalar/column reads; also backs the fully-specified table row path.
//! Invariants: Building never touches the network; an empty batch is rejected before sending.
//! Invariants: Response values map back to items by position; duplicate names keep the last.
use crate::core::error::{Error, ErrorKind};
use crate::core::oid::Oid;
use crate::core::schema::{ColumnNode, ScalarNode, Type, ValueFormatter};
use crate::core::transport::{LeafKind, Transport};
use crate::core::value::{Format, Value, resolve_format};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct QueryItem {
    pub name: String,
    pub oid: Oid,
    pub formatter: ValueFormatter,
}

#[derive(Clone, Debug, Default)]
pub struct Query {
    pub default_format: Option<Format>,
    items: Vec<QueryItem>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_format(mut self, format: Format) -> Self {
        self.default_format = Some(format);
        self
    }

    pub fn items(&self) -> &[QueryItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, name: impl Into<String>, ty: &Type, oid: Oid, format: Option<Format>) {
        let format = resolve_format(format, self.default_format);
        self.items.push(QueryItem {
            name: name.into(),
            oid,
            formatter: ty.formatter(format),
        });
    }

    pub fn column(&mut self, node: &ColumnNode, index: &[u32], format: Option<Format>) {
        self.add(node.name.clone(), &node.ty, node.instance_oid(index), format);
    }

    pub fn named_column(
        &mut self,
        name: impl Into<String>,
        node: &ColumnNode,
        index: &[u32],
        format: Option<Format>,
    ) {
        self.add(name, &node.ty, node.instance_oid(index), format);
    }

    pub fn scalar(&mut self, node: &ScalarNode, format: Option<Format>) {
        self.add(node.name.clone(), &node.ty, node.instance_oid(), format);
    }

    pub fn named_scalar(&mut self, name: impl Into<String>, node: &ScalarNode, format: Option<Format>) {
        self.add(name, &node.ty, node.instance_oid(), format);
    }
}

/// Sends every item of `query` in one request and formats the answers by name.
///
/// Any exception leaf fails the whole batch.
pub fn read_batch<T: Transport + ?Sized>(
    transport: &mut T,
    query: &Query,
) -> Result<BTreeMap<String, Value>, Error> {
    if query.is_empty() {
        return Err(Error::usage("no items in query"));
    }
    let oids: Vec<Oid> = query.items.iter().map(|item| item.oid.clone()).collect();
    tracing::debug!(items = oids.len(), "batch read");
    let leaves = transport.get(&oids)?;
    if leaves.len() != query.items.len() {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "response carried {} values for {} requested",
            leaves.len(),
            query.items.len()
        )));
    }

    let mut results = BTreeMap::new();
    for (item, leaf) in query.items.iter().zip(&leaves) {
        match leaf.kind {
            LeafKind::Value => {
                results.insert(item.name.clone(), item.formatter.format(&leaf.value));
            }
            LeafKind::NoSuchObject | LeafKind::NoSuchInstance | LeafKind::EndOfMibView => {
                return Err(Error::new(ErrorKind::NotFound)
                    .with_message(format!("{:?} for {}", leaf.kind, item.name))
                    .with_column(item.name.clone())
                    .with_oid(item.oid.clone()));
            }
        }
    }
    Ok(results)
}
