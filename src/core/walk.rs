//! Purpose: Materialize table rows from one subtree walk per requested column.
//! Exports: `walk_table`.
//! Role: Orchestrates index encoding, transport walks, index decoding and row accumulation.
//! Invariants: Validation (columns, membership, index prefix) completes before any transport call.
//! Invariants: Columns are walked one after another; any walk error discards all rows.
//! Invariants: Per-row terminal leaves are skipped; a no-such-object leaf fails the column.
use crate::core::error::{Error, ErrorKind};
use crate::core::index::{RowKey, decode_index};
use crate::core::oid::Oid;
use crate::core::query::{Query, read_batch};
use crate::core::schema::IndexValue;
use crate::core::table::{Column, Row, RowAccumulator, Rows, Table};
use crate::core::transport::{Leaf, LeafKind, Transport};

/// Fetches `table`, optionally restricted to rows under the leading `index` values.
///
/// When `index` covers every index column the row is read directly with one batch
/// request instead of walking.
pub fn walk_table<T: Transport + ?Sized>(
    transport: &mut T,
    table: &Table,
    index: &[IndexValue],
) -> Result<Rows, Error> {
    let columns = table.columns();
    if columns.is_empty() {
        return Err(Error::usage("no columns given")
            .with_hint("Add a column to the table or use a table node that declares columns."));
    }
    for column in &columns {
        if !table.node.parent_of(&column.node) {
            return Err(Error::usage(format!(
                "column {} is not in table {}",
                column.node.name,
                table.node.name()
            ))
            .with_column(column.name.clone()));
        }
    }

    if index.len() == table.node.index().len() {
        return single_row(transport, table, &columns, index);
    }

    let prefix = table.node.build_index(index)?;
    let mut rows = RowAccumulator::new();
    for column in &columns {
        let root = column.node.oid.concat(&prefix);
        walk_column(transport, table, column, index.len(), &root, &mut rows)?;
    }
    tracing::debug!(
        table = table.node.name(),
        columns = columns.len(),
        rows = rows.len(),
        "table walk finished"
    );
    Ok(rows.into_rows())
}

fn single_row<T: Transport + ?Sized>(
    transport: &mut T,
    table: &Table,
    columns: &[Column],
    index: &[IndexValue],
) -> Result<Rows, Error> {
    let parts = table.node.build_index(index)?;
    let mut query = Query::new();
    for column in columns {
        query.named_column(column.name.clone(), &column.node, &parts, Some(column.format));
    }
    let values = read_batch(transport, &query)?;

    let decoded = decode_index(
        table.node.index(),
        0,
        &parts,
        table.node.implied(),
        table.index_format,
    );
    let row = Row {
        index: decoded.values,
        values,
        index_fault: decoded.fault,
    };
    Ok(Rows::from([(RowKey::from_parts(&parts), row)]))
}

fn walk_column<T: Transport + ?Sized>(
    transport: &mut T,
    table: &Table,
    column: &Column,
    fixed: usize,
    root: &Oid,
    rows: &mut RowAccumulator,
) -> Result<(), Error> {
    tracing::debug!(column = %column.name, root = %root, "walking column");
    let mut leaves = 0usize;
    {
        let mut visit = |leaf: &Leaf| -> Result<(), Error> {
            match leaf.kind {
                LeafKind::Value => {}
                LeafKind::NoSuchObject => {
                    return Err(Error::new(ErrorKind::NotFound)
                        .with_message(format!("no such object for {}", column.node.name))
                        .with_column(column.name.clone())
                        .with_oid(root.clone()));
                }
                LeafKind::NoSuchInstance | LeafKind::EndOfMibView => {
                    tracing::trace!(oid = %leaf.oid, kind = ?leaf.kind, "skipping terminal leaf");
                    return Ok(());
                }
            }
            if !leaf.oid.starts_with(root) {
                tracing::trace!(oid = %leaf.oid, "leaf outside walk root");
                return Ok(());
            }
            let parts = leaf.oid.suffix_after(root.len());
            let value = column.format_value(&leaf.value);
            rows.record(RowKey::from_parts(parts), &column.name, value, || {
                new_row(table, fixed, parts)
            });
            leaves += 1;
            Ok(())
        };
        transport.walk(root, &mut visit)?;
    }
    tracing::debug!(column = %column.name, leaves, "column walk finished");
    Ok(())
}

fn new_row(table: &Table, fixed: usize, parts: &[u32]) -> Row {
    let decoded = decode_index(
        table.node.index(),
        fixed,
        parts,
        table.node.implied(),
        table.index_format,
    );
    if let Some(fault) = &decoded.fault {
        tracing::warn!(
            table = table.node.name(),
            row = %Oid::from_slice(parts),
            %fault,
            "row index could not be fully decoded"
        );
    }
    Row {
        index: decoded.values,
        values: Default::default(),
        index_fault: decoded.fault,
    }
}

#[cfg(test)]
mod tests {
    use super::walk_table;
    use crate::api::SnapshotTransport;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::index::{IndexFault, RowKey};
    use crate::core::oid::Oid;
    use crate::core::schema::{BaseType, ColumnNode, IndexValue, TableNode, Type};
    use crate::core::table::Table;
    use crate::core::session::SessionConfig;
    use crate::core::transport::{Leaf, LeafKind, Transport};
    use crate::core::value::{Format, RawValue};

    const ENTRY: [u32; 9] = [1, 3, 6, 1, 4, 1, 5000, 1, 1];

    fn demo_node(implied: bool) -> TableNode {
        let entry = Oid::from_slice(&ENTRY);
        let id = ColumnNode::new("demoId", entry.child(1), Type::new(BaseType::Integer32), "demoTable");
        let name = ColumnNode::new("demoName", entry.child(2), Type::new(BaseType::OctetString), "demoTable");
        let status = ColumnNode::new(
            "status",
            entry.child(3),
            Type::new(BaseType::Enumeration).with_named_number("ok", 1),
            "demoTable",
        );
        TableNode::new(
            "demoTable",
            entry.parent().expect("table oid"),
            vec![id.clone(), name.clone(), status],
            vec![id, name],
            implied,
        )
        .expect("table")
    }

    fn leaf(column: u32, index: &[u32], value: RawValue) -> Leaf {
        Leaf::value(Oid::from_slice(&ENTRY).child(column).concat(index), value)
    }

    /// Answers the first walk from a snapshot and times out on every later one.
    struct StallingTransport {
        inner: SnapshotTransport,
        walks: usize,
    }

    impl Transport for StallingTransport {
        fn connect(&mut self, config: &SessionConfig) -> Result<(), Error> {
            self.inner.connect(config)
        }

        fn close(&mut self) -> Result<(), Error> {
            self.inner.close()
        }

        fn get(&mut self, oids: &[Oid]) -> Result<Vec<Leaf>, Error> {
            self.inner.get(oids)
        }

        fn walk(
            &mut self,
            root: &Oid,
            visit: &mut dyn FnMut(&Leaf) -> Result<(), Error>,
        ) -> Result<(), Error> {
            self.walks += 1;
            if self.walks > 1 {
                return Err(Error::new(ErrorKind::Timeout).with_oid(root.clone()));
            }
            self.inner.walk(root, visit)
        }
    }

    fn status_table(node: TableNode) -> Table {
        let status = node.column("status").expect("status").clone();
        let mut table = Table::new(node, Some(Format::ALL));
        table.column(status, None);
        table
    }

    #[test]
    fn implied_index_decodes_remaining_octets() {
        let mut transport = SnapshotTransport::from_leaves(vec![leaf(
            3,
            &[1, 72, 101, 121],
            RawValue::Integer(1),
        )]);
        let table = status_table(demo_node(true));
        let rows = walk_table(&mut transport, &table, &[]).expect("rows");
        let row = &rows[&RowKey::from_parts(&[1, 72, 101, 121])];
        let index: Vec<_> = row.index.iter().map(|value| value.text()).collect();
        assert_eq!(index, vec!["1", "Hey"]);
        assert_eq!(row.values["status"].text(), "ok(1)");
        assert_eq!(transport.walk_count(), 1);
    }

    #[test]
    fn full_index_uses_one_batch_read() {
        let mut transport = SnapshotTransport::from_leaves(vec![
            leaf(3, &[7, 2, 104, 105], RawValue::Integer(1)),
            leaf(3, &[8, 1, 120], RawValue::Integer(1)),
        ]);
        let table = status_table(demo_node(false));
        let rows = walk_table(&mut transport, &table, &[7.into(), "hi".into()]).expect("rows");
        assert_eq!(rows.len(), 1);
        let key = RowKey::from_parts(&[7, 2, 104, 105]);
        assert_eq!(rows[&key].values["status"].text(), "ok(1)");
        assert_eq!(rows[&key].index.len(), 2);
        assert_eq!(transport.get_count(), 1);
        assert_eq!(transport.walk_count(), 0);
    }

    #[test]
    fn full_index_read_is_all_or_nothing() {
        let mut transport = SnapshotTransport::from_leaves(vec![leaf(1, &[7, 1, 97], RawValue::Integer(7))]);
        let table = Table::new(demo_node(false), None);
        let err = walk_table(&mut transport, &table, &[7.into(), "a".into()]).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn partial_index_narrows_walk_and_shortens_row_index() {
        let mut transport = SnapshotTransport::from_leaves(vec![
            leaf(3, &[1, 1, 97], RawValue::Integer(1)),
            leaf(3, &[2, 1, 98], RawValue::Integer(1)),
            leaf(3, &[2, 1, 99], RawValue::Integer(1)),
        ]);
        let table = status_table(demo_node(false));
        let rows = walk_table(&mut transport, &table, &[IndexValue::from(2)]).expect("rows");
        assert_eq!(rows.len(), 2);
        for (key, row) in &rows {
            assert_eq!(row.index.len(), 1, "row {key}");
        }
        assert!(rows.contains_key(&RowKey::from_parts(&[1, 98])));
    }

    #[test]
    fn rows_merge_values_across_column_walks() {
        let mut transport = SnapshotTransport::from_leaves(vec![
            leaf(1, &[1, 1, 97], RawValue::Integer(1)),
            leaf(1, &[2, 1, 98], RawValue::Integer(2)),
            leaf(2, &[1, 1, 97], RawValue::OctetString(b"a".to_vec())),
            leaf(2, &[2, 1, 98], RawValue::OctetString(b"b".to_vec())),
            leaf(3, &[2, 1, 98], RawValue::Integer(1)),
        ]);
        let table = Table::new(demo_node(false), None);
        let rows = walk_table(&mut transport, &table, &[]).expect("rows");
        assert_eq!(transport.walk_count(), 3);
        assert_eq!(rows.len(), 2);
        let first = &rows[&RowKey::from_parts(&[1, 1, 97])];
        assert_eq!(first.values.len(), 2);
        let second = &rows[&RowKey::from_parts(&[2, 1, 98])];
        assert_eq!(second.values.len(), 3);
        assert_eq!(second.values["demoName"].text(), "b");
    }

    #[test]
    fn zero_columns_fail_before_transport() {
        let entry = Oid::from_slice(&ENTRY);
        let id = ColumnNode::new("demoId", entry.child(1), Type::new(BaseType::Integer32), "demoTable");
        let node = TableNode::new("demoTable", entry, Vec::new(), vec![id], false).expect("node");
        let mut transport = SnapshotTransport::from_leaves(Vec::new());
        let err = walk_table(&mut transport, &Table::new(node, None), &[]).expect_err("no columns");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(transport.get_count() + transport.walk_count(), 0);
    }

    #[test]
    fn foreign_column_fails_before_transport() {
        let foreign = ColumnNode::new(
            "ifDescr",
            Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2, 1, 2]),
            Type::new(BaseType::OctetString),
            "ifTable",
        );
        let mut table = status_table(demo_node(false));
        table.column(foreign, None);
        let mut transport = SnapshotTransport::from_leaves(vec![leaf(3, &[1, 1, 97], RawValue::Integer(1))]);
        let err = walk_table(&mut transport, &table, &[]).expect_err("foreign");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().unwrap_or_default().contains("ifDescr"));
        assert_eq!(transport.walk_count(), 0);
    }

    #[test]
    fn no_such_object_names_the_column() {
        let root = Oid::from_slice(&ENTRY).child(3);
        let mut transport =
            SnapshotTransport::from_leaves(vec![Leaf::exception(root.child(1), LeafKind::NoSuchObject)]);
        let table = status_table(demo_node(false));
        let err = walk_table(&mut transport, &table, &[]).expect_err("no such object");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.column(), Some("status"));
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn no_such_instance_skips_only_that_row() {
        let root = Oid::from_slice(&ENTRY).child(3);
        let mut transport = SnapshotTransport::from_leaves(vec![
            leaf(3, &[1, 1, 97], RawValue::Integer(1)),
            Leaf::exception(root.concat(&[2, 1, 98]), LeafKind::NoSuchInstance),
            leaf(3, &[3, 1, 99], RawValue::Integer(1)),
        ]);
        let table = status_table(demo_node(false));
        let rows = walk_table(&mut transport, &table, &[]).expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(!rows.contains_key(&RowKey::from_parts(&[2, 1, 98])));
    }

    #[test]
    fn bad_length_prefix_keeps_partial_row() {
        let mut transport = SnapshotTransport::from_leaves(vec![
            leaf(3, &[4, 9, 97], RawValue::Integer(1)),
            leaf(3, &[5, 1, 98], RawValue::Integer(1)),
        ]);
        let table = status_table(demo_node(false));
        let rows = walk_table(&mut transport, &table, &[]).expect("rows");
        assert_eq!(rows.len(), 2);
        let broken = &rows[&RowKey::from_parts(&[4, 9, 97])];
        assert_eq!(broken.index.len(), 1);
        assert!(matches!(
            broken.index_fault,
            Some(IndexFault::LengthExceedsData { declared: 9, .. })
        ));
        assert_eq!(broken.values["status"].text(), "ok(1)");
        assert_eq!(rows[&RowKey::from_parts(&[5, 1, 98])].index_fault, None);
    }

    #[test]
    fn transport_timeout_mid_table_discards_rows() {
        let mut transport = StallingTransport {
            inner: SnapshotTransport::from_leaves(vec![
                leaf(1, &[1, 1, 97], RawValue::Integer(1)),
                leaf(2, &[1, 1, 97], RawValue::OctetString(b"a".to_vec())),
            ]),
            walks: 0,
        };
        let table = Table::new(demo_node(false), None);
        let err = walk_table(&mut transport, &table, &[]).expect_err("second walk stalls");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.oid(), Some(&Oid::from_slice(&ENTRY).child(2)));
        assert_eq!(transport.walks, 2);
    }
}
