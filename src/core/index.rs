//! Purpose: Decode compound row indexes from raw sub-identifiers and derive row keys.
//! Exports: `decode_index`, `IndexDecode`, `IndexFault`, `RowKey`.
//! Role: Pure codec between the walker's flat leaf identifiers and typed index values.
//! Invariants: Columns are consumed strictly in declared order; leftovers are ignored.
//! Invariants: Only the last remaining column of an implied table skips the length prefix.
//! Invariants: A fault stops decoding for that row; values decoded before it are kept.
use crate::core::schema::{ColumnNode, IndexEncoding};
use crate::core::value::{Format, RawValue, Value};
use serde::Serialize;
use std::fmt;

/// Why a row index could not be fully decoded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "fault", rename_all = "kebab-case")]
pub enum IndexFault {
    /// No sub-identifier left where a value or length prefix was required.
    MissingData { column: String },
    /// A length prefix larger than what remains in the identifier.
    LengthExceedsData {
        column: String,
        declared: u32,
        available: usize,
    },
    /// An octet element above 255.
    ElementTooWide { column: String, value: u32 },
}

impl IndexFault {
    pub fn column(&self) -> &str {
        match self {
            IndexFault::MissingData { column }
            | IndexFault::LengthExceedsData { column, .. }
            | IndexFault::ElementTooWide { column, .. } => column,
        }
    }
}

impl fmt::Display for IndexFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexFault::MissingData { column } => {
                write!(f, "index column {column}: identifier ended early")
            }
            IndexFault::LengthExceedsData {
                column,
                declared,
                available,
            } => write!(
                f,
                "index column {column}: length {declared} exceeds {available} remaining sub-identifiers"
            ),
            IndexFault::ElementTooWide { column, value } => {
                write!(f, "index column {column}: element {value} does not fit an octet")
            }
        }
    }
}

/// Outcome of decoding one row's index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexDecode {
    pub values: Vec<Value>,
    pub fault: Option<IndexFault>,
}

/// Decodes the index columns after the first `fixed` from `parts`.
///
/// `parts` is the identifier suffix following the walk root (column oid plus the
/// caller's fixed index prefix). Each remaining column is formatted with `format`.
pub fn decode_index(
    index: &[ColumnNode],
    fixed: usize,
    parts: &[u32],
    implied: bool,
    format: Format,
) -> IndexDecode {
    let remaining = index.get(fixed..).unwrap_or(&[]);
    let mut values = Vec::with_capacity(remaining.len());
    let mut rest = parts;
    for (position, column) in remaining.iter().enumerate() {
        let implied_last = implied && position + 1 == remaining.len();
        match take_value(column, &mut rest, implied_last) {
            Ok(raw) => values.push(column.ty.format(&raw, format)),
            Err(fault) => {
                return IndexDecode {
                    values,
                    fault: Some(fault),
                };
            }
        }
    }
    IndexDecode {
        values,
        fault: None,
    }
}

fn take_value(
    column: &ColumnNode,
    rest: &mut &[u32],
    implied_last: bool,
) -> Result<RawValue, IndexFault> {
    match column.ty.base.index_encoding() {
        IndexEncoding::Scalar => {
            let current: &[u32] = *rest;
            let (first, tail) = current.split_first().ok_or_else(|| IndexFault::MissingData {
                column: column.name.clone(),
            })?;
            *rest = tail;
            Ok(column.ty.raw_from_sub_id(*first))
        }
        IndexEncoding::Bytes => {
            let elements = take_variable(column, rest, implied_last)?;
            let bytes = elements
                .iter()
                .map(|element| {
                    u8::try_from(*element).map_err(|_| IndexFault::ElementTooWide {
                        column: column.name.clone(),
                        value: *element,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RawValue::OctetString(bytes))
        }
        IndexEncoding::Identifier => {
            let elements = take_variable(column, rest, implied_last)?;
            Ok(RawValue::ObjectIdentifier(elements.into()))
        }
    }
}

/// Splits off one variable-length element: everything when implied, else a
/// length prefix followed by that many sub-identifiers.
fn take_variable<'a>(
    column: &ColumnNode,
    rest: &mut &'a [u32],
    implied_last: bool,
) -> Result<&'a [u32], IndexFault> {
    if implied_last {
        let all = *rest;
        *rest = &[];
        return Ok(all);
    }
    let current: &'a [u32] = *rest;
    let (len, tail) = current.split_first().ok_or_else(|| IndexFault::MissingData {
        column: column.name.clone(),
    })?;
    let len_usize = *len as usize;
    if len_usize > tail.len() {
        return Err(IndexFault::LengthExceedsData {
            column: column.name.clone(),
            declared: *len,
            available: tail.len(),
        });
    }
    let (value, after) = tail.split_at(len_usize);
    *rest = after;
    Ok(value)
}

/// Byte-stable key for a row's raw index sub-identifiers.
///
/// Each sub-identifier is packed as four big-endian bytes, so equal sequences give
/// equal keys and key order matches identifier order.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RowKey(Vec<u8>);

impl RowKey {
    pub fn from_parts(parts: &[u32]) -> Self {
        let mut bytes = Vec::with_capacity(parts.len() * 4);
        for part in parts {
            bytes.extend_from_slice(&part.to_be_bytes());
        }
        Self(bytes)
    }

    pub fn parts(&self) -> Vec<u32> {
        self.0
            .chunks_exact(4)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .parts()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&parts)
    }
}

impl Serialize for RowKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexFault, RowKey, decode_index};
    use crate::core::oid::Oid;
    use crate::core::schema::{BaseType, ColumnNode, IndexValue, TableNode, Type};
    use crate::core::value::{Format, RawValue};
    use std::collections::HashSet;

    fn column(name: &str, sub: u32, base: BaseType) -> ColumnNode {
        ColumnNode::new(name, Oid::from_slice(&[1, 3, 6, 1, 4, 1, 99, 1, sub]), Type::new(base), "t")
    }

    fn raws(decoded: &super::IndexDecode) -> Vec<RawValue> {
        decoded.values.iter().map(|value| value.raw.clone()).collect()
    }

    #[test]
    fn implied_octet_tail_takes_remainder() {
        let index = [
            column("id", 1, BaseType::Integer32),
            column("name", 2, BaseType::OctetString),
        ];
        let decoded = decode_index(&index, 0, &[1, 72, 101, 121], true, Format::ALL);
        assert_eq!(decoded.fault, None);
        assert_eq!(
            raws(&decoded),
            vec![RawValue::Integer(1), RawValue::OctetString(b"Hey".to_vec())]
        );
        assert_eq!(decoded.values[1].text(), "Hey");
    }

    #[test]
    fn non_implied_tail_is_length_prefixed() {
        let index = [
            column("name", 1, BaseType::OctetString),
            column("oid", 2, BaseType::ObjectIdentifier),
        ];
        let parts = [2, 97, 98, 3, 1, 3, 6, 99];
        let decoded = decode_index(&index, 0, &parts, false, Format::NONE);
        assert_eq!(decoded.fault, None);
        assert_eq!(
            raws(&decoded),
            vec![
                RawValue::OctetString(b"ab".to_vec()),
                RawValue::ObjectIdentifier(Oid::from_slice(&[1, 3, 6])),
            ]
        );
    }

    #[test]
    fn scalar_consumes_exactly_one_sub_id() {
        let index = [
            column("a", 1, BaseType::Unsigned32),
            column("b", 2, BaseType::Integer32),
        ];
        let decoded = decode_index(&index, 0, &[u32::MAX, 0, 42], false, Format::NONE);
        assert_eq!(
            raws(&decoded),
            vec![RawValue::Unsigned(u64::from(u32::MAX)), RawValue::Integer(0)]
        );
    }

    #[test]
    fn fixed_prefix_skips_leading_columns() {
        let index = [
            column("a", 1, BaseType::Integer32),
            column("b", 2, BaseType::Integer32),
            column("c", 3, BaseType::OctetString),
        ];
        let decoded = decode_index(&index, 1, &[5, 1, 120], false, Format::NONE);
        assert_eq!(
            raws(&decoded),
            vec![RawValue::Integer(5), RawValue::OctetString(b"x".to_vec())]
        );
        let all_fixed = decode_index(&index, 3, &[], false, Format::NONE);
        assert!(all_fixed.values.is_empty());
        assert_eq!(all_fixed.fault, None);
    }

    #[test]
    fn oversized_length_prefix_faults_without_panicking() {
        let index = [
            column("a", 1, BaseType::Integer32),
            column("name", 2, BaseType::OctetString),
            column("c", 3, BaseType::Integer32),
        ];
        let decoded = decode_index(&index, 0, &[7, 9, 1, 2], true, Format::NONE);
        assert_eq!(raws(&decoded), vec![RawValue::Integer(7)]);
        assert_eq!(
            decoded.fault,
            Some(IndexFault::LengthExceedsData {
                column: "name".to_string(),
                declared: 9,
                available: 2,
            })
        );
    }

    #[test]
    fn wide_octet_element_faults() {
        let index = [column("name", 1, BaseType::OctetString)];
        let decoded = decode_index(&index, 0, &[2, 65, 300], false, Format::NONE);
        assert!(decoded.values.is_empty());
        let fault = decoded.fault.expect("fault");
        assert_eq!(fault.column(), "name");
        assert!(matches!(fault, IndexFault::ElementTooWide { value: 300, .. }));
    }

    #[test]
    fn missing_data_faults() {
        let index = [
            column("a", 1, BaseType::Integer32),
            column("b", 2, BaseType::Integer32),
        ];
        let decoded = decode_index(&index, 0, &[1], false, Format::NONE);
        assert_eq!(raws(&decoded), vec![RawValue::Integer(1)]);
        assert!(matches!(decoded.fault, Some(IndexFault::MissingData { .. })));
    }

    #[test]
    fn trailing_sub_ids_are_ignored() {
        let index = [column("a", 1, BaseType::Integer32)];
        let decoded = decode_index(&index, 0, &[3, 4, 5], false, Format::NONE);
        assert_eq!(decoded.fault, None);
        assert_eq!(raws(&decoded), vec![RawValue::Integer(3)]);
    }

    #[test]
    fn encode_then_decode_reproduces_values() {
        for implied in [false, true] {
            let index = vec![
                column("id", 1, BaseType::Unsigned32),
                column("addr", 2, BaseType::ObjectIdentifier),
                column("name", 3, BaseType::OctetString),
            ];
            let table =
                TableNode::new("t", Oid::from_slice(&[1]), index.clone(), index.clone(), implied)
                    .expect("table");
            let values = [
                IndexValue::from(17u32),
                IndexValue::from(Oid::from_slice(&[1, 3, 6, 1])),
                IndexValue::from("eth0"),
            ];
            let parts = table.build_index(&values).expect("encode");
            let decoded = decode_index(&index, 0, &parts, implied, Format::NONE);
            assert_eq!(decoded.fault, None);
            assert_eq!(
                raws(&decoded),
                vec![
                    RawValue::Unsigned(17),
                    RawValue::ObjectIdentifier(Oid::from_slice(&[1, 3, 6, 1])),
                    RawValue::OctetString(b"eth0".to_vec()),
                ]
            );
        }
    }

    #[test]
    fn bits_and_oid_tail_round_trip_with_and_without_implied() {
        let index = vec![
            column("slot", 1, BaseType::Integer32),
            column("flags", 2, BaseType::Bits),
            column("path", 3, BaseType::ObjectIdentifier),
        ];
        let values = [
            IndexValue::from(5),
            IndexValue::from(vec![160u8, 1]),
            IndexValue::from(Oid::from_slice(&[1, 3, 6])),
        ];
        for (implied, expected) in [
            (false, vec![5, 2, 160, 1, 3, 1, 3, 6]),
            (true, vec![5, 2, 160, 1, 1, 3, 6]),
        ] {
            let table = TableNode::new("t", Oid::from_slice(&[1]), index.clone(), index.clone(), implied)
                .expect("table");
            let parts = table.build_index(&values).expect("encode");
            assert_eq!(parts, expected, "implied={implied}");
            let decoded = decode_index(&index, 0, &parts, implied, Format::NONE);
            assert_eq!(decoded.fault, None, "implied={implied}");
            assert_eq!(
                raws(&decoded),
                vec![
                    RawValue::Integer(5),
                    RawValue::OctetString(vec![160, 1]),
                    RawValue::ObjectIdentifier(Oid::from_slice(&[1, 3, 6])),
                ]
            );
        }
    }

    #[test]
    fn enumeration_and_bits_index_render_names() {
        let status = ColumnNode::new(
            "status",
            Oid::from_slice(&[1, 3, 6, 1, 4, 1, 99, 1, 1]),
            Type::new(BaseType::Enumeration)
                .with_named_number("up", 1)
                .with_named_number("down", 2),
            "t",
        );
        let flags = ColumnNode::new(
            "flags",
            Oid::from_slice(&[1, 3, 6, 1, 4, 1, 99, 1, 2]),
            Type::new(BaseType::Bits)
                .with_named_number("a", 0)
                .with_named_number("c", 2),
            "t",
        );
        let index = vec![status, flags];
        let table = TableNode::new("t", Oid::from_slice(&[1]), index.clone(), index.clone(), true)
            .expect("table");
        let parts = table
            .build_index(&[IndexValue::from(2), IndexValue::from(vec![0b1010_0000u8])])
            .expect("encode");
        assert_eq!(parts, vec![2, 160]);
        let decoded = decode_index(&index, 0, &parts, true, Format::ALL);
        assert_eq!(decoded.fault, None);
        assert_eq!(decoded.values[0].raw, RawValue::Integer(2));
        assert_eq!(decoded.values[0].text(), "down(2)");
        assert_eq!(decoded.values[1].text(), "a(0) c(2)");
    }

    #[test]
    fn row_key_is_injective_for_short_sequences() {
        let alphabet = [0u32, 1, 255, 256, u32::MAX];
        let mut sequences: Vec<Vec<u32>> = vec![Vec::new()];
        let mut frontier: Vec<Vec<u32>> = vec![Vec::new()];
        for _ in 0..3 {
            frontier = frontier
                .iter()
                .flat_map(|seq| {
                    alphabet.iter().map(move |sub| {
                        let mut longer = seq.clone();
                        longer.push(*sub);
                        longer
                    })
                })
                .collect();
            sequences.extend(frontier.iter().cloned());
        }
        assert_eq!(sequences.len(), 156);

        let mut seen = HashSet::new();
        for seq in &sequences {
            let key = RowKey::from_parts(seq);
            assert_eq!(&key.parts(), seq);
            assert!(seen.insert(key), "collision for {seq:?}");
        }
    }

    #[test]
    fn row_key_order_and_display() {
        let a = RowKey::from_parts(&[1, 2]);
        let b = RowKey::from_parts(&[1, 10]);
        let c = RowKey::from_parts(&[2]);
        assert!(a < b && b < c);
        assert_eq!(b.to_string(), "1.10");
    }
}
