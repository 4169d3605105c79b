//! Purpose: Typed schema model for scalars, tables and their index columns.
//! Exports: `BaseType`, `IndexEncoding`, `Type`, `NamedNumber`, `Range`, `ValueFormatter`,
//!          `ScalarNode`, `ColumnNode`, `TableNode`, `IndexValue`.
//! Role: Supplies base types, index layouts, value formatting and index encoding to the engine.
//! Invariants: A table's index column order is fixed at construction and drives encode/decode.
//! Invariants: Only the last index column of an implied table skips its length prefix.
use crate::core::error::Error;
use crate::core::format::{render_integer, render_octets};
use crate::core::oid::Oid;
use crate::core::value::{Format, RawValue, Value, hex_string};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseType {
    Integer32,
    Unsigned32,
    Integer64,
    Unsigned64,
    Enumeration,
    OctetString,
    ObjectIdentifier,
    Bits,
}

/// How a base type is laid out inside a row index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexEncoding {
    /// One sub-identifier.
    Scalar,
    /// Length-prefixed octets, each at most 255.
    Bytes,
    /// Length-prefixed sub-identifiers.
    Identifier,
}

impl BaseType {
    pub fn index_encoding(self) -> IndexEncoding {
        match self {
            BaseType::Integer32
            | BaseType::Unsigned32
            | BaseType::Integer64
            | BaseType::Unsigned64
            | BaseType::Enumeration => IndexEncoding::Scalar,
            BaseType::OctetString | BaseType::Bits => IndexEncoding::Bytes,
            BaseType::ObjectIdentifier => IndexEncoding::Identifier,
        }
    }

    fn is_signed(self) -> bool {
        matches!(
            self,
            BaseType::Integer32 | BaseType::Integer64 | BaseType::Enumeration
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NamedNumber {
    pub name: String,
    pub value: i64,
}

/// Inclusive value range; for octet strings it bounds the length.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: i64,
    pub max: i64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Type {
    pub base: BaseType,
    pub name: Option<String>,
    pub display_hint: Option<String>,
    pub named_numbers: Vec<NamedNumber>,
    pub units: Option<String>,
    pub ranges: Vec<Range>,
}

impl Type {
    pub fn new(base: BaseType) -> Self {
        Self {
            base,
            name: None,
            display_hint: None,
            named_numbers: Vec::new(),
            units: None,
            ranges: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_display_hint(mut self, hint: impl Into<String>) -> Self {
        self.display_hint = Some(hint.into());
        self
    }

    pub fn with_named_number(mut self, name: impl Into<String>, value: i64) -> Self {
        self.named_numbers.push(NamedNumber {
            name: name.into(),
            value,
        });
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.ranges.push(Range { min, max });
        self
    }

    /// True when no ranges are declared or `value` falls in one of them.
    pub fn in_range(&self, value: i128) -> bool {
        self.ranges.is_empty()
            || self
                .ranges
                .iter()
                .any(|range| i128::from(range.min) <= value && value <= i128::from(range.max))
    }

    pub fn raw_from_sub_id(&self, sub_id: u32) -> RawValue {
        if self.base.is_signed() {
            RawValue::Integer(i64::from(sub_id))
        } else {
            RawValue::Unsigned(u64::from(sub_id))
        }
    }

    pub fn formatter(&self, format: Format) -> ValueFormatter {
        ValueFormatter {
            ty: self.clone(),
            format,
        }
    }

    pub fn format(&self, raw: &RawValue, format: Format) -> Value {
        let mut value = Value::raw(raw.clone());
        value.format = format;
        if format.is_none() {
            return value;
        }
        value.formatted = Some(self.render(raw, format));
        if format.contains(Format::UNITS) {
            value.units = self.units.clone();
        }
        value
    }

    fn render(&self, raw: &RawValue, format: Format) -> String {
        let named = format.contains(Format::ENUM_NAME);
        let numbered = format.contains(Format::ENUM_VALUE);
        match raw {
            RawValue::Integer(_) | RawValue::Unsigned(_)
                if self.base == BaseType::Enumeration && (named || numbered) =>
            {
                let number = raw.as_i128().unwrap_or_default();
                self.render_enum(number, named, numbered)
            }
            RawValue::Integer(_) | RawValue::Unsigned(_) => {
                let number = raw.as_i128().unwrap_or_default();
                self.hint_for(format)
                    .and_then(|hint| render_integer(hint, number))
                    .unwrap_or_else(|| number.to_string())
            }
            RawValue::OctetString(bytes)
                if self.base == BaseType::Bits && format.contains(Format::BITS) =>
            {
                self.render_bits(bytes, numbered)
            }
            RawValue::OctetString(bytes) => self
                .hint_for(format)
                .and_then(|hint| render_octets(hint, bytes))
                .unwrap_or_else(|| default_octets(bytes)),
            RawValue::ObjectIdentifier(oid) => oid.to_string(),
            RawValue::Null => String::new(),
        }
    }

    fn hint_for(&self, format: Format) -> Option<&str> {
        if format.contains(Format::DISPLAY_HINT) {
            self.display_hint.as_deref()
        } else {
            None
        }
    }

    fn name_of(&self, number: i128) -> Option<&str> {
        self.named_numbers
            .iter()
            .find(|named| i128::from(named.value) == number)
            .map(|named| named.name.as_str())
    }

    fn render_enum(&self, number: i128, named: bool, numbered: bool) -> String {
        match (self.name_of(number), named, numbered) {
            (Some(name), true, true) => format!("{name}({number})"),
            (Some(name), true, false) => name.to_string(),
            _ => number.to_string(),
        }
    }

    fn render_bits(&self, bytes: &[u8], numbered: bool) -> String {
        let mut labels = Vec::new();
        for (byte_index, byte) in bytes.iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) == 0 {
                    continue;
                }
                let number = (byte_index * 8 + bit) as i128;
                labels.push(match (self.name_of(number), numbered) {
                    (Some(name), true) => format!("{name}({number})"),
                    (Some(name), false) => name.to_string(),
                    (None, _) => number.to_string(),
                });
            }
        }
        labels.join(" ")
    }
}

fn default_octets(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
            text.to_string()
        }
        _ => hex_string(bytes, ":"),
    }
}

/// A type paired with the format it renders.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueFormatter {
    ty: Type,
    format: Format,
}

impl ValueFormatter {
    pub fn format(&self, raw: &RawValue) -> Value {
        self.ty.format(raw, self.format)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScalarNode {
    pub name: String,
    pub oid: Oid,
    pub ty: Type,
}

impl ScalarNode {
    pub fn new(name: impl Into<String>, oid: Oid, ty: Type) -> Self {
        Self {
            name: name.into(),
            oid,
            ty,
        }
    }

    /// The `.0` instance actually read from the agent.
    pub fn instance_oid(&self) -> Oid {
        self.oid.child(0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnNode {
    pub name: String,
    pub oid: Oid,
    pub ty: Type,
    pub table: String,
}

impl ColumnNode {
    pub fn new(name: impl Into<String>, oid: Oid, ty: Type, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            oid,
            ty,
            table: table.into(),
        }
    }

    pub fn instance_oid(&self, index: &[u32]) -> Oid {
        self.oid.concat(index)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableNode {
    name: String,
    oid: Oid,
    columns: Vec<ColumnNode>,
    index: Vec<ColumnNode>,
    implied: bool,
}

impl TableNode {
    pub fn new(
        name: impl Into<String>,
        oid: Oid,
        columns: Vec<ColumnNode>,
        index: Vec<ColumnNode>,
        implied: bool,
    ) -> Result<Self, Error> {
        let name = name.into();
        if index.is_empty() {
            return Err(Error::usage(format!("table {name} declares no index columns")));
        }
        if implied {
            let last = &index[index.len() - 1];
            if last.ty.base.index_encoding() == IndexEncoding::Scalar {
                return Err(Error::usage(format!(
                    "table {name} marks fixed-width index column {} as implied",
                    last.name
                )));
            }
        }
        Ok(Self {
            name,
            oid,
            columns,
            index,
            implied,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn columns(&self) -> &[ColumnNode] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnNode> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn index(&self) -> &[ColumnNode] {
        &self.index
    }

    pub fn implied(&self) -> bool {
        self.implied
    }

    pub fn parent_of(&self, column: &ColumnNode) -> bool {
        column.table == self.name
            && self
                .columns
                .iter()
                .any(|declared| declared.oid == column.oid)
    }

    /// Encodes leading index values into the identifier suffix that addresses them.
    pub fn build_index(&self, values: &[IndexValue]) -> Result<Vec<u32>, Error> {
        if values.len() > self.index.len() {
            return Err(Error::usage(format!(
                "table {} has {} index columns, {} values given",
                self.name,
                self.index.len(),
                values.len()
            )));
        }
        let total = self.index.len();
        let mut parts = Vec::new();
        for (position, (column, value)) in self.index.iter().zip(values).enumerate() {
            let implied_last = self.implied && position + 1 == total;
            encode_index_value(column, value, implied_last, &mut parts)?;
        }
        Ok(parts)
    }
}

fn encode_index_value(
    column: &ColumnNode,
    value: &IndexValue,
    implied_last: bool,
    parts: &mut Vec<u32>,
) -> Result<(), Error> {
    let mismatch = |expected: &str| {
        Error::usage(format!("index column {} expects {expected}", column.name))
            .with_column(column.name.clone())
    };
    match (column.ty.base.index_encoding(), value) {
        (IndexEncoding::Scalar, IndexValue::Integer(number)) => {
            let sub_id = u32::try_from(*number).map_err(|_| {
                Error::usage(format!(
                    "index value {number} for {} does not fit a sub-identifier",
                    column.name
                ))
                .with_column(column.name.clone())
            })?;
            if !column.ty.in_range(i128::from(*number)) {
                return Err(Error::usage(format!(
                    "index value {number} for {} is outside its declared range",
                    column.name
                ))
                .with_column(column.name.clone()));
            }
            parts.push(sub_id);
        }
        (IndexEncoding::Bytes, IndexValue::Bytes(bytes)) => {
            push_length(bytes.len(), implied_last, parts);
            parts.extend(bytes.iter().map(|byte| u32::from(*byte)));
        }
        (IndexEncoding::Identifier, IndexValue::Oid(oid)) => {
            push_length(oid.len(), implied_last, parts);
            parts.extend_from_slice(oid.as_slice());
        }
        (IndexEncoding::Scalar, _) => return Err(mismatch("an integer")),
        (IndexEncoding::Bytes, _) => return Err(mismatch("an octet string")),
        (IndexEncoding::Identifier, _) => return Err(mismatch("an object identifier")),
    }
    Ok(())
}

fn push_length(len: usize, implied_last: bool, parts: &mut Vec<u32>) {
    if !implied_last {
        parts.push(len as u32);
    }
}

/// A caller-supplied index value, matched against index columns in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IndexValue {
    Integer(i64),
    Bytes(Vec<u8>),
    Oid(Oid),
}

impl IndexValue {
    /// Interprets command-line text according to the index column's base type.
    pub fn parse(base: BaseType, text: &str) -> Result<Self, Error> {
        match base.index_encoding() {
            IndexEncoding::Scalar => text.trim().parse::<i64>().map(IndexValue::Integer).map_err(
                |err| Error::usage(format!("index value {text:?} is not an integer")).with_source(err),
            ),
            IndexEncoding::Bytes => Ok(IndexValue::Bytes(text.as_bytes().to_vec())),
            IndexEncoding::Identifier => text.parse::<Oid>().map(IndexValue::Oid),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Integer(value)
    }
}

impl From<i32> for IndexValue {
    fn from(value: i32) -> Self {
        IndexValue::Integer(i64::from(value))
    }
}

impl From<u32> for IndexValue {
    fn from(value: u32) -> Self {
        IndexValue::Integer(i64::from(value))
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::Bytes(value.into_bytes())
    }
}

impl From<Vec<u8>> for IndexValue {
    fn from(value: Vec<u8>) -> Self {
        IndexValue::Bytes(value)
    }
}

impl From<Oid> for IndexValue {
    fn from(value: Oid) -> Self {
        IndexValue::Oid(value)
    }
}
