//! Purpose: Raw protocol values, display-format selectors and formatted values.
//! Exports: `RawValue`, `Format`, `Value`, `resolve_format`.
//! Role: Vocabulary shared by transports (raw side) and the schema model (formatted side).
//! Invariants: `Format` resolution is override -> default -> `Format::ALL`, nothing implicit.
use crate::core::oid::Oid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// A decoded protocol value before any schema-driven formatting.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum RawValue {
    Integer(i64),
    Unsigned(u64),
    OctetString(Vec<u8>),
    ObjectIdentifier(Oid),
    Null,
}

impl RawValue {
    /// Integer view used for enum, bits-free and hint rendering.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            RawValue::Integer(value) => Some(i128::from(*value)),
            RawValue::Unsigned(value) => Some(i128::from(*value)),
            RawValue::OctetString(_) | RawValue::ObjectIdentifier(_) | RawValue::Null => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Integer(value) => write!(f, "{value}"),
            RawValue::Unsigned(value) => write!(f, "{value}"),
            RawValue::OctetString(bytes) => f.write_str(&hex_string(bytes, ":")),
            RawValue::ObjectIdentifier(oid) => write!(f, "{oid}"),
            RawValue::Null => f.write_str("null"),
        }
    }
}

pub(crate) fn hex_string(bytes: &[u8], sep: &str) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(sep)
}

/// Bit set selecting which human representations a formatter produces.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Format(u8);

impl Format {
    pub const NONE: Format = Format(0);
    pub const ENUM_NAME: Format = Format(1);
    pub const ENUM_VALUE: Format = Format(1 << 1);
    pub const BITS: Format = Format(1 << 2);
    pub const DISPLAY_HINT: Format = Format(1 << 3);
    pub const UNITS: Format = Format(1 << 4);
    pub const ALL: Format = Format(0b1_1111);

    pub fn contains(self, other: Format) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Parses the CLI spelling: `none|all|raw|enum|display|units`, joined by `,` or `+`.
    pub fn parse(text: &str) -> Option<Format> {
        text.split([',', '+'])
            .map(str::trim)
            .try_fold(Format::NONE, |acc, part| {
                let next = match part.to_ascii_lowercase().as_str() {
                    "none" | "raw" => Format::NONE,
                    "all" => Format::ALL,
                    "enum" => Format::ENUM_NAME | Format::ENUM_VALUE,
                    "enum-name" => Format::ENUM_NAME,
                    "enum-value" => Format::ENUM_VALUE,
                    "bits" => Format::BITS,
                    "display" | "hint" => Format::DISPLAY_HINT,
                    "units" => Format::UNITS,
                    _ => return None,
                };
                Some(acc | next)
            })
    }
}

impl BitOr for Format {
    type Output = Format;

    fn bitor(self, rhs: Format) -> Format {
        Format(self.0 | rhs.0)
    }
}

/// Effective format: explicit override, else the owner's default, else everything.
pub fn resolve_format(override_format: Option<Format>, default: Option<Format>) -> Format {
    override_format.or(default).unwrap_or(Format::ALL)
}

/// A raw value together with its rendered form for the format that produced it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Value {
    pub raw: RawValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(skip)]
    pub format: Format,
}

impl Value {
    pub fn raw(raw: RawValue) -> Self {
        Self {
            raw,
            formatted: None,
            units: None,
            format: Format::NONE,
        }
    }

    /// The formatted text when present, the raw rendering otherwise.
    pub fn text(&self) -> String {
        self.formatted
            .clone()
            .unwrap_or_else(|| self.raw.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())?;
        if let Some(units) = &self.units {
            write!(f, " {units}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Format, RawValue, Value, resolve_format};
    use serde_json::json;

    #[test]
    fn resolve_format_falls_back_in_order() {
        assert_eq!(
            resolve_format(Some(Format::BITS), Some(Format::NONE)),
            Format::BITS
        );
        assert_eq!(resolve_format(None, Some(Format::NONE)), Format::NONE);
        assert_eq!(resolve_format(None, None), Format::ALL);
    }

    #[test]
    fn format_contains_and_parse() {
        let format = Format::parse("enum+units").expect("format");
        assert!(format.contains(Format::ENUM_NAME));
        assert!(format.contains(Format::UNITS));
        assert!(!format.contains(Format::BITS));
        assert!(!Format::ALL.contains(Format::NONE));
        assert_eq!(Format::parse("raw"), Some(Format::NONE));
        assert_eq!(Format::parse("all"), Some(Format::ALL));
        assert_eq!(Format::parse("bogus"), None);
    }

    #[test]
    fn raw_value_json_is_tagged() {
        let value = serde_json::to_value(RawValue::OctetString(vec![1, 2])).expect("json");
        assert_eq!(value, json!({"type": "octet-string", "value": [1, 2]}));
        let back: RawValue =
            serde_json::from_value(json!({"type": "integer", "value": -4})).expect("raw");
        assert_eq!(back, RawValue::Integer(-4));
    }

    #[test]
    fn value_text_prefers_formatted() {
        let mut value = Value::raw(RawValue::Unsigned(7));
        assert_eq!(value.text(), "7");
        value.formatted = Some("seven".to_string());
        value.units = Some("s".to_string());
        assert_eq!(value.to_string(), "seven s");
    }
}
