//! Purpose: In-process transport answering from a recorded device snapshot.
//! Exports: `SnapshotTransport`.
//! Role: Offline agent for the CLI and tests; counts round trips so callers can assert on them.
//! Invariants: GET answers exact matches only; walks visit leaves strictly below the root in order.
//! Invariants: A walk that runs off the end of the snapshot reports end-of-view once.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::oid::Oid;
use crate::core::session::{SessionConfig, Version};
use crate::core::transport::{Leaf, LeafKind, Transport};
use crate::core::value::RawValue;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug, Default)]
pub struct SnapshotTransport {
    leaves: BTreeMap<Oid, Leaf>,
    community: Option<String>,
    connected: bool,
    gets: usize,
    walks: usize,
}

#[derive(Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    community: Option<String>,
    leaves: Vec<SnapshotEntry>,
}

#[derive(Deserialize)]
struct SnapshotEntry {
    oid: Oid,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: JsonValue,
}

impl SnapshotTransport {
    pub fn from_leaves(leaves: impl IntoIterator<Item = Leaf>) -> Self {
        let mut transport = Self::default();
        for leaf in leaves {
            transport.insert(leaf);
        }
        transport
    }

    pub fn insert(&mut self, leaf: Leaf) {
        self.leaves.insert(leaf.oid.clone(), leaf);
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn get_count(&self) -> usize {
        self.gets
    }

    pub fn walk_count(&self) -> usize {
        self.walks
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn load(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to read snapshot file")
                .with_path(path)
                .with_source(err)
        })?;
        let transport = Self::from_json_str(&text).map_err(|err| err.with_path(path))?;
        if transport.is_empty() {
            tracing::warn!(path = %path.display(), "snapshot has no leaves");
        }
        tracing::debug!(path = %path.display(), leaves = transport.len(), "snapshot loaded");
        Ok(transport)
    }

    pub fn from_json_str(text: &str) -> ApiResult<Self> {
        let file: SnapshotFile = serde_json::from_str(text).map_err(|err| {
            Error::usage("failed to parse snapshot json")
                .with_hint("Expected {\"leaves\": [{\"oid\": \"1.3.6...\", \"type\": \"integer\", \"value\": 1}]}.")
                .with_source(err)
        })?;
        let mut transport = Self::default();
        transport.community = file.community;
        for entry in file.leaves {
            let leaf = leaf_from_entry(entry)?;
            transport.insert(leaf);
        }
        Ok(transport)
    }

    fn missing_kind(&self, oid: &Oid) -> LeafKind {
        let Some(parent) = oid.parent() else {
            return LeafKind::NoSuchObject;
        };
        let has_sibling = self
            .leaves
            .range(parent.clone()..)
            .next()
            .is_some_and(|(candidate, _)| candidate.starts_with(&parent));
        if has_sibling {
            LeafKind::NoSuchInstance
        } else {
            LeafKind::NoSuchObject
        }
    }
}

impl Transport for SnapshotTransport {
    fn connect(&mut self, config: &SessionConfig) -> Result<(), Error> {
        if let Some(expected) = &self.community
            && config.version != Version::V3
            && &config.community != expected
        {
            return Err(Error::new(ErrorKind::Auth)
                .with_message(format!("community rejected by {}", config.target()))
                .with_hint("Check --community against the device configuration."));
        }
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.connected = false;
        Ok(())
    }

    fn get(&mut self, oids: &[Oid]) -> Result<Vec<Leaf>, Error> {
        self.gets += 1;
        Ok(oids
            .iter()
            .map(|oid| match self.leaves.get(oid) {
                Some(leaf) => leaf.clone(),
                None => Leaf::exception(oid.clone(), self.missing_kind(oid)),
            })
            .collect())
    }

    fn walk(
        &mut self,
        root: &Oid,
        visit: &mut dyn FnMut(&Leaf) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.walks += 1;
        let range = (Bound::Excluded(root.clone()), Bound::Unbounded);
        for (oid, leaf) in self.leaves.range(range) {
            if !oid.starts_with(root) {
                return Ok(());
            }
            visit(leaf)?;
        }
        visit(&Leaf::exception(root.clone(), LeafKind::EndOfMibView))
    }
}

fn leaf_from_entry(entry: SnapshotEntry) -> ApiResult<Leaf> {
    let SnapshotEntry { oid, kind, value } = entry;
    let invalid = |expected: &str| {
        Error::usage(format!("snapshot value of type {kind:?} must be {expected}"))
            .with_oid(oid.clone())
    };
    let raw = match kind.as_str() {
        "no-such-object" => return Ok(Leaf::exception(oid.clone(), LeafKind::NoSuchObject)),
        "no-such-instance" => return Ok(Leaf::exception(oid.clone(), LeafKind::NoSuchInstance)),
        "end-of-mib-view" => return Ok(Leaf::exception(oid.clone(), LeafKind::EndOfMibView)),
        "null" => RawValue::Null,
        "integer" => RawValue::Integer(value.as_i64().ok_or_else(|| invalid("a signed integer"))?),
        "unsigned" | "counter32" | "gauge32" | "timeticks" | "counter64" => {
            RawValue::Unsigned(value.as_u64().ok_or_else(|| invalid("an unsigned integer"))?)
        }
        "octet-string" | "string" => RawValue::OctetString(
            value
                .as_str()
                .ok_or_else(|| invalid("a string"))?
                .as_bytes()
                .to_vec(),
        ),
        "hex" => RawValue::OctetString(
            parse_hex(value.as_str().ok_or_else(|| invalid("a hex string"))?)
                .ok_or_else(|| invalid("pairs of hex digits"))?,
        ),
        "ip-address" => {
            let text = value.as_str().ok_or_else(|| invalid("a dotted IPv4 address"))?;
            let addr: std::net::Ipv4Addr = text
                .parse()
                .map_err(|_| invalid("a dotted IPv4 address"))?;
            RawValue::OctetString(addr.octets().to_vec())
        }
        "object-identifier" | "oid" => {
            let text = value.as_str().ok_or_else(|| invalid("a dotted oid"))?;
            RawValue::ObjectIdentifier(text.parse().map_err(|_| invalid("a dotted oid"))?)
        }
        other => {
            return Err(Error::usage(format!("unknown snapshot value type {other:?}"))
                .with_oid(oid.clone()));
        }
    };
    Ok(Leaf::value(oid, raw))
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

fn map_io_error_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}
