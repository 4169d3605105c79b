//! Purpose: The seam between the engine and whatever speaks the management protocol.
//! Exports: `Transport`, `Leaf`, `LeafKind`.
//! Role: Engine code depends only on this trait; sessions own one implementation.
//! Invariants: `get` answers in request order with exactly one leaf per requested oid.
//! Invariants: `walk` visits leaves in identifier order and stops when `visit` errors.
use crate::core::session::SessionConfig;
use crate::core::error::Error;
use crate::core::oid::Oid;
use crate::core::value::RawValue;
use serde::{Deserialize, Serialize};

/// Exception markers a response can carry instead of a value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeafKind {
    Value,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Leaf {
    pub oid: Oid,
    pub kind: LeafKind,
    pub value: RawValue,
}

impl Leaf {
    pub fn value(oid: Oid, value: RawValue) -> Self {
        Self {
            oid,
            kind: LeafKind::Value,
            value,
        }
    }

    pub fn exception(oid: Oid, kind: LeafKind) -> Self {
        Self {
            oid,
            kind,
            value: RawValue::Null,
        }
    }
}

pub trait Transport {
    /// Opens the session described by `config`.
    fn connect(&mut self, config: &SessionConfig) -> Result<(), Error>;

    fn close(&mut self) -> Result<(), Error>;

    /// One request for all `oids`; the response mirrors request order.
    fn get(&mut self, oids: &[Oid]) -> Result<Vec<Leaf>, Error>;

    /// Traverses the subtree under `root`, calling `visit` once per leaf.
    fn walk(
        &mut self,
        root: &Oid,
        visit: &mut dyn FnMut(&Leaf) -> Result<(), Error>,
    ) -> Result<(), Error>;
}
