//! Purpose: Define the public Rust API boundary for table and scalar reads.
//! Exports: Client facade, snapshot transport, schema loader, and the core types they exchange.
//! Role: Stable surface used by the CLI and integration tests.
//! Invariants: Reads flow through `Client`, which owns exactly one transport session.

mod client;
mod schema_file;
mod snapshot;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::index::{IndexFault, RowKey};
pub use crate::core::oid::Oid;
pub use crate::core::query::Query;
pub use crate::core::schema::{
    BaseType, ColumnNode, IndexValue, NamedNumber, Range, ScalarNode, TableNode, Type,
};
pub use crate::core::session::{
    AuthProtocol, PrivProtocol, SecurityLevel, SessionConfig, UsmSecurity, Version,
};
pub use crate::core::table::{Row, Rows, Table};
pub use crate::core::transport::{Leaf, LeafKind, Transport};
pub use crate::core::value::{Format, RawValue, Value};
pub use client::{ApiResult, Client, SessionState};
pub use schema_file::Schema;
pub use snapshot::SnapshotTransport;
