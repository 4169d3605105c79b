//! Purpose: Session-holding facade over one transport bound to one target.
//! Exports: `Client`, `SessionState`.
//! Role: Public entry point for reads; owns lifecycle and delegates wire work to `Transport`.
//! Invariants: Every read requires `Connected`; the check happens before any transport call.
//! Invariants: `connect` while connected and `close` while not connected are no-ops.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::query::{Query, read_batch};
use crate::core::schema::{ColumnNode, IndexValue, ScalarNode};
use crate::core::session::SessionConfig;
use crate::core::table::{Rows, Table};
use crate::core::transport::Transport;
use crate::core::value::{Format, Value};
use crate::core::walk::walk_table;
use std::collections::BTreeMap;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Connected,
    Closed,
}

#[derive(Debug)]
pub struct Client<T: Transport> {
    config: SessionConfig,
    transport: T,
    state: SessionState,
}

impl<T: Transport> Client<T> {
    pub fn new(config: SessionConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: SessionState::Idle,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Changes take effect on the next `connect`.
    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn connect(&mut self) -> ApiResult<()> {
        if self.state == SessionState::Connected {
            return Ok(());
        }
        let level = self.config.security_level()?;
        self.transport.connect(&self.config)?;
        self.state = SessionState::Connected;
        tracing::info!(
            target_addr = %self.config.target(),
            version = ?self.config.version,
            security = %level,
            "session connected"
        );
        Ok(())
    }

    pub fn close(&mut self) -> ApiResult<()> {
        if self.state != SessionState::Connected {
            return Ok(());
        }
        self.transport.close()?;
        self.state = SessionState::Closed;
        tracing::info!(target_addr = %self.config.target(), "session closed");
        Ok(())
    }

    /// Reads the single instance of a scalar object.
    pub fn get(&mut self, scalar: &ScalarNode, format: Option<Format>) -> ApiResult<Value> {
        let mut query = Query::new();
        query.scalar(scalar, format);
        self.read_one(&query, &scalar.name)
    }

    /// Reads one column instance addressed by already-encoded index sub-identifiers.
    pub fn get_index(
        &mut self,
        column: &ColumnNode,
        index: &[u32],
        format: Option<Format>,
    ) -> ApiResult<Value> {
        let mut query = Query::new();
        query.column(column, index, format);
        self.read_one(&query, &column.name)
    }

    pub fn get_all(&mut self, query: &Query) -> ApiResult<BTreeMap<String, Value>> {
        let transport = self.session()?;
        read_batch(transport, query)
    }

    pub fn table(&mut self, table: &Table, index: &[IndexValue]) -> ApiResult<Rows> {
        let transport = self.session()?;
        walk_table(transport, table, index)
    }

    fn read_one(&mut self, query: &Query, name: &str) -> ApiResult<Value> {
        let mut values = self.get_all(query)?;
        values.remove(name).ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("batch answer is missing {name}"))
                .with_column(name)
        })
    }

    fn session(&mut self) -> ApiResult<&mut T> {
        match self.state {
            SessionState::Connected => Ok(&mut self.transport),
            SessionState::Idle | SessionState::Closed => Err(Error::usage("client is not connected")
                .with_hint("Call connect before issuing reads.")),
        }
    }
}
