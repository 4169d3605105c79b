//! Purpose: Library crate behind the `snmptable` CLI: table materialization over a managed-object tree.
//! Exports: `api` (client facade, snapshot transport, schema loader) and `core` (codec, walker, errors).
//! Role: Engine plus the surfaces the binary and tests drive it through.
//! Invariants: The engine never talks to the network itself; all round trips go through `Transport`.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
