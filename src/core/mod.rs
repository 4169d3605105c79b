// Core modules implementing index encoding, traversal, formatting, and error modeling.
pub mod error;
pub mod format;
pub mod index;
pub mod oid;
pub mod query;
pub mod schema;
pub mod session;
pub mod table;
pub mod transport;
pub mod value;
pub mod walk;
