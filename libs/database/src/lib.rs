//! Database connectivity for the catalog workspace.
//!
//! One datastore, one connector: PostgreSQL through sea-orm. Connection
//! pooling and logging defaults live here so every binary connects the
//! same way.

pub mod postgres;

pub use postgres::{connect, connect_from_config, ping};
