//! # casepilot-store
//!
//! SQLite-backed [`TraceStore`](casepilot_core::TraceStore): run traces with
//! the requests that produced them, critic verdicts, replay sessions and
//! replay runs.

pub mod sqlite;

pub use sqlite::SqliteStore;
