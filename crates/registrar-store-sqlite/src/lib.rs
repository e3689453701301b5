//! SQLite backend for the registrar.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Admissions run inside `BEGIN
//! IMMEDIATE` transactions, which makes them atomic across every connection
//! opened on the same file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
