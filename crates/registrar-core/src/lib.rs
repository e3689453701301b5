//! Core types and trait definitions for the registrar.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

pub mod access;
pub mod admission;
pub mod catalog;
pub mod enrollment;
pub mod error;
pub mod schedule;
pub mod store;

pub use error::{Error, Result};
