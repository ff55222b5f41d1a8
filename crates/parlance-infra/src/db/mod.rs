//! Relational storage layer.
//!
//! [`sqlite::SqliteConnection`] implements the backend-neutral `Connection`
//! contract; the repositories are written against that contract and stay
//! engine-agnostic. [`context::DatabaseContext`] owns the connection and
//! the repositories behind one initialize/teardown lifecycle, and
//! [`manager::DatabaseManager`] binds a context to a configuration exactly
//! once at the composition root.

pub mod context;
pub mod manager;
pub mod message;
pub mod session;
pub mod sqlite;
pub mod user;
