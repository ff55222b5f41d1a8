//! Infrastructure layer for Parlance.
//!
//! Contains the SQLite implementation of the `Connection` contract, SQL
//! repository implementations of the traits defined in `parlance-core`,
//! the database context/manager lifecycle, configuration loading, and the
//! completion forwarder.

pub mod config;
pub mod db;
pub mod llm;
