//! Contracts for the Parlance data-access layer.
//!
//! This crate defines the "ports" the infrastructure layer implements: the
//! backend-neutral [`connection::Connection`] contract and the per-entity
//! repository traits. It depends only on `parlance-types` -- never on a
//! database or IO crate.

pub mod connection;
pub mod repository;
