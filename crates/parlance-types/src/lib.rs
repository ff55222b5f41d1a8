//! Shared domain types for Parlance.
//!
//! This crate contains the domain types used across the Parlance data layer:
//! User, ChatSession, ChatMessage, the branded Identifier, configuration,
//! and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod user;
