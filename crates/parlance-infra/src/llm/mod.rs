//! Completion endpoint client.
//!
//! A stateless forwarder: one request in, one HTTP POST out, the parsed
//! response body back verbatim. Retries, streaming, and response
//! normalization are deliberately the caller's concern.

pub mod forwarder;

pub use forwarder::CompletionForwarder;
