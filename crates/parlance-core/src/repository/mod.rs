//! Repository trait definitions.
//!
//! One trait per entity; implementations live in `parlance-infra`. Each
//! repository owns its table lifecycle (idempotent creation) and maps
//! backend rows into domain entities at its boundary -- no SQL leaks past
//! it.

pub mod message;
pub mod session;
pub mod user;

pub use message::{MessageRepository, MessageUpdate};
pub use session::SessionRepository;
pub use user::{UserRepository, UserUpdate};
