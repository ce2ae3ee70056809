//! # convo-shared
//!
//! Wire protocol for the convo realtime messaging backend: the inbound
//! client envelope (a closed set of operations tagged by `source`), the
//! outbound `{source, data}` envelope, and the payload shapes the server
//! renders for clients.  This crate does no I/O so both the server and any
//! future Rust client can depend on it.

pub mod protocol;
pub mod types;

pub use protocol::{encode, ClientEnvelope, ServerEnvelope};
pub use types::ConnectionStatus;
