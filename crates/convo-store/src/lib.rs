//! # convo-store
//!
//! The entity store for the convo backend, backed by SQLite.  The crate
//! exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model (users, connections, messages).  Every public operation is
//! internally atomic; get-or-create and accept are transactional so that
//! racing gateway sessions cannot duplicate rows or double-fire events.

pub mod connections;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;

/// Fixed page size for message history pagination.
pub const MESSAGE_PAGE_SIZE: u32 = 10;
