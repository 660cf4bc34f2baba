//! # relay-store
//!
//! Durable storage for the relay session hub.
//!
//! - **Traits**: [`Storage`], [`SessionDataBackend`] and the read-only
//!   [`StorageQuery`], the only storage surface the session core sees
//! - **`SQLite`**: pooled connections, embedded migrations and stateless
//!   repositories under [`sqlite`]
//! - **[`SqliteStorage`]**: the trait implementation over a pool

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;
pub mod traits;

pub use errors::{Result, StoreError};
pub use sqlite::{ConnectionConfig, ConnectionPool};
pub use store::SqliteStorage;
pub use traits::{BufferLookup, NetworkInfo, SessionDataBackend, Storage, StorageQuery};
