//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`.

pub mod buffer;
pub mod message;
pub mod network;
pub mod session_data;
pub mod session_state;

pub use buffer::BufferRepo;
pub use message::MessageRepo;
pub use network::NetworkRepo;
pub use session_data::SessionDataRepo;
pub use session_state::SessionStateRepo;
