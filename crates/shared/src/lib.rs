//! Shared types for the chainsession wallet-session client.
//!
//! Everything here is platform independent: the connection data model,
//! the provider event vocabulary, known networks and the error taxonomy.

pub mod error;
pub mod models;
pub mod networks;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use networks::*;
pub use protocol::*;
