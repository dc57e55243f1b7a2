//! Directional port definitions for the clean architecture rings.
//! Inbound ports are the use cases the CLI and HTTP adapters drive,
//! while outbound ports are services the application calls out to.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
