//! Database initialization for both storage backends

pub mod init;

pub use init::*;
