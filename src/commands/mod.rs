// ABOUTME: CLI command module exports
// ABOUTME: Each command wraps a DataAccess or profile file call in an ApiResponse envelope

pub mod connection;
pub mod profiles;
pub mod tables;

pub use connection::*;
pub use profiles::*;
pub use tables::*;
