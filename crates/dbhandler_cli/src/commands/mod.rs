//! CLI command implementations.

pub mod get;
pub mod inspect;
pub mod upload;
pub mod verify;
