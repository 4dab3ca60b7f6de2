//! Repository implementations for database operations

pub mod checkpoint;

pub use checkpoint::*;
