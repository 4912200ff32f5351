//! Foundational data structures, error types, and record factories.

pub mod error;
pub mod models;
pub mod record;
pub mod value;
