//! Core DBF reader module.

pub mod codec;
pub mod format;
pub mod iter;
pub mod options;
pub mod table;
pub mod types;
pub mod utils;

pub use types::{error, models, record, value};
