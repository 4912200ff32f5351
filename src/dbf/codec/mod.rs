//! Codec layer for turning raw field bytes into values.
//!
//! # Submodules
//!
//! - [`text`][]: Text decoding with strict/replace/ignore policies
//! - [`codepages`][]: Language driver byte to code page mapping
//! - [`fields`][]: The tag-keyed field decoding rules

pub mod codepages;
pub mod fields;
pub mod text;

mod code_tables;
