//! # fauna-values
//!
//! Value model for the Fauna wire protocol.
//!
//! This crate provides:
//! - The [`Value`] sum type covering JSON primitives and the Fauna-specific
//!   tagged types (`@ref`, `@set`, `@ts`, `@date`, `@bytes`, `@query`)
//! - A serde codec that recognises tagged objects by their first key
//! - Tree navigation by string keys and array indexes

pub mod codec;
pub mod error;
pub mod field;
pub mod value;

pub use error::DecodeError;
pub use field::FieldError;
pub use value::Value;
