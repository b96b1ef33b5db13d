//! # sp-sign
//!
//! Qualified names for Spade entities.
//!
//! A signature is a chain of elements: modules joined by `::`, then
//! classes and methods joined by `.`, for example `std::io.File<T>.open(path)`.
//! Methods carry parameter lists whose entries are class references,
//! generic references (`<T>`) or callbacks (`f(x)`).
//!
//! # Example
//!
//! ```ignore
//! use sp_sign::{Sign, SignKind};
//!
//! let open = Sign::parse("std::io.File.open(path)")?;
//! assert_eq!(open.kind(), SignKind::Method);
//! assert_eq!(open.parent_class().to_string(), "std::io.File");
//! assert_eq!(open.parent_module().to_string(), "std::io");
//! ```

mod error;
mod parser;
mod sign;

pub use error::{SignError, SignResult};
pub use sign::{Sign, SignElement, SignKind, SignParam};
