//! Expression IR: node types, complexity classification and constructors.

mod build;
pub mod types;

pub use types::*;
