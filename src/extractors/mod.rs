//! Value extractors
//!
//! Each module turns one kind of snapshot into result values.

mod links;
mod text;

pub use links::*;
pub use text::*;
