//! Safe SQL builder: identifiers from model metadata only, values as parameters.

mod builder;
pub use builder::*;
