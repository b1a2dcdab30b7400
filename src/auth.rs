//! Provider and workspace identifiers, scope sets, and OAuth token models.

pub mod id;
pub mod scope;
pub mod token;

pub use id::*;
pub use scope::*;
pub use token::{record::*, secret::*};
