//! Shared types for the library catalog workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
