//! Types shared by the model-chat crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
