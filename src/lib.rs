pub mod config;
pub mod engine;
pub mod error;
pub mod inference;
pub mod request;

pub use error::{Error, Result};
