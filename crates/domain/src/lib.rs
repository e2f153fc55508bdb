pub mod config;
pub mod error;
pub mod message;
pub mod stream;
pub mod tool;
pub mod trace;
pub mod usage;

pub use error::{Error, Result};
