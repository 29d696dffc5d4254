//! Common utilities shared by the runner and its context

pub mod color;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
