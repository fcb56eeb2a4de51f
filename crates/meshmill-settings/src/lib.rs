//! # meshmill settings
//!
//! Job configuration: which model to machine, how much stock to leave
//! around it, which operations to run and where to write the program.

pub mod config;
pub mod error;

pub use config::{JobConfig, OperationConfig, DEFAULT_MARGIN};
pub use error::{Result, SettingsError};
