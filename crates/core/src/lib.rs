pub mod config;
pub mod error;

pub use config::{ClientOptions, HostConfig};
pub use error::{Error, Result};
