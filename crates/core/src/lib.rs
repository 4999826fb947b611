pub mod config;
pub mod error;
pub mod protocol;

pub use config::Config;
pub use error::*;
pub use protocol::*;
