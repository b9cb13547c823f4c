pub mod config;
pub mod error;
pub mod key;

pub use config::PromsinkConfig;
pub use error::SinkError;
pub use key::flatten_key;
