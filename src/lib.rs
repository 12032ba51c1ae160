pub mod builder;
pub mod client;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod logger;
pub mod rpc;
pub mod schema;
pub mod server;
pub mod value;

pub use error::{Error, Result};
