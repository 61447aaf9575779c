pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod fix;
pub mod guid;
pub mod migrate;
pub mod reader;
pub mod tree;

pub use error::{CoreError, CoreErrorCode};
