//! Archive Fever Core - domain types, observer protocol, and error handling

pub mod broadcast;
pub mod error;
pub mod protocol;
pub mod types;

pub use broadcast::Broadcaster;
pub use error::{Error, Result};
pub use protocol::*;
pub use types::*;
