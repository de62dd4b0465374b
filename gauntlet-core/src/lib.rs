mod error;

pub mod load;
pub mod orchestrator;

pub use error::{Error, ErrorKind, ResourceKind, Result};
