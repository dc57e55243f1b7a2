pub mod conversation;
pub mod cost;
pub mod credential;
pub mod domain;
pub mod error;
pub mod ports;

pub use credential::Credential;
pub use domain::*;
pub use error::{Error, Result};
