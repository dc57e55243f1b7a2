//! Use-case layer: fan-out completion, catalog memoization and the prompt service.

pub mod catalog;
pub mod completion;
pub mod service;

pub use catalog::CatalogCache;
pub use completion::CompletionClient;
pub use service::{AppService, CredentialResolver, ServiceDefaults};
