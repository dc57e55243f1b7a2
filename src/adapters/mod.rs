pub mod inbound;
pub mod outbound;

// Re-export commonly used outbound adapters at the adapters level
pub use outbound::clock::SystemClock;
pub use outbound::gateway::OpenRouterGateway;
pub use outbound::snapshot::SnapshotCatalogSource;
