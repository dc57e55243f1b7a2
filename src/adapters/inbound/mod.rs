//! Inbound adapters translate external stimuli (CLI/HTTP) into application service calls.

pub mod cli;
pub mod server;
