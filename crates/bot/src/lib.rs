//! Chat bot: command parsing, routing and the inbound drain loop.

pub mod app;
pub mod config;
pub mod context;
