//! Kernel module - server infrastructure and dependencies.

pub mod database;
pub mod deps;
pub mod llm_gateway;

pub use database::Database;
pub use deps::ServerDeps;
pub use llm_gateway::OpenAiGateway;
