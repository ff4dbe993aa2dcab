// Forkfolio - application core
//
// Wires the recipe ingestion library to PostgreSQL and an OpenAI-compatible
// provider, and exposes the operations a routing layer or the CLI calls.

pub mod config;
pub mod kernel;
pub mod service;

pub use config::*;
pub use kernel::{Database, OpenAiGateway, ServerDeps};
pub use service::{RecipeService, ServiceError, ServiceResult};
