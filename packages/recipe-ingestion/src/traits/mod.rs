//! Seams between the pipeline and the outside world.
//!
//! The application implements [`gateway::LlmGateway`] over its model provider;
//! storage backends implement the traits in [`store`].

pub mod gateway;
pub mod store;
