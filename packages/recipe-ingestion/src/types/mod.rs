//! Domain types shared by stages, stores and callers.

pub mod book;
pub mod ids;
pub mod recipe;
pub mod search;
