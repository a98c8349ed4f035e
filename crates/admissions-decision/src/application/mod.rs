//! Application services: load, decide, commit, publish.

pub mod bulk;
pub mod command_handlers;
pub mod engine;
pub mod query_handlers;
mod retry;
