//! Commands and pure transition planning.

pub mod commands;
pub mod transition;
