//! Admissions API — HTTP surface of the admission decision engine.

pub mod config;
pub mod error;
pub mod routes;
pub mod sink;
pub mod state;
