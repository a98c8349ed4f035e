//! Admissions — Admission Decision bounded context.
//!
//! Moves applications through review while holding the line on one rule:
//! a student has at most one approved application per institution. Approving
//! an application rejects its open competitors in the same commit.

pub mod application;
pub mod config;
pub mod domain;
