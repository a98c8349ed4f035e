//! Admissions Core — shared domain abstractions.
//!
//! Defines the application record, the error taxonomy, and the traits the
//! decision engine is written against: the store it reads and writes
//! through, and the sink it publishes transition events to. It contains no
//! infrastructure code.

pub mod application;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod store;
