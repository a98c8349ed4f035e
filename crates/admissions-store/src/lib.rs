//! Admissions Store — PostgreSQL persistence for application records.

pub mod pg_application_store;
pub mod schema;
