//! Application store database schema.

/// SQL that provisions the applications table and its indexes.
///
/// The workspace migration is the single source of the DDL; every statement
/// in it is idempotent, so `PgApplicationStore::provision` can run it at each
/// startup.
pub const CREATE_APPLICATIONS_TABLE: &str =
    include_str!("../../../migrations/20260115100000_create_applications.sql");
