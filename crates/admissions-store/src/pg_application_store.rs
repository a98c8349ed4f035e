//! `PostgreSQL` implementation of the `ApplicationStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use admissions_core::application::{Application, ApplicationStatus};
use admissions_core::error::DomainError;
use admissions_core::store::{ApplicationStore, ConditionalWrite};

use crate::schema::CREATE_APPLICATIONS_TABLE;

const SELECT_APPLICATION: &str = r"
SELECT id, student_id, institution_id, course_id, status, created_at,
       reviewed_at, reviewed_by, review_notes, version
FROM applications
";

/// PostgreSQL-backed application store.
#[derive(Debug, Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    /// Creates a new `PgApplicationStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the applications table and indexes if they do not exist.
    ///
    /// Run once when the service starts, not on the request path.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::StoreUnavailable` or `DomainError::Infrastructure`
    /// if the DDL cannot be executed.
    pub async fn provision(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_APPLICATIONS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("applications schema provisioned");
        Ok(())
    }
}

/// Maps driver errors onto the domain taxonomy. Connection-level failures,
/// deadlocks and serialization failures are transient.
fn map_sqlx_error(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DomainError::StoreUnavailable(err.to_string()),
        sqlx::Error::Database(db_err)
            if matches!(db_err.code().as_deref(), Some("40001" | "40P01")) =>
        {
            DomainError::StoreUnavailable(err.to_string())
        }
        _ => DomainError::Infrastructure(err.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn row_to_application(row: &PgRow) -> Result<Application, DomainError> {
    let status: String = row.try_get("status").map_err(map_sqlx_error)?;
    let status = status.parse::<ApplicationStatus>().map_err(|e| {
        DomainError::Infrastructure(format!("stored application has invalid status: {e}"))
    })?;
    Ok(Application {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        student_id: row.try_get("student_id").map_err(map_sqlx_error)?,
        institution_id: row.try_get("institution_id").map_err(map_sqlx_error)?,
        course_id: row.try_get("course_id").map_err(map_sqlx_error)?,
        status,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(map_sqlx_error)?,
        reviewed_at: row.try_get("reviewed_at").map_err(map_sqlx_error)?,
        reviewed_by: row.try_get("reviewed_by").map_err(map_sqlx_error)?,
        review_notes: row.try_get("review_notes").map_err(map_sqlx_error)?,
        version: row.try_get("version").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        let row = sqlx::query(&format!("{SELECT_APPLICATION} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(row_to_application).transpose()
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        let rows = sqlx::query(&format!(
            "{SELECT_APPLICATION} WHERE student_id = $1 AND institution_id = $2 ORDER BY created_at, id"
        ))
        .bind(student_id)
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_application).collect()
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        let rows = sqlx::query(&format!(
            "{SELECT_APPLICATION} WHERE institution_id = $1 ORDER BY created_at, id"
        ))
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(row_to_application).collect()
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO applications
                (id, student_id, institution_id, course_id, status, created_at,
                 reviewed_at, reviewed_by, review_notes, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(application.id)
        .bind(application.student_id)
        .bind(application.institution_id)
        .bind(application.course_id)
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.reviewed_at)
        .bind(application.reviewed_by)
        .bind(application.review_notes.as_deref())
        .bind(application.version)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                DomainError::ConcurrencyConflict {
                    application_id: application.id,
                    expected: application.version,
                    actual: None,
                }
            } else {
                map_sqlx_error(err)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, writes), fields(write_count = writes.len()))]
    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        if writes.is_empty() {
            return Ok(());
        }

        // Rows are locked in id order so overlapping writers cannot deadlock.
        let mut ordered: Vec<&ConditionalWrite> = writes.iter().collect();
        ordered.sort_by_key(|write| write.application_id);

        // Dropping `tx` without commit rolls back every statement below.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for write in ordered {
            let row = sqlx::query("SELECT version FROM applications WHERE id = $1 FOR UPDATE")
                .bind(write.application_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            let Some(row) = row else {
                return Err(DomainError::ApplicationNotFound(write.application_id));
            };
            let actual: i64 = row.try_get("version").map_err(map_sqlx_error)?;
            if actual != write.expected_version {
                return Err(DomainError::ConcurrencyConflict {
                    application_id: write.application_id,
                    expected: write.expected_version,
                    actual: Some(actual),
                });
            }

            let Some(update) = &write.update else {
                continue;
            };
            sqlx::query(
                r"
                UPDATE applications
                SET status = $2, reviewed_at = $3, reviewed_by = $4, review_notes = $5,
                    version = version + 1
                WHERE id = $1
                ",
            )
            .bind(write.application_id)
            .bind(update.status.as_str())
            .bind(update.reviewed_at)
            .bind(update.reviewed_by)
            .bind(update.review_notes.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                // The partial unique index caught a second admission that the
                // version checks did not see.
                if is_unique_violation(&err) {
                    DomainError::ConcurrencyConflict {
                        application_id: write.application_id,
                        expected: write.expected_version,
                        actual: None,
                    }
                } else {
                    map_sqlx_error(err)
                }
            })?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
