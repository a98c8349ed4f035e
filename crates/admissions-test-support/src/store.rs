//! Test stores — `ApplicationStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use admissions_core::application::{Application, ApplicationStatus};
use admissions_core::error::DomainError;
use admissions_core::store::{ApplicationStore, ConditionalWrite};
use async_trait::async_trait;
use tokio::sync::Barrier;
use uuid::Uuid;

/// An in-process store with the same atomicity guarantees as the
/// `PostgreSQL` store: a conditional multi-write checks every precondition
/// and applies every update under one lock, and rejects a commit that would
/// leave two approved applications in one competing set.
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    records: Mutex<HashMap<Uuid, Application>>,
    committed_writes: AtomicUsize,
}

impl InMemoryApplicationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `applications`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_applications(applications: impl IntoIterator<Item = Application>) -> Self {
        let store = Self::new();
        {
            let mut records = store.records.lock().unwrap();
            for application in applications {
                records.insert(application.id, application);
            }
        }
        store
    }

    /// Returns the current state of one record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn snapshot(&self, id: Uuid) -> Option<Application> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Returns every record, ordered by creation time then id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn all(&self) -> Vec<Application> {
        let mut all: Vec<Application> = self.records.lock().unwrap().values().cloned().collect();
        sort(&mut all);
        all
    }

    /// Number of conditional multi-writes that committed at least one update.
    pub fn committed_writes(&self) -> usize {
        self.committed_writes.load(Ordering::SeqCst)
    }

    fn select(&self, predicate: impl Fn(&Application) -> bool) -> Vec<Application> {
        let mut found: Vec<Application> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|app| predicate(app))
            .cloned()
            .collect();
        sort(&mut found);
        found
    }
}

fn sort(applications: &mut [Application]) {
    applications.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        Ok(self.snapshot(id))
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        Ok(self.select(|app| app.student_id == student_id && app.institution_id == institution_id))
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        Ok(self.select(|app| app.institution_id == institution_id))
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&application.id) {
            return Err(DomainError::ConcurrencyConflict {
                application_id: application.id,
                expected: application.version,
                actual: None,
            });
        }
        records.insert(application.id, application.clone());
        Ok(())
    }

    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap();

        let mut staged: HashMap<Uuid, Application> = HashMap::new();
        for write in writes {
            let Some(current) = records.get(&write.application_id) else {
                return Err(DomainError::ApplicationNotFound(write.application_id));
            };
            if current.version != write.expected_version {
                return Err(DomainError::ConcurrencyConflict {
                    application_id: write.application_id,
                    expected: write.expected_version,
                    actual: Some(current.version),
                });
            }
            if let Some(update) = &write.update {
                staged.insert(write.application_id, current.with_update(update));
            }
        }

        for (id, next) in &staged {
            if next.status != ApplicationStatus::Approved {
                continue;
            }
            let second_admission = records.values().any(|other| {
                other.id != *id
                    && other.competes_with(next)
                    && staged.get(&other.id).map_or(other.status, |s| s.status)
                        == ApplicationStatus::Approved
            });
            if second_admission {
                return Err(DomainError::ConcurrencyConflict {
                    application_id: *id,
                    expected: next.version - 1,
                    actual: None,
                });
            }
        }

        if !staged.is_empty() {
            self.committed_writes.fetch_add(1, Ordering::SeqCst);
        }
        records.extend(staged);
        Ok(())
    }
}

/// A store whose every call fails with a transient error.
#[derive(Debug)]
pub struct FailingApplicationStore;

fn connection_refused() -> DomainError {
    DomainError::StoreUnavailable("connection refused".into())
}

#[async_trait]
impl ApplicationStore for FailingApplicationStore {
    async fn get(&self, _id: Uuid) -> Result<Option<Application>, DomainError> {
        Err(connection_refused())
    }

    async fn query_by_student_and_institution(
        &self,
        _student_id: Uuid,
        _institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        Err(connection_refused())
    }

    async fn query_by_institution(
        &self,
        _institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        Err(connection_refused())
    }

    async fn insert(&self, _application: &Application) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn conditional_multi_write(&self, _writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        Err(connection_refused())
    }
}

/// Wraps a store and fails the first `failures` calls, of any kind, with a
/// transient error before delegating.
#[derive(Debug)]
pub struct FlakyApplicationStore<S> {
    inner: S,
    remaining_failures: AtomicUsize,
    calls: AtomicUsize,
}

impl<S> FlakyApplicationStore<S> {
    /// Creates a wrapper that fails `failures` times.
    #[must_use]
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn trip(&self) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tripped = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(DomainError::StoreUnavailable("transient outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: ApplicationStore> ApplicationStore for FlakyApplicationStore<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        self.trip()?;
        self.inner.get(id).await
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.trip()?;
        self.inner
            .query_by_student_and_institution(student_id, institution_id)
            .await
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.trip()?;
        self.inner.query_by_institution(institution_id).await
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        self.trip()?;
        self.inner.insert(application).await
    }

    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        self.trip()?;
        self.inner.conditional_multi_write(writes).await
    }
}

/// Wraps a store and sleeps before every call.
#[derive(Debug)]
pub struct SlowApplicationStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowApplicationStore<S> {
    /// Creates a wrapper that delays each call by `delay`.
    #[must_use]
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ApplicationStore> ApplicationStore for SlowApplicationStore<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(id).await
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .query_by_student_and_institution(student_id, institution_id)
            .await
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.query_by_institution(institution_id).await
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(application).await
    }

    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.conditional_multi_write(writes).await
    }
}

/// Wraps a store and holds the first `parties` competing-set reads at a
/// barrier until all of them have read, forcing concurrent deciders to act
/// on the same snapshot. Later reads pass straight through.
#[derive(Debug)]
pub struct RacingApplicationStore<S> {
    inner: S,
    barrier: Barrier,
    parties: usize,
    gated: AtomicUsize,
}

impl<S> RacingApplicationStore<S> {
    /// Creates a wrapper that lines up `parties` readers.
    #[must_use]
    pub fn new(inner: S, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            parties,
            gated: AtomicUsize::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ApplicationStore> ApplicationStore for RacingApplicationStore<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        self.inner.get(id).await
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        let result = self
            .inner
            .query_by_student_and_institution(student_id, institution_id)
            .await;
        if self.gated.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.barrier.wait().await;
        }
        result
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.inner.query_by_institution(institution_id).await
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        self.inner.insert(application).await
    }

    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        self.inner.conditional_multi_write(writes).await
    }
}

/// Wraps a store and reports the first `losses` conditional multi-writes as
/// transient failures after they have committed, as when a connection drops
/// between commit and acknowledgement.
#[derive(Debug)]
pub struct LostAckApplicationStore<S> {
    inner: S,
    remaining_losses: AtomicUsize,
    write_calls: AtomicUsize,
}

impl<S> LostAckApplicationStore<S> {
    /// Creates a wrapper that loses `losses` acknowledgements.
    #[must_use]
    pub fn new(inner: S, losses: usize) -> Self {
        Self {
            inner,
            remaining_losses: AtomicUsize::new(losses),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Conditional multi-writes received.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: ApplicationStore> ApplicationStore for LostAckApplicationStore<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        self.inner.get(id).await
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.inner
            .query_by_student_and_institution(student_id, institution_id)
            .await
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.inner.query_by_institution(institution_id).await
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        self.inner.insert(application).await
    }

    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.conditional_multi_write(writes).await?;
        let lost = self
            .remaining_losses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            Err(DomainError::StoreUnavailable("connection reset after commit".into()))
        } else {
            Ok(())
        }
    }
}

/// Wraps a store and sleeps before every conditional multi-write; reads pass
/// straight through.
#[derive(Debug)]
pub struct SlowCommitApplicationStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowCommitApplicationStore<S> {
    /// Creates a wrapper that delays each commit by `delay`.
    #[must_use]
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ApplicationStore> ApplicationStore for SlowCommitApplicationStore<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Application>, DomainError> {
        self.inner.get(id).await
    }

    async fn query_by_student_and_institution(
        &self,
        student_id: Uuid,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.inner
            .query_by_student_and_institution(student_id, institution_id)
            .await
    }

    async fn query_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<Application>, DomainError> {
        self.inner.query_by_institution(institution_id).await
    }

    async fn insert(&self, application: &Application) -> Result<(), DomainError> {
        self.inner.insert(application).await
    }

    async fn conditional_multi_write(&self, writes: &[ConditionalWrite]) -> Result<(), DomainError> {
        tokio::time::sleep(self.delay).await;
        self.inner.conditional_multi_write(writes).await
    }
}
