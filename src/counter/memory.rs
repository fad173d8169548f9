use super::{Counter, CounterStore, StoreError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counter record held in process memory.
///
/// Used for local runs through [`crate::exec_test`] and for tests.
/// Failures of the backend can be simulated with [`MemoryStore::fail_gets`]
/// and [`MemoryStore::fail_puts`].
#[derive(Debug)]
pub struct MemoryStore {
    id: String,
    count: tokio::sync::Mutex<Option<u64>>,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryStore {
    /// Store holding a record `id` with `count` views
    pub fn with_count(id: impl Into<String>, count: u64) -> Self {
        Self::new(id.into(), Some(count))
    }

    /// Store without a record, as if the table was never seeded
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id.into(), None)
    }

    fn new(id: String, count: Option<u64>) -> Self {
        Self {
            id,
            count: tokio::sync::Mutex::new(count),
            fail_gets: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
        }
    }

    /// Currently stored count, `None` if there is no record
    pub async fn count(&self) -> Option<u64> {
        *self.count.lock().await
    }

    /// Number of successful writes
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Lets every following read and atomic add fail as unavailable
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Lets every following write and atomic add fail as unavailable
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    fn unavailable(operation: &'static str) -> StoreError {
        StoreError::Unavailable {
            operation,
            message: "memory store is set to fail".into(),
        }
    }

    fn not_found(&self) -> StoreError {
        StoreError::NotFound {
            id: self.id.clone(),
        }
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryStore {
    async fn get_count(&self) -> Result<Counter, StoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Self::unavailable("get"));
        }
        let count = self.count.lock().await.ok_or_else(|| self.not_found())?;
        Ok(Counter {
            id: self.id.clone(),
            count,
        })
    }

    async fn put_count(&self, value: u64) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::unavailable("put"));
        }
        *self.count.lock().await = Some(value);
        let _ = self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_count(&self, delta: u64) -> Result<u64, StoreError> {
        if self.fail_gets.load(Ordering::SeqCst) || self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::unavailable("update"));
        }
        let mut count = self.count.lock().await;
        let current = count.ok_or_else(|| self.not_found())?;
        let updated = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::InvalidRecord {
                id: self.id.clone(),
                reason: "count can not be incremented any further".into(),
            })?;
        *count = Some(updated);
        let _ = self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}

/// Seeds the record with a count of zero, standing in for the
/// provisioning step of a real table.
#[async_trait::async_trait]
impl super::Connect for MemoryStore {
    async fn connect(config: &crate::config::Config, _region: &str) -> anyhow::Result<Self> {
        Ok(Self::with_count(config.counter_id.clone(), 0))
    }
}
