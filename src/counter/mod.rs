//! Access to the counter record.
//!
//! The record is created when the table is provisioned and is never
//! created or deleted by the lambdas. A missing record is reported as
//! [`StoreError::NotFound`] and never treated as a count of zero.
//!
//! Two stores are available:
//!
//! * [`DynamoDbStore`]: The record in DynamoDB, used by the deployed lambdas
//! * [`MemoryStore`]: An in-process record, used for local runs and tests

mod dynamodb;
mod memory;

pub use dynamodb::{DynamoDbStore, COUNT_ATTRIBUTE, KEY_ATTRIBUTE};
pub use memory::MemoryStore;

/// The counter record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Counter {
    /// Fixed identifier of the record
    pub id: String,
    /// Number of views
    pub count: u64,
}

/// Errors of the storage layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The counter record does not exist
    #[error("Counter record with id {id} does not exist")]
    NotFound {
        /// Identifier which was looked up
        id: String,
    },
    /// The record exists but does not hold a usable count
    #[error("Counter record with id {id} is invalid: {reason}")]
    InvalidRecord {
        /// Identifier of the record
        id: String,
        /// What is wrong with it
        reason: String,
    },
    /// The storage backend failed or could not be reached
    #[error("Unable to {operation} counter record: {message}")]
    Unavailable {
        /// Operation which failed
        operation: &'static str,
        /// Backend error description
        message: String,
    },
}

/// Get and put access to the counter record
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetches the counter record
    async fn get_count(&self) -> Result<Counter, StoreError>;

    /// Overwrites the count of the record with `value`, unconditionally
    async fn put_count(&self, value: u64) -> Result<(), StoreError>;

    /// Adds `delta` to the stored count in a single operation
    /// and returns the new count. Fails with [`StoreError::NotFound`]
    /// instead of creating the record.
    async fn add_count(&self, delta: u64) -> Result<u64, StoreError>;
}

/// Stores which can be built during [`crate::Runner::setup`]
#[async_trait::async_trait]
pub trait Connect: Sized {
    /// Builds the store for `region`
    async fn connect(config: &crate::config::Config, region: &str) -> anyhow::Result<Self>;
}

/// How a counter is advanced by one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IncrementMode {
    /// Get the count, add one and put it back. Two parallel
    /// invocations may read the same count and both write
    /// `count + 1`, losing one view.
    #[default]
    ReadModifyWrite,
    /// Let the store add one in a single request
    Atomic,
}

/// Error returned for unknown [`IncrementMode`] names
#[derive(Debug, thiserror::Error)]
#[error("Unknown increment mode {0}, expected read-modify-write or atomic")]
pub struct ParseIncrementModeError(String);

impl std::str::FromStr for IncrementMode {
    type Err = ParseIncrementModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read-modify-write" | "read_modify_write" => Ok(Self::ReadModifyWrite),
            "atomic" => Ok(Self::Atomic),
            _ => Err(ParseIncrementModeError(s.to_owned())),
        }
    }
}

/// Advances the count by one and returns the new count.
///
/// With [`IncrementMode::ReadModifyWrite`] nothing is written if
/// reading fails. If writing fails, the error is returned and the
/// stored count stays at its previous value. There are no retries.
pub async fn advance<S>(store: &S, mode: IncrementMode) -> Result<u64, StoreError>
where
    S: CounterStore + ?Sized,
{
    match mode {
        IncrementMode::ReadModifyWrite => {
            let counter = store.get_count().await?;
            let count = counter
                .count
                .checked_add(1)
                .ok_or_else(|| StoreError::InvalidRecord {
                    id: counter.id.clone(),
                    reason: "count can not be incremented any further".into(),
                })?;
            tracing::info!("Current total view count is {}.", count);
            store.put_count(count).await?;
            Ok(count)
        }
        IncrementMode::Atomic => {
            let count = store.add_count(1).await?;
            tracing::info!("Current total view count is {}.", count);
            Ok(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lets two callers meet after reading and before adding,
    /// as two parallel invocations would.
    struct Interleaved {
        inner: MemoryStore,
        barrier: tokio::sync::Barrier,
    }

    impl Interleaved {
        fn new(count: u64) -> Self {
            Self {
                inner: MemoryStore::with_count("1", count),
                barrier: tokio::sync::Barrier::new(2),
            }
        }
    }

    #[async_trait::async_trait]
    impl CounterStore for Interleaved {
        async fn get_count(&self) -> Result<Counter, StoreError> {
            let counter = self.inner.get_count().await?;
            let _ = self.barrier.wait().await;
            Ok(counter)
        }

        async fn put_count(&self, value: u64) -> Result<(), StoreError> {
            self.inner.put_count(value).await
        }

        async fn add_count(&self, delta: u64) -> Result<u64, StoreError> {
            let _ = self.barrier.wait().await;
            self.inner.add_count(delta).await
        }
    }

    #[tokio::test]
    async fn parallel_read_modify_write_loses_a_view() {
        let store = Interleaved::new(10);
        let (first, second) = tokio::join!(
            advance(&store, IncrementMode::ReadModifyWrite),
            advance(&store, IncrementMode::ReadModifyWrite)
        );
        assert_eq!(first.ok(), Some(11));
        assert_eq!(second.ok(), Some(11));
        assert_eq!(store.inner.count().await, Some(11));
        assert_eq!(store.inner.puts(), 2);
    }

    #[tokio::test]
    async fn parallel_atomic_counts_every_view() {
        let store = Interleaved::new(10);
        let (first, second) = tokio::join!(
            advance(&store, IncrementMode::Atomic),
            advance(&store, IncrementMode::Atomic)
        );
        let mut counts = [
            first.expect("store is healthy"),
            second.expect("store is healthy"),
        ];
        counts.sort_unstable();
        assert_eq!(counts, [11, 12]);
        assert_eq!(store.inner.count().await, Some(12));
    }

    #[tokio::test]
    async fn atomic_with_failing_store_does_not_write() {
        let store = MemoryStore::with_count("1", 7);
        store.fail_gets(true);
        let err = advance(&store, IncrementMode::Atomic)
            .await
            .expect_err("store fails");
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(store.count().await, Some(7));
    }

    #[test]
    fn increment_modes_parse() {
        assert_eq!(
            "read-modify-write".parse::<IncrementMode>().ok(),
            Some(IncrementMode::ReadModifyWrite)
        );
        assert_eq!(
            "ATOMIC".parse::<IncrementMode>().ok(),
            Some(IncrementMode::Atomic)
        );
        assert!("sometimes".parse::<IncrementMode>().is_err());
    }

    #[tokio::test]
    async fn read_modify_write_advances_by_one() {
        let store = MemoryStore::with_count("1", 41);
        let count = advance(&store, IncrementMode::ReadModifyWrite)
            .await
            .expect("store is healthy");
        assert_eq!(count, 42);
        assert_eq!(store.count().await, Some(42));
    }

    #[tokio::test]
    async fn atomic_advances_by_one() {
        let store = MemoryStore::with_count("1", 41);
        let count = advance(&store, IncrementMode::Atomic)
            .await
            .expect("store is healthy");
        assert_eq!(count, 42);
        assert_eq!(store.count().await, Some(42));
    }

    #[tokio::test]
    async fn failed_read_does_not_write() {
        let store = MemoryStore::with_count("1", 7);
        store.fail_gets(true);
        let err = advance(&store, IncrementMode::ReadModifyWrite)
            .await
            .expect_err("get fails");
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(store.puts(), 0);
        assert_eq!(store.count().await, Some(7));
    }

    #[tokio::test]
    async fn missing_record_is_not_treated_as_zero() {
        for mode in [IncrementMode::ReadModifyWrite, IncrementMode::Atomic] {
            let store = MemoryStore::empty("1");
            let err = advance(&store, mode).await.expect_err("record is missing");
            assert!(matches!(err, StoreError::NotFound { .. }));
            assert_eq!(store.count().await, None);
        }
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_count() {
        let store = MemoryStore::with_count("1", 7);
        store.fail_puts(true);
        let err = advance(&store, IncrementMode::ReadModifyWrite)
            .await
            .expect_err("put fails");
        assert!(matches!(err, StoreError::Unavailable { operation: "put", .. }));
        assert_eq!(store.count().await, Some(7));
    }

    #[tokio::test]
    async fn saturated_count_is_invalid() {
        let store = MemoryStore::with_count("1", u64::MAX);
        let err = advance(&store, IncrementMode::ReadModifyWrite)
            .await
            .expect_err("count would overflow");
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(store.puts(), 0);
    }
}
