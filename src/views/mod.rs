//! Runners of the view lambdas.
//!
//! All runners share the same [`Views`] state and are generic over the
//! [`CounterStore`]. The deployed binaries use [`crate::counter::DynamoDbStore`], local runs
//! can use [`crate::counter::MemoryStore`] instead.
//!
//! # Usage
//!
//! ```no_run
//! use view_counter::{counter::DynamoDbStore, views::read::GetViews};
//!
//! pub fn main() -> anyhow::Result<()> {
//!     view_counter::exec_tokio::<_, _, GetViews<DynamoDbStore>, _>()
//! }
//! ```
//!
//! Every invocation runs the same sequence: read the counter, and for the
//! incrementing runners write `count + 1` back. Nothing is retried, each
//! failure ends the invocation with a logged error.

pub mod edge;
pub mod increment;
pub mod read;

use crate::counter::{Connect, CounterStore, IncrementMode};

/// Data shared by all invocations of one execution environment
#[derive(Debug)]
pub struct Views<S> {
    /// Handle to the counter record. Created once, reused by every invocation
    pub store: S,
    /// How the counter is advanced
    pub mode: IncrementMode,
}

impl<S> Views<S>
where
    S: CounterStore + Connect,
{
    /// Reads the [`crate::config::Config`] from the environment, installs
    /// logging and connects to the store
    pub async fn setup(region: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let config = crate::config::Config::from_env().context("Unable to read configuration")?;
        crate::logging::init(config.log_level);
        Self::connect(&config, region).await
    }

    /// Connects to the store described by `config`
    pub async fn connect(config: &crate::config::Config, region: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let store = S::connect(config, region)
            .await
            .context("Unable to connect to counter store")?;
        Ok(Self {
            store,
            mode: config.increment_mode,
        })
    }
}
