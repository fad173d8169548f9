//! Lambda adding one view and returning the new count.

use super::Views;
use crate::counter::{Connect, CounterStore, IncrementMode};

/// Advances the counter and returns the new count.
///
/// Unlike [`super::read::handle`], storage errors are not turned into a
/// response. They fail the invocation and are reported to the caller.
pub async fn handle<S>(store: &S, mode: IncrementMode) -> anyhow::Result<u64>
where
    S: CounterStore + ?Sized,
{
    use anyhow::Context;

    crate::counter::advance(store, mode)
        .await
        .context("Unable to increment the view count")
}

/// Runner returning the incremented count.
/// The content of the event is ignored.
#[derive(Debug)]
pub struct IncrementViews<S>(std::marker::PhantomData<S>);

#[async_trait::async_trait]
impl<S> crate::Runner<Views<S>, serde_json::Value, u64> for IncrementViews<S>
where
    S: 'static + CounterStore + Connect,
{
    async fn setup(region: &str) -> anyhow::Result<Views<S>> {
        Views::setup(region).await
    }

    async fn run<'a>(
        shared: &'a Views<S>,
        _event: serde_json::Value,
        _region: &'a str,
    ) -> anyhow::Result<u64> {
        handle(&shared.store, shared.mode).await
    }
}
