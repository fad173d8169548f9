//! Lambda functions backing a website visitor counter.
//!
//! A single record in a DynamoDB table holds the number of views. Three
//! lambdas share it:
//!
//! * [`views::read::GetViews`] returns the current count wrapped in an
//!   HTTP style envelope.
//! * [`views::increment::IncrementViews`] adds one to the count and returns
//!   the new value.
//! * [`views::edge::EdgeViews`] runs as a CloudFront trigger, counts the view
//!   as a side effect and always lets the response through with `200 OK`.
//!
//! # Runners
//!
//! Every lambda is a type implementing [`Runner`]. [`Runner::setup`] is called
//! once per execution environment and builds the state which is shared by all
//! invocations of that environment, [`Runner::run`] is called for every
//! invocation.
//!
//! ```no_run
//! struct Runner;
//!
//! #[async_trait::async_trait]
//! impl view_counter::Runner<u64, serde_json::Value, u64> for Runner {
//!     async fn setup(_region: &str) -> anyhow::Result<u64> {
//!         Ok(41)
//!     }
//!
//!     async fn run<'a>(
//!         shared: &'a u64,
//!         _event: serde_json::Value,
//!         _region: &'a str,
//!     ) -> anyhow::Result<u64> {
//!         Ok(*shared + 1)
//!     }
//! }
//!
//! pub fn main() -> anyhow::Result<()> {
//!     view_counter::exec_tokio::<_, _, Runner, _>()
//! }
//! ```
//!
//! # Shared Data
//!
//! With AWS Lambda, its possible to share data between invocations, as long as both
//! invocations use the same runtime environment. The view lambdas use this to keep
//! a single DynamoDB client per environment instead of creating one per invocation.
//! The client itself holds no request specific state.
//!
//! Lambda execution environments never run multiple invocations simultaneously,
//! but multiple environments do run in parallel. The counter record is the only
//! thing they share, see [`counter::IncrementMode`] for what that means for
//! concurrent increments.
//!
//! # Timeout handling
//!
//! Normally, if a lambda runs into a timeout, it will not create an error, which
//! then does not get propagated by `on_error` destinations.
//!
//! To fix that, a timeout handler is setup, which will "fail" 100 miliseconds before
//! the lambda would run into a timeout. There is, however, no gurantee that this
//! handler will fail in time. It only works while the invocation is awaiting,
//! which for the view lambdas is almost always a DynamoDB request.

#![warn(
    absolute_paths_not_starting_with_crate,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    meta_variable_misuse,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    non_ascii_idents,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unstable_features,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    variant_size_differences
)]
#![warn(
    clippy::correctness,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::nursery
)]
#![allow(clippy::multiple_crate_versions, clippy::future_not_send)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod counter;
pub mod logging;
pub mod views;

/// Time before the lambda deadline at which an invocation is failed
const TIMEOUT_MARGIN_IN_MS: u64 = 100;

/// Defines a type which is executed every time a lambda
/// is invoced.
///
/// Types:
/// * `Shared`: Type which is shared between lambda
///             invocations of one execution environment.
///             Created once by [`Runner::setup`].
/// * `Event`:  The expected Event which is being send
///             to the lambda by AWS.
/// * `Return`: Type which is the result of the lamba
///             invocation being returned to AWS
#[async_trait::async_trait]
pub trait Runner<Shared, Event, Return>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Return: serde::Serialize,
{
    /// Invoked only once before lambda runtime start. Does not get called on each
    /// lambda invocation. Sets up logging and builds the shared data, but should
    /// be short as it delays lambda startup
    async fn setup(region: &str) -> anyhow::Result<Shared>;

    /// Invoked for every lambda invocation. Data in `shared` is persisted between
    /// invocations as long as they are running in the same `execution environment`
    ///
    /// More Info: <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-context.html>
    async fn run<'a>(shared: &'a Shared, event: Event, region: &'a str) -> anyhow::Result<Return>;
}

/// Lambda entrypoint. This function sets up a lambda
/// multi-thread runtimes and executes [`exec`]. If you
/// already have your own runtime, use the [`exec`]
/// function.
///
/// Types:
/// * `Shared`: Type which is shared between lambda
///             invocations.
/// * `Event`:  The expected Event which is being send
///             to the lambda by AWS.
/// * `Run`:    Runner which is execued for each lambda
///             invocation.
/// * `Return`: Type which is the result of the lamba
///             invocation being returned to AWS
pub fn exec_tokio<Shared, Event, Run, Return>() -> anyhow::Result<()>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize,
{
    use anyhow::Context;
    use tokio::runtime::Builder;

    Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Unable to build tokio runtime")?
        .block_on(exec::<Shared, Event, Run, Return>())
}

/// Lambda entrypoint. This function requires a
/// running tokio runtime. Alternativly use [`exec_tokio`]
/// which creates one.
///
/// Fails on startup if `AWS_REGION` is not set or
/// [`Runner::setup`] fails.
pub async fn exec<Shared, Event, Run, Return>() -> anyhow::Result<()>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize,
{
    use anyhow::{anyhow, Context};
    use lambda_runtime::{service_fn, LambdaEvent};
    use std::env;

    let region = env::var("AWS_REGION").context("Missing AWS_REGION env variable")?;
    let region_ref = &region;
    let shared = Run::setup(region_ref).await?;
    let shared_ref = &shared;
    tracing::info!("Starting lambda runtime");
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Event>| {
        tracing::info!("Received lambda invocation with event: {:?}", event.payload);
        let deadline: u64 = event.context.deadline;
        run::<_, Event, Run, Return>(shared_ref, event.payload, Some(deadline), region_ref)
    }))
    .await
    .map_err(|e| anyhow!(e))
}

async fn run<Shared, Event, Run, Return>(
    shared: &Shared,
    event: Event,
    deadline_in_ms: Option<u64>,
    region: &str,
) -> anyhow::Result<Return>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize,
{
    use anyhow::anyhow;
    use futures::FutureExt;

    let mut runner = Run::run(shared, event, region).fuse();
    let res = if let Some(deadline_in_ms) = deadline_in_ms {
        let mut timeout = Box::pin(timeout_handler(deadline_in_ms).fuse());
        futures::select! {
            res = runner => res,
            _ = timeout => Err(anyhow!("Lambda failed by running into a timeout")),
        }
    } else {
        runner.await
    };
    tracing::info!("Completed lambda invocation");
    match res {
        Ok(res) => Ok(res),
        Err(err) => {
            tracing::error!("{:?}", err);
            Err(err)
        }
    }
}

async fn timeout_handler(deadline_in_ms: u64) {
    use std::time::{SystemTime, UNIX_EPOCH};
    use tokio::time::Instant;

    let now_instant = Instant::now();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let deadline = now_instant + time_left(deadline_in_ms, now);
    tracing::debug!("Setting deadline to: {:?}", deadline);
    tokio::time::sleep_until(deadline).await;
}

/// Time until the invocation has to be failed, given the
/// lambda deadline and the current time, both since epoch.
/// Saturates at zero for deadlines which already passed.
fn time_left(deadline_in_ms: u64, now: std::time::Duration) -> std::time::Duration {
    use std::time::Duration;

    Duration::from_millis(deadline_in_ms)
        .saturating_sub(now)
        .saturating_sub(Duration::from_millis(TIMEOUT_MARGIN_IN_MS))
}

/// TestData which can be used to test lambda invocations
/// locally in combination with [`exec_test`].
#[derive(serde::Deserialize, Clone, Debug)]
pub struct TestData<Event> {
    /// Region handed to [`Runner::setup`] and [`Runner::run`]
    pub region: String,
    /// Events, invoked in order
    pub invocations: Vec<Event>,
}

/// Lambda entrypoint. This function can be used to
/// test one or multiple lambda invocations locally.
///
/// All invocations share the data created by a single
/// [`Runner::setup`] call, like invocations within one
/// execution environment would. Returns the result of
/// every invocation in order and stops at the first
/// failing one.
///
/// `test_data` is the json representation of [`TestData`].
pub fn exec_test<Shared, Event, Run, Return>(test_data: &str) -> anyhow::Result<Vec<Return>>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize + std::fmt::Debug,
{
    use anyhow::Context;
    use tokio::runtime::Builder;

    Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Unable to build tokio runtime")?
        .block_on(async {
            let test_data: TestData<Event> =
                serde_json::from_str(test_data).context("Unable to deserialize test_data")?;
            let region_ref = &test_data.region;
            let shared = Run::setup(region_ref).await?;
            let shared_ref = &shared;
            tracing::info!("Starting lambda test runtime");

            let mut results = Vec::with_capacity(test_data.invocations.len());
            for (i, data) in test_data.invocations.into_iter().enumerate() {
                tracing::info!("Invocation: {}", i);
                let res = run::<_, Event, Run, Return>(shared_ref, data, None, region_ref).await?;
                tracing::info!("{:?}", res);
                results.push(res);
            }
            Ok(results)
        })
}
