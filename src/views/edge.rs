//! Lambda@Edge function counting views of a CloudFront distribution.
//!
//! The function is attached to a viewer or origin response. It counts the
//! view as a side effect and hands the response back to CloudFront with
//! `200 OK`. The outcome of counting never changes the response: if the
//! counter can not be read or written, the error is logged and the response
//! is delivered anyway, so a storage outage never blocks content.
//!
//! Events without a response object are rejected before the counter is
//! touched, as there is nothing that could be delivered.

use super::Views;
use crate::counter::{Connect, CounterStore, IncrementMode};
use std::collections::HashMap;

/// Event send by CloudFront
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct EdgeEvent {
    /// CloudFront records, only the first one is used
    #[serde(rename = "Records", default)]
    pub records: Vec<EdgeRecord>,
}

/// Single record of an [`EdgeEvent`]
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct EdgeRecord {
    /// CloudFront payload of the record
    #[serde(default)]
    pub cf: Option<CloudFront>,
}

/// CloudFront part of an [`EdgeRecord`]
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CloudFront {
    /// Response which is about to be delivered
    #[serde(default)]
    pub response: Option<EdgeResponse>,
    /// Other fields like `config` and `request`
    #[serde(flatten)]
    pub o: HashMap<String, serde_json::Value>,
}

/// Response object passed through by CloudFront.
///
/// Only the status fields are typed. Every other field is preserved
/// and returned unchanged.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EdgeResponse {
    /// Status code, CloudFront sends it as string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EdgeStatus>,
    /// Reason phrase of the status
    #[serde(
        rename = "statusDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub status_description: Option<String>,
    /// Other fields like `headers`
    #[serde(flatten)]
    pub o: HashMap<String, serde_json::Value>,
}

/// Status code of an [`EdgeResponse`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum EdgeStatus {
    /// Numeric code, as set by [`handle`]
    Code(u16),
    /// Code as string, as send by CloudFront
    Text(String),
}

/// Event does not contain a response which could be returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEventError {
    /// `Records` is empty or missing
    #[error("CloudFront event does not contain any record")]
    MissingRecord,
    /// First record has no `cf` object
    #[error("CloudFront record does not contain a cf object")]
    MissingCloudFront,
    /// `cf` object has no `response`
    #[error("CloudFront record does not contain a response object")]
    MissingResponse,
}

impl EdgeEvent {
    /// Extracts the response of the first record
    pub fn into_response(self) -> Result<EdgeResponse, MalformedEventError> {
        self.records
            .into_iter()
            .next()
            .ok_or(MalformedEventError::MissingRecord)?
            .cf
            .ok_or(MalformedEventError::MissingCloudFront)?
            .response
            .ok_or(MalformedEventError::MissingResponse)
    }
}

impl EdgeResponse {
    fn set_ok(&mut self) {
        self.status = Some(EdgeStatus::Code(200));
        self.status_description = Some("OK".into());
    }
}

/// Counts the view and returns the response of `event` with `200 OK`.
///
/// Only a malformed event is an error. Storage errors are logged and
/// do not change the returned response.
pub async fn handle<S>(
    store: &S,
    mode: IncrementMode,
    event: EdgeEvent,
) -> Result<EdgeResponse, MalformedEventError>
where
    S: CounterStore + ?Sized,
{
    let mut response = event.into_response()?;
    tracing::info!("{:?}", response);
    match crate::counter::advance(store, mode).await {
        Ok(count) => tracing::debug!("Counted view {}", count),
        Err(err) => tracing::error!("{}", err),
    }
    response.set_ok();
    Ok(response)
}

/// Runner for CloudFront viewer and origin response triggers
#[derive(Debug)]
pub struct EdgeViews<S>(std::marker::PhantomData<S>);

#[async_trait::async_trait]
impl<S> crate::Runner<Views<S>, EdgeEvent, EdgeResponse> for EdgeViews<S>
where
    S: 'static + CounterStore + Connect,
{
    async fn setup(region: &str) -> anyhow::Result<Views<S>> {
        Views::setup(region).await
    }

    async fn run<'a>(
        shared: &'a Views<S>,
        event: EdgeEvent,
        _region: &'a str,
    ) -> anyhow::Result<EdgeResponse> {
        Ok(handle(&shared.store, shared.mode, event).await?)
    }
}
