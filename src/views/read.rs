//! Lambda returning the current number of views.

use super::Views;
use crate::counter::{Connect, CounterStore};

/// Body of the response if the count can not be read
pub const ERROR_MESSAGE: &str = "An error occurred while retrieving the viewer count.";

/// HTTP style response of [`GetViews`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReadResponse {
    /// `200` with the count, `500` if it could not be read
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// The count, or [`ERROR_MESSAGE`]
    pub body: String,
}

impl ReadResponse {
    fn ok(count: u64) -> Self {
        Self {
            status_code: 200,
            body: count.to_string(),
        }
    }

    fn error() -> Self {
        Self {
            status_code: 500,
            body: ERROR_MESSAGE.into(),
        }
    }
}

/// Reads the count without changing it. Storage errors are logged
/// and answered with a `500` response which does not contain any
/// details.
pub async fn handle<S>(store: &S) -> ReadResponse
where
    S: CounterStore + ?Sized,
{
    match store.get_count().await {
        Ok(counter) => {
            tracing::info!("The total number of views: {}", counter.count);
            ReadResponse::ok(counter.count)
        }
        Err(err) => {
            tracing::error!("{}", err);
            ReadResponse::error()
        }
    }
}

/// Runner returning the current count as [`ReadResponse`].
/// The content of the event is ignored.
#[derive(Debug)]
pub struct GetViews<S>(std::marker::PhantomData<S>);

#[async_trait::async_trait]
impl<S> crate::Runner<Views<S>, serde_json::Value, ReadResponse> for GetViews<S>
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
    ) -> anyhow::Result<ReadResponse> {
        Ok(handle(&shared.store).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MemoryStore;

    #[tokio::test]
    async fn returns_stored_count() {
        let store = MemoryStore::with_count("1", 41);
        assert_eq!(
            handle(&store).await,
            ReadResponse {
                status_code: 200,
                body: "41".into()
            }
        );
    }

    #[tokio::test]
    async fn reading_does_not_change_count() {
        let store = MemoryStore::with_count("1", 5);
        let first = handle(&store).await;
        let second = handle(&store).await;
        assert_eq!(first, second);
        assert_eq!(store.count().await, Some(5));
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn missing_record_is_an_error_response() {
        let store = MemoryStore::empty("1");
        let response = handle(&store).await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn unavailable_store_is_an_error_response() {
        let store = MemoryStore::with_count("1", 41);
        store.fail_gets(true);
        let response = handle(&store).await;
        assert_eq!(response.status_code, 500);
        assert!(!response.body.contains("41"));
    }

    #[test]
    fn response_uses_lambda_proxy_field_names() {
        let json = serde_json::to_value(ReadResponse::ok(42)).expect("serializable");
        assert_eq!(json, serde_json::json!({"statusCode": 200, "body": "42"}));
    }
}
