use super::{Counter, CounterStore, StoreError};
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

/// Partition key attribute of the counter table
pub const KEY_ATTRIBUTE: &str = "CounterID";
/// Attribute holding the number of views
pub const COUNT_ATTRIBUTE: &str = "views";

/// Counter record stored in a DynamoDB table.
///
/// The table is keyed by the string attribute [`KEY_ATTRIBUTE`] and stores
/// the count in the number attribute [`COUNT_ATTRIBUTE`]. Requests are not
/// retried by the sdk, a failed request is reported as
/// [`StoreError::Unavailable`] right away.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    counter_id: String,
}

impl std::fmt::Debug for DynamoDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbStore")
            .field("client", &"[...]")
            .field("table_name", &self.table_name)
            .field("counter_id", &self.counter_id)
            .finish()
    }
}

impl DynamoDbStore {
    /// Creates a store using an already configured client
    pub fn new(
        client: aws_sdk_dynamodb::Client,
        table_name: impl Into<String>,
        counter_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            counter_id: counter_id.into(),
        }
    }

    fn key(&self) -> AttributeValue {
        AttributeValue::S(self.counter_id.clone())
    }

    fn invalid(&self, reason: impl Into<String>) -> StoreError {
        StoreError::InvalidRecord {
            id: self.counter_id.clone(),
            reason: reason.into(),
        }
    }

    fn unavailable<E: std::error::Error>(operation: &'static str, err: E) -> StoreError {
        use aws_sdk_dynamodb::error::DisplayErrorContext;

        StoreError::Unavailable {
            operation,
            message: DisplayErrorContext(err).to_string(),
        }
    }

    fn parse_count(&self, item: &HashMap<String, AttributeValue>) -> Result<u64, StoreError> {
        match item.get(COUNT_ATTRIBUTE) {
            Some(AttributeValue::N(count)) => count.parse().map_err(|_| {
                self.invalid(format!(
                    "{} is not a non-negative integer: {}",
                    COUNT_ATTRIBUTE, count
                ))
            }),
            Some(_) => Err(self.invalid(format!("{} is not a number", COUNT_ATTRIBUTE))),
            None => Err(self.invalid(format!("{} is missing", COUNT_ATTRIBUTE))),
        }
    }
}

#[async_trait::async_trait]
impl CounterStore for DynamoDbStore {
    async fn get_count(&self) -> Result<Counter, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, self.key())
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| Self::unavailable("get", err))?;
        tracing::debug!("Received item from {}: {:?}", self.table_name, output.item());
        let item = output.item().ok_or_else(|| StoreError::NotFound {
            id: self.counter_id.clone(),
        })?;
        Ok(Counter {
            id: self.counter_id.clone(),
            count: self.parse_count(item)?,
        })
    }

    async fn put_count(&self, value: u64) -> Result<(), StoreError> {
        let _ = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item(KEY_ATTRIBUTE, self.key())
            .item(COUNT_ATTRIBUTE, AttributeValue::N(value.to_string()))
            .send()
            .await
            .map_err(|err| Self::unavailable("put", err))?;
        tracing::info!("Successfully updated the DynamoDB table");
        Ok(())
    }

    async fn add_count(&self, delta: u64) -> Result<u64, StoreError> {
        use aws_sdk_dynamodb::types::ReturnValue;

        let res = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, self.key())
            .update_expression("ADD #count :delta")
            .condition_expression("attribute_exists(#key) AND attribute_type(#count, :number)")
            .expression_attribute_names("#count", COUNT_ATTRIBUTE)
            .expression_attribute_names("#key", KEY_ATTRIBUTE)
            .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
            .expression_attribute_values(":number", AttributeValue::S("N".into()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await;
        let output = match res {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                return Err(self.condition_failed().await)
            }
            Err(err) => return Err(Self::unavailable("update", err)),
        };
        let attributes = output
            .attributes()
            .ok_or_else(|| self.invalid("update returned no attributes"))?;
        let count = self.parse_count(attributes)?;
        tracing::info!("Successfully updated the DynamoDB table");
        Ok(count)
    }
}

impl DynamoDbStore {
    /// The update condition failed, either the record is missing or
    /// its count is not a number. Reads the record to find out which.
    async fn condition_failed(&self) -> StoreError {
        match self.get_count().await {
            Err(err) => err,
            Ok(counter) => self.invalid(format!(
                "update condition failed although {} is {}",
                COUNT_ATTRIBUTE, counter.count
            )),
        }
    }
}

#[async_trait::async_trait]
impl super::Connect for DynamoDbStore {
    async fn connect(config: &crate::config::Config, region: &str) -> anyhow::Result<Self> {
        use aws_config::{retry::RetryConfig, BehaviorVersion, Region};

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        let client = aws_sdk_dynamodb::Client::new(&sdk_config);
        tracing::info!(
            "Using counter {} in table {}",
            config.counter_id,
            config.table_name
        );
        Ok(Self::new(
            client,
            config.table_name.clone(),
            config.counter_id.clone(),
        ))
    }
}
