use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use crate::core::client::queue::{JobQueue, LeasedMessage, QueueError};
use crate::types::constant::QUEUE_RECEIVE_WAIT;

/// Messages in flight count as queued: a leased job is not done until it is deleted.
const LENGTH_ATTRIBUTES: [QueueAttributeName; 2] =
    [QueueAttributeName::ApproximateNumberOfMessages, QueueAttributeName::ApproximateNumberOfMessagesNotVisible];

#[derive(Clone, Debug)]
pub struct SQS(Client);

impl SQS {
    /// Creates a new instance of SQS with the provided AWS configuration.
    pub fn new(aws_config: &SdkConfig) -> Self {
        let sqs_config_builder = aws_sdk_sqs::config::Builder::from(aws_config);
        Self(Client::from_conf(sqs_config_builder.build()))
    }

    pub fn client(&self) -> &Client {
        &self.0
    }

    /// get_queue_url_from_client - Get the queue URL from the client
    /// This function returns the queue URL based on the queue name.
    pub async fn get_queue_url_from_client(&self, queue_name: &str) -> Result<String, QueueError> {
        Ok(self
            .client()
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await?
            .queue_url()
            .ok_or_else(|| QueueError::FailedToGetQueueUrl(queue_name.to_string()))?
            .to_string())
    }

    fn timeout_secs(visibility_timeout: Duration) -> i32 {
        i32::try_from(visibility_timeout.as_secs()).unwrap_or(i32::MAX)
    }

    /// Long poll window in seconds. A short poll may come back empty while
    /// messages are still visible.
    pub(crate) fn receive_wait_secs(wait: Duration) -> i32 {
        Self::timeout_secs(wait).clamp(1, 20)
    }
}

#[async_trait]
impl JobQueue for SQS {
    async fn ensure_queue(&self, queue: &str, visibility_timeout: Duration) -> Result<(), QueueError> {
        let mut attributes = HashMap::new();
        attributes.insert(QueueAttributeName::VisibilityTimeout, Self::timeout_secs(visibility_timeout).to_string());
        // CreateQueue is idempotent for an existing queue with identical attributes.
        let output = self.client().create_queue().queue_name(queue).set_attributes(Some(attributes)).send().await?;
        info!(queue = %queue, url = ?output.queue_url(), "Queue ready");
        Ok(())
    }

    async fn enqueue(&self, queue: &str, payload: String) -> Result<(), QueueError> {
        let queue_url = self.get_queue_url_from_client(queue).await?;
        self.client().send_message().queue_url(queue_url).message_body(payload).send().await?;
        Ok(())
    }

    async fn lease(&self, queue: &str, visibility_timeout: Duration) -> Result<Option<LeasedMessage>, QueueError> {
        let queue_url = self.get_queue_url_from_client(queue).await?;
        let output = self
            .client()
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(Self::receive_wait_secs(QUEUE_RECEIVE_WAIT))
            .visibility_timeout(Self::timeout_secs(visibility_timeout))
            .send()
            .await?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };
        let body = message
            .body()
            .ok_or_else(|| QueueError::IncompleteMessage { queue: queue.to_string(), field: "body" })?;
        let receipt = message
            .receipt_handle()
            .ok_or_else(|| QueueError::IncompleteMessage { queue: queue.to_string(), field: "receipt handle" })?;

        debug!(queue = %queue, message_id = ?message.message_id(), "Leased message");
        Ok(Some(LeasedMessage {
            message_id: message.message_id().map(str::to_string),
            body: body.to_string(),
            receipt: receipt.to_string(),
        }))
    }

    async fn delete(&self, queue: &str, receipt: &str) -> Result<(), QueueError> {
        let queue_url = self.get_queue_url_from_client(queue).await?;
        self.client().delete_message().queue_url(queue_url).receipt_handle(receipt).send().await?;
        Ok(())
    }

    async fn approximate_length(&self, queue: &str) -> Result<u64, QueueError> {
        let queue_url = self.get_queue_url_from_client(queue).await?;
        let output = self
            .client()
            .get_queue_attributes()
            .queue_url(queue_url)
            .set_attribute_names(Some(LENGTH_ATTRIBUTES.to_vec()))
            .send()
            .await?;

        let Some(attributes) = output.attributes() else {
            return Ok(0);
        };
        LENGTH_ATTRIBUTES.iter().filter_map(|name| attributes.get(name).map(|value| (name, value))).try_fold(
            0u64,
            |total, (name, value)| {
                let count = value.parse::<u64>().map_err(|_| QueueError::InvalidAttribute {
                    queue: queue.to_string(),
                    attribute: name.as_str().to_string(),
                    value: value.clone(),
                })?;
                Ok(total + count)
            },
        )
    }
}
