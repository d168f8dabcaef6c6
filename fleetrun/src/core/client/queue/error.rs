use aws_sdk_sqs::error::SdkError;
use aws_sdk_sqs::operation::create_queue::CreateQueueError;
use aws_sdk_sqs::operation::delete_message::DeleteMessageError;
use aws_sdk_sqs::operation::get_queue_attributes::GetQueueAttributesError;
use aws_sdk_sqs::operation::get_queue_url::GetQueueUrlError;
use aws_sdk_sqs::operation::receive_message::ReceiveMessageError;
use aws_sdk_sqs::operation::send_message::SendMessageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to get queue url for queue: {0}")]
    FailedToGetQueueUrl(String),
    #[error("Received message without {field} from queue {queue}")]
    IncompleteMessage { queue: String, field: &'static str },
    #[error("Queue {queue} reported an unreadable {attribute}: {value}")]
    InvalidAttribute { queue: String, attribute: String, value: String },
    #[error("Receipt {0} does not belong to a leased message")]
    UnknownReceipt(String),
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),
    #[error("Failed to get queue url: {0}")]
    GetQueueUrlError(#[from] SdkError<GetQueueUrlError>),
    #[error("Failed to create queue: {0}")]
    CreateQueueError(#[from] SdkError<CreateQueueError>),
    #[error("Failed to send message: {0}")]
    SendMessageError(#[from] SdkError<SendMessageError>),
    #[error("Failed to receive message: {0}")]
    ReceiveMessageError(#[from] SdkError<ReceiveMessageError>),
    #[error("Failed to delete message: {0}")]
    DeleteMessageError(#[from] SdkError<DeleteMessageError>),
    #[error("Failed to get queue attributes: {0}")]
    GetQueueAttributesError(#[from] SdkError<GetQueueAttributesError>),
}
