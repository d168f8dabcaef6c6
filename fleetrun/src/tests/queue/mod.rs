use std::time::Duration;

use assert_matches::assert_matches;
use rstest::*;

use crate::core::client::queue::sqs::SQS;
use crate::core::client::queue::{JobQueue, QueueError};
use crate::error::job::JobError;
use crate::tests::common::memory_queue::MemoryQueue;
use crate::types::constant::QUEUE_RECEIVE_WAIT;
use crate::types::job::{ExecutableStep, JobDescriptor};

#[rstest]
fn job_message_uses_snake_case_fields() {
    let job = JobDescriptor {
        steps: vec![ExecutableStep::new("solver", ["--input", "a.csv"])],
        input_files: vec!["a.csv".into()],
        output_files: vec!["b.csv".into()],
        files_to_remove: vec!["a.csv".into()],
    };

    let value: serde_json::Value = serde_json::from_str(&job.to_message().unwrap()).unwrap();

    assert_eq!(
        value,
        serde_json::json!({
            "steps": [{ "path": "solver", "arguments": ["--input", "a.csv"] }],
            "input_files": ["a.csv"],
            "output_files": ["b.csv"],
            "files_to_remove": ["a.csv"]
        })
    );
    assert_eq!(JobDescriptor::from_message(&job.to_message().unwrap()).unwrap(), job);
}

#[rstest]
fn missing_lists_default_to_empty() {
    let job = JobDescriptor::from_message(r#"{"steps":[{"path":"/bin/true"}]}"#).unwrap();

    assert_eq!(job.steps, vec![ExecutableStep::new("/bin/true", Vec::<String>::new())]);
    assert!(job.input_files.is_empty() && job.output_files.is_empty() && job.files_to_remove.is_empty());
}

#[rstest]
#[case("not json")]
#[case(r#"{"steps": "solver"}"#)]
fn undecodable_messages_are_malformed(#[case] body: &str) {
    assert_matches!(JobDescriptor::from_message(body), Err(JobError::MalformedMessage(_)));
}

#[rstest]
#[case(r#"{"input_files":["../secrets.txt"]}"#)]
#[case(r#"{"output_files":["/etc/passwd"]}"#)]
#[case(r#"{"files_to_remove":[""]}"#)]
#[case(r#"{"input_files":["data/../../escape"]}"#)]
fn paths_leaving_scratch_are_rejected(#[case] body: &str) {
    assert_matches!(JobDescriptor::from_message(body), Err(JobError::UnsafePath(_)));
}

#[rstest]
fn nested_relative_paths_are_accepted() {
    let job = JobDescriptor::from_message(r#"{"input_files":["data/run-1/a.csv","./b.csv"]}"#).unwrap();
    assert_eq!(job.input_files.len(), 2);
}

#[rstest]
#[tokio::test]
async fn leased_message_is_hidden_until_deleted_or_expired() {
    let queue = MemoryQueue::new();
    queue.enqueue("jobs", "first".to_string()).await.unwrap();

    let leased = queue.lease("jobs", Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(leased.body, "first");
    assert!(queue.lease("jobs", Duration::from_secs(60)).await.unwrap().is_none());
    assert_eq!(queue.approximate_length("jobs").await.unwrap(), 1);

    queue.delete("jobs", &leased.receipt).await.unwrap();
    assert_eq!(queue.approximate_length("jobs").await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn expired_lease_invalidates_the_old_receipt() {
    let queue = MemoryQueue::new();
    queue.enqueue("jobs", "job".to_string()).await.unwrap();

    let first = queue.lease("jobs", Duration::ZERO).await.unwrap().unwrap();
    let second = queue.lease("jobs", Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(first.message_id, second.message_id);

    assert_matches!(queue.delete("jobs", &first.receipt).await, Err(QueueError::UnknownReceipt(_)));
    queue.delete("jobs", &second.receipt).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn leasing_from_an_unknown_queue_fails() {
    let queue = MemoryQueue::new();
    assert_matches!(queue.lease("missing", Duration::from_secs(1)).await, Err(QueueError::QueueNotFound(_)));
}

#[rstest]
#[case::default_wait(QUEUE_RECEIVE_WAIT, 10)]
#[case::zero_still_long_polls(Duration::ZERO, 1)]
#[case::capped_at_twenty(Duration::from_secs(60), 20)]
fn leases_long_poll_within_sqs_limits(#[case] wait: Duration, #[case] expected: i32) {
    assert_eq!(SQS::receive_wait_secs(wait), expected);
}
