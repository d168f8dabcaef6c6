use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use bytes::Bytes;
use mockall::Sequence;
use reqwest::StatusCode;
use rstest::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::core::client::control_plane::{ControlPlaneError, MockControlPlaneClient};
use crate::core::client::queue::JobQueue;
use crate::deployment::DeploymentMonitor;
use crate::error::deployment::DeploymentError;
use crate::error::FleetError;
use crate::runner::OperatorDriver;
use crate::tests::common::memory_queue::MemoryQueue;
use crate::tests::common::memory_store::MemoryObjectStore;
use crate::tests::common::{small_block_settings, write_file};
use crate::transfer::ChunkedTransferEngine;
use crate::types::deployment::{
    AsyncOperationHandle, DeploymentLifecycleState, DeploymentStatus, InstanceState, InstanceStatus, OperationStatus,
    QuorumPolicy,
};
use crate::types::job::ExecutableStep;
use crate::types::manifest::{ManifestError, RunManifest, RunnerOperation};

/// Writes the local files a manifest refers to and returns the manifest.
fn manifest_in(dir: &Path) -> RunManifest {
    write_file(&dir.join("worker.zip"), b"package-bytes");
    write_file(&dir.join("setup.sh"), b"#!/bin/sh\n");
    write_file(&dir.join("input.csv"), b"1,2,3\n");

    let yaml = format!(
        r#"
package_file: {dir}/worker.zip
staging_files: [{dir}/setup.sh]
staging_actions:
  - path: setup.sh
    arguments: ["--install"]
data_files: [{dir}/input.csv]
service_name: solver
queue_name: jobs
output_location: {dir}/results
jobs:
  - steps: [{{ path: solver, arguments: [input.csv] }}]
    input_files: [input.csv]
    output_files: [result.csv]
  - steps: [{{ path: solver, arguments: ["--check"] }}]
"#,
        dir = dir.display()
    );
    RunManifest::from_yaml(&yaml).unwrap()
}

fn driver(
    manifest: RunManifest,
    store: Arc<MemoryObjectStore>,
    queue: Arc<MemoryQueue>,
    client: MockControlPlaneClient,
    token: CancellationToken,
) -> OperatorDriver {
    let engine = ChunkedTransferEngine::new(store, small_block_settings(8, 2));
    let monitor =
        DeploymentMonitor::new(Arc::new(client), Duration::from_millis(5), QuorumPolicy::default(), token.clone());
    OperatorDriver::new(manifest, "fleet-bucket", engine, queue, monitor, Duration::from_millis(5), token)
}

fn stopped_fleet() -> DeploymentLifecycleState {
    DeploymentLifecycleState {
        main_status: DeploymentStatus::Suspended,
        instances: vec![InstanceState {
            role_name: "worker".to_string(),
            instance_name: "worker_IN_0".to_string(),
            status: InstanceStatus::Stopped,
        }],
    }
}

/// Expects stop, the stopped wait and delete, in that order.
fn expect_cleanup(client: &mut MockControlPlaneClient) {
    let mut seq = Sequence::new();
    client
        .expect_submit_update_deployment_status()
        .withf(|target, status| target.service_name == "solver" && *status == DeploymentStatus::Suspended)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(AsyncOperationHandle::new("op-stop")));
    client
        .expect_poll_operation()
        .withf(|handle| handle.request_id == "op-stop")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(OperationStatus::Succeeded));
    client.expect_get_deployment_status().times(1).in_sequence(&mut seq).returning(|_| Ok(stopped_fleet()));
    client
        .expect_submit_delete_deployment()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(AsyncOperationHandle::new("op-delete")));
    client
        .expect_poll_operation()
        .withf(|handle| handle.request_id == "op-delete")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(OperationStatus::Succeeded));
}

#[rstest]
#[tokio::test]
async fn staging_uploads_every_file_under_its_prefix() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let driver = driver(
        manifest_in(dir.path()),
        store.clone(),
        Arc::new(MemoryQueue::new()),
        MockControlPlaneClient::new(),
        CancellationToken::new(),
    );

    let package_url = driver.stage_files().await.unwrap();

    assert_eq!(package_url, "memory://packages/worker.zip");
    assert_eq!(
        store.keys(),
        vec![
            "datafiles/input.csv".to_string(),
            "packages/worker.zip".to_string(),
            "stagingfiles/setup.sh".to_string(),
            "stagingfiles/staging_actions.json".to_string(),
        ]
    );
    let actions: Vec<ExecutableStep> =
        serde_json::from_slice(&store.object("stagingfiles/staging_actions.json").unwrap()).unwrap();
    assert_eq!(actions, vec![ExecutableStep::new("setup.sh", ["--install"])]);
}

#[rstest]
#[tokio::test]
async fn staging_twice_replaces_stale_actions() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("stagingfiles/staging_actions.json", Bytes::from_static(br#"[{"path":"old.sh"}]"#));

    let mut manifest = manifest_in(dir.path());
    manifest.staging_actions.clear();
    let driver =
        driver(manifest, store.clone(), Arc::new(MemoryQueue::new()), MockControlPlaneClient::new(), CancellationToken::new());

    driver.stage_files().await.unwrap();

    let actions: Vec<ExecutableStep> =
        serde_json::from_slice(&store.object("stagingfiles/staging_actions.json").unwrap()).unwrap();
    assert!(actions.is_empty());
}

#[rstest]
#[tokio::test]
async fn jobs_are_published_in_manifest_order() {
    let dir = TempDir::new().unwrap();
    let manifest = manifest_in(dir.path());
    let expected: Vec<String> = manifest.jobs.iter().map(|job| job.to_message().unwrap()).collect();
    let queue = Arc::new(MemoryQueue::new());
    let driver = driver(
        manifest,
        Arc::new(MemoryObjectStore::new()),
        queue.clone(),
        MockControlPlaneClient::new(),
        CancellationToken::new(),
    );

    assert_eq!(driver.publish_jobs().await.unwrap(), 2);
    assert_eq!(queue.bodies("jobs"), expected);
}

#[rstest]
#[tokio::test]
async fn queue_wait_returns_once_workers_drain_it() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(MemoryQueue::new());
    queue.enqueue("jobs", "{}".to_string()).await.unwrap();
    let driver = driver(
        manifest_in(dir.path()),
        Arc::new(MemoryObjectStore::new()),
        queue.clone(),
        MockControlPlaneClient::new(),
        CancellationToken::new(),
    );

    let worker_queue = Arc::clone(&queue);
    let consumer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let message = worker_queue.lease("jobs", Duration::from_secs(60)).await.unwrap().unwrap();
        worker_queue.delete("jobs", &message.receipt).await.unwrap();
    });

    driver.wait_for_queue_empty().await.unwrap();
    consumer.await.unwrap();
    assert!(queue.bodies("jobs").is_empty());
}

#[rstest]
#[tokio::test]
async fn queue_wait_stops_on_cancellation() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(MemoryQueue::new());
    queue.enqueue("jobs", "{}".to_string()).await.unwrap();
    let token = CancellationToken::new();
    let driver = driver(
        manifest_in(dir.path()),
        Arc::new(MemoryObjectStore::new()),
        queue,
        MockControlPlaneClient::new(),
        token.clone(),
    );
    token.cancel();

    assert_matches!(driver.wait_for_queue_empty().await, Err(FleetError::Cancelled("queue drain")));
}

#[rstest]
#[tokio::test]
async fn output_is_downloaded_into_the_output_location() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("output/result.csv", Bytes::from_static(b"answer,42\n"));
    store.insert("output/logs/run.log", Bytes::from_static(b"ok\n"));
    let driver = driver(
        manifest_in(dir.path()),
        store,
        Arc::new(MemoryQueue::new()),
        MockControlPlaneClient::new(),
        CancellationToken::new(),
    );

    let files = driver.retrieve_output().await.unwrap();

    let results = dir.path().join("results");
    assert_eq!(files, vec![results.join("logs").join("run.log"), results.join("result.csv")]);
    assert_eq!(std::fs::read(results.join("result.csv")).unwrap(), b"answer,42\n");
}

#[rstest]
#[tokio::test]
async fn cleanup_stops_waits_and_deletes() {
    let dir = TempDir::new().unwrap();
    let mut client = MockControlPlaneClient::new();
    expect_cleanup(&mut client);
    let driver = driver(
        manifest_in(dir.path()),
        Arc::new(MemoryObjectStore::new()),
        Arc::new(MemoryQueue::new()),
        client,
        CancellationToken::new(),
    );

    driver.execute(RunnerOperation::Cleanup).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn full_run_tears_the_fleet_down_when_creation_fails() {
    let dir = TempDir::new().unwrap();
    let mut client = MockControlPlaneClient::new();
    client.expect_submit_create_deployment().times(1).returning(|_| {
        Err(ControlPlaneError::ApiError {
            operation: "create deployment",
            status: StatusCode::CONFLICT,
            message: "deployment already exists".to_string(),
        })
    });
    expect_cleanup(&mut client);
    let driver = driver(
        manifest_in(dir.path()),
        Arc::new(MemoryObjectStore::new()),
        Arc::new(MemoryQueue::new()),
        client,
        CancellationToken::new(),
    );

    let result = driver.execute(RunnerOperation::FullRun).await;

    assert_matches!(
        result,
        Err(FleetError::Deployment(DeploymentError::ControlPlane(ControlPlaneError::ApiError { status, .. })))
            if status == StatusCode::CONFLICT
    );
}

#[rstest]
#[tokio::test]
async fn full_run_tears_the_fleet_down_after_cancellation() {
    let dir = TempDir::new().unwrap();
    let stop_submitted = Arc::new(AtomicBool::new(false));
    let stop_polls = Arc::new(AtomicUsize::new(0));

    let mut client = MockControlPlaneClient::new();
    client.expect_submit_create_deployment().times(1).returning(|_| Ok(AsyncOperationHandle::new("op-create")));
    client
        .expect_submit_update_deployment_status()
        .withf(|_, status| *status == DeploymentStatus::Running)
        .times(1)
        .returning(|_, _| Ok(AsyncOperationHandle::new("op-start")));
    let stopping = Arc::clone(&stop_submitted);
    client
        .expect_submit_update_deployment_status()
        .withf(|_, status| *status == DeploymentStatus::Suspended)
        .times(1)
        .returning(move |_, _| {
            stopping.store(true, Ordering::SeqCst);
            Ok(AsyncOperationHandle::new("op-stop"))
        });
    // The stop needs a second poll, so teardown has to pause after the run was cancelled.
    let polls = Arc::clone(&stop_polls);
    client.expect_poll_operation().returning(move |handle| {
        if handle.request_id == "op-stop" && polls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(OperationStatus::InProgress);
        }
        Ok(OperationStatus::Succeeded)
    });
    let stopped = Arc::clone(&stop_submitted);
    client.expect_get_deployment_status().returning(move |_| {
        if stopped.load(Ordering::SeqCst) {
            return Ok(stopped_fleet());
        }
        Ok(DeploymentLifecycleState {
            main_status: DeploymentStatus::Running,
            instances: vec![InstanceState {
                role_name: "worker".to_string(),
                instance_name: "worker_IN_0".to_string(),
                status: InstanceStatus::Ready,
            }],
        })
    });
    client.expect_submit_delete_deployment().times(1).returning(|_| Ok(AsyncOperationHandle::new("op-delete")));

    let token = CancellationToken::new();
    // Nothing drains the queue, so the run only ends through the token.
    let driver = driver(
        manifest_in(dir.path()),
        Arc::new(MemoryObjectStore::new()),
        Arc::new(MemoryQueue::new()),
        client,
        token.clone(),
    );
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let result = driver.execute(RunnerOperation::FullRun).await;
    canceller.await.unwrap();

    assert_matches!(result, Err(FleetError::Cancelled("queue drain")));
    assert!(stop_submitted.load(Ordering::SeqCst));
    assert_eq!(stop_polls.load(Ordering::SeqCst), 2);
}

#[rstest]
#[tokio::test]
async fn deploy_creates_the_fleet_with_node_settings() {
    let dir = TempDir::new().unwrap();
    let mut manifest = manifest_in(dir.path());
    manifest.label = Some("nightly".to_string());
    manifest.instance_count = 2;
    let queue = Arc::new(MemoryQueue::new());

    let mut client = MockControlPlaneClient::new();
    client
        .expect_submit_create_deployment()
        .withf(|request| {
            request.package_url == "memory://packages/worker.zip"
                && request.label == "nightly"
                && request.instance_count == 2
                && !request.start_deployment
                && request.node_settings.bucket == "fleet-bucket"
                && request.node_settings.queue_name == "jobs"
        })
        .times(1)
        .returning(|_| Ok(AsyncOperationHandle::new("op-create")));
    client
        .expect_submit_update_deployment_status()
        .withf(|_, status| *status == DeploymentStatus::Running)
        .times(1)
        .returning(|_, _| Ok(AsyncOperationHandle::new("op-start")));
    client.expect_poll_operation().times(2).returning(|_| Ok(OperationStatus::Succeeded));

    // Reporting ready also plays the fleet: it drains the queue.
    let fleet_queue = Arc::clone(&queue);
    client.expect_get_deployment_status().returning(move |_| {
        fleet_queue.clear("jobs");
        Ok(DeploymentLifecycleState {
            main_status: DeploymentStatus::Running,
            instances: vec![InstanceState {
                role_name: "worker".to_string(),
                instance_name: "worker_IN_0".to_string(),
                status: InstanceStatus::Ready,
            }],
        })
    });

    let driver = driver(manifest, Arc::new(MemoryObjectStore::new()), queue.clone(), client, CancellationToken::new());

    driver.execute(RunnerOperation::Deploy).await.unwrap();
    assert!(queue.bodies("jobs").is_empty());
}

#[rstest]
#[tokio::test]
async fn operations_validate_the_manifest_first() {
    let dir = TempDir::new().unwrap();
    let mut manifest = manifest_in(dir.path());
    manifest.package_file = None;
    let driver = driver(
        manifest,
        Arc::new(MemoryObjectStore::new()),
        Arc::new(MemoryQueue::new()),
        MockControlPlaneClient::new(),
        CancellationToken::new(),
    );

    assert_matches!(
        driver.execute(RunnerOperation::Stage).await,
        Err(FleetError::Manifest(ManifestError::MissingField("package_file")))
    );
}
