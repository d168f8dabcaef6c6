use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use bytes::Bytes;
use rstest::*;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::core::client::storage::{MockObjectStore, StorageError};
use crate::error::transfer::TransferError;
use crate::tests::common::memory_store::MemoryObjectStore;
use crate::tests::common::{dir_entries, pattern_bytes, small_block_settings, write_file};
use crate::transfer::engine::relative_object_path;
use crate::transfer::{plan_transfer, ChunkedTransferEngine, TransferSettings};
use crate::types::transfer::BlockId;

fn block_size(size: u64) -> NonZeroU64 {
    NonZeroU64::new(size).unwrap()
}

#[rstest]
#[case(0, 4)]
#[case(1, 4)]
#[case(3, 4)]
#[case(4, 4)]
#[case(5, 4)]
#[case(8, 4)]
#[case(9, 1)]
#[case(1000, 7)]
fn plan_partitions_the_object(#[case] object_size: u64, #[case] max_block_size: u64) {
    let plan = plan_transfer(object_size, block_size(max_block_size));

    assert_eq!(plan.blocks.len() as u64, object_size / max_block_size + 1);

    let mut expected_offset = 0;
    for (position, block) in plan.blocks.iter().enumerate() {
        assert_eq!(block.index, position as u64);
        assert_eq!(block.offset, expected_offset);
        if position + 1 < plan.blocks.len() {
            assert_eq!(block.length, max_block_size);
        } else {
            assert!(block.length < max_block_size);
        }
        expected_offset += block.length;
    }
    assert_eq!(expected_offset, object_size);

    let ids: Vec<&BlockId> = plan.blocks.iter().map(|block| &block.block_id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(ids, sorted, "block ids must be unique and sort in block order");

    assert_eq!(plan, plan_transfer(object_size, block_size(max_block_size)));
}

#[rstest]
fn plan_for_ten_million_bytes_in_four_mib_blocks() {
    let plan = plan_transfer(10_000_000, block_size(4_194_304));

    let layout: Vec<(u64, u64)> = plan.blocks.iter().map(|block| (block.offset, block.length)).collect();
    assert_eq!(layout, vec![(0, 4_194_304), (4_194_304, 4_194_304), (8_388_608, 1_611_392)]);
    assert_eq!(
        plan.committed_block_ids(),
        vec![BlockId::from_index(0), BlockId::from_index(1), BlockId::from_index(2)]
    );
}

#[rstest]
fn plan_for_exact_multiple_ends_with_empty_block() {
    let plan = plan_transfer(8, block_size(4));

    assert_eq!(plan.blocks.len(), 3);
    assert!(plan.blocks[2].is_empty());
    assert_eq!(plan.non_empty_blocks().count(), 2);
}

#[rstest]
fn plan_for_empty_object_has_single_empty_block() {
    let plan = plan_transfer(0, block_size(4));

    assert_eq!(plan.blocks.len(), 1);
    assert!(plan.blocks[0].is_empty());
    assert!(plan.committed_block_ids().is_empty());
}

#[rstest]
fn block_ids_sort_numerically_and_are_file_name_safe() {
    let nine = BlockId::from_index(9);
    let ten = BlockId::from_index(10);
    let huge = BlockId::from_index(u64::MAX);

    assert!(nine < ten);
    assert!(ten < huge);
    assert_eq!(ten.index(), Some(10));
    assert_eq!(huge.index(), Some(u64::MAX));
    assert!(huge.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
}

#[rstest]
fn transfer_settings_reject_zero_block_size() {
    assert_matches!(TransferSettings::new(0, 4, 2), Err(TransferError::InvalidSettings(_)));
    assert_matches!(TransferSettings::new(1024, 0, 2), Err(TransferError::InvalidSettings(_)));
    assert!(TransferSettings::new(1024, 4, 2).is_ok());
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(64)]
#[case(1000)]
#[tokio::test]
async fn upload_then_download_returns_identical_bytes(#[case] size: usize) {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.bin");
    let destination = dir.path().join("nested").join("copy.bin");
    let contents = pattern_bytes(size);
    write_file(&source, &contents);

    let store = Arc::new(MemoryObjectStore::new());
    let engine = ChunkedTransferEngine::new(store.clone(), small_block_settings(64, 4));

    let url = engine.upload_file(&source, "datafiles/source.bin").await.unwrap();
    assert_eq!(url, "memory://datafiles/source.bin");
    assert_eq!(store.object("datafiles/source.bin").unwrap().as_ref(), contents.as_slice());

    let written = engine.download_file("datafiles/source.bin", &destination).await.unwrap();
    assert_eq!(written, size as u64);
    assert_eq!(std::fs::read(&destination).unwrap(), contents);
    assert_eq!(dir_entries(destination.parent().unwrap()), vec!["copy.bin".to_string()]);
}

#[rstest]
#[tokio::test]
async fn download_reassembles_in_block_order_when_blocks_finish_out_of_order() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("object.bin");
    let contents = pattern_bytes(8 * 32);

    // The first block is the slowest, the last the fastest.
    let store = Arc::new(
        MemoryObjectStore::new().with_range_latency(|offset| Duration::from_millis(10 + (256 - offset) / 32 * 15)),
    );
    store.insert("object.bin", contents.clone());
    let engine = ChunkedTransferEngine::new(store.clone(), small_block_settings(32, 8));

    engine.download_file("object.bin", &destination).await.unwrap();

    let completions = store.range_completions();
    let mut in_block_order = completions.clone();
    in_block_order.sort();
    assert_ne!(completions, in_block_order, "blocks should have completed out of order");
    assert_eq!(std::fs::read(&destination).unwrap(), contents);
}

#[rstest]
#[tokio::test]
async fn failed_block_aborts_the_upload() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.bin");
    write_file(&source, &pattern_bytes(200));

    let store = Arc::new(MemoryObjectStore::new().with_failing_block(BlockId::from_index(1)));
    let engine = ChunkedTransferEngine::new(store.clone(), small_block_settings(64, 2));

    let result = engine.upload_file(&source, "output/source.bin").await;

    assert_matches!(result, Err(TransferError::StageBlock { block_id, .. }) if block_id == BlockId::from_index(1));
    assert!(store.object("output/source.bin").is_none());
    assert_eq!(store.aborted_uploads(), vec!["output/source.bin".to_string()]);
    assert_eq!(store.open_uploads(), 0);
}

#[rstest]
#[tokio::test]
async fn short_ranged_read_fails_without_leaving_files_behind() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("object.bin");

    let store = Arc::new(MemoryObjectStore::new().with_short_reads());
    store.insert("object.bin", pattern_bytes(96));
    let engine = ChunkedTransferEngine::new(store, small_block_settings(32, 4));

    let result = engine.download_file("object.bin", &destination).await;

    assert_matches!(result, Err(TransferError::LengthMismatch { expected: 32, actual: 31, .. }));
    assert!(!destination.exists());
    assert!(dir_entries(dir.path()).is_empty());
}

#[rstest]
#[tokio::test]
async fn download_of_missing_object_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = ChunkedTransferEngine::new(Arc::new(MemoryObjectStore::new()), small_block_settings(32, 4));

    let result = engine.download_file("absent.bin", &dir.path().join("absent.bin")).await;

    assert_matches!(result, Err(TransferError::Storage(StorageError::ObjectNotFound(key))) if key == "absent.bin");
}

#[rstest]
#[tokio::test]
async fn upload_if_changed_skips_objects_of_same_size() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("package.zip");
    write_file(&source, &pattern_bytes(42));

    let mut store = MockObjectStore::new();
    store.expect_object_length().times(1).returning(|_| Ok(42));
    store.expect_object_url().returning(|key| format!("s3://bucket/{key}"));
    let engine = ChunkedTransferEngine::new(Arc::new(store), TransferSettings::default());

    let outcome = engine.upload_if_changed(&source, "packages/package.zip").await.unwrap();

    assert!(outcome.skipped);
    assert_eq!(outcome.url, "s3://bucket/packages/package.zip");
}

#[rstest]
#[tokio::test]
async fn upload_if_changed_uploads_new_and_resized_objects() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data.csv");
    write_file(&source, &pattern_bytes(10));

    let store = Arc::new(MemoryObjectStore::new());
    let engine = ChunkedTransferEngine::new(store.clone(), small_block_settings(4, 2));

    let first = engine.upload_if_changed(&source, "datafiles/data.csv").await.unwrap();
    assert!(!first.skipped);

    let second = engine.upload_if_changed(&source, "datafiles/data.csv").await.unwrap();
    assert!(second.skipped);

    write_file(&source, &pattern_bytes(12));
    let third = engine.upload_if_changed(&source, "datafiles/data.csv").await.unwrap();
    assert!(!third.skipped);
    assert_eq!(store.object("datafiles/data.csv").unwrap().len(), 12);
}

#[rstest]
#[tokio::test]
async fn download_prefix_fetches_every_object_and_notifies() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("output/a.txt", Bytes::from_static(b"alpha"));
    store.insert("output/b.txt", Bytes::from_static(b"beta"));
    store.insert("output/run/c.txt", Bytes::from_static(b"gamma"));
    store.insert("datafiles/ignored.txt", Bytes::from_static(b"nope"));
    let engine = ChunkedTransferEngine::new(store, small_block_settings(2, 2));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let downloaded = engine.download_prefix("output/", dir.path(), Some(tx)).await.unwrap();

    let expected = vec![dir.path().join("a.txt"), dir.path().join("b.txt"), dir.path().join("run").join("c.txt")];
    assert_eq!(downloaded, expected);

    let mut notified = Vec::new();
    while let Some(path) = rx.recv().await {
        notified.push(path);
    }
    notified.sort();
    assert_eq!(notified, expected);

    assert_eq!(std::fs::read(dir.path().join("run").join("c.txt")).unwrap(), b"gamma");
    assert!(!dir.path().join("ignored.txt").exists());
}

#[rstest]
#[case("output/", "output/../escape.txt")]
#[case("output/", "output/")]
#[case("output/", "output/run/../../escape.txt")]
fn object_keys_cannot_escape_the_target_directory(#[case] prefix: &str, #[case] key: &str) {
    assert_matches!(relative_object_path(prefix, key), Err(TransferError::UnsafeKey(_)));
}

#[rstest]
fn object_keys_keep_their_layout_below_the_prefix() {
    assert_eq!(relative_object_path("output/", "output/run/c.txt").unwrap(), std::path::Path::new("run/c.txt"));
}
