mod helpers;

use clipvault_core::{GatePolicy, MediaHandle, UploadOutcome, UploadProgress};
use clipvault_upload::{LocatorError, MemoryStore, UploadError, UploadSettings};
use helpers::{harness, harness_with, FlakyStore, MockIndex, MockStorage, Script};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn two_videos() -> MockIndex {
    MockIndex::new()
        .with("content://media/external/video/1", "/sdcard/DCIM/a.mp4", 1_048_576)
        .with("content://media/external/video/2", "/sdcard/DCIM/b.mp4", 2_048)
}

fn first() -> MediaHandle {
    MediaHandle::from("content://media/external/video/1")
}

fn second() -> MediaHandle {
    MediaHandle::from("content://media/external/video/2")
}

#[tokio::test]
async fn first_upload_transfers_and_closes_the_gate() {
    let h = harness(two_videos(), MockStorage::succeeding());

    let outcome = h.coordinator.upload(&first()).await.unwrap();

    assert_eq!(
        outcome,
        UploadOutcome::Uploaded("cameraVideos/video_20240102_030405.mp4".to_string())
    );
    assert_eq!(outcome.message(), "Upload succeeded: cameraVideos/video_20240102_030405.mp4");
    let calls = h.storage.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].local_path, PathBuf::from("/sdcard/DCIM/a.mp4"));
    assert_eq!(calls[0].key, "cameraVideos/video_20240102_030405.mp4");
    assert!(h.guard.has_uploaded(&first()).await.unwrap());
}

#[tokio::test]
async fn closed_gate_skips_every_later_upload() {
    let h = harness(two_videos(), MockStorage::succeeding());
    h.coordinator.upload(&first()).await.unwrap();

    for handle in [second(), first(), MediaHandle::from("content://media/unknown")] {
        let outcome = h.coordinator.upload(&handle).await.unwrap();
        assert_eq!(outcome, UploadOutcome::AlreadyUploaded);
        assert_eq!(outcome.message(), "Video already uploaded");
    }
    assert_eq!(h.storage.calls().len(), 1);
}

#[tokio::test]
async fn unresolved_media_never_reaches_storage() {
    let index = two_videos()
        .with("empty", "/sdcard/DCIM/empty.mp4", 0)
        .with("negative", "/sdcard/DCIM/neg.mp4", -1);
    let h = harness(index, MockStorage::succeeding());

    let err = h
        .coordinator
        .upload(&MediaHandle::from("content://media/missing"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UploadError::LocatorFailed(LocatorError::NotFound(_))
    ));

    for handle in ["empty", "negative"] {
        let err = h
            .coordinator
            .upload(&MediaHandle::from(handle))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::LocatorFailed(LocatorError::InvalidSize { .. })
        ));
    }

    assert!(h.storage.calls().is_empty());
    assert!(!h.guard.has_uploaded(&first()).await.unwrap());
}

#[tokio::test]
async fn progress_is_reported_before_the_result() {
    let h = harness(
        two_videos(),
        MockStorage::new(Script::Succeed {
            steps: vec![262_144, 524_288, 1_048_576],
        }),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let outcome = h
        .coordinator
        .upload_with(
            &first(),
            move |p: UploadProgress| sink.lock().unwrap().push(p.percent()),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let after_result = seen.lock().unwrap().len();

    assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(25), Some(50), Some(100)]
    );

    // Nothing arrives once the call has returned.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(seen.lock().unwrap().len(), after_result);
}

#[tokio::test]
async fn failed_transfer_leaves_the_gate_open_for_a_retry() {
    let h = harness(
        two_videos(),
        MockStorage::new(Script::Fail {
            steps: vec![1024],
            reason: "quota exceeded".to_string(),
        }),
    );

    let err = h.coordinator.upload(&first()).await.unwrap_err();
    match &err {
        UploadError::TransferFailed(reason) => assert!(reason.contains("quota exceeded")),
        other => panic!("expected TransferFailed, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert!(!h.guard.has_uploaded(&first()).await.unwrap());

    h.storage.set_script(Script::Succeed {
        steps: vec![1_048_576],
    });
    let outcome = h.coordinator.upload(&first()).await.unwrap();

    assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
    assert_eq!(h.storage.calls().len(), 2);
    assert!(h.guard.has_uploaded(&first()).await.unwrap());
}

#[tokio::test]
async fn transfer_that_cannot_start_is_a_failure() {
    let h = harness(
        two_videos(),
        MockStorage::new(Script::Refuse("bucket does not exist".to_string())),
    );

    let err = h.coordinator.upload(&first()).await.unwrap_err();

    assert!(matches!(err, UploadError::TransferFailed(_)));
    assert!(err.to_string().contains("bucket does not exist"));
    assert!(!h.guard.has_uploaded(&first()).await.unwrap());
}

#[tokio::test]
async fn transfer_without_a_result_is_a_failure() {
    let h = harness(two_videos(), MockStorage::new(Script::Vanish));

    let err = h.coordinator.upload(&first()).await.unwrap_err();

    assert!(matches!(err, UploadError::TransferFailed(_)));
    assert!(!h.guard.has_uploaded(&first()).await.unwrap());
}

#[tokio::test]
async fn cancellation_mid_transfer_leaves_the_gate_open() {
    let h = harness(two_videos(), MockStorage::new(Script::UntilCancelled));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let outcome = h
        .coordinator
        .upload_with(&first(), move |_| trigger.cancel(), cancel)
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Cancelled);
    assert_eq!(outcome.message(), "Upload cancelled");
    assert_eq!(h.storage.calls().len(), 1);
    assert!(!h.guard.has_uploaded(&first()).await.unwrap());
}

#[tokio::test]
async fn cancellation_before_start_skips_everything() {
    let h = harness(two_videos(), MockStorage::succeeding());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .coordinator
        .upload_with(&first(), |_| {}, cancel)
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Cancelled);
    assert!(h.storage.calls().is_empty());
}

#[tokio::test]
async fn concurrent_uploads_transfer_exactly_once() {
    let h = harness(
        two_videos(),
        MockStorage::succeeding().with_delay(Duration::from_millis(50)),
    );

    let mut tasks = Vec::new();
    for i in 0..6 {
        let coordinator = h.coordinator.clone();
        let handle = if i % 2 == 0 { first() } else { second() };
        tasks.push(tokio::spawn(async move { coordinator.upload(&handle).await }));
    }

    let mut uploaded = 0;
    let mut skipped = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            UploadOutcome::Uploaded(_) => uploaded += 1,
            UploadOutcome::AlreadyUploaded => skipped += 1,
            UploadOutcome::Cancelled => panic!("nothing was cancelled"),
        }
    }

    assert_eq!(uploaded, 1);
    assert_eq!(skipped, 5);
    assert_eq!(h.storage.calls().len(), 1);
}

#[tokio::test]
async fn per_media_policy_gates_each_handle_separately() {
    let h = harness_with(
        two_videos(),
        MockStorage::succeeding(),
        Arc::new(MemoryStore::new()),
        GatePolicy::PerMedia,
        UploadSettings {
            unique_keys: true,
            ..UploadSettings::default()
        },
    );

    let a = h.coordinator.upload(&first()).await.unwrap();
    let b = h.coordinator.upload(&second()).await.unwrap();
    let again = h.coordinator.upload(&first()).await.unwrap();

    let (UploadOutcome::Uploaded(key_a), UploadOutcome::Uploaded(key_b)) = (a, b) else {
        panic!("both handles should upload");
    };
    // Same clock second, distinct keys thanks to the suffix.
    assert_ne!(key_a, key_b);
    assert!(key_a.starts_with("cameraVideos/video_20240102_030405_"));
    assert_eq!(again, UploadOutcome::AlreadyUploaded);
    assert_eq!(h.storage.calls().len(), 2);
}

#[tokio::test]
async fn key_takes_the_source_extension_or_the_default() {
    let index = MockIndex::new()
        .with("mov", "/sdcard/DCIM/clip.MOV", 10)
        .with("bare", "/sdcard/DCIM/clip", 10);
    let h = harness_with(
        index,
        MockStorage::succeeding(),
        Arc::new(MemoryStore::new()),
        GatePolicy::PerMedia,
        UploadSettings {
            namespace: "clips".to_string(),
            ..UploadSettings::default()
        },
    );

    assert_eq!(
        h.coordinator.upload(&MediaHandle::from("mov")).await.unwrap(),
        UploadOutcome::Uploaded("clips/video_20240102_030405.mov".to_string())
    );
    assert_eq!(
        h.coordinator.upload(&MediaHandle::from("bare")).await.unwrap(),
        UploadOutcome::Uploaded("clips/video_20240102_030405.mp4".to_string())
    );
}

#[tokio::test]
async fn unreadable_state_blocks_the_upload() {
    let store = FlakyStore {
        fail_reads: true,
        ..FlakyStore::default()
    };
    let h = harness_with(
        two_videos(),
        MockStorage::succeeding(),
        Arc::new(store),
        GatePolicy::Global,
        UploadSettings::default(),
    );

    let err = h.coordinator.upload(&first()).await.unwrap_err();

    assert!(matches!(err, UploadError::State(_)));
    assert!(!err.is_retryable());
    assert!(h.storage.calls().is_empty());
}

#[tokio::test]
async fn unrecorded_completion_is_reported_with_the_key() {
    let store = FlakyStore {
        fail_writes: true,
        ..FlakyStore::default()
    };
    let h = harness_with(
        two_videos(),
        MockStorage::succeeding(),
        Arc::new(store),
        GatePolicy::Global,
        UploadSettings::default(),
    );

    let err = h.coordinator.upload(&first()).await.unwrap_err();

    match err {
        UploadError::CompletionNotRecorded { key, .. } => {
            assert_eq!(key, "cameraVideos/video_20240102_030405.mp4")
        }
        other => panic!("expected CompletionNotRecorded, got {other:?}"),
    }
    assert_eq!(h.storage.calls().len(), 1);
}
