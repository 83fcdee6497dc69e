//! Tests for the upload pipeline and derivative routing.

use async_trait::async_trait;
use attache::{
    AttacheErrorKind, AttacheResult, BackendKind, Derivative, DerivativeRole, FileStorage,
    LocalBackend, MediaKind, MediaProcessor, MemoryBackend, PassthroughProcessor, StorageErrorKind,
    StorageFactory, StorageSettings, Upload, UploadError, UploadErrorKind, Uploader,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Produces a fixed optimized rendition and thumbnail, counting calls.
#[derive(Default)]
struct FakeTranscoder {
    calls: AtomicUsize,
}

#[async_trait]
impl MediaProcessor for FakeTranscoder {
    async fn process(
        &self,
        kind: MediaKind,
        data: &[u8],
        _mime_type: &str,
    ) -> AttacheResult<Vec<Derivative>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let optimized_mime = match kind {
            MediaKind::Video => "video/mp4",
            _ => "image/webp",
        };
        Ok(vec![
            Derivative::new(DerivativeRole::Optimized, &data[..data.len() / 2], optimized_mime)
                .with_entry("width", json!(1280)),
            Derivative::new(DerivativeRole::Thumbnail, b"thumb".as_slice(), "image/webp")
                .with_entry("width", json!(320)),
        ])
    }
}

/// Always fails.
struct BrokenTranscoder;

#[async_trait]
impl MediaProcessor for BrokenTranscoder {
    async fn process(
        &self,
        _kind: MediaKind,
        _data: &[u8],
        _mime_type: &str,
    ) -> AttacheResult<Vec<Derivative>> {
        Err(UploadError::new(UploadErrorKind::Processing("codec missing".to_string())).into())
    }
}

fn upload(data: &[u8], name: &str, mime: &str) -> Upload {
    Upload::builder()
        .data(data)
        .file_name(name)
        .mime_type(mime)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_image_upload_stores_derivatives() {
    let storage: Arc<dyn FileStorage> = Arc::new(MemoryBackend::new(1024 * 1024));
    let uploader = Uploader::new(storage.clone(), FakeTranscoder::default());

    let outcome = uploader
        .upload(upload(&[9u8; 400], "shot.png", "image/png"))
        .await
        .unwrap();

    let original = outcome.original();
    let optimized = outcome.optimized().as_ref().expect("optimized stored");
    let thumbnail = outcome.thumbnail().as_ref().expect("thumbnail stored");

    assert_eq!(*original.size(), 400);
    assert_eq!(*optimized.size(), 200);
    assert_eq!(optimized.mime_type(), "image/webp");
    assert!(optimized.id().ends_with(".webp"));
    assert!(optimized.id().starts_with("shot_optimized_"));

    assert_eq!(optimized.metadata().get("derivative"), Some(&json!("optimized")));
    assert_eq!(optimized.metadata().get("sourceId"), Some(&json!(original.id())));
    assert_eq!(optimized.metadata().get("optimized"), Some(&json!(true)));
    assert_eq!(optimized.metadata().get("width"), Some(&json!(1280)));

    assert_eq!(thumbnail.metadata().get("derivative"), Some(&json!("thumbnail")));
    assert_eq!(thumbnail.metadata().get("sourceId"), Some(&json!(original.id())));
    assert!(thumbnail.metadata().get("optimized").is_none());

    // Each derivative is an independent stored file
    for id in [original.id(), optimized.id(), thumbnail.id()] {
        assert!(storage.exists(id).await.unwrap());
    }
    assert!(original.metadata().get("derivative").is_none());
}

#[tokio::test]
async fn test_video_upload_is_processed() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(LocalBackend::new(temp_dir.path(), "/uploads").unwrap());
    let uploader = Uploader::new(storage, FakeTranscoder::default());

    let mut builder = Upload::builder();
    builder
        .data(vec![1u8; 64])
        .file_name("repro.mov")
        .mime_type("video/quicktime")
        .path("issues/12")
        .metadata_entry("issue", json!(12));
    let outcome = uploader.upload(builder.build().unwrap()).await.unwrap();

    assert!(outcome.original().id().starts_with("issues/12/repro_"));
    assert_eq!(outcome.original().metadata().get("issue"), Some(&json!(12)));

    let optimized = outcome.optimized().as_ref().unwrap();
    assert!(optimized.id().starts_with("issues/12/repro_optimized_"));
    assert!(temp_dir.path().join(optimized.id()).is_file());

    let fetched = uploader
        .storage()
        .fetch(optimized.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        fetched.file.metadata().get("sourceId"),
        Some(&json!(outcome.original().id()))
    );
}

#[tokio::test]
async fn test_non_media_skips_processor() {
    let storage: Arc<dyn FileStorage> = Arc::new(MemoryBackend::new(1024));
    let uploader = Uploader::new(storage, FakeTranscoder::default());

    for (name, mime) in [
        ("server.log", "text/plain"),
        ("voice.mp3", "audio/mpeg"),
        ("report.pdf", "application/pdf"),
    ] {
        let outcome = uploader.upload(upload(b"bytes", name, mime)).await.unwrap();
        assert!(outcome.optimized().is_none());
        assert!(outcome.thumbnail().is_none());
    }
}

#[tokio::test]
async fn test_processor_called_only_for_media() {
    let transcoder = Arc::new(FakeTranscoder::default());

    struct Shared(Arc<FakeTranscoder>);

    #[async_trait]
    impl MediaProcessor for Shared {
        async fn process(
            &self,
            kind: MediaKind,
            data: &[u8],
            mime_type: &str,
        ) -> AttacheResult<Vec<Derivative>> {
            self.0.process(kind, data, mime_type).await
        }
    }

    let uploader = Uploader::new(
        Arc::new(MemoryBackend::new(1024 * 1024)),
        Shared(transcoder.clone()),
    );
    uploader
        .upload(upload(b"bytes", "notes.txt", "text/plain"))
        .await
        .unwrap();
    assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);

    uploader
        .upload(upload(b"gif-bytes", "a.gif", "image/gif"))
        .await
        .unwrap();
    assert_eq!(transcoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_processor_failure_keeps_original() {
    let storage: Arc<dyn FileStorage> = Arc::new(MemoryBackend::new(1024));
    let uploader = Uploader::new(storage.clone(), BrokenTranscoder);

    let outcome = uploader
        .upload(upload(b"png-bytes", "shot.png", "image/png"))
        .await
        .unwrap();

    assert!(outcome.optimized().is_none());
    assert!(outcome.thumbnail().is_none());
    assert!(storage.exists(outcome.original().id()).await.unwrap());
}

#[tokio::test]
async fn test_storage_failure_propagates() {
    let storage: Arc<dyn FileStorage> = Arc::new(MemoryBackend::new(1024).with_max_file_size(4));
    let uploader = Uploader::new(storage, PassthroughProcessor);

    let err = uploader
        .upload(upload(b"too large", "big.bin", "application/octet-stream"))
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), AttacheErrorKind::Storage(_)));
}

/// Returns a small thumbnail and an optimized rendition of a fixed size.
struct OversizedRendition {
    optimized_size: usize,
}

#[async_trait]
impl MediaProcessor for OversizedRendition {
    async fn process(
        &self,
        _kind: MediaKind,
        _data: &[u8],
        _mime_type: &str,
    ) -> AttacheResult<Vec<Derivative>> {
        Ok(vec![
            Derivative::new(DerivativeRole::Thumbnail, b"tiny".as_slice(), "image/webp"),
            Derivative::new(
                DerivativeRole::Optimized,
                vec![0u8; self.optimized_size],
                "image/webp",
            ),
        ])
    }
}

#[tokio::test]
async fn test_failed_derivative_rolls_back_upload() {
    let memory = Arc::new(MemoryBackend::new(1024).with_max_file_size(16));
    let uploader = Uploader::new(memory.clone(), OversizedRendition { optimized_size: 64 });

    let err = uploader
        .upload(upload(&[7u8; 8], "shot.png", "image/png"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.storage_kind(),
        Some(StorageErrorKind::FileTooLarge { size: 64, limit: 16 })
    ));

    // Neither the original nor the thumbnail saved before the failure remain
    assert!(memory.is_empty().await);
    assert_eq!(memory.resident_bytes().await, 0);
}

#[tokio::test]
async fn test_failed_derivative_rolls_back_local_files() {
    let temp_dir = TempDir::new().unwrap();
    let local = LocalBackend::new(temp_dir.path(), "/uploads")
        .unwrap()
        .with_max_file_size(16);
    let uploader = Uploader::new(Arc::new(local), OversizedRendition { optimized_size: 64 });

    assert!(
        uploader
            .upload(upload(&[7u8; 8], "shot.png", "image/png"))
            .await
            .is_err()
    );
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_derivatives_within_limits_are_kept() {
    let memory = Arc::new(MemoryBackend::new(1024).with_max_file_size(16));
    let uploader = Uploader::new(memory.clone(), OversizedRendition { optimized_size: 12 });

    let outcome = uploader
        .upload(upload(&[7u8; 8], "shot.png", "image/png"))
        .await
        .unwrap();
    assert!(outcome.optimized().is_some());
    assert!(outcome.thumbnail().is_some());
    assert_eq!(memory.len().await, 3);
}

#[test]
fn test_builder_rejects_missing_fields() {
    let err = Upload::builder().file_name("a.txt").build().unwrap_err();
    match err.kind() {
        AttacheErrorKind::Upload(e) => {
            assert!(matches!(e.kind(), UploadErrorKind::Rejected(_)))
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_uploader_over_factory_backend() {
    let factory =
        StorageFactory::new(StorageSettings::default().with_backend(BackendKind::Memory));
    let uploader = Uploader::new(factory.get().await.unwrap(), PassthroughProcessor);

    let outcome = uploader
        .upload(upload(b"hello", "hello.txt", "text/plain"))
        .await
        .unwrap();

    let shared = factory.get().await.unwrap();
    assert!(shared.exists(outcome.original().id()).await.unwrap());
    assert_eq!(shared.kind(), BackendKind::Memory);
}
