//! End-to-end pipeline workflows against a scripted recognition service
//!
//! These tests exercise the public API the way an upload front end would:
//! build a pipeline over a mock service, feed it encoded images, and check
//! the caching, compression, retry, and cropping behavior that falls out.

use cutout::{
    geometry, retry_with_backoff, CacheConfig, CutoutError, EncodedImage, ImageInput, ImageMime,
    ImagePipeline, MockRecognitionService, MockResponse, PipelineConfig, RecognitionService,
    RemovalOptions, RetryConfig,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

/// Encode a solid-color PNG of the given size
fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(pixel)));
    geometry::encode(&image, ImageMime::Png, 1.0).unwrap().bytes
}

/// A plausible service response: transparent field with an opaque subject
fn service_payload() -> EncodedImage {
    let mut field = RgbaImage::from_pixel(80, 80, Rgba([0, 0, 0, 0]));
    for y in 20..60 {
        for x in 30..50 {
            field.put_pixel(x, y, Rgba([180, 40, 20, 255]));
        }
    }
    geometry::encode(&DynamicImage::ImageRgba8(field), ImageMime::Png, 1.0).unwrap()
}

fn pipeline(
    config: PipelineConfig,
    service: MockRecognitionService,
) -> (ImagePipeline, Arc<MockRecognitionService>) {
    let service = Arc::new(service);
    let handle = Arc::clone(&service);
    let pipeline = ImagePipeline::with_service(config, service).unwrap();
    (pipeline, handle)
}

fn base_config() -> PipelineConfig {
    PipelineConfig::builder().api_key("test-key").build().unwrap()
}

#[tokio::test]
async fn full_workflow_produces_transparent_artwork() {
    let (pipeline, service) = pipeline(
        base_config(),
        MockRecognitionService::succeeding(service_payload()),
    );

    let input = ImageInput::new("mug.png", png_bytes(200, 150, [240, 240, 240, 255]));
    let result = pipeline.process(&input).await.unwrap();

    assert_eq!(service.invocations(), 1);
    assert!(!result.from_cache);
    assert_eq!(result.extracted.mime, ImageMime::Png);
    assert_eq!((result.width, result.height), (80, 80));

    // The extracted bytes decode and keep their transparency
    let decoded = geometry::decode(&result.extracted.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    assert_eq!(decoded.get_pixel(40, 40)[3], 255);
}

#[tokio::test]
async fn repeat_processing_hits_cache_without_service_calls() {
    let (pipeline, service) = pipeline(
        base_config(),
        MockRecognitionService::succeeding(service_payload()),
    );

    let input = ImageInput::new("mug.png", png_bytes(64, 64, [10, 200, 10, 255]));

    let first = pipeline.process(&input).await.unwrap();
    let second = pipeline.process(&input).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.extracted, first.extracted);
    assert_eq!(service.invocations(), 1);

    // Same name but different content is a different cache identity
    let other = ImageInput::new("mug.png", png_bytes(64, 64, [200, 10, 10, 255]));
    let third = pipeline.process(&other).await.unwrap();
    assert!(!third.from_cache);
    assert_eq!(service.invocations(), 2);
}

#[tokio::test]
async fn cache_bound_evicts_oldest_inserted_first() {
    let config = PipelineConfig::builder()
        .api_key("test-key")
        .cache(CacheConfig {
            capacity: 3,
            ttl: Duration::from_secs(3600),
        })
        .build()
        .unwrap();
    let (pipeline, service) = pipeline(config, MockRecognitionService::succeeding(service_payload()));

    let inputs: Vec<ImageInput> = (0..5u8)
        .map(|i| ImageInput::new(format!("photo-{i}.png"), png_bytes(32, 32, [i, i, i, 255])))
        .collect();

    for input in &inputs {
        pipeline.process(input).await.unwrap();
    }

    let stats = pipeline.cache_stats();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.evictions, 2);

    // The two oldest-inserted entries were evicted and reprocess
    let again = pipeline.process(&inputs[0]).await.unwrap();
    assert!(!again.from_cache);
    // 5 initial calls + 1 reprocess
    assert_eq!(service.invocations(), 6);

    // The most recent entries are still resident
    let cached = pipeline.process(&inputs[4]).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(service.invocations(), 6);
}

#[tokio::test]
async fn expired_entries_are_reprocessed() {
    let config = PipelineConfig::builder()
        .api_key("test-key")
        .cache(CacheConfig {
            capacity: 10,
            ttl: Duration::ZERO,
        })
        .build()
        .unwrap();
    let (pipeline, service) = pipeline(config, MockRecognitionService::succeeding(service_payload()));

    let input = ImageInput::new("mug.png", png_bytes(32, 32, [1, 2, 3, 255]));
    pipeline.process(&input).await.unwrap();
    let second = pipeline.process(&input).await.unwrap();

    assert!(!second.from_cache);
    assert_eq!(service.invocations(), 2);
    assert_eq!(pipeline.cache_stats().expirations, 1);
}

#[tokio::test]
async fn oversized_upload_is_bounded_before_the_service_sees_it() {
    let config = PipelineConfig::builder()
        .api_key("test-key")
        .max_upload_dimension(100)
        .build()
        .unwrap();
    let (pipeline, _service) =
        pipeline(config, MockRecognitionService::succeeding(service_payload()));

    let input = ImageInput::new("huge.png", png_bytes(400, 200, [9, 9, 9, 255]));
    let result = pipeline.process(&input).await.unwrap();

    let uploaded = geometry::decode(&result.original.bytes).unwrap();
    assert_eq!((uploaded.width(), uploaded.height()), (100, 50));
}

#[tokio::test]
async fn terminal_api_failure_is_not_retried_and_not_cached() {
    let (pipeline, service) = pipeline(base_config(), MockRecognitionService::always_failing(400));

    let input = ImageInput::new("mug.png", png_bytes(32, 32, [1, 1, 1, 255]));
    let err = pipeline.process(&input).await.unwrap_err();

    assert!(matches!(err, CutoutError::Api { status: 400, .. }));
    assert!(!err.retryable());
    assert_eq!(service.invocations(), 1);
    assert_eq!(pipeline.cache_stats().entries, 0);

    // A later retry by the caller goes back to the service
    let err = pipeline.process(&input).await.unwrap_err();
    assert!(!err.retryable());
    assert_eq!(service.invocations(), 2);
}

#[tokio::test(start_paused = true)]
async fn retryable_failures_recover_under_backoff() {
    // 503 twice, then success: with initial_delay=10ms and multiplier 2 the
    // third attempt lands after 10ms + 20ms of backoff
    let service = MockRecognitionService::succeeding(service_payload()).with_script(vec![
        MockResponse::Failure(503),
        MockResponse::Failure(503),
    ]);
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
    };

    let upload = EncodedImage::new(png_bytes(16, 16, [0, 0, 0, 255]), ImageMime::Png);
    let options = RemovalOptions::default();

    let started = tokio::time::Instant::now();
    let result = retry_with_backoff(
        || service.remove_background(&upload, &options),
        &retry,
        "mock removal",
    )
    .await
    .unwrap();

    assert_eq!(service.invocations(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(30));
    assert_eq!(result, service_payload());
}

#[tokio::test(start_paused = true)]
async fn retry_budget_is_a_hard_bound() {
    let service = MockRecognitionService::always_failing(503);
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
    };

    let upload = EncodedImage::new(png_bytes(16, 16, [0, 0, 0, 255]), ImageMime::Png);
    let options = RemovalOptions::default();

    let err = retry_with_backoff(
        || service.remove_background(&upload, &options),
        &retry,
        "mock removal",
    )
    .await
    .unwrap_err();

    assert!(err.retryable());
    assert_eq!(service.invocations(), 3);
}

#[tokio::test]
async fn local_crop_path_tightens_to_artwork() {
    let config = PipelineConfig::builder()
        .api_key("test-key")
        .service_crop(false)
        .crop_margin(4)
        .build()
        .unwrap();
    let (pipeline, _service) =
        pipeline(config, MockRecognitionService::succeeding(service_payload()));

    let input = ImageInput::new("mug.png", png_bytes(80, 80, [1, 1, 1, 255]));
    let result = pipeline.process(&input).await.unwrap();

    // Payload subject is 20x40 at (30, 20); plus a 4px margin each side
    assert_eq!((result.width, result.height), (28, 48));
    let decoded = geometry::decode(&result.extracted.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (28, 48));
}

#[tokio::test]
async fn convenience_path_entry_point_round_trips() {
    let (pipeline, _service) = pipeline(
        base_config(),
        MockRecognitionService::succeeding(service_payload()),
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shirt.png");
    std::fs::write(&path, png_bytes(48, 48, [77, 77, 77, 255])).unwrap();

    let result = cutout::process_image_from_path(&path, &pipeline).await.unwrap();
    assert_eq!((result.width, result.height), (80, 80));

    // The same file comes back from the cache
    let again = cutout::process_image_from_path(&path, &pipeline).await.unwrap();
    assert!(again.from_cache);
}

#[tokio::test]
async fn convenience_bytes_entry_point() {
    let (pipeline, service) = pipeline(
        base_config(),
        MockRecognitionService::succeeding(service_payload()),
    );

    let result = cutout::process_image_from_bytes(
        "upload.png",
        png_bytes(48, 48, [7, 7, 7, 255]),
        &pipeline,
    )
    .await
    .unwrap();
    assert!(!result.from_cache);
    assert_eq!(service.invocations(), 1);
}

#[tokio::test]
async fn convenience_reader_entry_point() {
    let (pipeline, service) = pipeline(
        base_config(),
        MockRecognitionService::succeeding(service_payload()),
    );

    let reader = std::io::Cursor::new(png_bytes(48, 48, [3, 3, 3, 255]));
    let result = cutout::process_image_from_reader("stream.png", reader, &pipeline)
        .await
        .unwrap();
    assert_eq!((result.width, result.height), (80, 80));
    assert_eq!(service.invocations(), 1);
}

#[tokio::test]
async fn missing_file_surfaces_as_classified_error() {
    let (pipeline, _service) = pipeline(
        base_config(),
        MockRecognitionService::succeeding(service_payload()),
    );

    let err = cutout::process_image_from_path("/nonexistent/input.png", &pipeline)
        .await
        .unwrap_err();
    // IO failures normalize into the processing category
    assert_eq!(err.category(), cutout::ErrorCategory::Processing);
    assert!(!err.info().message.is_empty());
}
