//! Engine tests against a temporary database and an in-memory transport.

use super::*;
use crate::error::Error;
use crate::tasks::test_helpers::{LineExtractor, MockTransport, sample_post};
use crate::types::{ImageStatus, LogStatus, LogType, ThreadLink};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

struct TestEngine {
    engine: VripperEngine,
    transport: Arc<MockTransport>,
    downloads: TempDir,
    _db_file: NamedTempFile,
}

async fn test_engine(mut config: Config, transport: MockTransport) -> TestEngine {
    let db_file = NamedTempFile::new().unwrap();
    let downloads = TempDir::new().unwrap();
    config.persistence.database_path = db_file.path().to_path_buf();
    config.download.download_dir = downloads.path().to_path_buf();

    let transport = Arc::new(transport);
    let engine = VripperEngine::with_transport(config, Arc::new(LineExtractor), transport.clone())
        .await
        .unwrap();

    TestEngine {
        engine,
        transport,
        downloads,
        _db_file: db_file,
    }
}

fn thread(id: &str) -> ThreadLink {
    ThreadLink {
        thread_id: id.to_string(),
        post_id: None,
    }
}

#[tokio::test]
async fn test_new_rejects_invalid_config() {
    let db_file = NamedTempFile::new().unwrap();
    let mut config = Config::default();
    config.persistence.database_path = db_file.path().to_path_buf();
    config.connection.max_concurrent_tasks = 0;

    let result = VripperEngine::with_transport(
        config,
        Arc::new(LineExtractor),
        Arc::new(MockTransport::ok(b"")),
    )
    .await;

    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_login_disabled_sends_no_request() {
    let t = test_engine(Config::default(), MockTransport::ok(b"")).await;

    assert_eq!(t.transport.call_count(), 0);
    assert!(!t.engine.is_authenticated().await);
}

#[tokio::test]
async fn test_download_post_stores_images_and_logs_post() {
    let t = test_engine(Config::default(), MockTransport::ok(PNG)).await;
    let post = (*sample_post("77")).clone();

    t.engine
        .download_post(
            post,
            vec![
                "https://img.example/77/first.png".to_string(),
                "https://img.example/77/second".to_string(),
            ],
        )
        .await
        .unwrap();
    t.engine.drain().await;

    // thanks is gated off without login, so only the images are fetched
    assert_eq!(t.transport.call_count(), 2);
    assert_eq!(t.engine.running_count(), 0);

    let images = t.engine.db.get_images("77").await.unwrap();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|(_, s)| *s == ImageStatus::Complete));

    let folder = t.downloads.path().join("Sample Gallery_77");
    assert!(folder.join("first.png").exists());
    assert!(folder.join("second.png").exists());

    let posts = t
        .engine
        .events(
            &LogFilter {
                log_type: Some(LogType::Post),
                status: None,
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].status, LogStatus::Success);
    assert!(posts[0].message.contains("post 77"));
}

#[tokio::test]
async fn test_failed_download_marks_image_and_logs_error() {
    let mut config = Config::default();
    config.retry.max_attempts = 0;
    let t = test_engine(config, MockTransport::failing()).await;

    t.engine
        .download_post(
            (*sample_post("5")).clone(),
            vec!["https://img.example/5/a.jpg".to_string()],
        )
        .await
        .unwrap();
    t.engine.drain().await;

    let images = t.engine.db.get_images("5").await.unwrap();
    assert_eq!(images[0].1, ImageStatus::Error);

    let errors = t
        .engine
        .events(
            &LogFilter {
                log_type: Some(LogType::Download),
                status: Some(LogStatus::Error),
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("post 5"));
    assert_eq!(t.engine.running_count(), 0);
}

#[tokio::test]
async fn test_scan_persists_thread_items() {
    let t = test_engine(Config::default(), MockTransport::ok(b"101\n102\n103\n")).await;
    let mut events = t.engine.subscribe();

    t.engine.scan(thread("9000")).await.unwrap();
    t.engine.drain().await;

    let items = t.engine.db.get_thread_items("9000").await.unwrap();
    assert_eq!(items.len(), 3);

    let entry = events.recv().await.unwrap();
    assert_eq!(entry.log_type, LogType::Scan);
    assert_eq!(entry.status, LogStatus::Success);
}

#[tokio::test]
async fn test_lookup_queued_uses_queued_log_types() {
    let t = test_engine(Config::default(), MockTransport::ok(b"<html>")).await;

    t.engine.lookup_queued(thread("1"), false).await.unwrap();
    t.engine.lookup_queued(thread("2"), true).await.unwrap();
    t.engine.drain().await;

    for log_type in [LogType::Queued, LogType::QueuedCacheMiss] {
        let filter = LogFilter {
            log_type: Some(log_type),
            status: Some(LogStatus::Error),
        };
        assert_eq!(t.engine.event_count(&filter).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_fetch_metadata_respects_setting() {
    let mut config = Config::default();
    config.viper.fetch_metadata = false;
    let t = test_engine(config.clone(), MockTransport::ok(b"poster\nAlt Name\n")).await;
    let post = (*sample_post("8")).clone();
    t.engine.db.upsert_post(&post).await.unwrap();

    t.engine.fetch_metadata(post.clone(), false).await.unwrap();
    t.engine.drain().await;
    assert_eq!(t.transport.call_count(), 0);

    config.viper.fetch_metadata = true;
    t.engine.update_settings(config).await.unwrap();
    t.engine.fetch_metadata(post, false).await.unwrap();
    t.engine.drain().await;

    assert_eq!(t.transport.call_count(), 1);
    let metadata = t.engine.db.get_post_metadata("8").await.unwrap().unwrap();
    assert_eq!(metadata.posted_by.as_deref(), Some("poster"));
    assert_eq!(metadata.resolved_names, vec!["Alt Name".to_string()]);
}

#[tokio::test]
async fn test_leave_thanks_is_skipped_when_not_authenticated() {
    let mut config = Config::default();
    config.viper.thanks = true;
    let t = test_engine(config, MockTransport::ok(b"")).await;

    t.engine
        .leave_thanks((*sample_post("3")).clone())
        .await
        .unwrap();
    t.engine.drain().await;

    assert_eq!(t.transport.call_count(), 0);
    assert_eq!(t.engine.event_count(&LogFilter::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_event_log_retention() {
    let mut config = Config::default();
    config.persistence.max_event_log_size = 3;
    let t = test_engine(config, MockTransport::failing()).await;

    for i in 0..6 {
        t.engine.scan(thread(&i.to_string())).await.unwrap();
    }
    t.engine.drain().await;

    assert_eq!(t.engine.event_count(&LogFilter::default()).await.unwrap(), 3);

    let cleared = t.engine.clear_events().await.unwrap();
    assert_eq!(cleared, 3);
    assert_eq!(t.engine.event_count(&LogFilter::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_settings_rejects_invalid_config() {
    let t = test_engine(Config::default(), MockTransport::ok(b"")).await;
    let mut invalid = Config::default();
    invalid.viper.host = "vipergirls.to".to_string();

    assert!(t.engine.update_settings(invalid).await.is_err());
    assert_eq!(t.engine.settings().viper.host, "https://vipergirls.to");
}

#[tokio::test]
async fn test_account_change_logs_in_again() {
    let t = test_engine(Config::default(), MockTransport::ok(b"")).await;
    assert_eq!(t.transport.call_count(), 0);

    let mut config = (*t.engine.settings()).clone();
    config.viper.login = true;
    config.viper.username = "someone".to_string();
    config.viper.password = "secret".to_string();
    t.engine.update_settings(config.clone()).await.unwrap();

    let requests = t.transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("/login.php?do=login"));
    // the mock sets no session cookie
    assert!(!t.engine.is_authenticated().await);

    // unrelated changes keep the session
    config.download.force_order = true;
    t.engine.update_settings(config).await.unwrap();
    assert_eq!(t.transport.call_count(), 1);
}

#[tokio::test]
async fn test_submit_after_shutdown_fails() {
    let t = test_engine(Config::default(), MockTransport::ok(b"")).await;

    t.engine.shutdown().await.unwrap();

    let err = t.engine.scan(thread("1")).await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    assert_eq!(t.engine.stats().running, 0);
}

fn statuses(images: Vec<(crate::types::Image, ImageStatus)>) -> Vec<ImageStatus> {
    images.into_iter().map(|(_, status)| status).collect()
}

#[tokio::test]
async fn test_stop_and_restart_post() {
    let mut config = Config::default();
    config.connection.max_concurrent_tasks = 1;
    let t = test_engine(
        config,
        MockTransport::ok(PNG).with_delay(Duration::from_secs(60)),
    )
    .await;

    t.engine
        .download_post(
            (*sample_post("77")).clone(),
            vec![
                "https://img.example/77/a.png".to_string(),
                "https://img.example/77/b.png".to_string(),
                "https://img.example/77/c.png".to_string(),
            ],
        )
        .await
        .unwrap();
    while t.transport.call_count() < 1 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // refused while the post is still downloading
    assert_eq!(t.engine.restart_post("77").await.unwrap(), 0);

    assert_eq!(t.engine.stop_post("77").await.unwrap(), 3);
    assert_eq!(t.engine.running_count(), 0);
    assert_eq!(
        statuses(t.engine.db.get_images("77").await.unwrap()),
        vec![ImageStatus::Stopped; 3]
    );

    t.transport.set_delay(None);
    assert_eq!(t.engine.restart_post("77").await.unwrap(), 3);
    t.engine.drain().await;

    assert_eq!(
        statuses(t.engine.db.get_images("77").await.unwrap()),
        vec![ImageStatus::Complete; 3]
    );
    let folder = t.downloads.path().join("Sample Gallery_77");
    for name in ["a.png", "b.png", "c.png"] {
        assert!(folder.join(name).exists(), "{} missing", name);
    }
    assert!(
        std::fs::read_dir(&folder)
            .unwrap()
            .all(|entry| !entry.unwrap().file_name().to_string_lossy().ends_with(".tmp"))
    );

    // nothing left to restart
    assert_eq!(t.engine.restart_post("77").await.unwrap(), 0);
}

#[tokio::test]
async fn test_stop_unknown_post_is_not_found() {
    let t = test_engine(Config::default(), MockTransport::ok(b"")).await;

    let err = t.engine.stop_post("404").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let err = t.engine.restart_post("404").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
