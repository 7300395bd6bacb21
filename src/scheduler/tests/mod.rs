use super::*;
use crate::error::Error;
use crate::gauge::ActiveTasks;
use crate::tasks::test_helpers::*;
use crate::tasks::{DownloadTask, ScanMode, ScanTask, ThanksTask};
use crate::transport::Response;
use crate::types::{Image, ImageStatus, LogStatus, LogType, ThreadLink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn thanks(post_id: usize) -> ThanksTask {
    ThanksTask::new(sample_post(&post_id.to_string()), true, auth())
}

/// Transport answering after `delay` and recording the highest gauge value
/// seen while a request was in flight
fn gauge_recording_transport(
    gauge: ActiveTasks,
    peak: Arc<AtomicUsize>,
    delay: Duration,
) -> MockTransport {
    MockTransport::new(move |_| {
        peak.fetch_max(gauge.current(), Ordering::SeqCst);
        Ok(Response {
            status: 200,
            body: Vec::new(),
        })
    })
    .with_delay(delay)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failures_are_logged_once_each_and_gauge_returns_to_zero() {
    let failing: Vec<String> = (0..10).map(|i| (i * 5).to_string()).collect();
    let t = test_context(thanks_config(), MockTransport::failing_for_posts(failing));
    let scheduler = TaskScheduler::new(t.ctx.clone(), 12);

    for i in 0..50 {
        scheduler.submit(thanks(i)).unwrap();
    }
    scheduler.drain().await;

    assert_eq!(t.transport.call_count(), 50);
    let errors = t.event_log.errors_of(LogType::Thanks);
    assert_eq!(errors.len(), 10);
    assert!(
        errors
            .iter()
            .all(|e| e.message.starts_with("Failed to leave a thanks for post"))
    );
    assert_eq!(scheduler.in_flight_count(), 0);
    assert_eq!(scheduler.queued_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_bound_is_respected() {
    let gauge = ActiveTasks::new();
    let peak = Arc::new(AtomicUsize::new(0));
    let transport =
        gauge_recording_transport(gauge.clone(), peak.clone(), Duration::from_millis(20));
    let mut t = test_context(thanks_config(), transport);
    t.ctx.gauge = gauge;
    let scheduler = TaskScheduler::new(t.ctx.clone(), 3);

    for i in 0..15 {
        scheduler.submit(thanks(i)).unwrap();
    }
    scheduler.drain().await;

    assert_eq!(t.transport.call_count(), 15);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak was {}", peak);
    assert_eq!(scheduler.in_flight_count(), 0);
}

#[tokio::test]
async fn test_excess_units_are_queued_without_blocking_submit() {
    let t = test_context(
        thanks_config(),
        MockTransport::ok(b"").with_delay(Duration::from_secs(60)),
    );
    let scheduler = TaskScheduler::new(t.ctx.clone(), 2);

    for i in 0..5 {
        scheduler.submit(thanks(i)).unwrap();
    }
    assert_eq!(scheduler.queued_count(), 5);

    while t.transport.call_count() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let stats = scheduler.stats();
    assert_eq!(stats.running, 2);
    assert_eq!(stats.queued, 3);

    assert!(scheduler.shutdown(Duration::from_secs(5)).await);
    assert_eq!(scheduler.stats().running, 0);
    assert_eq!(scheduler.stats().queued, 0);
}

#[tokio::test]
async fn test_submit_after_shutdown_is_refused() {
    let t = test_context(thanks_config(), MockTransport::ok(b""));
    let scheduler = TaskScheduler::new(t.ctx.clone(), 4);

    assert!(scheduler.is_accepting());
    assert!(scheduler.shutdown(Duration::from_secs(1)).await);
    assert!(!scheduler.is_accepting());

    let err = scheduler.submit(thanks(1)).unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    assert_eq!(t.transport.call_count(), 0);
}

#[tokio::test]
async fn test_shutdown_cancels_running_units_and_balances_gauge() {
    let t = test_context(
        thanks_config(),
        MockTransport::ok(b"").with_delay(Duration::from_secs(60)),
    );
    let scheduler = TaskScheduler::new(t.ctx.clone(), 2);

    for i in 0..4 {
        scheduler.submit(thanks(i)).unwrap();
    }
    while t.transport.call_count() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(scheduler.in_flight_count(), 2);

    assert!(scheduler.shutdown(Duration::from_secs(5)).await);

    assert_eq!(scheduler.in_flight_count(), 0);
    assert_eq!(scheduler.queued_count(), 0);
    assert_eq!(t.transport.call_count(), 2, "queued units never started");
    assert!(t.event_log.entries().is_empty());
}

#[tokio::test]
async fn test_settings_change_before_start_is_honoured() {
    let t = test_context(
        thanks_config(),
        MockTransport::ok(b"").with_delay(Duration::from_millis(100)),
    );
    let scheduler = TaskScheduler::new(t.ctx.clone(), 1);

    scheduler.submit(thanks(1)).unwrap();
    scheduler.submit(thanks(2)).unwrap();
    while t.transport.call_count() < 1 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let mut disabled = thanks_config();
    disabled.viper.thanks = false;
    t.ctx.settings.update(disabled).unwrap();
    scheduler.drain().await;

    assert_eq!(t.transport.call_count(), 1);
    assert!(t.event_log.entries().is_empty());
}

#[tokio::test]
async fn test_grow_pool_starts_queued_units() {
    let t = test_context(
        thanks_config(),
        MockTransport::ok(b"").with_delay(Duration::from_secs(60)),
    );
    let scheduler = TaskScheduler::new(t.ctx.clone(), 1);

    for i in 0..3 {
        scheduler.submit(thanks(i)).unwrap();
    }
    while t.transport.call_count() < 1 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    scheduler.resize(3);
    tokio::time::timeout(Duration::from_secs(5), async {
        while t.transport.call_count() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("queued units should start after growing the pool");
    assert_eq!(scheduler.in_flight_count(), 3);

    scheduler.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shrink_pool_limits_later_units() {
    let gauge = ActiveTasks::new();
    let peak = Arc::new(AtomicUsize::new(0));
    let transport =
        gauge_recording_transport(gauge.clone(), peak.clone(), Duration::from_millis(10));
    let mut t = test_context(thanks_config(), transport);
    t.ctx.gauge = gauge;
    let scheduler = TaskScheduler::new(t.ctx.clone(), 4);

    scheduler.resize(1);
    // the shrink completes once the idle permits are taken back
    tokio::time::sleep(Duration::from_millis(20)).await;

    for i in 0..6 {
        scheduler.submit(thanks(i)).unwrap();
    }
    scheduler.drain().await;

    assert_eq!(t.transport.call_count(), 6);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_drain_keeps_scheduler_open() {
    let t = test_context(thanks_config(), MockTransport::ok(b""));
    let scheduler = TaskScheduler::new(t.ctx.clone(), 2);

    scheduler.submit(thanks(1)).unwrap();
    scheduler.drain().await;
    scheduler.submit(thanks(2)).unwrap();
    scheduler.drain().await;

    assert!(scheduler.is_accepting());
    assert_eq!(t.transport.call_count(), 2);
}

#[tokio::test]
async fn test_scan_units_run_through_scheduler() {
    let t = test_context(thanks_config(), MockTransport::ok(b"101\n102\n"));
    let scheduler = TaskScheduler::new(t.ctx.clone(), 2);

    let link = ThreadLink {
        thread_id: "9000".to_string(),
        post_id: None,
    };
    scheduler
        .submit(ScanTask::new(link, ScanMode::Direct, auth()))
        .unwrap();
    scheduler.drain().await;

    let entries = t.event_log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].log_type, LogType::Scan);
    assert_eq!(entries[0].status, LogStatus::Success);
    assert_eq!(t.posts.thread_items.lock().unwrap()[0].1.len(), 2);
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";

fn download(post_id: &str, index: u32, url: &str) -> DownloadTask {
    let image = Image {
        post_id: post_id.to_string(),
        index,
        url: url.to_string(),
    };
    DownloadTask::new(sample_post(post_id), image, auth())
}

fn download_config(dir: &std::path::Path, max_threads_per_host: usize) -> crate::config::Config {
    let mut config = crate::config::Config::default();
    config.download.download_dir = dir.to_path_buf();
    config.connection.max_threads_per_host = max_threads_per_host;
    config
}

#[tokio::test]
async fn test_shutdown_marks_running_download_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_context(
        download_config(dir.path(), 4),
        MockTransport::ok(PNG).with_delay(Duration::from_secs(10)),
    );
    let scheduler = TaskScheduler::new(t.ctx.clone(), 1);

    scheduler
        .submit(download("5", 1, "https://img.example/a.png"))
        .unwrap();
    scheduler
        .submit(download("5", 2, "https://img.example/b.png"))
        .unwrap();
    while t.transport.call_count() < 1 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(scheduler.shutdown(Duration::from_secs(2)).await);

    assert_eq!(
        t.posts.statuses_of("5", 1),
        vec![ImageStatus::Downloading, ImageStatus::Stopped]
    );
    // never started, stopped while queued
    assert_eq!(t.posts.statuses_of("5", 2), vec![ImageStatus::Stopped]);
    assert!(t.event_log.entries().is_empty());
    assert_eq!(scheduler.in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_downloads_respect_per_host_limit() {
    let dir = tempfile::tempdir().unwrap();
    let gauge = ActiveTasks::new();
    let peak = Arc::new(AtomicUsize::new(0));
    let recorder = gauge.clone();
    let seen = peak.clone();
    let transport = MockTransport::new(move |_| {
        seen.fetch_max(recorder.current(), Ordering::SeqCst);
        Ok(Response {
            status: 200,
            body: PNG.to_vec(),
        })
    })
    .with_delay(Duration::from_millis(20));
    let mut t = test_context(download_config(dir.path(), 1), transport);
    t.ctx.gauge = gauge;
    let scheduler = TaskScheduler::new(t.ctx.clone(), 8);

    for index in 1..=4 {
        scheduler
            .submit(download("5", index, &format!("https://one.example/{}.png", index)))
            .unwrap();
    }
    scheduler.drain().await;

    assert_eq!(t.transport.call_count(), 4);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    for index in 1..=4 {
        assert_eq!(
            t.posts.statuses_of("5", index).last(),
            Some(&ImageStatus::Complete)
        );
    }

    // a second host gets its own slot
    scheduler.set_host_limit(2);
    for index in 5..=8 {
        let host = if index % 2 == 0 { "one" } else { "two" };
        scheduler
            .submit(download("5", index, &format!("https://{}.example/{}.png", host, index)))
            .unwrap();
    }
    scheduler.drain().await;
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=4).contains(&peak), "peak was {}", peak);
}

#[tokio::test]
async fn test_stop_post_cancels_only_that_post() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_context(
        download_config(dir.path(), 4),
        MockTransport::ok(PNG).with_delay(Duration::from_millis(300)),
    );
    let scheduler = TaskScheduler::new(t.ctx.clone(), 4);

    scheduler
        .submit(download("5", 1, "https://img.example/5.png"))
        .unwrap();
    scheduler
        .submit(download("6", 1, "https://img.example/6.png"))
        .unwrap();
    while t.transport.call_count() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(scheduler.is_post_active("5"));

    assert_eq!(scheduler.stop_post("5").await, 1);
    assert!(!scheduler.is_post_active("5"));
    assert_eq!(scheduler.stop_post("5").await, 0);

    scheduler.drain().await;
    assert_eq!(
        t.posts.statuses_of("5", 1).last(),
        Some(&ImageStatus::Stopped)
    );
    assert_eq!(
        t.posts.statuses_of("6", 1).last(),
        Some(&ImageStatus::Complete)
    );

    // the post can be submitted again after a stop
    scheduler
        .submit(download("5", 1, "https://img.example/5.png"))
        .unwrap();
    scheduler.drain().await;
    assert_eq!(
        t.posts.statuses_of("5", 1).last(),
        Some(&ImageStatus::Complete)
    );
}
