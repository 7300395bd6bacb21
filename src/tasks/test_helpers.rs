//! In-memory collaborators for exercising task units without a network or
//! database.

use super::TaskContext;
use crate::config::Config;
use crate::error::{Error, Result, TransportError};
use crate::event_log::EventLogStore;
use crate::extract::LinkExtractor;
use crate::gauge::ActiveTasks;
use crate::posts::PostStore;
use crate::settings::SettingsService;
use crate::transport::{AuthContext, PreparedRequest, Response, Transport};
use crate::types::{
    Image, ImageStatus, LogEntry, LogStatus, LogType, Metadata, NewLogEntry, Post, ThreadItem,
    ThreadLink,
};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = dyn Fn(&PreparedRequest) -> std::result::Result<Response, TransportError>
    + Send
    + Sync;

/// Transport that records every request and answers through a closure
pub(crate) struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<PreparedRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&PreparedRequest) -> std::result::Result<Response, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Always answers 200 with `body`
    pub(crate) fn ok(body: &'static [u8]) -> Self {
        Self::new(move |_| {
            Ok(Response {
                status: 200,
                body: body.to_vec(),
            })
        })
    }

    /// Always fails at the transport level
    pub(crate) fn failing() -> Self {
        Self::new(|_| Err(TransportError::Other("connection reset".to_string())))
    }

    /// Fails when the form body names one of `post_ids`
    pub(crate) fn failing_for_posts(post_ids: Vec<String>) -> Self {
        Self::new(move |request| {
            let body = request.body_text().unwrap_or_default();
            let fails = post_ids
                .iter()
                .any(|id| body.split('&').any(|field| field == format!("p={}", id)));
            if fails {
                Err(TransportError::Other("connection reset".to_string()))
            } else {
                Ok(Response {
                    status: 200,
                    body: Vec::new(),
                })
            }
        })
    }

    /// Wait `delay` before answering each request
    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    /// Change the delay of later requests
    pub(crate) fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: PreparedRequest,
        _auth: &AuthContext,
    ) -> std::result::Result<Response, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&request)
    }
}

/// Event log kept in a vector; can be switched to fail every append
#[derive(Default)]
pub(crate) struct MemoryEventLog {
    entries: Mutex<Vec<LogEntry>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl MemoryEventLog {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub(crate) fn errors_of(&self, log_type: LogType) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.log_type == log_type && e.status == LogStatus::Error)
            .collect()
    }
}

#[async_trait::async_trait]
impl EventLogStore for MemoryEventLog {
    async fn append(&self, entry: NewLogEntry) -> Result<LogEntry> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Other("event log unavailable".to_string()));
        }
        let stored = LogEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            log_type: entry.log_type,
            status: entry.status,
            message: entry.message,
            time: chrono::Utc::now(),
        };
        self.entries.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

/// Post store recording what it is told
#[derive(Default)]
pub(crate) struct MemoryPostStore {
    pub(crate) thread_items: Mutex<Vec<(ThreadLink, Vec<ThreadItem>)>>,
    pub(crate) metadata: Mutex<Vec<(String, Metadata)>>,
    pub(crate) image_statuses: Mutex<Vec<(String, u32, ImageStatus)>>,
}

impl MemoryPostStore {
    pub(crate) fn statuses_of(&self, post_id: &str, index: u32) -> Vec<ImageStatus> {
        self.image_statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, i, _)| p == post_id && *i == index)
            .map(|(_, _, s)| *s)
            .collect()
    }
}

#[async_trait::async_trait]
impl PostStore for MemoryPostStore {
    async fn save_thread_items(&self, link: &ThreadLink, items: &[ThreadItem]) -> Result<()> {
        self.thread_items
            .lock()
            .unwrap()
            .push((link.clone(), items.to_vec()));
        Ok(())
    }

    async fn save_metadata(&self, post: &Post, metadata: &Metadata) -> Result<()> {
        self.metadata
            .lock()
            .unwrap()
            .push((post.post_id.clone(), metadata.clone()));
        Ok(())
    }

    async fn set_image_status(&self, image: &Image, status: ImageStatus) -> Result<()> {
        self.image_statuses
            .lock()
            .unwrap()
            .push((image.post_id.clone(), image.index, status));
        Ok(())
    }
}

/// Extractor treating each non-empty body line as a post id; metadata is
/// the first line as poster and the rest as alternative names
pub(crate) struct LineExtractor;

impl LinkExtractor for LineExtractor {
    fn thread_items(&self, link: &ThreadLink, body: &str) -> Result<Vec<ThreadItem>> {
        if body.starts_with("<html") {
            return Err(Error::Extraction("unexpected page".to_string()));
        }
        Ok(body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, post_id)| ThreadItem {
                thread_id: link.thread_id.clone(),
                post_id: post_id.trim().to_string(),
                number: i as u32 + 1,
                title: format!("Post {}", post_id.trim()),
                image_count: 1,
                url: format!("https://vipergirls.to/threads/{}?p={}", link.thread_id, post_id),
                previews: Vec::new(),
                hosts: String::new(),
            })
            .collect())
    }

    fn metadata(&self, _post: &Post, body: &str) -> Result<Metadata> {
        let mut lines = body.lines();
        Ok(Metadata {
            posted_by: lines.next().map(str::to_string),
            resolved_names: lines.map(str::to_string).collect(),
        })
    }
}

/// Collaborators of a test context, kept for inspection
pub(crate) struct TestContext {
    pub(crate) ctx: TaskContext,
    pub(crate) transport: Arc<MockTransport>,
    pub(crate) event_log: Arc<MemoryEventLog>,
    pub(crate) posts: Arc<MemoryPostStore>,
}

pub(crate) fn test_context(config: Config, transport: MockTransport) -> TestContext {
    let transport = Arc::new(transport);
    let event_log = Arc::new(MemoryEventLog::default());
    let posts = Arc::new(MemoryPostStore::default());
    let ctx = TaskContext {
        settings: SettingsService::new(config),
        transport: transport.clone(),
        event_log: event_log.clone(),
        posts: posts.clone(),
        extractor: Arc::new(LineExtractor),
        gauge: ActiveTasks::new(),
    };
    TestContext {
        ctx,
        transport,
        event_log,
        posts,
    }
}

/// Settings with login, an authenticated session and thanks all enabled
pub(crate) fn thanks_config() -> Config {
    let mut config = Config::default();
    config.viper.login = true;
    config.viper.username = "someone".to_string();
    config.viper.thanks = true;
    config
}

pub(crate) fn sample_post(post_id: &str) -> Arc<Post> {
    Arc::new(Post {
        post_id: post_id.to_string(),
        thread_id: "9000".to_string(),
        title: "Sample Gallery".to_string(),
        url: format!("https://vipergirls.to/threads/9000?p={}", post_id),
        token: "abcDEF".to_string(),
        image_count: 2,
    })
}

pub(crate) fn auth() -> AuthContext {
    AuthContext::new(&crate::config::ConnectionConfig::default()).unwrap()
}
