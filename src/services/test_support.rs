//! Recording collaborators shared by the service tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    cache::{Cache, CacheResult, MemoryCache},
    config::AppConfig,
    dao::store::memory::MemoryStore,
    dto::events::RoomEvent,
    services::{
        access::AccessGuard,
        attachments::{AttachmentError, AttachmentStore, UploadedFile},
        issue_service::IssueService,
        room_service::RoomService,
        ticket::{TicketAttachment, TicketBridge, TicketError, TicketRequest},
    },
    state::{AppState, SharedState, hub::Broadcaster},
};

/// Cache operation observed by [`RecordingCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Get(String),
    Set(String),
    Delete(String),
}

/// Side effect seen by one of the recording collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Cache(CacheOp),
    /// Event name passed to [`Broadcaster::publish`].
    Publish(&'static str),
}

/// Ordered log shared by [`RecordingCache`] and [`RecordingBroadcaster`].
#[derive(Clone, Default)]
pub struct Timeline {
    steps: Arc<Mutex<Vec<Step>>>,
}

impl Timeline {
    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.steps.lock().unwrap().clear();
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push(step);
    }

    /// Panics unless every key was deleted, and all of them before `event` was published.
    pub fn assert_invalidated_before_publish(&self, keys: &[String], event: &'static str) {
        let steps = self.steps();
        let published = steps
            .iter()
            .position(|step| *step == Step::Publish(event))
            .unwrap_or_else(|| panic!("`{event}` was never published: {steps:?}"));
        for key in keys {
            let deleted = steps
                .iter()
                .position(|step| *step == Step::Cache(CacheOp::Delete(key.clone())))
                .unwrap_or_else(|| panic!("`{key}` was never invalidated: {steps:?}"));
            assert!(
                deleted < published,
                "`{key}` invalidated after `{event}` was published: {steps:?}"
            );
        }
    }
}

/// Real in-memory cache that logs every call.
pub struct RecordingCache {
    inner: MemoryCache,
    ops: Arc<Mutex<Vec<CacheOp>>>,
    timeline: Timeline,
}

impl RecordingCache {
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            inner: MemoryCache::new(100, Duration::from_secs(60)),
            ops: Arc::default(),
            timeline,
        }
    }

    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Delete(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.ops.lock().unwrap().clear();
        self.timeline.clear();
    }

    fn record(&self, op: CacheOp) {
        self.timeline.push(Step::Cache(op.clone()));
        self.ops.lock().unwrap().push(op);
    }
}

impl Cache for RecordingCache {
    fn get(&self, key: &str) -> BoxFuture<'static, CacheResult<Option<Value>>> {
        self.record(CacheOp::Get(key.to_string()));
        self.inner.get(key)
    }

    fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> BoxFuture<'static, CacheResult<()>> {
        self.record(CacheOp::Set(key.to_string()));
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, CacheResult<()>> {
        self.record(CacheOp::Delete(key.to_string()));
        self.inner.delete(key)
    }
}

/// Broadcaster that keeps every published event.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(Uuid, RoomEvent, Option<Uuid>)>>,
    timeline: Timeline,
}

impl RecordingBroadcaster {
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            events: Mutex::default(),
            timeline,
        }
    }

    pub fn events(&self) -> Vec<(Uuid, RoomEvent, Option<Uuid>)> {
        self.events.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, room_id: Uuid, event: RoomEvent, origin: Option<Uuid>) {
        self.timeline.push(Step::Publish(event.name()));
        self.events.lock().unwrap().push((room_id, event, origin));
    }
}

/// Ticket bridge counting calls and answering with `QA-{n}` keys.
#[derive(Default)]
pub struct CountingBridge {
    filed: AtomicUsize,
    attached: Mutex<Vec<(String, String)>>,
    failure: Mutex<Option<TicketError>>,
    hang: AtomicBool,
}

impl CountingBridge {
    pub fn filed(&self) -> usize {
        self.filed.load(Ordering::SeqCst)
    }

    pub fn attached(&self) -> Vec<(String, String)> {
        self.attached.lock().unwrap().clone()
    }

    pub fn fail_with(&self, error: TicketError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Never answer `file_ticket`, to exercise the timeout.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }
}

impl TicketBridge for CountingBridge {
    fn file_ticket(&self, _request: TicketRequest) -> BoxFuture<'static, Result<String, TicketError>> {
        let n = self.filed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang.load(Ordering::SeqCst) {
            return futures::future::pending().boxed();
        }
        let result = match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(format!("QA-{n}")),
        };
        async move { result }.boxed()
    }

    fn attach_file(
        &self,
        ticket_key: &str,
        attachment: TicketAttachment,
    ) -> BoxFuture<'static, Result<(), TicketError>> {
        self.attached
            .lock()
            .unwrap()
            .push((ticket_key.to_string(), attachment.file_name));
        async { Ok(()) }.boxed()
    }
}

/// Attachment store keeping files in memory.
#[derive(Default)]
pub struct MemoryAttachments {
    files: DashMap<String, Vec<u8>>,
}

impl MemoryAttachments {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.files.contains_key(reference)
    }
}

impl AttachmentStore for MemoryAttachments {
    fn put(&self, file: UploadedFile) -> BoxFuture<'static, Result<String, AttachmentError>> {
        let reference = format!("{}-{}", Uuid::new_v4().simple(), file.file_name);
        self.files.insert(reference.clone(), file.bytes);
        async move { Ok(reference) }.boxed()
    }

    fn read(&self, reference: &str) -> BoxFuture<'static, Result<Vec<u8>, AttachmentError>> {
        let result = self
            .files
            .get(reference)
            .map(|bytes| bytes.clone())
            .ok_or_else(|| AttachmentError::InvalidReference(reference.to_string()));
        async move { result }.boxed()
    }

    fn remove(&self, reference: &str) -> BoxFuture<'static, Result<(), AttachmentError>> {
        self.files.remove(reference);
        async { Ok(()) }.boxed()
    }
}

/// Services wired over in-memory collaborators, with handles to inspect them.
pub struct Harness {
    pub store: MemoryStore,
    /// Cache deletions and publishes in the order they happened.
    pub timeline: Timeline,
    pub cache: Arc<RecordingCache>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub bridge: Arc<CountingBridge>,
    pub attachments: Arc<MemoryAttachments>,
    pub rooms: RoomService,
    pub issues: IssueService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::with_rules(
            vec!["fixed".into(), "wont_fix".into()],
            vec!["lead@example.com".into()],
        ))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let store = MemoryStore::new();
        let timeline = Timeline::default();
        let cache = Arc::new(RecordingCache::with_timeline(timeline.clone()));
        let broadcaster = Arc::new(RecordingBroadcaster::with_timeline(timeline.clone()));
        let bridge = Arc::new(CountingBridge::default());
        let attachments = Arc::new(MemoryAttachments::default());
        let guard = AccessGuard::new(Arc::new(store.clone()));

        let rooms = RoomService::new(
            Arc::new(store.clone()),
            cache.clone(),
            broadcaster.clone(),
            guard.clone(),
            config.clone(),
        );
        let issues = IssueService::new(
            Arc::new(store.clone()),
            cache.clone(),
            broadcaster.clone(),
            bridge.clone(),
            attachments.clone(),
            guard,
            config,
        );

        Self {
            store,
            timeline,
            cache,
            broadcaster,
            bridge,
            attachments,
            rooms,
            issues,
        }
    }
}

/// Fully wired application state over in-memory collaborators and the real room hub.
pub fn app_state() -> SharedState {
    AppState::new(
        AppConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryCache::new(100, Duration::from_secs(60))),
        Arc::new(CountingBridge::default()),
        Arc::new(MemoryAttachments::default()),
    )
}
