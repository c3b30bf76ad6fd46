#![allow(dead_code)]

use async_trait::async_trait;
use quill::agent::Orchestrator;
use quill::capabilities::CapabilityInvocation;
use quill::config::AgentConfig;
use quill::db;
use quill::journal::{Category, Entry, EntryStore, NewEntry, OwnerId, SqliteEntryStore, StoreError};
use quill::model::{ModelError, ModelReply, ModelRequest, ModelService};
use quill::session::Session;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn test_store() -> Arc<SqliteEntryStore> {
    Arc::new(SqliteEntryStore::from_connection(test_db()))
}

pub fn session(owner: &str) -> Session {
    Session::new(OwnerId::new(owner), format!("{owner}-token"))
}

pub fn category(name: &str) -> Category {
    name.parse().unwrap()
}

/// Insert an entry directly through the store. Returns the created entry.
pub async fn seed(store: &dyn EntryStore, owner: &str, title: &str, category_name: &str) -> Entry {
    store
        .create(
            &OwnerId::new(owner),
            NewEntry::new(title, format!("{title} details"), category(category_name)),
        )
        .await
        .unwrap()
}

pub async fn entries_of(store: &dyn EntryStore, owner: &str) -> Vec<Entry> {
    store.query(&OwnerId::new(owner), None).await.unwrap()
}

pub fn call(id: &str, name: &str, arguments: Value) -> CapabilityInvocation {
    CapabilityInvocation::new(Some(id.into()), name, arguments)
}

pub fn add_call(id: &str, title: &str, content: &str, category_name: &str) -> CapabilityInvocation {
    call(
        id,
        "add_entry",
        json!({"title": title, "content": content, "category": category_name}),
    )
}

pub fn query_call(id: &str, arguments: Value) -> CapabilityInvocation {
    call(id, "query_entries", arguments)
}

/// A model reply that only requests capabilities.
pub fn invoke(invocations: Vec<CapabilityInvocation>) -> ModelReply {
    ModelReply {
        text: String::new(),
        invocations,
    }
}

pub fn orchestrator(model: Arc<dyn ModelService>, store: Arc<dyn EntryStore>) -> Orchestrator {
    Orchestrator::new(model, store, AgentConfig::default())
}

/// What the script does once its replies run out.
enum Exhausted {
    Fail,
    Repeat(ModelReply),
    Hang,
}

/// A [`ModelService`] that plays back a fixed script of replies and records
/// every request it receives. Streaming mode sends the text word by word.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    requests: Mutex<Vec<ModelRequest>>,
    exhausted: Exhausted,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(replies: Vec<Result<ModelReply, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            exhausted: Exhausted::Fail,
        })
    }

    /// Answer every request with the same reply.
    pub fn repeating(reply: ModelReply) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            exhausted: Exhausted::Repeat(reply),
        })
    }

    /// Play `replies`, then never answer again.
    pub fn then_hang(replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
            exhausted: Exhausted::Hang,
        })
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    async fn next(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match (next, &self.exhausted) {
            (Some(reply), _) => reply,
            (None, Exhausted::Repeat(reply)) => Ok(reply.clone()),
            (None, Exhausted::Hang) => std::future::pending().await,
            (None, Exhausted::Fail) => Err(ModelError::InvalidResponse("script exhausted".into())),
        }
    }
}

#[async_trait]
impl ModelService for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        self.next(request).await
    }

    async fn complete_streaming(
        &self,
        request: &ModelRequest,
        chunks: &mpsc::UnboundedSender<String>,
    ) -> Result<ModelReply, ModelError> {
        let reply = self.next(request).await?;
        for piece in reply.text.split_inclusive(' ') {
            let _ = chunks.send(piece.to_string());
        }
        Ok(reply)
    }
}

/// An [`EntryStore`] whose every call fails, counting attempts.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntryStore for FailingStore {
    async fn create(&self, _owner: &OwnerId, _entry: NewEntry) -> Result<Entry, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Task("store offline".into()))
    }

    async fn query(
        &self,
        _owner: &OwnerId,
        _category: Option<&Category>,
    ) -> Result<Vec<Entry>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Task("store offline".into()))
    }
}
