//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use parley::adapters::memory::InMemoryStateStore;
use parley::adapters::oracle::MockOracle;
use parley::domain::models::{
    ActionRequest, ActionResult, DialogueConfig, IntentExtraction, SlotValues,
};
use parley::domain::ports::{ActionHandler, DialogueStateStore, Oracle};
use parley::services::builtin_actions::{builtin_handlers, AccountLedger};
use parley::services::{ActionDispatcher, DialogueEngine, IntentRegistry};
use parley::{DialogueState, DomainError, DomainResult};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create a temporary test database path
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let db_path = dir.path().join("test.db");
    (dir, db_path)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Build slot values from `(name, value)` pairs
pub fn args(pairs: &[(&str, Value)]) -> SlotValues {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// Shorthand for a scripted oracle match
pub fn matched(intent: &str, pairs: &[(&str, Value)]) -> IntentExtraction {
    IntentExtraction::matched(intent, args(pairs))
}

type Responder = dyn Fn(usize, &ActionRequest) -> ActionResult + Send + Sync;

/// Handler that records every invocation and answers through a closure
/// receiving the zero-based call index.
pub struct RecordingHandler {
    name: String,
    calls: Mutex<Vec<SlotValues>>,
    responder: Box<Responder>,
}

impl RecordingHandler {
    pub fn new(
        name: &str,
        responder: impl Fn(usize, &ActionRequest) -> ActionResult + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Always succeeds with a null payload
    pub fn succeeding(name: &str) -> Arc<Self> {
        Self::new(name, |_, _| ActionResult::success(Value::Null))
    }

    /// Fails its precondition on the first call, succeeds afterwards
    pub fn needs_first(name: &str, dependency: &'static str) -> Arc<Self> {
        Self::new(name, move |call, _| {
            if call == 0 {
                ActionResult::precondition_failed(dependency)
            } else {
                ActionResult::success(Value::Null)
            }
        })
    }

    pub fn calls(&self) -> Vec<SlotValues> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, request: &ActionRequest) -> anyhow::Result<ActionResult> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.arguments.clone());
            calls.len() - 1
        };
        Ok((self.responder)(index, request))
    }
}

/// In-memory store whose reads or writes can be switched to fail
pub struct FaultyStateStore {
    inner: Arc<InMemoryStateStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyStateStore {
    pub fn new(inner: Arc<InMemoryStateStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> DomainResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DialogueStateStore for FaultyStateStore {
    async fn get(&self, conversation_id: &str) -> DomainResult<Option<DialogueState>> {
        Self::check(&self.fail_reads)?;
        self.inner.get(conversation_id).await
    }

    async fn save(&self, conversation_id: &str, state: &DialogueState) -> DomainResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.save(conversation_id, state).await
    }

    async fn clear(&self, conversation_id: &str) -> DomainResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.clear(conversation_id).await
    }

    async fn list(&self, limit: usize) -> DomainResult<Vec<DialogueState>> {
        Self::check(&self.fail_reads)?;
        self.inner.list(limit).await
    }
}

/// Engine wired to an in-memory store and a mock oracle
pub struct Harness {
    pub engine: DialogueEngine,
    pub oracle: Arc<MockOracle>,
    pub store: Arc<InMemoryStateStore>,
    pub faults: Arc<FaultyStateStore>,
}

impl Harness {
    pub async fn send(&self, message: &str) -> parley::DialogueReply {
        self.send_to("conv-1", message).await
    }

    pub async fn try_send(&self, message: &str) -> DomainResult<parley::DialogueReply> {
        self.engine.process_message(message, "conv-1").await
    }

    pub async fn send_to(&self, conversation_id: &str, message: &str) -> parley::DialogueReply {
        self.engine
            .process_message(message, conversation_id)
            .await
            .expect("process_message failed")
    }

    pub async fn state(&self) -> Option<parley::DialogueState> {
        self.store.get("conv-1").await.expect("store read failed")
    }
}

pub struct HarnessBuilder {
    registry: IntentRegistry,
    oracle: MockOracle,
    handlers: Vec<Arc<dyn ActionHandler>>,
    config: DialogueConfig,
    action_timeout: Duration,
}

impl HarnessBuilder {
    pub fn new(oracle: MockOracle) -> Self {
        Self {
            registry: IntentRegistry::builtin().expect("builtin catalog"),
            oracle,
            handlers: Vec::new(),
            config: DialogueConfig::default(),
            action_timeout: Duration::from_secs(5),
        }
    }

    pub fn registry(mut self, registry: IntentRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Built-in handlers for every intent not already registered
    pub fn builtin_handlers(mut self) -> Self {
        let taken: Vec<String> = self.handlers.iter().map(|h| h.name().to_string()).collect();
        for handler in builtin_handlers(Arc::new(AccountLedger::new())) {
            if !taken.iter().any(|name| name == handler.name()) {
                self.handlers.push(handler);
            }
        }
        self
    }

    pub fn config(mut self, configure: impl FnOnce(&mut DialogueConfig)) -> Self {
        configure(&mut self.config);
        self
    }

    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let mut dispatcher = ActionDispatcher::builder().with_timeout(self.action_timeout);
        for handler in self.handlers {
            dispatcher = dispatcher.register(handler).expect("duplicate handler");
        }

        let oracle = Arc::new(self.oracle);
        let store = Arc::new(InMemoryStateStore::new());
        let faults = Arc::new(FaultyStateStore::new(Arc::clone(&store)));
        let engine = DialogueEngine::new(
            Arc::new(self.registry),
            Arc::clone(&faults) as Arc<dyn DialogueStateStore>,
            Arc::clone(&oracle) as Arc<dyn Oracle>,
            Arc::new(dispatcher.build()),
            self.config,
        )
        .with_oracle_timeout(Duration::from_secs(5));

        Harness {
            engine,
            oracle,
            store,
            faults,
        }
    }
}
