//! Test doubles for exercising the executors without a real database.
//!
//! Enabled by the `test-support` feature.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docmigrate_store::{
    CollectionOptions, Document, DocumentStore, MemoryStore, Namespace, StoreError, StoreResult,
    UpdateOutcome,
};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::error::UnitResult;
use crate::unit::{Migration, Seeder};

/// One event seen by a [`LogCapture`]
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

/// A layer that records every event, for asserting on log output
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture events on the current thread until the guard drops
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events.lock().iter().filter(|event| event.level == level).count()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.level == level)
            .map(|event| event.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Shared record of unit invocations, in call order
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Migration that records `up:<name>` / `down:<name>` and can be told to fail
#[derive(Debug, Clone)]
pub struct RecordingMigration {
    name: String,
    journal: Journal,
    fail_up: bool,
    fail_down: bool,
}

impl RecordingMigration {
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
            fail_up: false,
            fail_down: false,
        }
    }

    pub fn failing_up(mut self) -> Self {
        self.fail_up = true;
        self
    }

    pub fn failing_down(mut self) -> Self {
        self.fail_down = true;
        self
    }
}

#[async_trait]
impl Migration for RecordingMigration {
    async fn up(&self, _store: &dyn DocumentStore) -> UnitResult<()> {
        self.journal.record(format!("up:{}", self.name));
        if self.fail_up {
            return Err(anyhow::anyhow!("{} refused to migrate up", self.name).into());
        }
        Ok(())
    }

    async fn down(&self, _store: &dyn DocumentStore) -> UnitResult<()> {
        self.journal.record(format!("down:{}", self.name));
        if self.fail_down {
            return Err(anyhow::anyhow!("{} refused to migrate down", self.name).into());
        }
        Ok(())
    }
}

/// Seeder that records `run:<name>`
#[derive(Debug, Clone)]
pub struct RecordingSeeder {
    name: String,
    journal: Journal,
    fail: bool,
}

impl RecordingSeeder {
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Seeder for RecordingSeeder {
    async fn run(&self, _store: &dyn DocumentStore) -> UnitResult<()> {
        self.journal.record(format!("run:{}", self.name));
        if self.fail {
            return Err(anyhow::anyhow!("{} refused to run", self.name).into());
        }
        Ok(())
    }
}

/// [`MemoryStore`] with switchable faults
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_list_collections: AtomicBool,
    forget_reads: AtomicBool,
    fail_deletes: AtomicBool,
    fail_drops: AtomicBool,
    lose_drops: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Fail `list_collection_names`, and with it ledger provisioning
    pub fn fail_list_collections(&self, on: bool) {
        self.fail_list_collections.store(on, Ordering::SeqCst);
    }

    /// Make `find_one` report nothing, so the ledger believes nothing is applied
    pub fn forget_reads(&self, on: bool) {
        self.forget_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    pub fn fail_drops(&self, on: bool) {
        self.fail_drops.store(on, Ordering::SeqCst);
    }

    /// Make `drop_collection` report nothing dropped and leave the collection
    pub fn lose_drops(&self, on: bool) {
        self.lose_drops.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list_collection_names(&self, database: &str) -> StoreResult<Vec<String>> {
        if self.fail_list_collections.load(Ordering::SeqCst) {
            return Err(StoreError::connection("connection reset by peer"));
        }
        self.inner.list_collection_names(database).await
    }

    async fn create_collection(&self, namespace: &Namespace, options: CollectionOptions) -> StoreResult<()> {
        self.inner.create_collection(namespace, options).await
    }

    async fn create_index(&self, namespace: &Namespace, field: &str, unique: bool) -> StoreResult<()> {
        self.inner.create_index(namespace, field, unique).await
    }

    async fn drop_collection(&self, namespace: &Namespace) -> StoreResult<bool> {
        if self.fail_drops.load(Ordering::SeqCst) {
            return Err(StoreError::backend(format!("not authorized to drop {}", namespace)));
        }
        if self.lose_drops.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.drop_collection(namespace).await
    }

    async fn find_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<Option<Document>> {
        if self.forget_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_one(namespace, filter).await
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> StoreResult<()> {
        self.inner.insert_one(namespace, document).await
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.update_one(namespace, filter, update, upsert).await
    }

    async fn delete_one(&self, namespace: &Namespace, filter: &Document) -> StoreResult<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("write concern timeout"));
        }
        self.inner.delete_one(namespace, filter).await
    }
}

/// Create placeholder unit files in `dir`, for use with registered units.
///
/// Panics on I/O failure.
pub fn touch_units(dir: &Path, filenames: &[&str]) {
    for filename in filenames {
        if let Err(e) = fs::write(dir.join(filename), "{}") {
            panic!("failed to create unit {}: {}", filename, e);
        }
    }
}
