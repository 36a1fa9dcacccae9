//! Push/pull reconciliation
//!
//! The [`SyncManager`] reconciles the Local Store with the remote authority.
//!
//! ## Cycle
//!
//! 1. **Guards**: a cycle already in flight or a lost network makes the
//!    request a no-op ([`CycleOutcome::Skipped`]).
//! 2. **Push**: pending operations in FIFO order, one at a time. A failing
//!    operation is counted and retained; it never aborts the push phase.
//!    Successful creates remap the temporary id to the authoritative one.
//! 3. **Pull**: complete folder listing, then documents per folder. Synced
//!    records are overwritten, records absent remotely are pruned, and
//!    document payloads are handed to the content cache.
//! 4. **Bookkeeping**: `last_sync_time` is recorded only when the whole
//!    cycle got through its pull.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Instant,
};

use chrono::Utc;
use meddir_content::{ContentCache, PrimingReport};
use meddir_core::{
    domain::{
        EngineError, EngineResult, EntityId, EntityKind, EntityRecord, IndexQuery,
        OperationType, PendingOperation, RemoteId, SyncState, SyncStatus,
    },
    ports::{EngineEvent, IConnectivity, IEventSink, ILocalStore, IRemoteAuthority, RemoteEntity},
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    activity::{ActivityGuard, SyncActivity},
    retry::RetryPolicy,
};

// ============================================================================
// Cycle results
// ============================================================================

/// Counters of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Operations accepted by the authority
    pub pushed: u64,
    /// Operations that failed this cycle
    pub push_failed: u64,
    /// Operations left alone (failed earlier, or waiting out their backoff)
    pub skipped: u64,
    pub pulled_folders: u64,
    pub pulled_documents: u64,
    /// Local records removed because the authority no longer lists them
    pub pruned: u64,
    /// Per-operation error messages
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn pulled(&self) -> u64 {
        self.pulled_folders + self.pulled_documents
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Offline,
}

/// Result of [`SyncManager::cycle`] and [`SyncManager::full_resync`]
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Skipped(SkipReason),
    /// The pull (or local bookkeeping) failed; data pulled so far is kept
    Failed {
        error: EngineError,
        report: CycleReport,
    },
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) | CycleOutcome::Failed { report, .. } => Some(report),
            CycleOutcome::Skipped(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }
}

// ============================================================================
// SyncManager
// ============================================================================

/// Reconciliation engine
///
/// ## Dependencies
///
/// - `store`: Local Store (entities, pending operations, metadata)
/// - `remote`: remote authority HTTP contract
/// - `content`: optional content cache primed after each pull
/// - `connectivity`: network reachability signal
/// - `events`: lifecycle event sink
pub struct SyncManager {
    store: Arc<dyn ILocalStore>,
    remote: Arc<dyn IRemoteAuthority>,
    content: Option<Arc<ContentCache>>,
    connectivity: Arc<dyn IConnectivity>,
    events: Arc<dyn IEventSink>,
    policy: RetryPolicy,
    activity: SyncActivity,
    /// Background priming started by the last pull
    priming: Mutex<Option<JoinHandle<PrimingReport>>>,
}

impl SyncManager {
    pub fn new(
        store: Arc<dyn ILocalStore>,
        remote: Arc<dyn IRemoteAuthority>,
        content: Option<Arc<ContentCache>>,
        connectivity: Arc<dyn IConnectivity>,
        events: Arc<dyn IEventSink>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            content,
            connectivity,
            events,
            policy,
            activity: SyncActivity::new(),
            priming: Mutex::new(None),
        }
    }

    /// Busy indicator shared with the scheduler and the interception layer
    pub fn activity(&self) -> &SyncActivity {
        &self.activity
    }

    pub fn is_syncing(&self) -> bool {
        self.activity.is_busy()
    }

    fn begin(&self, initial: SyncState) -> Result<ActivityGuard, SkipReason> {
        let guard = self
            .activity
            .try_begin_with(initial)
            .ok_or(SkipReason::AlreadyRunning)?;
        if !self.connectivity.is_online() {
            return Err(SkipReason::Offline);
        }
        Ok(guard)
    }

    /// Runs one push/pull cycle
    #[tracing::instrument(skip(self))]
    pub async fn cycle(&self) -> CycleOutcome {
        let guard = match self.begin(SyncState::Pushing) {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(?reason, "Sync cycle skipped");
                return CycleOutcome::Skipped(reason);
            }
        };

        info!("Starting sync cycle");
        self.events.emit(EngineEvent::SyncStarted);
        let start = Instant::now();
        let mut report = CycleReport::default();

        let result = match self.push(&mut report).await {
            Ok(()) => {
                guard.set(SyncState::Pulling);
                self.pull(&mut report).await
            }
            Err(e) => Err(e),
        };

        self.finish(guard, report, result, start).await
    }

    /// Clears the Local Store and the content cache, then pulls from empty
    ///
    /// Pending operations are discarded. Skipped when offline so a lost
    /// network never wipes local data.
    #[tracing::instrument(skip(self))]
    pub async fn full_resync(&self) -> CycleOutcome {
        let guard = match self.begin(SyncState::Pulling) {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(?reason, "Full resync skipped");
                return CycleOutcome::Skipped(reason);
            }
        };

        info!("Starting full resync");
        self.events.emit(EngineEvent::SyncStarted);
        let start = Instant::now();
        let mut report = CycleReport::default();

        let result = match self.reset_local().await {
            Ok(()) => self.pull(&mut report).await,
            Err(e) => Err(e),
        };

        self.finish(guard, report, result, start).await
    }

    async fn reset_local(&self) -> EngineResult<()> {
        self.store.clear_all().await?;
        if let Some(content) = &self.content {
            content.clear().await?;
        }
        info!("Local store and content cache cleared");
        Ok(())
    }

    async fn finish(
        &self,
        guard: ActivityGuard,
        mut report: CycleReport,
        result: EngineResult<()>,
        start: Instant,
    ) -> CycleOutcome {
        let result = match result {
            Ok(()) => self.store.set_last_sync_time(Utc::now()).await,
            Err(e) => Err(e),
        };
        report.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(
                    pushed = report.pushed,
                    failed = report.push_failed,
                    skipped = report.skipped,
                    folders = report.pulled_folders,
                    documents = report.pulled_documents,
                    pruned = report.pruned,
                    duration_ms = report.duration_ms,
                    "Sync cycle completed"
                );
                self.events.emit(EngineEvent::SyncCompleted {
                    pushed: report.pushed,
                    failed: report.push_failed,
                    pulled: report.pulled(),
                });
                drop(guard);
                CycleOutcome::Completed(report)
            }
            Err(error) => {
                guard.set(SyncState::Failed);
                error!(%error, "Sync cycle failed");
                self.events.emit(EngineEvent::SyncFailed {
                    error: error.to_string(),
                });
                drop(guard);
                CycleOutcome::Failed { error, report }
            }
        }
    }

    // ========================================================================
    // Push
    // ========================================================================

    async fn push(&self, report: &mut CycleReport) -> EngineResult<()> {
        let mut operations = self.store.pending_operations().await?;
        if operations.is_empty() {
            debug!("No pending operations");
            return Ok(());
        }

        info!(count = operations.len(), "Pushing pending operations");
        let now = Utc::now();

        for index in 0..operations.len() {
            let mut operation = operations[index].clone();
            if !self.policy.is_due(&operation, now) {
                report.skipped += 1;
                continue;
            }

            match self.push_operation(&operation).await {
                Ok(created) => {
                    self.store
                        .acknowledge_operation(&operation, created.as_ref())
                        .await?;
                    report.pushed += 1;
                    debug!(operation = %operation.describe(), "Pushed");

                    if let Some(created) = created {
                        info!(
                            kind = %operation.entity_kind,
                            temp_id = %operation.entity_id,
                            id = %created.id,
                            "Remapped to authoritative id"
                        );
                        remap_remaining(
                            &mut operations[index + 1..],
                            &operation.entity_id,
                            &created.id,
                        );
                    }
                }
                Err(e) => {
                    let msg = format!("{}: {}", operation.describe(), e);
                    warn!(%msg, attempts = operation.attempts + 1, "Push failed");
                    report.errors.push(msg);
                    report.push_failed += 1;

                    if operation.record_failure(e.to_string(), self.policy.max_attempts) {
                        warn!(
                            operation = %operation.describe(),
                            attempts = operation.attempts,
                            "Retry budget exhausted, operation marked failed"
                        );
                    }
                    self.store.update_operation(&operation).await?;
                }
            }
        }

        Ok(())
    }

    /// Sends one operation. Returns the authority's copy of a created entity.
    async fn push_operation(
        &self,
        operation: &PendingOperation,
    ) -> EngineResult<Option<RemoteEntity>> {
        match (operation.entity_kind, operation.op_type) {
            (EntityKind::Folder, OperationType::Create) => {
                let created = self.remote.create_folder(&operation.payload).await?;
                Ok(Some(created))
            }
            (EntityKind::Folder, OperationType::Update) => {
                let id = entity_remote_id(operation)?;
                self.remote.update_folder(id, &operation.payload).await?;
                Ok(None)
            }
            (EntityKind::Folder, OperationType::Delete) => {
                let id = entity_remote_id(operation)?;
                self.remote.delete_folder(id).await?;
                Ok(None)
            }
            (EntityKind::Document, OperationType::Create) => {
                let folder_id = parent_remote_id(operation)?;
                let file = if operation.has_file {
                    self.retained_file(operation).await?
                } else {
                    None
                };

                let created = self
                    .remote
                    .create_document(folder_id, &operation.payload, file.as_ref())
                    .await?;
                Ok(Some(created))
            }
            (EntityKind::Document, OperationType::Update) => {
                let folder_id = parent_remote_id(operation)?;
                let id = entity_remote_id(operation)?;
                self.remote
                    .update_document(folder_id, id, &operation.payload)
                    .await?;
                Ok(None)
            }
            (EntityKind::Document, OperationType::Delete) => {
                let folder_id = parent_remote_id(operation)?;
                let id = entity_remote_id(operation)?;
                self.remote.delete_document(folder_id, id).await?;
                Ok(None)
            }
        }
    }

    async fn retained_file(
        &self,
        operation: &PendingOperation,
    ) -> EngineResult<Option<meddir_core::domain::RetainedFile>> {
        let record = self
            .store
            .get(EntityKind::Document, &operation.entity_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                kind: EntityKind::Document,
                id: operation.entity_id.to_string(),
            })?;

        if record.file.is_none() {
            warn!(id = %operation.entity_id, "Retained file missing, creating without it");
        }
        Ok(record.file)
    }

    // ========================================================================
    // Pull
    // ========================================================================

    async fn pull(&self, report: &mut CycleReport) -> EngineResult<()> {
        let listing = self.remote.list_folders().await?;
        info!(count = listing.folders.len(), "Pulled folder listing");

        let dirty = self.unsynced_ids(EntityKind::Folder).await?;
        for folder in &listing.folders {
            let record = EntityRecord::authoritative(
                EntityKind::Folder,
                folder.id.clone().into(),
                None,
                folder.attributes.clone(),
                None,
            );
            if dirty.contains(&record.id) {
                debug!(id = %record.id, "Keeping folder with unpushed changes");
                continue;
            }
            self.store.save_synced(&record).await?;
            report.pulled_folders += 1;
        }

        let listed: HashSet<EntityId> = listing
            .folders
            .iter()
            .map(|f| f.id.clone().into())
            .collect();
        report.pruned += self.prune_folders(&listed).await?;

        let dirty = self.unsynced_ids(EntityKind::Document).await?;
        let mut file_urls = Vec::new();
        for folder in &listing.folders {
            let parent: EntityId = folder.id.clone().into();
            let documents = self.remote.list_documents(&folder.id).await?;

            let mut listed = HashSet::new();
            for document in documents.documents {
                let record = EntityRecord::authoritative(
                    EntityKind::Document,
                    document.id.into(),
                    Some(parent.clone()),
                    document.attributes,
                    document.file_url,
                );
                listed.insert(record.id.clone());
                if dirty.contains(&record.id) {
                    debug!(id = %record.id, "Keeping document with unpushed changes");
                    continue;
                }
                if let Some(url) = &record.file_url {
                    file_urls.push(url.clone());
                }
                self.store.save_synced(&record).await?;
                report.pulled_documents += 1;
            }

            report.pruned += self.prune_documents(&parent, &listed).await?;
        }

        if let Some(content) = &self.content {
            if !file_urls.is_empty() {
                debug!(count = file_urls.len(), "Priming content cache");
                let handle = content.schedule(file_urls);
                if let Ok(mut priming) = self.priming.lock() {
                    *priming = Some(handle);
                }
            }
        }

        Ok(())
    }

    async fn unsynced_ids(&self, kind: EntityKind) -> EngineResult<HashSet<EntityId>> {
        Ok(self
            .store
            .query_by_index(kind, &IndexQuery::Synced(false))
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }

    /// Removes synced folders the authority no longer lists, with their
    /// documents. A folder holding unpushed documents is kept.
    async fn prune_folders(&self, listed: &HashSet<EntityId>) -> EngineResult<u64> {
        let mut pruned = 0;
        let synced = self
            .store
            .query_by_index(EntityKind::Folder, &IndexQuery::Synced(true))
            .await?;

        for folder in synced {
            if folder.id.is_local() || listed.contains(&folder.id) {
                continue;
            }

            let children = self
                .store
                .query_by_index(
                    EntityKind::Document,
                    &IndexQuery::ParentFolder(folder.id.clone()),
                )
                .await?;
            if children.iter().any(|c| !c.synced) {
                debug!(id = %folder.id, "Folder gone remotely but holds unpushed documents");
                continue;
            }

            for child in &children {
                self.remove_local(child).await?;
                pruned += 1;
            }
            self.remove_local(&folder).await?;
            pruned += 1;
        }
        Ok(pruned)
    }

    async fn prune_documents(
        &self,
        parent: &EntityId,
        listed: &HashSet<EntityId>,
    ) -> EngineResult<u64> {
        let mut pruned = 0;
        let documents = self
            .store
            .query_by_index(EntityKind::Document, &IndexQuery::ParentFolder(parent.clone()))
            .await?;

        for document in documents {
            if !document.synced || document.id.is_local() || listed.contains(&document.id) {
                continue;
            }
            self.remove_local(&document).await?;
            pruned += 1;
        }
        Ok(pruned)
    }

    async fn remove_local(&self, record: &EntityRecord) -> EngineResult<()> {
        self.store.delete(record.kind, &record.id).await?;
        if let (Some(content), Some(url)) = (&self.content, &record.file_url) {
            content.remove(url).await;
        }
        debug!(kind = %record.kind, id = %record.id, "Pruned record absent remotely");
        Ok(())
    }

    // ========================================================================
    // Status and maintenance
    // ========================================================================

    pub async fn status(&self) -> EngineResult<SyncStatus> {
        let counts = self.store.storage_counts().await?;
        Ok(SyncStatus {
            state: self.activity.state(),
            is_syncing: self.activity.is_busy(),
            is_online: self.connectivity.is_online(),
            pending_count: counts.pending,
            last_sync_time: self.store.last_sync_time().await?,
            storage_counts: counts,
        })
    }

    /// Waits for the priming started by the last pull, if any
    pub async fn wait_for_priming(&self) -> Option<PrimingReport> {
        let handle = self.priming.lock().ok()?.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Priming task did not finish");
                None
            }
        }
    }

    /// Makes failed operations eligible for the next cycle again
    pub async fn retry_failed(&self) -> EngineResult<u64> {
        let reset = self.store.reset_failed_operations().await?;
        info!(reset, "Failed operations reset");
        Ok(reset)
    }
}

fn entity_remote_id(operation: &PendingOperation) -> EngineResult<&RemoteId> {
    operation.entity_id.as_remote().ok_or_else(|| {
        EngineError::Corrupt(format!(
            "{} targets an entity the authority has never seen",
            operation.describe()
        ))
    })
}

fn parent_remote_id(operation: &PendingOperation) -> EngineResult<&RemoteId> {
    match &operation.parent_id {
        Some(parent) => parent
            .as_remote()
            .ok_or_else(|| EngineError::UnresolvedParent(parent.to_string())),
        None => Err(EngineError::Corrupt(format!(
            "{} has no parent folder",
            operation.describe()
        ))),
    }
}

/// Applies a remap to operations later in the same push
fn remap_remaining(operations: &mut [PendingOperation], temp_id: &EntityId, server_id: &RemoteId) {
    let server: EntityId = server_id.clone().into();
    for operation in operations {
        if &operation.entity_id == temp_id {
            operation.entity_id = server.clone();
        }
        if operation.parent_id.as_ref() == Some(temp_id) {
            operation.parent_id = Some(server.clone());
        }
    }
}
