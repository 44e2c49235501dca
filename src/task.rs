//! Task ledger for slate.
//!
//! Tasks are stored as append-only events in `.slate/tasks.jsonl` with a
//! derived snapshot in `.slate/tasks.snapshot.json`. A task's identity is
//! its slug, allocated from the title at creation time; the slug of a
//! surviving task never changes except through `retitle`.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::TasksConfig;
use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::slug::{self, SlugAllocator, SlugLookup};
use crate::storage::Storage;

const TASKS_SCHEMA_VERSION: &str = "slate.tasks.v1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventType {
    TaskCreated,
    TaskRetitled,
    TaskStatusChanged,
    TaskDeleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_id: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub event_type: TaskEventType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// New slug assigned by a retitle whose normalized base changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
}

impl TaskEvent {
    pub fn new(event_type: TaskEventType, slug: impl Into<String>) -> Self {
        Self {
            event_id: Ulid::new().to_string(),
            slug: slug.into(),
            event_type,
            timestamp: Utc::now(),
            title: None,
            status: None,
            renamed_to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub slug: String,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub tasks: Vec<TaskRecord>,
}

impl TaskSnapshot {
    pub fn empty() -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            tasks: Vec::new(),
        }
    }
}

/// Check a title before it reaches the allocator.
///
/// A valid title is non-empty after trimming, fits the configured length,
/// and contains at least one ASCII alphanumeric character, which
/// guarantees a non-empty slug base.
pub fn validate_title(title: &str, config: &TasksConfig) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTitle("title cannot be empty".to_string()));
    }
    if trimmed.chars().count() > config.max_title_len {
        return Err(Error::InvalidTitle(format!(
            "title exceeds {} characters",
            config.max_title_len
        )));
    }
    if !trimmed.chars().any(|ch| ch.is_ascii_alphanumeric()) {
        return Err(Error::InvalidTitle(
            "title must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Event-sourced store of task records keyed by slug.
#[derive(Debug, Clone)]
pub struct TaskStore {
    storage: Storage,
    config: TasksConfig,
}

impl TaskStore {
    pub fn new(storage: Storage, config: TasksConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &TasksConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.storage.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.storage.root().to_path_buf()))
        }
    }

    /// Create a task, allocating its slug from the title.
    ///
    /// The read-resolve-append sequence runs under a per-base file lock so
    /// concurrent creations for the same base serialize; the allocator's
    /// commit closure re-checks existence and retries on a lost race as a
    /// second line of defense for writers that bypass the lock.
    pub fn create(&self, title: &str, status: Option<&str>) -> Result<TaskRecord> {
        self.ensure_initialized()?;
        let title = validate_title(title, &self.config)?;
        let status = match status {
            Some(value) => {
                self.validate_status(value)?;
                value.to_string()
            }
            None => self.config.default_status.clone(),
        };

        let base = slug::normalize(&title);
        let _base_lock =
            FileLock::acquire(self.storage.base_lock(&base), DEFAULT_LOCK_TIMEOUT_MS)?;

        let allocator = SlugAllocator::new(self);
        let slug = allocator.allocate_with(&title, |candidate| {
            let mut event = TaskEvent::new(TaskEventType::TaskCreated, candidate);
            event.title = Some(title.clone());
            event.status = Some(status.clone());
            self.append_event_claiming(event, candidate)
        })?;

        tracing::debug!(%slug, "created task");
        self.get(&slug)
    }

    /// Change a task's title.
    ///
    /// The slug is stable while the normalized base stays the same. When
    /// the base changes, a fresh slug is allocated for the new base and the
    /// old slug is released exactly as if the record had been deleted.
    pub fn retitle(&self, slug_value: &str, new_title: &str) -> Result<TaskRecord> {
        self.ensure_initialized()?;
        let title = validate_title(new_title, &self.config)?;
        let current = self.get(slug_value)?;

        let old_base = slug::normalize(&current.title);
        let new_base = slug::normalize(&title);

        if new_base == old_base {
            let mut event = TaskEvent::new(TaskEventType::TaskRetitled, &current.slug);
            event.title = Some(title);
            self.append_event(event)?;
            return self.get(&current.slug);
        }

        let _base_lock =
            FileLock::acquire(self.storage.base_lock(&new_base), DEFAULT_LOCK_TIMEOUT_MS)?;

        let allocator = SlugAllocator::new(self);
        let new_slug = allocator.allocate_with(&title, |candidate| {
            let mut event = TaskEvent::new(TaskEventType::TaskRetitled, &current.slug);
            event.title = Some(title.clone());
            event.renamed_to = Some(candidate.to_string());
            self.append_event_claiming(event, candidate)
        })?;

        tracing::debug!(from = %current.slug, to = %new_slug, "retitled task");
        self.get(&new_slug)
    }

    /// Move a task to another configured status.
    pub fn set_status(&self, slug_value: &str, status: &str) -> Result<TaskRecord> {
        self.ensure_initialized()?;
        self.validate_status(status)?;
        let current = self.get(slug_value)?;

        let mut event = TaskEvent::new(TaskEventType::TaskStatusChanged, &current.slug);
        event.status = Some(status.to_string());
        self.append_event(event)?;
        self.get(&current.slug)
    }

    /// Close a task with the first configured done status.
    pub fn done(&self, slug_value: &str) -> Result<TaskRecord> {
        let status = self
            .config
            .done_statuses
            .first()
            .cloned()
            .unwrap_or_else(|| "done".to_string());
        self.set_status(slug_value, &status)
    }

    /// Delete a task, freeing its exact slug.
    ///
    /// Freeing never lowers suffix numbers: later allocations for the same
    /// base still resolve against the maximum among surviving slugs.
    pub fn delete(&self, slug_value: &str) -> Result<TaskRecord> {
        self.ensure_initialized()?;
        let current = self.get(slug_value)?;

        let event = TaskEvent::new(TaskEventType::TaskDeleted, &current.slug);
        self.append_event(event)?;
        tracing::debug!(slug = %current.slug, "deleted task");
        Ok(current)
    }

    /// Look up a task by slug.
    pub fn get(&self, slug_value: &str) -> Result<TaskRecord> {
        self.find(slug_value)?
            .ok_or_else(|| Error::TaskNotFound(slug_value.to_string()))
    }

    fn find(&self, slug_value: &str) -> Result<Option<TaskRecord>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .tasks
            .into_iter()
            .find(|task| task.slug == slug_value))
    }

    /// List surviving tasks, optionally filtered by status.
    pub fn list(&self, status: Option<&str>) -> Result<Vec<TaskRecord>> {
        self.ensure_initialized()?;
        let snapshot = self.snapshot()?;
        let mut tasks = snapshot.tasks;
        if let Some(status) = status {
            let status = status.trim();
            self.validate_status(status)?;
            tasks.retain(|task| task.status == status);
        }
        Ok(tasks)
    }

    pub fn count(&self, status: Option<&str>) -> Result<usize> {
        Ok(self.list(status)?.len())
    }

    pub fn validate_status(&self, status: &str) -> Result<()> {
        if self.config.statuses.iter().any(|value| value == status) {
            Ok(())
        } else {
            Err(Error::UnknownStatus(status.to_string()))
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn append_event(&self, event: TaskEvent) -> Result<()> {
        let log = self.storage.tasks_log();
        let _log_lock =
            FileLock::acquire(self.storage.write_lock(&log), DEFAULT_LOCK_TIMEOUT_MS)?;
        self.append_locked(&log, event)
    }

    /// Append an event that claims `claimed` as a freshly issued slug.
    ///
    /// The existence check and the append run under the log lock, so two
    /// writers can never both claim one slug. The per-base lock alone is
    /// not enough: the bare slug for base `task-2` competes with suffix 2
    /// of base `task`, and those writers hold different base locks.
    fn append_event_claiming(&self, event: TaskEvent, claimed: &str) -> Result<bool> {
        let log = self.storage.tasks_log();
        let _log_lock =
            FileLock::acquire(self.storage.write_lock(&log), DEFAULT_LOCK_TIMEOUT_MS)?;
        if self.find(claimed)?.is_some() {
            return Ok(false);
        }
        self.append_locked(&log, event)?;
        Ok(true)
    }

    /// Append and fold one event; the caller holds the log lock.
    ///
    /// Events that mutate an existing task are validated against the
    /// surviving set first, so a writer that raced a deletion fails
    /// cleanly instead of poisoning the log with an unreplayable event.
    fn append_locked(&self, log: &Path, event: TaskEvent) -> Result<()> {
        if event.event_type != TaskEventType::TaskCreated
            && self.find(&event.slug)?.is_none()
        {
            return Err(Error::TaskNotFound(event.slug.clone()));
        }
        self.storage.append_jsonl(log, &event)?;
        self.refresh_snapshot_with(&event)
    }

    /// Fold one freshly appended event into the snapshot.
    ///
    /// When the snapshot file is missing the log (which already contains
    /// the event) is replayed instead, so a deleted snapshot heals.
    fn refresh_snapshot_with(&self, event: &TaskEvent) -> Result<()> {
        let path = self.storage.tasks_snapshot();
        let _lock =
            FileLock::acquire(self.storage.write_lock(&path), DEFAULT_LOCK_TIMEOUT_MS)?;

        let snapshot = match self.load_snapshot()? {
            Some(mut snapshot) => {
                let mut map: HashMap<String, TaskRecord> = snapshot
                    .tasks
                    .drain(..)
                    .map(|task| (task.slug.clone(), task))
                    .collect();
                apply_event(&mut map, event, &self.config)?;
                snapshot_from_map(map)
            }
            None => self.build_snapshot(&self.load_events()?)?,
        };

        self.storage.write_json(&path, &snapshot)
    }

    /// Current snapshot, rebuilt from the event log when missing.
    pub fn snapshot(&self) -> Result<TaskSnapshot> {
        if let Some(snapshot) = self.load_snapshot()? {
            return Ok(snapshot);
        }
        let snapshot = self.build_snapshot(&self.load_events()?)?;
        // Cache for the next reader. Skip when a writer holds the snapshot
        // lock; it is about to produce a fresher file anyway.
        let path = self.storage.tasks_snapshot();
        if let Ok(Some(_lock)) = FileLock::try_acquire(self.storage.write_lock(&path)) {
            let _ = self.storage.write_json(&path, &snapshot);
        }
        Ok(snapshot)
    }

    fn load_snapshot(&self) -> Result<Option<TaskSnapshot>> {
        let path = self.storage.tasks_snapshot();
        if !path.exists() {
            return Ok(None);
        }
        let snapshot = self.storage.read_json(&path)?;
        Ok(Some(snapshot))
    }

    fn load_events(&self) -> Result<Vec<TaskEvent>> {
        self.storage.read_jsonl(&self.storage.tasks_log())
    }

    fn build_snapshot(&self, events: &[TaskEvent]) -> Result<TaskSnapshot> {
        let mut sorted = events.to_vec();
        sort_events(&mut sorted);

        let mut map: HashMap<String, TaskRecord> = HashMap::new();
        for event in &sorted {
            apply_event(&mut map, event, &self.config)?;
        }

        Ok(snapshot_from_map(map))
    }
}

/// The store itself is the slug collaborator: the matching set for a base
/// is exactly the anchored matches among surviving task slugs.
impl SlugLookup for TaskStore {
    fn matching_slugs(&self, base: &str) -> Result<Vec<String>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .tasks
            .into_iter()
            .map(|task| task.slug)
            .filter(|candidate| slug::matches_base(base, candidate))
            .collect())
    }
}

fn snapshot_from_map(map: HashMap<String, TaskRecord>) -> TaskSnapshot {
    let mut tasks: Vec<TaskRecord> = map.into_values().collect();
    tasks.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.slug.cmp(&b.slug))
    });

    TaskSnapshot {
        schema_version: TASKS_SCHEMA_VERSION.to_string(),
        generated_at: Utc::now(),
        tasks,
    }
}

fn sort_events(events: &mut [TaskEvent]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
}

fn apply_event(
    map: &mut HashMap<String, TaskRecord>,
    event: &TaskEvent,
    config: &TasksConfig,
) -> Result<()> {
    match event.event_type {
        TaskEventType::TaskCreated => {
            if map.contains_key(&event.slug) {
                return Err(Error::InvalidArgument(format!(
                    "task already exists: {}",
                    event.slug
                )));
            }

            let title = event.title.clone().ok_or_else(|| {
                Error::InvalidArgument(format!("missing title for {}", event.slug))
            })?;
            let status = event
                .status
                .clone()
                .unwrap_or_else(|| config.default_status.clone());
            if !config.statuses.iter().any(|value| value == &status) {
                return Err(Error::UnknownStatus(status));
            }

            let now = event.timestamp;
            map.insert(
                event.slug.clone(),
                TaskRecord {
                    slug: event.slug.clone(),
                    title,
                    status,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        TaskEventType::TaskRetitled => {
            let mut record = map
                .remove(&event.slug)
                .ok_or_else(|| Error::TaskNotFound(event.slug.clone()))?;
            record.title = event.title.clone().ok_or_else(|| {
                Error::InvalidArgument(format!("missing title for {}", event.slug))
            })?;
            if let Some(new_slug) = &event.renamed_to {
                if map.contains_key(new_slug) {
                    return Err(Error::InvalidArgument(format!(
                        "slug already taken: {new_slug}"
                    )));
                }
                record.slug = new_slug.clone();
            }
            record.updated_at = event.timestamp;
            map.insert(record.slug.clone(), record);
        }
        TaskEventType::TaskStatusChanged => {
            let record = map
                .get_mut(&event.slug)
                .ok_or_else(|| Error::TaskNotFound(event.slug.clone()))?;
            let status = event
                .status
                .clone()
                .ok_or_else(|| Error::InvalidArgument("missing status".to_string()))?;
            if !config.statuses.iter().any(|value| value == &status) {
                return Err(Error::UnknownStatus(status));
            }
            record.status = status;
            record.updated_at = event.timestamp;
        }
        TaskEventType::TaskDeleted => {
            map.remove(&event.slug)
                .ok_or_else(|| Error::TaskNotFound(event.slug.clone()))?;
        }
    }

    Ok(())
}
