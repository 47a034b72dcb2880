//! Repository traits over the delivery log and tenant settings.
//!
//! These traits are the narrow seam between the delivery engine and
//! durable persistence, which is an external collaborator. The in-memory
//! implementations back the composition root and tests; a SQL
//! implementation would express `claim_for_retry` as a conditional
//! `UPDATE ... RETURNING` so the claim stays atomic across processes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hookline_core::{
    CoreError, DeliveryId, DeliveryLog, DeliveryStatus, TenantId, WebhookSettings,
};
use tokio::sync::RwLock;

/// Aggregate delivery counts for a tenant's settings/log view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Total log entries.
    pub total: u64,
    /// Entries delivered successfully.
    pub delivered: u64,
    /// Entries currently failed (retrying or exhausted).
    pub failed: u64,
    /// Entries with an initial send in flight.
    pub pending: u64,
    /// Entries claimed by a retry sweep.
    pub retrying: u64,
}

/// Append/update interface over the durable delivery log.
///
/// Entries are append-on-create and mutated in place per attempt; nothing
/// here deletes them (retention is an external concern). All mutation
/// methods reject terminal entries so the state machine stays monotonic.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    /// Appends a new entry, returning its generated id.
    async fn insert(&self, entry: DeliveryLog) -> Result<DeliveryId, CoreError>;

    /// Records a successful delivery. Terminal.
    async fn record_delivered(
        &self,
        id: DeliveryId,
        attempts: u32,
        response_status: u16,
        body_excerpt: String,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Records a failed attempt.
    ///
    /// `next_retry_at = None` marks the failure terminal; a set value
    /// schedules the entry for a future sweep and must lie after `now`.
    #[allow(clippy::too_many_arguments)]
    async fn record_failed(
        &self,
        id: DeliveryId,
        attempts: u32,
        response_status: Option<u16>,
        body_excerpt: Option<String>,
        error_message: Option<String>,
        next_retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Atomically claims a due entry for retry.
    ///
    /// Only an entry with `status = Failed`, `next_retry_at <= now`, and
    /// attempts below the cap flips to `Retrying`; the flip also increments
    /// `attempts` and clears `next_retry_at`, so a concurrent sweep
    /// observes the entry as claimed and skips it. Returns `None` when the
    /// entry is missing or not claimable.
    async fn claim_for_retry(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryLog>, CoreError>;

    /// Returns entries due for retry at `now`, oldest first.
    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryLog>, CoreError>;

    /// Returns a tenant's entries, newest first.
    async fn list_by_tenant(
        &self,
        tenant_id: TenantId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DeliveryLog>, CoreError>;

    /// Returns a single entry by id.
    async fn find(&self, id: DeliveryId) -> Result<Option<DeliveryLog>, CoreError>;

    /// Returns aggregate delivery counts for a tenant.
    async fn stats_for_tenant(&self, tenant_id: TenantId) -> Result<DeliveryStats, CoreError>;
}

/// Read interface over per-tenant webhook settings.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Returns the tenant's webhook settings, if configured.
    async fn get_settings(&self, tenant_id: TenantId)
        -> Result<Option<WebhookSettings>, CoreError>;
}

/// In-memory delivery log store.
///
/// Backs tests and single-process deployments. Mutations take the write
/// lock for their full read-modify-write cycle, which makes
/// `claim_for_retry` atomic the same way a conditional SQL update would
/// be.
#[derive(Debug, Default)]
pub struct InMemoryDeliveryLogStore {
    entries: RwLock<Vec<DeliveryLog>>,
}

impl InMemoryDeliveryLogStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries across all tenants.
    pub async fn total_entries(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl DeliveryLogStore for InMemoryDeliveryLogStore {
    async fn insert(&self, entry: DeliveryLog) -> Result<DeliveryId, CoreError> {
        let id = entry.id;
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn record_delivered(
        &self,
        id: DeliveryId,
        attempts: u32,
        response_status: u16,
        body_excerpt: String,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        let entry = find_mut(&mut entries, id)?;
        ensure_mutable(entry)?;

        entry.status = DeliveryStatus::Delivered;
        entry.attempts = entry.attempts.max(attempts);
        entry.response_status = Some(response_status);
        entry.response_body_excerpt = Some(body_excerpt);
        entry.error_message = None;
        entry.next_retry_at = None;
        entry.updated_at = now;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_failed(
        &self,
        id: DeliveryId,
        attempts: u32,
        response_status: Option<u16>,
        body_excerpt: Option<String>,
        error_message: Option<String>,
        next_retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        let entry = find_mut(&mut entries, id)?;
        ensure_mutable(entry)?;

        entry.status = DeliveryStatus::Failed;
        entry.attempts = entry.attempts.max(attempts);
        entry.response_status = response_status;
        entry.response_body_excerpt = body_excerpt;
        entry.error_message = error_message;
        entry.next_retry_at = next_retry_at;
        entry.updated_at = now;
        Ok(())
    }

    async fn claim_for_retry(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryLog>, CoreError> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) else {
            return Ok(None);
        };

        if !entry.is_due_for_retry(now) {
            return Ok(None);
        }

        entry.status = DeliveryStatus::Retrying;
        entry.attempts += 1;
        entry.next_retry_at = None;
        entry.updated_at = now;
        Ok(Some(entry.clone()))
    }

    async fn find_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryLog>, CoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.is_due_for_retry(now))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: TenantId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DeliveryLog>, CoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter(|entry| entry.tenant_id == tenant_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find(&self, id: DeliveryId) -> Result<Option<DeliveryLog>, CoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|entry| entry.id == id).cloned())
    }

    async fn stats_for_tenant(&self, tenant_id: TenantId) -> Result<DeliveryStats, CoreError> {
        let entries = self.entries.read().await;
        let mut stats = DeliveryStats::default();

        for entry in entries.iter().filter(|entry| entry.tenant_id == tenant_id) {
            stats.total += 1;
            match entry.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Delivered => stats.delivered += 1,
                DeliveryStatus::Failed => stats.failed += 1,
                DeliveryStatus::Retrying => stats.retrying += 1,
            }
        }

        Ok(stats)
    }
}

fn find_mut(entries: &mut [DeliveryLog], id: DeliveryId) -> Result<&mut DeliveryLog, CoreError> {
    entries
        .iter_mut()
        .find(|entry| entry.id == id)
        .ok_or_else(|| CoreError::not_found(format!("delivery log entry {id} not found")))
}

fn ensure_mutable(entry: &DeliveryLog) -> Result<(), CoreError> {
    if entry.is_terminal() {
        return Err(CoreError::invalid_input(format!(
            "delivery log entry {} is terminal and cannot be mutated",
            entry.id
        )));
    }
    Ok(())
}

/// In-memory settings store with an upsert surface for the settings UI.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    settings: RwLock<HashMap<TenantId, WebhookSettings>>,
}

impl InMemorySettingsStore {
    /// Creates an empty settings store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tenant's settings.
    pub async fn upsert(&self, settings: WebhookSettings) {
        self.settings.write().await.insert(settings.tenant_id, settings);
    }

    /// Removes a tenant's settings.
    pub async fn remove(&self, tenant_id: TenantId) {
        self.settings.write().await.remove(&tenant_id);
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettingsStore {
    async fn get_settings(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<WebhookSettings>, CoreError> {
        Ok(self.settings.read().await.get(&tenant_id).cloned())
    }
}
