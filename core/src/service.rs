use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::analysis::{AnalysisGateway, AnalysisInput, AnalysisOutcome, build_messages, parse_analysis};
use crate::backup::{self, BackupController};
use crate::db::Database;
use crate::entries::{self, EntryStore, SaveOutcome};
use crate::error::ValidationError;
use crate::goals::{CredentialStore, GoalStore};
use crate::models::{
    BackupSnapshot, BackupStatus, GoalState, ImportOutcome, MacroTotals, MealEntry, Period,
    PeriodReview,
};
use crate::session::Session;

/// Single entry point for front ends. Owns the local database; every
/// operation goes through one of the stores.
pub struct FoodMonitorService {
    db: Database,
}

impl FoodMonitorService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    fn entries(&self) -> EntryStore<'_> {
        EntryStore::new(&self.db)
    }

    fn backups(&self) -> BackupController<'_> {
        BackupController::new(&self.db)
    }

    // --- Entries ---

    #[must_use]
    pub fn list_entries(&self) -> Vec<MealEntry> {
        self.entries().list()
    }

    #[must_use]
    pub fn get_entry(&self, id: i64) -> Option<MealEntry> {
        self.entries().get(id)
    }

    pub fn save_entry(&self, entry: MealEntry) -> Result<SaveOutcome> {
        self.entries().save(entry)
    }

    /// Persist the session's draft and reset the form. A new entry gets a
    /// time-derived id; an edited one keeps its own.
    pub fn save_draft(
        &self,
        session: &mut Session,
        now: DateTime<Utc>,
    ) -> Result<(MealEntry, SaveOutcome)> {
        let store = self.entries();
        let entry = session.to_entry(store.next_id(now)?, now);
        let outcome = store.save(entry.clone())?;
        session.reset();
        info!(id = entry.id, ?outcome, "entry saved");
        Ok((entry, outcome))
    }

    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        self.entries().delete(id)
    }

    /// Drop the whole log once `confirm` (given the current count) agrees.
    pub fn clear_entries<F>(&self, confirm: F) -> Result<usize>
    where
        F: FnOnce(usize) -> bool,
    {
        let store = self.entries();
        if !confirm(store.list().len()) {
            return Err(ValidationError::ClearCancelled.into());
        }
        let count = store.clear()?;
        info!(count, "all entries cleared");
        Ok(count)
    }

    #[must_use]
    pub fn entries_for_date(&self, date: NaiveDate) -> Vec<MealEntry> {
        self.entries().filter_by_date(date)
    }

    #[must_use]
    pub fn entries_for_period(&self, period: Period, reference: NaiveDate) -> Vec<MealEntry> {
        self.entries().filter_by_period(period, reference)
    }

    #[must_use]
    pub fn totals_for_date(&self, date: NaiveDate) -> MacroTotals {
        entries::aggregate(&self.entries_for_date(date))
    }

    #[must_use]
    pub fn review(&self, period: Period, reference: NaiveDate) -> PeriodReview {
        self.entries().review(period, reference)
    }

    // --- Goal ---

    #[must_use]
    pub fn get_goal(&self) -> GoalState {
        GoalStore::new(&self.db).load()
    }

    pub fn set_goal(&self, goal: Option<&str>, goal_custom: Option<&str>) -> Result<GoalState> {
        GoalStore::new(&self.db).save(goal, goal_custom)
    }

    // --- API credential ---

    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        CredentialStore::new(&self.db).load()
    }

    pub fn save_api_key(&self, key: &str) -> Result<bool> {
        CredentialStore::new(&self.db).save(key)
    }

    pub fn clear_api_key(&self) -> Result<bool> {
        CredentialStore::new(&self.db).clear()
    }

    // --- Backup ---

    /// Build a snapshot of the whole log. Does not count as a backup until
    /// it has been written; see [`Self::export_backup_to`].
    pub fn export_backup(&self, now: DateTime<Utc>) -> Result<BackupSnapshot> {
        self.backups().export_snapshot(&self.list_entries(), now)
    }

    /// Write a snapshot to `path` and only then record the backup time.
    pub fn export_backup_to(&self, path: &Path, now: DateTime<Utc>) -> Result<BackupSnapshot> {
        let snapshot = self.export_backup(now)?;
        let body = serde_json::to_string_pretty(&snapshot).context("Failed to serialize backup")?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write backup: {}", path.display()))?;
        self.backups().record_backup(now)?;
        Ok(snapshot)
    }

    /// Parse a snapshot file and, if `confirm(local, incoming)` agrees,
    /// replace the log with it.
    pub fn import_backup<F>(&self, raw: &str, confirm: F) -> Result<ImportOutcome>
    where
        F: FnOnce(usize, usize) -> bool,
    {
        let entries = backup::parse_snapshot(raw)?;
        self.backups().apply_import(entries, confirm)
    }

    #[must_use]
    pub fn backup_status(&self, now: DateTime<Utc>) -> BackupStatus {
        self.backups().status(now)
    }

    #[must_use]
    pub fn backup_reminder_due(&self, now: DateTime<Utc>) -> bool {
        self.backups().should_remind(self.list_entries().len(), now)
    }

    pub fn snooze_backup(&self, days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.backups().snooze_for(days, now)
    }

    // --- Analysis ---

    /// Ask `gateway` for an estimate of `input` and hydrate the session's
    /// draft from it. An unparsable reply is returned, not raised.
    pub async fn analyze<G: AnalysisGateway>(
        &self,
        gateway: &G,
        session: &mut Session,
        input: &AnalysisInput,
    ) -> Result<AnalysisOutcome> {
        let messages = build_messages(input, &self.get_goal())?;
        info!(
            has_image = input.image_data_url.is_some(),
            "requesting analysis"
        );
        let content = gateway.complete(&messages).await?;
        let outcome = parse_analysis(&content);
        session.hydrate(outcome.clone());
        Ok(outcome)
    }
}
