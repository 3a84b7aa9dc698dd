//! Full-log snapshots (export/restore) and the backup reminder cadence.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::db::{Database, KEY_BACKUP_SNOOZE, KEY_LAST_BACKUP};
use crate::entries::EntryStore;
use crate::error::ValidationError;
use crate::models::{APP_ID, BackupSnapshot, BackupStatus, ImportOutcome, MealEntry, SnapshotMeta};

/// A reminder fires once the last backup is older than this.
pub const REMINDER_INTERVAL_DAYS: i64 = 7;

pub struct BackupController<'a> {
    db: &'a Database,
}

impl<'a> BackupController<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Wrap `entries` in a snapshot. The backup time is recorded separately,
    /// once the snapshot has been written out.
    pub fn export_snapshot(&self, entries: &[MealEntry], now: DateTime<Utc>) -> Result<BackupSnapshot> {
        if entries.is_empty() {
            return Err(ValidationError::NothingToExport.into());
        }
        let device_id = match self.db.get_or_create_device_id() {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "no device id for snapshot");
                None
            }
        };
        let snapshot = BackupSnapshot {
            meta: SnapshotMeta {
                exported_at: now.to_rfc3339(),
                count: entries.len(),
                app: APP_ID.to_string(),
                device_id,
            },
            entries: entries.to_vec(),
        };
        debug!(count = entries.len(), "snapshot built");
        Ok(snapshot)
    }

    /// Replace the whole log with `entries`, but only if `confirm` agrees.
    ///
    /// `confirm` receives `(local_count, incoming_count)`. Declining leaves
    /// the log untouched and yields [`ValidationError::ImportCancelled`].
    pub fn apply_import<F>(&self, entries: Vec<MealEntry>, confirm: F) -> Result<ImportOutcome>
    where
        F: FnOnce(usize, usize) -> bool,
    {
        let store = EntryStore::new(self.db);
        let replaced = store.list().len();
        if !confirm(replaced, entries.len()) {
            return Err(ValidationError::ImportCancelled.into());
        }
        store.replace_all(&entries)?;
        info!(replaced, imported = entries.len(), "snapshot restored");
        Ok(ImportOutcome {
            replaced,
            imported: entries.len(),
        })
    }

    pub fn record_backup(&self, at: DateTime<Utc>) -> Result<()> {
        self.db.set_item(KEY_LAST_BACKUP, &at.to_rfc3339())?;
        info!(at = %at, "backup recorded");
        Ok(())
    }

    #[must_use]
    pub fn last_backup(&self) -> Option<DateTime<Utc>> {
        self.read_timestamp(KEY_LAST_BACKUP)
    }

    pub fn snooze(&self, until: DateTime<Utc>) -> Result<()> {
        self.db.set_item(KEY_BACKUP_SNOOZE, &until.to_rfc3339())
    }

    /// Snooze for a positive number of days. Out-of-range values are a
    /// validation error and leave any existing snooze in place.
    pub fn snooze_for(&self, days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let until = Some(days)
            .filter(|d| *d > 0)
            .and_then(Duration::try_days)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(ValidationError::InvalidSnoozeDays(days))?;
        self.snooze(until)?;
        Ok(until)
    }

    #[must_use]
    pub fn snoozed_until(&self) -> Option<DateTime<Utc>> {
        self.read_timestamp(KEY_BACKUP_SNOOZE)
    }

    #[must_use]
    pub fn should_remind(&self, entry_count: usize, now: DateTime<Utc>) -> bool {
        reminder_due(entry_count, self.last_backup(), self.snoozed_until(), now)
    }

    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> BackupStatus {
        let entry_count = EntryStore::new(self.db).list().len();
        let last_backup = self.last_backup();
        let snoozed_until = self.snoozed_until().filter(|until| *until > now);
        BackupStatus {
            entry_count,
            last_backup: last_backup.map(|t| t.to_rfc3339()),
            snoozed_until: snoozed_until.map(|t| t.to_rfc3339()),
            reminder_due: reminder_due(entry_count, last_backup, snoozed_until, now),
        }
    }

    fn read_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.db.get_item(key).ok().flatten()?;
        let parsed = parse_timestamp(&raw);
        if parsed.is_none() {
            debug!(key, "stored timestamp is corrupt; ignoring");
        }
        parsed
    }
}

/// RFC 3339, or epoch milliseconds as written by older clients.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Whether to nag about backups: there is something to lose, no snooze is
/// active, and the last backup is older than the interval (or never happened).
#[must_use]
pub fn reminder_due(
    entry_count: usize,
    last_backup: Option<DateTime<Utc>>,
    snoozed_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if entry_count == 0 {
        return false;
    }
    if snoozed_until.is_some_and(|until| now < until) {
        return false;
    }
    last_backup.is_none_or(|last| now - last > Duration::days(REMINDER_INTERVAL_DAYS))
}

/// Entries from a snapshot file: either `{ "meta": .., "entries": [..] }` or
/// a bare list of entries.
pub fn parse_snapshot(raw: &str) -> Result<Vec<MealEntry>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| ValidationError::InvalidFormat)
        .context("Backup file is not valid JSON")?;
    let list = match value {
        Value::Object(mut obj) => obj.remove("entries").unwrap_or(Value::Null),
        other => other,
    };
    if !list.is_array() {
        return Err(ValidationError::InvalidFormat.into());
    }
    serde_json::from_value(list)
        .map_err(|_| ValidationError::InvalidFormat)
        .context("Backup contains an entry that could not be read")
}

#[must_use]
pub fn snapshot_file_name(now: DateTime<Utc>) -> String {
    format!("{APP_ID}-backup-{}.json", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::as_validation;
    use crate::models::Macros;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()
    }

    fn entry(id: i64, foods: &str) -> MealEntry {
        MealEntry {
            id,
            created_at: "2024-05-19T12:00:00.000Z".to_string(),
            foods: foods.to_string(),
            weight_grams: Some(250.0),
            macros: Macros {
                protein: Some(30.0),
                carbs: Some(45.5),
                fat: None,
                calories: Some(520.0),
            },
            macros100: Macros {
                protein: Some(12.0),
                ..Macros::default()
            },
            notes: "with sauce".to_string(),
        }
    }

    #[test]
    fn test_export_empty_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let backup = BackupController::new(&db);
        let err = backup.export_snapshot(&[], now()).unwrap_err();
        assert_eq!(as_validation(&err), Some(&ValidationError::NothingToExport));
        assert!(backup.last_backup().is_none());
    }

    #[test]
    fn test_export_builds_without_recording_time() {
        let db = Database::open_in_memory().unwrap();
        let backup = BackupController::new(&db);
        let entries = vec![entry(2, "curry"), entry(1, "toast")];

        let snapshot = backup.export_snapshot(&entries, now()).unwrap();
        assert_eq!(snapshot.meta.count, 2);
        assert_eq!(snapshot.meta.app, APP_ID);
        assert_eq!(snapshot.meta.exported_at, now().to_rfc3339());
        assert!(snapshot.meta.device_id.is_some());
        assert_eq!(snapshot.entries, entries);
        assert!(backup.last_backup().is_none());

        backup.record_backup(now()).unwrap();
        assert_eq!(backup.last_backup(), Some(now()));
    }

    #[test]
    fn test_export_then_import_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let store = EntryStore::new(&db);
        store.save(entry(1, "toast")).unwrap();
        store.save(entry(2, "curry")).unwrap();
        let before = store.list();

        let backup = BackupController::new(&db);
        let snapshot = backup.export_snapshot(&before, now()).unwrap();
        let file = serde_json::to_string_pretty(&snapshot).unwrap();

        store.clear().unwrap();
        let parsed = parse_snapshot(&file).unwrap();
        backup.apply_import(parsed, |_, _| true).unwrap();
        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_snapshot_meta_field_names() {
        let db = Database::open_in_memory().unwrap();
        let snapshot = BackupController::new(&db)
            .export_snapshot(&[entry(1, "toast")], now())
            .unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["meta"]["exported_at"].is_string());
        assert_eq!(json["meta"]["count"], 1);
        assert_eq!(json["meta"]["app"], APP_ID);
        assert_eq!(json["entries"][0]["weightGrams"], 250.0);
    }

    #[test]
    fn test_parse_snapshot_accepts_bare_list() {
        let raw = r#"[{"id": 1, "createdAt": "2024-05-01T08:00:00.000Z", "foods": "oats"}]"#;
        let entries = parse_snapshot(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].foods, "oats");
    }

    #[test]
    fn test_parse_snapshot_rejects_other_shapes() {
        for raw in [
            r#"{"meta": {"count": 1}}"#,
            r#"{"entries": {"id": 1}}"#,
            r#""entries""#,
            "42",
            "not json at all",
            r#"[{"foods": "missing id"}]"#,
        ] {
            let err = parse_snapshot(raw).unwrap_err();
            assert_eq!(
                as_validation(&err),
                Some(&ValidationError::InvalidFormat),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_import_requires_confirmation() {
        let db = Database::open_in_memory().unwrap();
        let store = EntryStore::new(&db);
        store.save(entry(1, "toast")).unwrap();
        let backup = BackupController::new(&db);

        let mut seen = None;
        let err = backup
            .apply_import(vec![entry(5, "a"), entry(6, "b")], |local, incoming| {
                seen = Some((local, incoming));
                false
            })
            .unwrap_err();
        assert_eq!(as_validation(&err), Some(&ValidationError::ImportCancelled));
        assert_eq!(seen, Some((1, 2)));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].foods, "toast");
    }

    #[test]
    fn test_import_replaces_never_merges() {
        let db = Database::open_in_memory().unwrap();
        let store = EntryStore::new(&db);
        store.save(entry(1, "toast")).unwrap();
        store.save(entry(2, "curry")).unwrap();

        let outcome = BackupController::new(&db)
            .apply_import(vec![entry(9, "imported")], |_, _| true)
            .unwrap();
        assert_eq!(outcome.replaced, 2);
        assert_eq!(outcome.imported, 1);
        let entries = store.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 9);
    }

    #[test]
    fn test_reminder_fires_after_eight_days() {
        let last = now() - Duration::days(8);
        assert!(reminder_due(3, Some(last), None, now()));
    }

    #[test]
    fn test_reminder_quiet_after_recent_backup() {
        let last = now() - Duration::days(3);
        assert!(!reminder_due(3, Some(last), None, now()));
        // Exactly seven days is not "more than" seven days
        let last = now() - Duration::days(7);
        assert!(!reminder_due(3, Some(last), None, now()));
    }

    #[test]
    fn test_reminder_quiet_when_empty_or_snoozed() {
        let last = now() - Duration::days(30);
        assert!(!reminder_due(0, Some(last), None, now()));
        let until = now() + Duration::hours(1);
        assert!(!reminder_due(3, Some(last), Some(until), now()));
        // Expired snooze no longer suppresses
        let until = now() - Duration::hours(1);
        assert!(reminder_due(3, Some(last), Some(until), now()));
    }

    #[test]
    fn test_reminder_fires_when_never_backed_up() {
        assert!(reminder_due(1, None, None, now()));
    }

    #[test]
    fn test_snooze_persists() {
        let db = Database::open_in_memory().unwrap();
        EntryStore::new(&db).save(entry(1, "toast")).unwrap();
        let backup = BackupController::new(&db);
        backup.record_backup(now() - Duration::days(10)).unwrap();
        assert!(backup.should_remind(1, now()));

        let until = backup.snooze_for(3, now()).unwrap();
        assert_eq!(backup.snoozed_until(), Some(until));
        assert!(!backup.should_remind(1, now()));
        assert!(backup.should_remind(1, now() + Duration::days(4)));
    }

    #[test]
    fn test_snooze_rejects_out_of_range_days() {
        let db = Database::open_in_memory().unwrap();
        let backup = BackupController::new(&db);
        let until = backup.snooze_for(2, now()).unwrap();

        for days in [0, -1, 100_000_000, i64::MAX] {
            let err = backup.snooze_for(days, now()).unwrap_err();
            assert_eq!(
                as_validation(&err),
                Some(&ValidationError::InvalidSnoozeDays(days))
            );
        }
        assert_eq!(backup.snoozed_until(), Some(until));
    }

    #[test]
    fn test_status() {
        let db = Database::open_in_memory().unwrap();
        EntryStore::new(&db).save(entry(1, "toast")).unwrap();
        let backup = BackupController::new(&db);
        let status = backup.status(now());
        assert_eq!(status.entry_count, 1);
        assert!(status.last_backup.is_none());
        assert!(status.reminder_due);

        backup.record_backup(now()).unwrap();
        let status = backup.status(now());
        assert!(status.last_backup.is_some());
        assert!(!status.reminder_due);
    }

    #[test]
    fn test_corrupt_timestamps_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.set_item(KEY_LAST_BACKUP, "yesterday-ish").unwrap();
        db.set_item(KEY_BACKUP_SNOOZE, "").unwrap();
        let backup = BackupController::new(&db);
        assert!(backup.last_backup().is_none());
        assert!(backup.snoozed_until().is_none());
    }

    #[test]
    fn test_epoch_millis_timestamps_are_read() {
        let db = Database::open_in_memory().unwrap();
        db.set_item(KEY_LAST_BACKUP, &now().timestamp_millis().to_string())
            .unwrap();
        assert_eq!(BackupController::new(&db).last_backup(), Some(now()));
    }

    #[test]
    fn test_snapshot_file_name() {
        assert_eq!(
            snapshot_file_name(now()),
            "food-monitor-backup-2024-05-20.json"
        );
    }
}
