use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

use food_monitor_core::backup::snapshot_file_name;
use food_monitor_core::error::{ValidationError, as_validation};
use food_monitor_core::service::FoodMonitorService;

use super::entry::report_validation;
use super::helpers::{json_error, prompt_confirm};

pub(crate) fn cmd_backup_export(
    svc: &FoodMonitorService,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let now = Utc::now();
    let path = output.unwrap_or_else(|| PathBuf::from(snapshot_file_name(now)));
    let snapshot = match svc.export_backup_to(&path, now) {
        Ok(snapshot) => snapshot,
        Err(e) => return report_validation(e, json),
    };

    let count = snapshot.meta.count;
    if json {
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "count": count })
        );
    } else {
        println!("Exported {count} entries to {}", path.display());
    }
    Ok(())
}

pub(crate) fn cmd_backup_import(
    svc: &FoodMonitorService,
    file: &Path,
    yes: bool,
    json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read backup: {}", file.display()))?;

    let result = svc.import_backup(&raw, |local, incoming| {
        yes || prompt_confirm(&format!(
            "Replace {local} local entries with {incoming} from {}?",
            file.display()
        ))
    });
    match result {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let (replaced, imported) = (outcome.replaced, outcome.imported);
                println!("Imported {imported} entries (replaced {replaced})");
            }
            Ok(())
        }
        Err(e) if as_validation(&e) == Some(&ValidationError::ImportCancelled) => {
            if json {
                println!("{}", json_error(&e.to_string()));
            } else {
                eprintln!("{e}");
            }
            Ok(())
        }
        Err(e) => report_validation(e, json),
    }
}

pub(crate) fn cmd_backup_status(svc: &FoodMonitorService, json: bool) -> Result<()> {
    let status = svc.backup_status(Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Entries:      {}", status.entry_count);
    println!(
        "Last backup:  {}",
        status.last_backup.as_deref().unwrap_or("never")
    );
    if let Some(until) = &status.snoozed_until {
        println!("Snoozed until: {until}");
    }
    if status.reminder_due {
        println!("\nA backup is due. Run `food-monitor backup export`.");
    }
    Ok(())
}

pub(crate) fn cmd_backup_snooze(svc: &FoodMonitorService, days: i64, json: bool) -> Result<()> {
    let until = match svc.snooze_backup(days, Utc::now()) {
        Ok(until) => until,
        Err(e) => return report_validation(e, json),
    };
    if json {
        println!("{}", serde_json::json!({ "snoozed_until": until.to_rfc3339() }));
    } else {
        println!("Backup reminder snoozed until {}", until.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use food_monitor_core::session::Session;

    #[test]
    fn test_export_to_bad_path_leaves_reminder_due() {
        let svc = FoodMonitorService::new_in_memory().unwrap();
        let mut session = Session::default();
        session.set_foods("oats");
        svc.save_draft(&mut session, Utc::now()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("backup.json");
        assert!(cmd_backup_export(&svc, Some(path), true).is_err());

        let status = svc.backup_status(Utc::now());
        assert!(status.last_backup.is_none());
        assert!(status.reminder_due);
    }

    #[test]
    fn test_export_writes_file() {
        let svc = FoodMonitorService::new_in_memory().unwrap();
        let mut session = Session::default();
        session.set_foods("oats");
        svc.save_draft(&mut session, Utc::now()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        cmd_backup_export(&svc, Some(path.clone()), true).unwrap();
        assert!(path.is_file());
        assert!(!svc.backup_status(Utc::now()).reminder_due);
    }
}
