use anyhow::Result;
use chrono::Utc;
use clap::Args;
use std::process;

use food_monitor_core::error::{ValidationError, as_validation};
use food_monitor_core::models::{MacroKind, MealEntry};
use food_monitor_core::service::FoodMonitorService;
use food_monitor_core::session::{FeatureFlags, Session};

use super::helpers::{fmt_opt, json_error, prompt_confirm};

/// Entry fields shared by `add` and `edit`. Values are taken as typed: an
/// empty string clears a number, anything unparsable is treated as unknown.
#[derive(Args, Debug, Default)]
pub(crate) struct EntryFields {
    /// Portion weight in grams
    #[arg(short, long)]
    pub(crate) weight: Option<String>,
    /// Protein for the portion (g)
    #[arg(long)]
    pub(crate) protein: Option<String>,
    /// Carbs for the portion (g)
    #[arg(long)]
    pub(crate) carbs: Option<String>,
    /// Fat for the portion (g)
    #[arg(long)]
    pub(crate) fat: Option<String>,
    /// Calories for the portion (kcal)
    #[arg(long)]
    pub(crate) calories: Option<String>,
    /// Protein per 100 g; portion values follow the weight
    #[arg(long = "protein-100")]
    pub(crate) protein_100: Option<String>,
    /// Carbs per 100 g
    #[arg(long = "carbs-100")]
    pub(crate) carbs_100: Option<String>,
    /// Fat per 100 g
    #[arg(long = "fat-100")]
    pub(crate) fat_100: Option<String>,
    /// Calories per 100 g
    #[arg(long = "calories-100")]
    pub(crate) calories_100: Option<String>,
    /// Free-text notes
    #[arg(short, long)]
    pub(crate) notes: Option<String>,
}

impl EntryFields {
    fn per100(&self) -> [(MacroKind, Option<&String>); 4] {
        [
            (MacroKind::Protein, self.protein_100.as_ref()),
            (MacroKind::Carbs, self.carbs_100.as_ref()),
            (MacroKind::Fat, self.fat_100.as_ref()),
            (MacroKind::Calories, self.calories_100.as_ref()),
        ]
    }

    fn portion(&self) -> [(MacroKind, Option<&String>); 4] {
        [
            (MacroKind::Protein, self.protein.as_ref()),
            (MacroKind::Carbs, self.carbs.as_ref()),
            (MacroKind::Fat, self.fat.as_ref()),
            (MacroKind::Calories, self.calories.as_ref()),
        ]
    }

    /// Per-100 values and weight first so they recompute the portion;
    /// explicit portion values are applied last and win.
    pub(crate) fn apply(&self, session: &mut Session) {
        for (kind, raw) in self.per100() {
            if let Some(raw) = raw {
                session.set_per100_input(kind, raw);
            }
        }
        if let Some(raw) = &self.weight {
            session.set_weight_input(raw);
        }
        for (kind, raw) in self.portion() {
            if let Some(raw) = raw {
                session.set_macro_input(kind, raw);
            }
        }
        if let Some(notes) = &self.notes {
            session.set_notes(notes);
        }
    }
}

pub(crate) fn print_entry_line(verb: &str, entry: &MealEntry) {
    let id = entry.id;
    let foods = &entry.foods;
    let weight = entry
        .weight_grams
        .map(|w| format!(" {w:.0}g"))
        .unwrap_or_default();
    let cal = entry
        .macros
        .calories
        .map_or_else(|| "? kcal".to_string(), |c| format!("{c:.0} kcal"));
    let p = fmt_opt(entry.macros.protein);
    let c = fmt_opt(entry.macros.carbs);
    let f = fmt_opt(entry.macros.fat);
    println!("{verb} entry {id}: {foods}{weight}, {cal} | P:{p} C:{c} F:{f}");
}

/// Report a validation failure the way the form would, without a stack of
/// context. Anything else propagates.
pub(super) fn report_validation(err: anyhow::Error, json: bool) -> Result<()> {
    match as_validation(&err) {
        Some(v) => {
            if json {
                println!("{}", json_error(&v.to_string()));
            } else {
                eprintln!("{v}");
            }
            process::exit(2);
        }
        None => Err(err),
    }
}

pub(crate) fn cmd_add(
    svc: &FoodMonitorService,
    flags: FeatureFlags,
    foods: &str,
    fields: &EntryFields,
    json: bool,
) -> Result<()> {
    let mut session = Session::new(flags);
    session.set_foods(foods);
    fields.apply(&mut session);

    match svc.save_draft(&mut session, Utc::now()) {
        Ok((entry, _)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_entry_line("Added", &entry);
            }
            Ok(())
        }
        Err(e) => report_validation(e, json),
    }
}

pub(crate) fn cmd_edit(
    svc: &FoodMonitorService,
    flags: FeatureFlags,
    entry_id: i64,
    foods: Option<&str>,
    fields: &EntryFields,
    json: bool,
) -> Result<()> {
    let Some(existing) = svc.get_entry(entry_id) else {
        if json {
            println!("{}", json_error(&format!("Entry {entry_id} not found")));
        } else {
            eprintln!("Entry {entry_id} not found");
        }
        process::exit(2);
    };

    let mut session = Session::new(flags);
    session.start_edit(&existing);
    if let Some(foods) = foods {
        session.set_foods(foods);
    }
    fields.apply(&mut session);

    match svc.save_draft(&mut session, Utc::now()) {
        Ok((entry, _)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_entry_line("Updated", &entry);
            }
            Ok(())
        }
        Err(e) => report_validation(e, json),
    }
}

pub(crate) fn cmd_delete(svc: &FoodMonitorService, entry_id: i64, json: bool) -> Result<()> {
    if svc.delete_entry(entry_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": entry_id }));
        } else {
            println!("Deleted entry {entry_id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {entry_id} not found")));
        } else {
            eprintln!("Entry {entry_id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_clear(svc: &FoodMonitorService, yes: bool, json: bool) -> Result<()> {
    let result = svc.clear_entries(|count| {
        yes || prompt_confirm(&format!("Delete all {count} entries? This cannot be undone."))
    });
    match result {
        Ok(count) => {
            if json {
                println!("{}", serde_json::json!({ "cleared": count }));
            } else {
                println!("Cleared {count} entries");
            }
            Ok(())
        }
        Err(e) if as_validation(&e) == Some(&ValidationError::ClearCancelled) => {
            if json {
                println!("{}", json_error(&e.to_string()));
            } else {
                eprintln!("{e}");
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_per100_then_explicit_portion() {
        let fields = EntryFields {
            weight: Some("200".to_string()),
            protein_100: Some("10".to_string()),
            calories_100: Some("150".to_string()),
            calories: Some("280".to_string()),
            notes: Some("leftovers".to_string()),
            ..EntryFields::default()
        };
        let mut session = Session::new(FeatureFlags::default());
        fields.apply(&mut session);
        assert_eq!(session.draft.weight_grams, Some(200.0));
        assert_eq!(session.draft.macros.protein, Some(20.0));
        assert_eq!(session.draft.macros.calories, Some(280.0));
        assert_eq!(session.draft.notes, "leftovers");
    }

    #[test]
    fn test_apply_empty_string_clears_value() {
        let mut session = Session::new(FeatureFlags::default());
        session.set_macro(MacroKind::Fat, Some(5.0));
        session.set_weight(Some(100.0));
        let fields = EntryFields {
            fat: Some(String::new()),
            weight: Some("  ".to_string()),
            ..EntryFields::default()
        };
        fields.apply(&mut session);
        assert!(session.draft.macros.fat.is_none());
        assert!(session.draft.weight_grams.is_none());
    }
}
