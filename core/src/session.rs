use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisOutcome;
use crate::entries::iso_timestamp;
use crate::models::{MacroKind, Macros, MealEntry};
use crate::numeric::parse_number;
use crate::scaling::{per100_from_portion, portion_from_per100};

/// Front-end switches. Unknown keys in a config file are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub voice_input: bool,
    pub per100_editing: bool,
    pub backup_reminders: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            voice_input: false,
            per100_editing: true,
            backup_reminders: true,
        }
    }
}

/// The entry form as the user is filling it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub foods: String,
    pub weight_grams: Option<f64>,
    pub notes: String,
    pub macros: Macros,
    pub macros100: Macros,
}

impl Draft {
    fn from_entry(entry: &MealEntry) -> Self {
        Self {
            foods: entry.foods.clone(),
            weight_grams: entry.weight_grams,
            notes: entry.notes.clone(),
            macros: entry.macros,
            macros100: entry.macros100,
        }
    }
}

/// Everything a front end holds between events: which entry is being edited,
/// the date being viewed, the last analysis, and the draft itself.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub editing_id: Option<i64>,
    editing_created_at: Option<String>,
    pub selected_date: Option<NaiveDate>,
    pub last_analysis: Option<AnalysisOutcome>,
    pub draft: Draft,
    pub flags: FeatureFlags,
}

impl Session {
    #[must_use]
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.editing_id.is_some()
    }

    pub fn set_foods(&mut self, foods: &str) {
        self.draft.foods = foods.to_string();
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.draft.notes = notes.to_string();
    }

    /// A weight that is missing, zero or negative is stored as unknown.
    pub fn set_weight(&mut self, weight_grams: Option<f64>) {
        self.draft.weight_grams = weight_grams.filter(|w| w.is_finite() && *w > 0.0);
        self.recompute();
    }

    pub fn set_weight_input(&mut self, raw: &str) {
        self.set_weight(parse_number(raw));
    }

    /// Direct edit of an absolute value. Never triggers recomputation.
    pub fn set_macro(&mut self, kind: MacroKind, value: Option<f64>) {
        self.draft.macros.set(kind, value);
    }

    pub fn set_macro_input(&mut self, kind: MacroKind, raw: &str) {
        self.set_macro(kind, parse_number(raw));
    }

    pub fn set_per100(&mut self, kind: MacroKind, value: Option<f64>) {
        self.draft.macros100.set(kind, value);
        self.recompute();
    }

    pub fn set_per100_input(&mut self, kind: MacroKind, raw: &str) {
        self.set_per100(kind, parse_number(raw));
    }

    fn recompute(&mut self) {
        if !self.flags.per100_editing {
            return;
        }
        if let Some(macros) =
            portion_from_per100(&self.draft.macros100, self.draft.weight_grams, &self.draft.macros)
        {
            self.draft.macros = macros;
        }
    }

    /// Fill the draft from an analysis result. An unparsed result is kept as
    /// `last_analysis` but leaves the draft alone.
    pub fn hydrate(&mut self, outcome: AnalysisOutcome) {
        if let AnalysisOutcome::Estimate(estimate) = &outcome {
            self.draft.foods = estimate
                .items
                .iter()
                .map(|i| i.name.trim())
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            self.draft.notes = estimate
                .items
                .iter()
                .map(|i| i.note.trim())
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(" • ");
            self.draft.weight_grams = estimate.weight_grams.filter(|w| *w > 0.0);
            self.draft.macros = estimate.macros;
            self.draft.macros100 = estimate
                .macros100
                .unwrap_or_else(|| per100_from_portion(&estimate.macros, self.draft.weight_grams));
        }
        self.last_analysis = Some(outcome);
    }

    pub fn start_edit(&mut self, entry: &MealEntry) {
        self.editing_id = Some(entry.id);
        self.editing_created_at = Some(entry.created_at.clone());
        self.draft = Draft::from_entry(entry);
        self.last_analysis = None;
    }

    /// Back to a blank form. The selected date is kept.
    pub fn reset(&mut self) {
        self.editing_id = None;
        self.editing_created_at = None;
        self.last_analysis = None;
        self.draft = Draft::default();
    }

    /// The entry to persist. When editing, the original id and creation time
    /// win over `fresh_id` and `now`.
    #[must_use]
    pub fn to_entry(&self, fresh_id: i64, now: DateTime<Utc>) -> MealEntry {
        MealEntry {
            id: self.editing_id.unwrap_or(fresh_id),
            created_at: self
                .editing_created_at
                .clone()
                .unwrap_or_else(|| iso_timestamp(now)),
            foods: self.draft.foods.trim().to_string(),
            weight_grams: self.draft.weight_grams,
            macros: self.draft.macros,
            macros100: self.draft.macros100,
            notes: self.draft.notes.trim().to_string(),
        }
    }
}
