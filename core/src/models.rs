use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::numeric;

/// Application identifier written into backup snapshots.
pub const APP_ID: &str = "food-monitor";

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroKind {
    Protein,
    Carbs,
    Fat,
    Calories,
}

impl MacroKind {
    pub const ALL: [MacroKind; 4] = [
        MacroKind::Protein,
        MacroKind::Carbs,
        MacroKind::Fat,
        MacroKind::Calories,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MacroKind::Protein => "Protein",
            MacroKind::Carbs => "Carbs",
            MacroKind::Fat => "Fat",
            MacroKind::Calories => "Calories",
        }
    }
}

impl FromStr for MacroKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "protein" | "p" => Ok(MacroKind::Protein),
            "carbs" | "carbohydrates" | "c" => Ok(MacroKind::Carbs),
            "fat" | "f" => Ok(MacroKind::Fat),
            "calories" | "kcal" | "cal" => Ok(MacroKind::Calories),
            _ => bail!("Invalid macro '{s}'. Must be one of: protein, carbs, fat, calories"),
        }
    }
}

/// Four optional macro values. Used both for absolute portion amounts and for
/// per-100 g amounts; which one is meant depends on the field holding it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub protein: Option<f64>,
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub carbs: Option<f64>,
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub fat: Option<f64>,
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub calories: Option<f64>,
}

impl Macros {
    #[must_use]
    pub fn get(&self, kind: MacroKind) -> Option<f64> {
        match kind {
            MacroKind::Protein => self.protein,
            MacroKind::Carbs => self.carbs,
            MacroKind::Fat => self.fat,
            MacroKind::Calories => self.calories,
        }
    }

    pub fn set(&mut self, kind: MacroKind, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        match kind {
            MacroKind::Protein => self.protein = value,
            MacroKind::Carbs => self.carbs = value,
            MacroKind::Fat => self.fat = value,
            MacroKind::Calories => self.calories = value,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        MacroKind::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub foods: String,
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub weight_grams: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub macros: Macros,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Macros::is_empty"
    )]
    pub macros100: Macros,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
}

impl MealEntry {
    /// The calendar-date bucket: the `YYYY-MM-DD` prefix of `created_at`.
    #[must_use]
    pub fn date_key(&self) -> Option<&str> {
        self.created_at.get(..10)
    }

    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        self.date_key()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

/// Reject entries that cannot be persisted.
pub fn validate_entry(entry: &MealEntry) -> Result<()> {
    if entry.foods.trim().is_empty() {
        return Err(ValidationError::EmptyFoods.into());
    }
    Ok(())
}

// --- Goal ---

/// Goal labels offered by the front end. Any other label is stored as-is.
pub const KNOWN_GOALS: &[&str] = &["lose_fat", "maintain", "build_muscle", "custom"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_custom: Option<String>,
}

impl GoalState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.goal.is_none() && self.goal_custom.is_none()
    }

    /// Human-readable goal, preferring the free-text description when the
    /// label is `custom` or missing.
    #[must_use]
    pub fn describe(&self) -> Option<String> {
        let custom = self
            .goal_custom
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        match (self.goal.as_deref(), custom) {
            (Some("custom") | None, Some(c)) => Some(c.to_string()),
            (Some("custom") | None, None) => None,
            (Some(label), Some(c)) => Some(format!("{} ({c})", label.replace('_', " "))),
            (Some(label), None) => Some(label.replace('_', " ")),
        }
    }
}

// --- Backup snapshot ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub exported_at: String,
    pub count: usize,
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub meta: SnapshotMeta,
    pub entries: Vec<MealEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<String>,
    pub reminder_due: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub replaced: usize,
    pub imported: usize,
}

// --- Periods and totals ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Length of the window in calendar days.
    #[must_use]
    pub fn days(self) -> i64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }

    /// Inclusive `(start, end)` window ending at `reference`.
    #[must_use]
    pub fn window(self, reference: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = reference - chrono::Duration::days(self.days() - 1);
        (start, reference)
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "day" | "today" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            _ => bail!("Invalid period '{s}'. Must be one of: day, week, month"),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroTotals {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub calories: f64,
}

impl MacroTotals {
    /// Add a portion's macros; unknown values count as zero.
    pub fn add(&mut self, macros: &Macros) {
        self.protein += macros.protein.unwrap_or(0.0);
        self.carbs += macros.carbs.unwrap_or(0.0);
        self.fat += macros.fat.unwrap_or(0.0);
        self.calories += macros.calories.unwrap_or(0.0);
    }

    #[must_use]
    pub fn get(&self, kind: MacroKind) -> f64 {
        match kind {
            MacroKind::Protein => self.protein,
            MacroKind::Carbs => self.carbs,
            MacroKind::Fat => self.fat,
            MacroKind::Calories => self.calories,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn divided_by(&self, n: usize) -> MacroTotals {
        if n == 0 {
            return MacroTotals::default();
        }
        let n = n as f64;
        MacroTotals {
            protein: self.protein / n,
            carbs: self.carbs / n,
            fat: self.fat / n,
            calories: self.calories / n,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayTotals {
    pub date: NaiveDate,
    pub entry_count: usize,
    pub totals: MacroTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReview {
    pub period: Period,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entry_count: usize,
    pub totals: MacroTotals,
    pub days: Vec<DayTotals>,
    pub days_logged: usize,
    pub daily_average: MacroTotals,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: &str, foods: &str) -> MealEntry {
        MealEntry {
            id: 1,
            created_at: created_at.to_string(),
            foods: foods.to_string(),
            weight_grams: None,
            macros: Macros::default(),
            macros100: Macros::default(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_validate_entry_rejects_blank_foods() {
        assert!(validate_entry(&entry("2024-05-01T08:00:00.000Z", "oats")).is_ok());
        let err = validate_entry(&entry("2024-05-01T08:00:00.000Z", "  \t ")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::EmptyFoods)
        );
    }

    #[test]
    fn test_date_key() {
        let e = entry("2024-05-01T23:59:00.000Z", "toast");
        assert_eq!(e.date_key(), Some("2024-05-01"));
        assert_eq!(e.date(), NaiveDate::from_ymd_opt(2024, 5, 1));

        let legacy = entry("", "toast");
        assert!(legacy.date_key().is_none());
        assert!(legacy.date().is_none());
    }

    #[test]
    fn test_entry_json_uses_camel_case() {
        let mut e = entry("2024-05-01T08:00:00.000Z", "eggs");
        e.weight_grams = Some(120.0);
        e.macros.protein = Some(15.0);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["createdAt"], "2024-05-01T08:00:00.000Z");
        assert_eq!(json["weightGrams"], 120.0);
        assert_eq!(json["macros"]["protein"], 15.0);
        assert!(json["macros"]["carbs"].is_null());
        // Empty per-100 values are omitted
        assert!(json.get("macros100").is_none());
    }

    #[test]
    fn test_entry_loads_legacy_shapes() {
        let e: MealEntry = serde_json::from_str(
            r#"{"id": 5, "foods": "rice", "weightGrams": "", "macros": null, "notes": null}"#,
        )
        .unwrap();
        assert_eq!(e.id, 5);
        assert_eq!(e.foods, "rice");
        assert!(e.weight_grams.is_none());
        assert!(e.macros.is_empty());
        assert!(e.notes.is_empty());
        assert!(e.created_at.is_empty());
    }

    #[test]
    fn test_macros_set_drops_non_finite() {
        let mut m = Macros::default();
        m.set(MacroKind::Fat, Some(f64::NAN));
        assert!(m.fat.is_none());
        m.set(MacroKind::Fat, Some(3.5));
        assert_eq!(m.get(MacroKind::Fat), Some(3.5));
        assert!(!m.is_empty());
    }

    #[test]
    fn test_macro_kind_from_str() {
        assert_eq!("Protein".parse::<MacroKind>().unwrap(), MacroKind::Protein);
        assert_eq!("kcal".parse::<MacroKind>().unwrap(), MacroKind::Calories);
        assert!("fiber".parse::<MacroKind>().is_err());
    }

    #[test]
    fn test_period_window() {
        let reference = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(Period::Day.window(reference), (reference, reference));
        assert_eq!(
            Period::Week.window(reference).0,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert_eq!(
            Period::Month.window(reference).0,
            NaiveDate::from_ymd_opt(2024, 4, 8).unwrap()
        );
    }

    #[test]
    fn test_period_from_str() {
        assert_eq!("WEEK".parse::<Period>().unwrap(), Period::Week);
        assert!("year".parse::<Period>().is_err());
        assert_eq!(Period::Month.to_string(), "month");
    }

    #[test]
    fn test_totals_treat_unknown_as_zero() {
        let mut totals = MacroTotals::default();
        totals.add(&Macros {
            protein: Some(10.0),
            calories: Some(200.0),
            ..Macros::default()
        });
        totals.add(&Macros::default());
        assert!((totals.protein - 10.0).abs() < f64::EPSILON);
        assert!((totals.carbs - 0.0).abs() < f64::EPSILON);
        assert!((totals.divided_by(2).calories - 100.0).abs() < f64::EPSILON);
        assert!((totals.divided_by(0).calories - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_goal_describe() {
        let g = GoalState {
            goal: Some("lose_fat".to_string()),
            goal_custom: None,
        };
        assert_eq!(g.describe().as_deref(), Some("lose fat"));

        let g = GoalState {
            goal: Some("custom".to_string()),
            goal_custom: Some(" marathon prep ".to_string()),
        };
        assert_eq!(g.describe().as_deref(), Some("marathon prep"));

        assert!(GoalState::default().describe().is_none());
        assert!(GoalState::default().is_empty());
    }
}
