use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::db::{Database, KEY_ENTRIES};
use crate::models::{
    DayTotals, MacroTotals, MealEntry, Period, PeriodReview, validate_entry,
};

/// `created_at` format: UTC with millisecond precision, e.g.
/// `2024-05-01T12:30:00.000Z`.
#[must_use]
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// The durable, ordered collection of meal entries. Newest first.
pub struct EntryStore<'a> {
    db: &'a Database,
}

impl<'a> EntryStore<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The stored array as raw values, readable or not. Unreadable or corrupt
    /// storage reads as empty.
    fn load_raw(&self) -> Vec<Value> {
        let raw = match self.db.get_item(KEY_ENTRIES) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                debug!(error = %e, "entry storage unreadable; treating as empty");
                return Vec::new();
            }
        };
        serde_json::from_str::<Vec<Value>>(&raw).unwrap_or_else(|_| {
            debug!("stored entries are not a JSON array; treating as empty");
            Vec::new()
        })
    }

    /// All readable entries. Malformed elements are left out of the listing
    /// but stay in storage untouched by `save` and `delete`.
    #[must_use]
    pub fn list(&self) -> Vec<MealEntry> {
        self.load_raw().into_iter().filter_map(parse_stored).collect()
    }

    fn write(&self, values: &[Value]) -> Result<()> {
        let json = serde_json::to_string(values).context("Failed to serialize entries")?;
        self.db.set_item(KEY_ENTRIES, &json)
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<MealEntry> {
        self.list().into_iter().find(|e| e.id == id)
    }

    /// Insert or replace. An existing id is replaced in place; a new id is
    /// prepended as the newest entry.
    pub fn save(&self, entry: MealEntry) -> Result<SaveOutcome> {
        validate_entry(&entry)?;
        let encoded = serde_json::to_value(&entry).context("Failed to serialize entry")?;
        let mut values = self.load_raw();
        let slot = values
            .iter()
            .position(|v| parse_stored(v.clone()).is_some_and(|e| e.id == entry.id));
        let outcome = if let Some(i) = slot {
            values[i] = encoded;
            SaveOutcome::Updated
        } else {
            values.insert(0, encoded);
            SaveOutcome::Created
        };
        self.write(&values)?;
        debug!(count = values.len(), ?outcome, "entries saved");
        Ok(outcome)
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let mut values = self.load_raw();
        let before = values.len();
        values.retain(|v| !parse_stored(v.clone()).is_some_and(|e| e.id == id));
        if values.len() == before {
            return Ok(false);
        }
        self.write(&values)?;
        Ok(true)
    }

    /// Drop every entry. Returns how many readable ones there were.
    pub fn clear(&self) -> Result<usize> {
        let count = self.list().len();
        self.db.remove_item(KEY_ENTRIES)?;
        Ok(count)
    }

    /// Replace the whole collection with one write.
    pub fn replace_all(&self, entries: &[MealEntry]) -> Result<()> {
        let values = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialize entries")?;
        self.write(&values)
    }

    /// Time-derived id for a new entry: epoch milliseconds, kept strictly
    /// above every stored id, including ids on unreadable elements.
    pub fn next_id(&self, now: DateTime<Utc>) -> Result<i64> {
        let Some(max_existing) = self
            .load_raw()
            .iter()
            .filter_map(|v| v.get("id").and_then(Value::as_i64))
            .max()
        else {
            return Ok(now.timestamp_millis());
        };
        let above = max_existing
            .checked_add(1)
            .context("No entry id left above the largest stored id")?;
        Ok(now.timestamp_millis().max(above))
    }

    #[must_use]
    pub fn filter_by_date(&self, date: NaiveDate) -> Vec<MealEntry> {
        filter_by_date(&self.list(), date)
    }

    #[must_use]
    pub fn filter_by_period(&self, period: Period, reference: NaiveDate) -> Vec<MealEntry> {
        filter_by_period(&self.list(), period, reference)
    }

    #[must_use]
    pub fn review(&self, period: Period, reference: NaiveDate) -> PeriodReview {
        review(&self.list(), period, reference)
    }
}

fn parse_stored(value: Value) -> Option<MealEntry> {
    match serde_json::from_value::<MealEntry>(value) {
        Ok(entry) => Some(entry),
        Err(e) => {
            debug!(error = %e, "skipping malformed stored entry");
            None
        }
    }
}

/// Entries whose `created_at` date prefix is exactly `date`.
#[must_use]
pub fn filter_by_date(entries: &[MealEntry], date: NaiveDate) -> Vec<MealEntry> {
    let key = date.format("%Y-%m-%d").to_string();
    entries
        .iter()
        .filter(|e| e.date_key() == Some(key.as_str()))
        .cloned()
        .collect()
}

/// Entries dated within the period's calendar window ending at `reference`.
#[must_use]
pub fn filter_by_period(
    entries: &[MealEntry],
    period: Period,
    reference: NaiveDate,
) -> Vec<MealEntry> {
    let (start, end) = period.window(reference);
    entries
        .iter()
        .filter(|e| e.date().is_some_and(|d| d >= start && d <= end))
        .cloned()
        .collect()
}

#[must_use]
pub fn aggregate(entries: &[MealEntry]) -> MacroTotals {
    let mut totals = MacroTotals::default();
    for entry in entries {
        totals.add(&entry.macros);
    }
    totals
}

/// Totals for a period, broken down per calendar day (empty days included).
#[must_use]
pub fn review(entries: &[MealEntry], period: Period, reference: NaiveDate) -> PeriodReview {
    let (start, end) = period.window(reference);
    let in_window = filter_by_period(entries, period, reference);

    let mut by_day: BTreeMap<NaiveDate, DayTotals> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| {
            (
                date,
                DayTotals {
                    date,
                    entry_count: 0,
                    totals: MacroTotals::default(),
                },
            )
        })
        .collect();

    for entry in &in_window {
        if let Some(day) = entry.date().and_then(|d| by_day.get_mut(&d)) {
            day.entry_count += 1;
            day.totals.add(&entry.macros);
        }
    }

    let totals = aggregate(&in_window);
    let days_logged = by_day.values().filter(|d| d.entry_count > 0).count();

    PeriodReview {
        period,
        start,
        end,
        entry_count: in_window.len(),
        totals,
        days: by_day.into_values().rev().collect(),
        days_logged,
        daily_average: totals.divided_by(days_logged),
    }
}
