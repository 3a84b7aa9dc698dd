use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use food_monitor_core::models::{MacroTotals, MealEntry};

/// Entries are bucketed by the UTC date of `createdAt`, so "today" is the
/// UTC date too.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(today()),
        Some(s) => match s.as_str() {
            "today" => Ok(today()),
            "yesterday" => Ok(today() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD, today or yesterday")
            }),
        },
    }
}

/// Ask a yes/no question on stderr. Anything but an explicit yes is a no.
pub(crate) fn prompt_confirm(question: &str) -> bool {
    eprint!("{question} [y/N]: ");
    if io::stderr().flush().is_err() {
        return false;
    }
    let stdin = io::stdin();
    let Some(Ok(line)) = stdin.lock().lines().next() else {
        return false;
    };
    is_yes(&line)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn format_totals(totals: &MacroTotals) -> String {
    let cal = no_neg_zero(totals.calories);
    let p = no_neg_zero(totals.protein);
    let c = no_neg_zero(totals.carbs);
    let f = no_neg_zero(totals.fat);
    format!("{cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn print_entry_table(entries: &[MealEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Foods")]
        foods: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            time: e.created_at.get(11..16).unwrap_or("").to_string(),
            foods: truncate(&e.foods, 35),
            weight: e.weight_grams.map_or("-".into(), |w| format!("{w:.0}g")),
            protein: fmt_opt(e.macros.protein),
            carbs: fmt_opt(e.macros.carbs),
            fat: fmt_opt(e.macros.fat),
            calories: e.macros.calories.map_or("-".into(), |v| format!("{v:.0}")),
            notes: truncate(&e.notes, 30),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        assert_eq!(parse_date(None).unwrap(), Utc::now().date_naive());
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Utc::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(None), "-");
        assert_eq!(fmt_opt(Some(12.34)), "12.3");
    }

    #[test]
    fn test_format_totals() {
        let totals = MacroTotals {
            protein: 30.4,
            carbs: -0.0,
            fat: 9.6,
            calories: 512.2,
        };
        assert_eq!(format_totals(&totals), "512 kcal | P:30g C:0g F:10g");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("Entry 5 not found"), r#"{"error":"Entry 5 not found"}"#);
    }
}
