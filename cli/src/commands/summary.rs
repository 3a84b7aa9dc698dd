use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use food_monitor_core::entries::aggregate;
use food_monitor_core::models::{MacroTotals, MealEntry, Period};
use food_monitor_core::service::FoodMonitorService;
use food_monitor_core::session::FeatureFlags;

use super::helpers::{format_totals, no_neg_zero, parse_date, print_entry_table};

#[derive(Serialize)]
struct EntryList {
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<Period>,
    entries: Vec<MealEntry>,
    totals: MacroTotals,
}

pub(crate) fn cmd_list(
    svc: &FoodMonitorService,
    flags: FeatureFlags,
    date: Option<String>,
    period: Option<Period>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let entries = match period {
        Some(p) => svc.entries_for_period(p, date),
        None => svc.entries_for_date(date),
    };
    let totals = aggregate(&entries);

    if json {
        let list = EntryList {
            date: date.to_string(),
            period,
            entries,
            totals,
        };
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if entries.is_empty() {
        match period {
            Some(p) => eprintln!("No entries in the {p} ending {date}"),
            None => eprintln!("No entries for {date}"),
        }
        process::exit(2);
    }

    match period {
        Some(p) => println!("=== {p} ending {date} ===\n"),
        None => println!("=== {date} ===\n"),
    }
    print_entry_table(&entries);
    println!("\n  TOTAL: {}", format_totals(&totals));

    if flags.backup_reminders && svc.backup_reminder_due(Utc::now()) {
        eprintln!(
            "\nReminder: it has been a while since your last backup. Run `food-monitor backup export`."
        );
    }

    Ok(())
}

pub(crate) fn cmd_review(
    svc: &FoodMonitorService,
    period: Period,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let reference = parse_date(date)?;
    let review = svc.review(period, reference);

    if json {
        println!("{}", serde_json::to_string_pretty(&review)?);
        return Ok(());
    }

    if review.entry_count == 0 {
        let (start, end) = (review.start, review.end);
        eprintln!("No entries between {start} and {end}");
        process::exit(2);
    }

    let rows: Vec<DayRow> = review
        .days
        .iter()
        .map(|d| {
            let t = &d.totals;
            DayRow {
                date: d.date.to_string(),
                entries: d.entry_count,
                calories: format!("{:.0}", no_neg_zero(t.calories)),
                protein: format!("{:.0}g", no_neg_zero(t.protein)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                fat: format!("{:.0}g", no_neg_zero(t.fat)),
            }
        })
        .collect();

    let (start, end) = (review.start, review.end);
    println!("=== {period}: {start} to {end} ===\n");
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let logged = review.days_logged;
    println!("\n  TOTAL: {}", format_totals(&review.totals));
    println!(
        "  AVERAGE ({logged} logged days): {}",
        format_totals(&review.daily_average)
    );

    Ok(())
}
