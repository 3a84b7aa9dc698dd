use anyhow::Result;

use food_monitor_core::models::{GoalState, KNOWN_GOALS};
use food_monitor_core::service::FoodMonitorService;

fn print_goal(goal: &GoalState) {
    match goal.describe() {
        Some(text) => println!("Goal: {text}"),
        None => println!("No goal set"),
    }
}

pub(crate) fn cmd_goal_set(
    svc: &FoodMonitorService,
    goal: &str,
    custom: Option<&str>,
    json: bool,
) -> Result<()> {
    if !KNOWN_GOALS.contains(&goal) {
        let known = KNOWN_GOALS.join(", ");
        if !json {
            eprintln!("Note: '{goal}' is not one of {known}; storing it as-is");
        }
    }
    let saved = svc.set_goal(Some(goal), custom)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        print_goal(&saved);
    }
    Ok(())
}

pub(crate) fn cmd_goal_show(svc: &FoodMonitorService, json: bool) -> Result<()> {
    let goal = svc.get_goal();
    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        print_goal(&goal);
    }
    Ok(())
}
