use anyhow::Result;

use food_monitor_core::service::FoodMonitorService;

use crate::config::{API_KEY_ENV, resolve_api_key};

/// `sk-...abcd`: enough to recognise a key without printing it.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub(crate) fn cmd_key_set(svc: &FoodMonitorService, key: &str, json: bool) -> Result<()> {
    let stored = svc.save_api_key(key)?;
    if json {
        println!("{}", serde_json::json!({ "stored": stored }));
    } else if stored {
        println!("Saved locally.");
    } else {
        println!("Key cleared.");
    }
    Ok(())
}

pub(crate) fn cmd_key_clear(svc: &FoodMonitorService, json: bool) -> Result<()> {
    let removed = svc.clear_api_key()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": removed }));
    } else if removed {
        println!("Key cleared.");
    } else {
        println!("No key stored.");
    }
    Ok(())
}

pub(crate) fn cmd_key_show(svc: &FoodMonitorService, json: bool) -> Result<()> {
    let stored = svc.api_key();
    let source = if stored.is_some() {
        "local"
    } else {
        API_KEY_ENV
    };
    let resolved = resolve_api_key(stored);

    if json {
        let body = match &resolved {
            Some(k) => serde_json::json!({ "key": mask(k), "source": source }),
            None => serde_json::json!({ "key": null }),
        };
        println!("{body}");
        return Ok(());
    }

    match resolved {
        Some(k) => println!("Key {} (from {source})", mask(&k)),
        None => println!("No key set. Use `food-monitor key set <KEY>` or {API_KEY_ENV}."),
    }
    Ok(())
}
