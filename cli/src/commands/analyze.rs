use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::io::Read;
use std::path::Path;
use std::process;

use food_monitor_core::analysis::{
    AnalysisInput, AnalysisOutcome, MacroEstimate, image_data_url, mime_for_path,
};
use food_monitor_core::error::ValidationError;
use food_monitor_core::service::FoodMonitorService;
use food_monitor_core::session::Session;

use crate::config::{Settings, resolve_api_key};
use crate::openai::OpenAiClient;

use super::entry::{print_entry_line, report_validation};
use super::helpers::{fmt_opt, json_error};

fn read_image(path: &Path) -> Result<String> {
    let Some(mime) = mime_for_path(path) else {
        bail!(
            "Unsupported image type: {}. Use jpg, png, webp, gif or heic",
            path.display()
        );
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(image_data_url(&bytes, mime))
}

/// `-` reads a dictated transcript from stdin, when voice input is enabled.
fn read_text(text: Option<String>, voice_input: bool) -> Result<Option<String>> {
    match text.as_deref() {
        Some("-") if !voice_input => {
            bail!("Voice input is off. Set \"features\": {{\"voice_input\": true}} in config.json")
        }
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read description from stdin")?;
            Ok(Some(buf))
        }
        _ => Ok(text),
    }
}

fn print_estimate(estimate: &MacroEstimate, session: &Session) {
    let draft = &session.draft;
    println!("Foods:   {}", draft.foods);
    if !draft.notes.is_empty() {
        println!("Notes:   {}", draft.notes);
    }
    println!(
        "Weight:  {}",
        draft
            .weight_grams
            .map_or_else(|| "unknown".to_string(), |w| format!("{w:.0}g"))
    );
    let m = &estimate.macros;
    println!(
        "Macros:  {} kcal | P:{} C:{} F:{}",
        fmt_opt(m.calories),
        fmt_opt(m.protein),
        fmt_opt(m.carbs),
        fmt_opt(m.fat)
    );
    let per100 = &draft.macros100;
    if !per100.is_empty() {
        println!(
            "Per 100g: {} kcal | P:{} C:{} F:{}",
            fmt_opt(per100.calories),
            fmt_opt(per100.protein),
            fmt_opt(per100.carbs),
            fmt_opt(per100.fat)
        );
    }
    if let Some(c) = estimate.confidence {
        println!("Confidence: {:.0}%", c * 100.0);
    }
}

pub(crate) async fn cmd_analyze(
    svc: &FoodMonitorService,
    settings: &Settings,
    image: Option<&Path>,
    text: Option<String>,
    save: bool,
    json: bool,
) -> Result<()> {
    let input = AnalysisInput {
        text: read_text(text, settings.features.voice_input)?,
        image_data_url: image.map(read_image).transpose()?,
    };
    if input.is_empty() {
        return report_validation(ValidationError::MissingAnalysisInput.into(), json);
    }

    let Some(api_key) = resolve_api_key(svc.api_key()) else {
        let msg = "Add your OpenAI API key first: food-monitor key set <KEY>";
        if json {
            println!("{}", json_error(msg));
        } else {
            eprintln!("{msg}");
        }
        process::exit(2);
    };
    let gateway = OpenAiClient::new(api_key, settings)?;

    let mut session = Session::new(settings.features);
    if !json {
        eprintln!("Analyzing...");
    }
    let outcome = match svc.analyze(&gateway, &mut session, &input).await {
        Ok(outcome) => outcome,
        Err(e) => return report_validation(e, json),
    };

    let estimate = match &outcome {
        AnalysisOutcome::Estimate(estimate) => estimate,
        AnalysisOutcome::Unparsed { raw, error } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                eprintln!("{error}");
                eprintln!("Raw response:\n{raw}");
            }
            process::exit(2);
        }
    };

    if !save {
        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_estimate(estimate, &session);
            println!("\nReview the estimate, then log it with `food-monitor add` or rerun with --save.");
        }
        return Ok(());
    }

    if !json {
        print_estimate(estimate, &session);
        println!();
    }
    match svc.save_draft(&mut session, Utc::now()) {
        Ok((entry, _)) => {
            if json {
                let body = serde_json::json!({ "analysis": outcome, "entry": entry });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_entry_line("Added", &entry);
            }
            Ok(())
        }
        Err(e) => report_validation(e, json),
    }
}
