mod commands;
mod config;
mod openai;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    EntryFields, cmd_add, cmd_analyze, cmd_backup_export, cmd_backup_import, cmd_backup_snooze,
    cmd_backup_status, cmd_clear, cmd_delete, cmd_edit, cmd_goal_set, cmd_goal_show,
    cmd_key_clear, cmd_key_set, cmd_key_show, cmd_list, cmd_review,
};
use crate::config::Config;
use food_monitor_core::models::Period;
use food_monitor_core::service::FoodMonitorService;

#[derive(Parser)]
#[command(
    name = "food-monitor",
    version,
    about = "Photograph or describe a meal, get a macro estimate, keep a local food log"
)]
struct Cli {
    /// Log debug output to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a meal
    Add {
        /// What was eaten
        foods: String,
        #[command(flatten)]
        fields: EntryFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a logged meal; unspecified fields are kept
    Edit {
        /// Entry ID to edit
        entry_id: i64,
        /// New food description
        #[arg(long)]
        foods: Option<String>,
        #[command(flatten)]
        fields: EntryFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries for a day (defaults to today, UTC)
    List {
        /// Date to show (YYYY-MM-DD, today or yesterday)
        date: Option<String>,
        /// Show the day, week or month ending at the date instead
        #[arg(short, long)]
        period: Option<Period>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-day totals and averages for a period
    Review {
        /// day, week or month
        #[arg(short, long, default_value = "week")]
        period: Period,
        /// Last day of the period (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Estimate a meal from a photo and/or a description
    Analyze {
        /// Photo of the meal (jpg, png, webp, gif, heic)
        #[arg(short, long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Description of the meal; `-` reads a dictated transcript from stdin (needs voice_input)
        #[arg(short, long)]
        text: Option<String>,
        /// Log the estimate as a new entry
        #[arg(long)]
        save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the nutrition goal used in analysis
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Manage the locally stored API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Export, restore and schedule backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Delete every entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set the goal: lose_fat, maintain, build_muscle, custom (or any label)
    Set {
        /// Goal label
        goal: String,
        /// Free-text description, used with `custom`
        #[arg(long)]
        custom: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current goal
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store an API key on this device (a blank key clears it)
    Set {
        /// API key
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the stored API key
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which key would be used (masked)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Write every entry to a JSON snapshot
    Export {
        /// Output file (default: food-monitor-backup-YYYY-MM-DD.json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the log with a snapshot
    Import {
        /// Snapshot file
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show when the last backup happened and whether one is due
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Silence the backup reminder for a few days
    Snooze {
        /// Number of days (1-365)
        #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(i64).range(1..=365))]
        days: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = FoodMonitorService::new(&config.db_path.to_string_lossy())?;
    let flags = config.settings.features;

    match cli.command {
        Commands::Add {
            foods,
            fields,
            json,
        } => cmd_add(&svc, flags, &foods, &fields, json),
        Commands::Edit {
            entry_id,
            foods,
            fields,
            json,
        } => cmd_edit(&svc, flags, entry_id, foods.as_deref(), &fields, json),
        Commands::Delete { entry_id, json } => cmd_delete(&svc, entry_id, json),
        Commands::List { date, period, json } => cmd_list(&svc, flags, date, period, json),
        Commands::Review { period, date, json } => cmd_review(&svc, period, date, json),
        Commands::Analyze {
            image,
            text,
            save,
            json,
        } => cmd_analyze(&svc, &config.settings, image.as_deref(), text, save, json).await,
        Commands::Goal { command } => match command {
            GoalCommands::Set { goal, custom, json } => {
                cmd_goal_set(&svc, &goal, custom.as_deref(), json)
            }
            GoalCommands::Show { json } => cmd_goal_show(&svc, json),
        },
        Commands::Key { command } => match command {
            KeyCommands::Set { key, json } => cmd_key_set(&svc, &key, json),
            KeyCommands::Clear { json } => cmd_key_clear(&svc, json),
            KeyCommands::Show { json } => cmd_key_show(&svc, json),
        },
        Commands::Backup { command } => match command {
            BackupCommands::Export { output, json } => cmd_backup_export(&svc, output, json),
            BackupCommands::Import { file, yes, json } => {
                cmd_backup_import(&svc, &file, yes, json)
            }
            BackupCommands::Status { json } => cmd_backup_status(&svc, json),
            BackupCommands::Snooze { days, json } => cmd_backup_snooze(&svc, days, json),
        },
        Commands::Clear { yes, json } => cmd_clear(&svc, yes, json),
    }
}
