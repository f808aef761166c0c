//! # invoicectl
//!
//! Command-line access to the invoice numbering service.
//!
//! ## Usage
//! ```bash
//! # Show settings (created with defaults on first use) and a preview
//! cargo run -p invoice-db --bin invoicectl -- settings
//!
//! # Change the numbering scheme
//! cargo run -p invoice-db --bin invoicectl -- update-settings \
//!     --prefix inv --length 5 --fy-start 2024-04-01 --fy-end 2025-03-31
//!
//! # Issue the next number, or only preview it
//! cargo run -p invoice-db --bin invoicectl -- generate
//! cargo run -p invoice-db --bin invoicectl -- generate --preview
//!
//! # Use a specific database and evaluation date
//! cargo run -p invoice-db --bin invoicectl -- --db ./dev.db --today 2025-06-01 generate
//! ```
//!
//! Results are printed to stdout as pretty JSON. Failures print
//! `{ "code", "message" }` and exit with status 1. Logs go to stderr
//! (`RUST_LOG` overrides the default filter).

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

use invoice_core::{GenerateOptions, InvoiceNumber, InvoiceSequence, InvoiceSettingsUpdate};
use invoice_db::{
    AppConfig, Database, InvoiceError, InvoiceNumberService, InvoiceResult, InvoiceSettingsView,
};

const DEFAULT_LOG_FILTER: &str = "info,invoice=debug,sqlx=warn";

#[derive(Debug)]
enum Command {
    Settings,
    UpdateSettings(InvoiceSettingsUpdate),
    Generate { preview: bool },
    Sequences,
}

#[derive(Debug)]
struct Cli {
    db_path: Option<String>,
    today: Option<NaiveDate>,
    command: Command,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Settings(Box<InvoiceSettingsView>),
    Number(InvoiceNumber),
    Sequences(Vec<InvoiceSequence>),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!();
            print_usage();
            process::exit(2);
        }
    };

    let mut config = AppConfig::load()?;
    if let Some(path) = cli.db_path {
        config = config.with_database_path(path);
    }

    let db = Database::new(config.db_config()).await?;
    let service = InvoiceNumberService::new(db.clone());
    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());

    let result = run(&service, cli.command, today).await;
    db.close().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.to_response())?);
            process::exit(1);
        }
    }
}

async fn run(
    service: &InvoiceNumberService,
    command: Command,
    today: NaiveDate,
) -> InvoiceResult<Output> {
    match command {
        Command::Settings => {
            let view = service.get_settings_on(today).await?;
            Ok(Output::Settings(Box::new(view)))
        }
        Command::UpdateSettings(update) => {
            let view = service.update_settings_on(&update, today).await?;
            Ok(Output::Settings(Box::new(view)))
        }
        Command::Generate { preview } => {
            let options = if preview {
                GenerateOptions::preview()
            } else {
                GenerateOptions::issue()
            };

            service
                .generate_invoice_number_on(options, today)
                .await?
                .map(Output::Number)
                .ok_or(InvoiceError::NotConfigured)
        }
        Command::Sequences => Ok(Output::Sequences(service.sequences().await?)),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses the arguments after the program name. `Ok(None)` means help.
fn parse_args(args: &[String]) -> Result<Option<Cli>, String> {
    let mut db_path = None;
    let mut today = None;
    let mut command: Option<&str> = None;
    let mut preview = false;
    let mut update = InvoiceSettingsUpdate::default();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{} requires a value", arg))
        };

        match arg {
            "--db" | "-d" => db_path = Some(value()?),
            "--today" => {
                let raw = value()?;
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| format!("--today expects YYYY-MM-DD, got '{}'", raw))?;
                today = Some(date);
            }
            "--prefix" => update.invoice_prefix = Some(value()?),
            "--length" => {
                let raw = value()?;
                let length = raw
                    .parse()
                    .map_err(|_| format!("--length expects a number, got '{}'", raw))?;
                update.invoice_sequence_length = Some(length);
            }
            "--fy-start" => update.financial_year_start = Some(value()?),
            "--fy-end" => update.financial_year_end = Some(value()?),
            "--manual-fy" => update.manual_financial_year = Some(value()?),
            "--format" => update.invoice_format = Some(value()?),
            "--no-auto-fy" => update.auto_financial_year = Some(false),
            "--inactive" => update.is_active = Some(false),
            "--preview" => preview = true,
            "--help" | "-h" => command = Some("help"),
            other if other.starts_with('-') => return Err(format!("unknown option '{}'", other)),
            other if command.is_none() => command = Some(other),
            other => return Err(format!("unexpected argument '{}'", other)),
        }
        i += 1;
    }

    let command = match command {
        Some("settings") => Command::Settings,
        Some("update-settings") => Command::UpdateSettings(update),
        Some("generate") => Command::Generate { preview },
        Some("sequences") => Command::Sequences,
        Some("help") | None => return Ok(None),
        Some(other) => return Err(format!("unknown command '{}'", other)),
    };

    Ok(Some(Cli {
        db_path,
        today,
        command,
    }))
}

fn print_usage() {
    println!("Invoice numbering control");
    println!();
    println!("Usage: invoicectl [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  settings           Show settings and the current number preview");
    println!("  update-settings    Validate and save settings");
    println!("  generate           Issue the next invoice number");
    println!("  sequences          List sequence counters per financial year");
    println!();
    println!("Options:");
    println!("  -d, --db <PATH>        Database file (default: $INVOICE_DB_PATH or data dir)");
    println!("      --today <DATE>     Evaluate as of YYYY-MM-DD (default: today, UTC)");
    println!("      --preview          generate: show the current number without consuming it");
    println!("  -h, --help             Show this help message");
    println!();
    println!("update-settings options:");
    println!("      --prefix <TEXT>    Invoice prefix (upper-cased)");
    println!("      --length <N>       Sequence width, 1-10");
    println!("      --fy-start <DATE>  Financial year start");
    println!("      --fy-end <DATE>    Financial year end");
    println!("      --manual-fy <TEXT> Financial year label used with --no-auto-fy");
    println!("      --format <TEXT>    Template, default {{PREFIX}}-{{FY}}-{{SEQ}}");
    println!("      --no-auto-fy       Do not roll the financial year over automatically");
    println!("      --inactive         Disable invoice number generation");
}
