//! Lead Import - bulk lead creation with automatic RM assignment
//!
//! Reads a spreadsheet of leads, maps its columns, then creates and assigns
//! every valid row through the CRM lead API.

mod cli;
mod config;
mod defaults;
mod services;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, MappingArgs};
use crate::defaults::MAX_QA_COLUMNS;
use crate::services::column_mapper::{auto_guess, check_mapping};
use crate::services::decoder::decode_file;
use crate::services::import_orchestrator::ImportOrchestrator;
use crate::services::lead_api::create_lead_api;
use crate::services::reporter::{format_summary, report_json, write_failure_report};
use crate::services::validator::{partition, preview_rows};
use crate::types::{ColumnMap, DecodedSheet, LeadSourceMapping};

fn init_logging() -> WorkerGuard {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "lead-import.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,lead_import=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)) // stderr, keeps stdout for output
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging();

    let mut config = config::Config::from_env()?;
    info!("Configuration loaded");

    match cli.command {
        Command::Preview { file, mapping } => run_preview(&file, &mapping),
        Command::Import { file, mapping, concurrency, export_dir, json } => {
            if let Some(c) = concurrency {
                config.concurrency = c;
            }
            if let Some(dir) = export_dir {
                config.export_dir = dir;
            }
            run_import(&config, &file, &mapping, json).await
        }
    }
}

/// Decode `file` and derive its column map from aliases plus CLI overrides
fn load(file: &Path, overrides: &MappingArgs) -> Result<(DecodedSheet, ColumnMap)> {
    let sheet = decode_file(file).with_context(|| format!("Failed to decode {}", file.display()))?;
    if overrides.qa.len() > MAX_QA_COLUMNS {
        warn!(
            "{} Q&A columns given, only the first {} are used",
            overrides.qa.len(),
            MAX_QA_COLUMNS
        );
    }
    let map = overrides.apply(&auto_guess(&sheet.headers));
    Ok((sheet, map))
}

fn describe_lead_source(map: &ColumnMap) -> String {
    match &map.lead_source {
        Some(LeadSourceMapping::Platform { column }) => format!("platform column '{}'", column),
        Some(LeadSourceMapping::Column { column }) => format!("column '{}'", column),
        Some(LeadSourceMapping::Other { source }) => format!("literal '{}'", source),
        None => "(unmapped)".to_string(),
    }
}

fn print_mapping(map: &ColumnMap) {
    println!("Column mapping:");
    for (slot, column) in map.slot_columns() {
        println!("  {:<14} {}", slot.label(), column);
    }
    println!("  {:<14} {}", "source", describe_lead_source(map));
    if !map.qa_columns.is_empty() {
        println!("  {:<14} {}", "q&a", map.qa_columns.join(", "));
    }
}

fn run_preview(file: &Path, overrides: &MappingArgs) -> Result<()> {
    let (sheet, map) = load(file, overrides)?;
    print_mapping(&map);

    let issues = check_mapping(&map, &sheet.headers);
    for issue in &issues {
        println!("  ! {}", issue);
    }

    let split = partition(&sheet.rows, &map);
    println!(
        "\n{} rows: {} valid, {} skipped",
        sheet.rows.len(),
        split.valid_indexes.len(),
        split.invalid_count
    );

    for row in preview_rows(&sheet.rows, &map) {
        let status = match &row.rejection {
            Some(reason) => format!("skip: {}", reason),
            None => "ok".to_string(),
        };
        println!(
            "  {:>5}  {:<28} {:<12} {:<10} qa={}  {}",
            row.index + defaults::HEADER_ROW_OFFSET,
            row.name,
            row.phone,
            row.lead_source,
            row.qa_answered,
            status
        );
    }
    Ok(())
}

async fn run_import(config: &config::Config, file: &Path, overrides: &MappingArgs, json: bool) -> Result<()> {
    let (sheet, map) = load(file, overrides)?;
    let api = create_lead_api(config)?;
    let orchestrator = ImportOrchestrator::new(api, config.concurrency);

    let mut progress_rx = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let p = progress_rx.borrow_and_update().clone();
            info!(
                "Progress {}/{}: {} success, {} failed{}",
                p.done,
                p.total,
                p.success,
                p.failed,
                if p.halted { " (halting)" } else { "" }
            );
        }
    });

    let run = orchestrator.run(&sheet.rows, &sheet.headers, &map);
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, waiting for in-flight rows");
            orchestrator.cancel();
            run.await
        }
    };
    printer.abort();
    let report = result?;
    info!("Orchestrator is {:?}", orchestrator.state());

    let export_path = write_failure_report(&config.export_dir, &report)?;

    if json {
        let out = report_json(&report, export_path.as_deref());
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", format_summary(&report.summary));
        if let Some(path) = export_path {
            println!("\nFailed rows written to {}", path.display());
        }
    }
    Ok(())
}
