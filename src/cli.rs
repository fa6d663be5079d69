//! CLI argument parsing for the lead-import binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::parse_concurrency;
use crate::services::column_mapper::{set_field, set_other_source, set_qa_columns};
use crate::types::{ColumnMap, MappingSlot};

#[derive(Parser)]
#[command(name = "lead-import", about = "Bulk lead import with automatic RM assignment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a file and show how its rows would be imported
    Preview {
        /// Spreadsheet to read (.xlsx, .xls or .csv)
        file: PathBuf,
        #[command(flatten)]
        mapping: MappingArgs,
    },
    /// Create and assign a lead for every valid row
    Import {
        /// Spreadsheet to read (.xlsx, .xls or .csv)
        file: PathBuf,
        #[command(flatten)]
        mapping: MappingArgs,
        /// Concurrent workers (overrides IMPORT_CONCURRENCY)
        #[arg(long, value_parser = worker_count)]
        concurrency: Option<usize>,
        /// Where the failed-rows CSV is written (overrides EXPORT_DIR)
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Print the run report as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
}

/// Column overrides applied on top of the auto-guessed mapping
#[derive(Args, Debug, Default, Clone)]
pub struct MappingArgs {
    #[arg(long)]
    pub full_name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    /// Platform column, canonicalized to a lead source
    #[arg(long, conflicts_with_all = ["lead_source", "other_source"])]
    pub platform: Option<String>,
    /// Column holding the lead source verbatim
    #[arg(long, conflicts_with = "other_source")]
    pub lead_source: Option<String>,
    /// Literal lead source for every row
    #[arg(long)]
    pub other_source: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub remark: Option<String>,
    #[arg(long)]
    pub approach_at: Option<String>,
    /// Q&A column (repeatable, in order)
    #[arg(long = "qa")]
    pub qa: Vec<String>,
}

impl MappingArgs {
    pub fn apply(&self, map: &ColumnMap) -> ColumnMap {
        let slots = [
            (MappingSlot::FullName, &self.full_name),
            (MappingSlot::Phone, &self.phone),
            (MappingSlot::Platform, &self.platform),
            (MappingSlot::LeadSource, &self.lead_source),
            (MappingSlot::Email, &self.email),
            (MappingSlot::Location, &self.location),
            (MappingSlot::Remark, &self.remark),
            (MappingSlot::ApproachAt, &self.approach_at),
        ];

        let mut next = map.clone();
        for (slot, column) in slots {
            if let Some(column) = column {
                next = set_field(&next, slot, Some(column.clone()));
            }
        }
        if let Some(source) = &self.other_source {
            next = set_other_source(&next, source);
        }
        if !self.qa.is_empty() {
            next = set_qa_columns(&next, self.qa.clone());
        }
        next
    }
}

fn worker_count(raw: &str) -> Result<usize, String> {
    parse_concurrency(raw).map_err(|e| format!("{:#}", e))
}
