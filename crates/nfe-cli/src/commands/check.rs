//! Check command - classify the line items of a single CSV export.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use nfe_core::{
    read_line_items_from_path, ClassificationResult, ClassifiedRow, Decimal, NfeConfig,
    RowClassifier, RowOutcome,
};

use super::config::load_config;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Placeholder shown by `--show-text` when the first row has no annotation.
const NO_TEXT: &str = "No annotation text found";

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Input CSV file
    #[arg(required = true)]
    input: PathBuf,

    /// Write rows without a note to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// List resolved rows too
    #[arg(long)]
    all: bool,

    /// Print the first row's annotation text for manual review
    #[arg(long)]
    show_text: bool,

    /// Classify rows on a single thread
    #[arg(long)]
    sequential: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// Classification of one file.
pub struct FileReport {
    pub result: ClassificationResult,
    /// Rows skipped for a blank required column.
    pub dropped: usize,
}

pub fn run(args: CheckArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if args.sequential {
        config.processing.parallel = false;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message("Classifying rows...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let report = classify_file(&args.input, &config)?;

    pb.finish_and_clear();

    let output = match args.format {
        OutputFormat::Json => format_json(&report, args.all)?,
        OutputFormat::Csv => format_csv(&report.result, args.all)?,
        OutputFormat::Text => format_text(&report, args.all),
    };
    print!("{}", output);

    if let Some(output_path) = &args.output {
        fs::write(output_path, unresolved_csv(&report.result)?)?;
        eprintln!(
            "{} Rows without note written to {}",
            style("✓").green(),
            output_path.display()
        );
    }

    if args.show_text && report.result.unresolved_count() > 0 {
        let text = report
            .result
            .rows()
            .first()
            .and_then(|row| row.item.annotation_text.as_deref())
            .unwrap_or(NO_TEXT);
        println!();
        println!("{}", style("Annotation text for review:").bold());
        println!("{}", text);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Read and classify one CSV file.
pub fn classify_file(path: &Path, config: &NfeConfig) -> anyhow::Result<FileReport> {
    let loaded = read_line_items_from_path(path, &config.input)?;
    if loaded.dropped > 0 {
        debug!(
            "Dropped {} rows with blank {}",
            loaded.dropped,
            config.input.required_column.as_deref().unwrap_or("")
        );
    }

    let result = RowClassifier::new()
        .with_extraction(config.extraction.clone())
        .with_processing(config.processing.clone())
        .classify(loaded.items)?;

    Ok(FileReport {
        result,
        dropped: loaded.dropped,
    })
}

/// Rows without a note as CSV, UTF-8 with BOM so spreadsheet tools pick up
/// the encoding.
pub fn unresolved_csv(result: &ClassificationResult) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());

    wtr.write_record(["Código Produto", "Quantidade", "Valor"])?;

    for row in result.unresolved() {
        wtr.write_record([
            row.item.product_code.as_deref().unwrap_or(""),
            &number_cell(row.item.quantity),
            &number_cell(row.item.value),
        ])?;
    }

    Ok(wtr.into_inner()?)
}

// blank cells stay blank
fn number_cell(number: Option<Decimal>) -> String {
    number.map(|d| d.to_string()).unwrap_or_default()
}

fn listed_rows(result: &ClassificationResult, all: bool) -> Vec<&ClassifiedRow> {
    if all {
        result.rows().iter().collect()
    } else {
        result.unresolved().collect()
    }
}

fn status_label(outcome: &RowOutcome) -> String {
    match outcome {
        RowOutcome::Resolved(resolution) => {
            format!("{} ({})", resolution.identifier, resolution.stage)
        }
        RowOutcome::Unresolved { .. } => "no note".to_string(),
        RowOutcome::Failed { error } => format!("error: {}", error),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    total: usize,
    resolved: usize,
    unresolved: usize,
    failed: usize,
    dropped: usize,
    rows: Vec<&'a ClassifiedRow>,
}

fn format_json(report: &FileReport, all: bool) -> anyhow::Result<String> {
    let result = &report.result;
    let json = JsonReport {
        total: result.len(),
        resolved: result.resolved_count(),
        unresolved: result.unresolved_count(),
        failed: result.failed_count(),
        dropped: report.dropped,
        rows: listed_rows(result, all),
    };
    Ok(serde_json::to_string_pretty(&json)? + "\n")
}

fn format_csv(result: &ClassificationResult, all: bool) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["row", "product_code", "quantity", "value", "note", "stage", "status"])?;

    for row in listed_rows(result, all) {
        let status = match &row.outcome {
            RowOutcome::Resolved(_) => "resolved".to_string(),
            RowOutcome::Unresolved { .. } => "unresolved".to_string(),
            RowOutcome::Failed { error } => format!("failed: {}", error),
        };
        wtr.write_record([
            &row.index.to_string(),
            row.item.product_code.as_deref().unwrap_or(""),
            &number_cell(row.item.quantity),
            &number_cell(row.item.value),
            row.identifier().map(|id| id.as_str()).unwrap_or(""),
            row.outcome.stage().map(|s| s.as_str()).unwrap_or(""),
            &status,
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(report: &FileReport, all: bool) -> String {
    let result = &report.result;
    let mut output = String::new();

    output.push_str(&format!("Total rows:        {}\n", result.len()));
    output.push_str(&format!("Rows without note: {}\n", result.unresolved_count()));
    if result.failed_count() > 0 {
        output.push_str(&format!("Failed rows:       {}\n", result.failed_count()));
    }
    if report.dropped > 0 {
        output.push_str(&format!("Dropped rows:      {}\n", report.dropped));
    }
    output.push('\n');

    if result.unresolved_count() == 0 && !all {
        output.push_str("All rows have an originating note.\n");
        return output;
    }

    output.push_str(&format!(
        "{:<20} {:>12} {:>14}  {}\n",
        "Product", "Quantity", "Value", "Note"
    ));
    for row in listed_rows(result, all) {
        output.push_str(&format!(
            "{:<20} {:>12} {:>14}  {}\n",
            row.item.product_code.as_deref().unwrap_or("-"),
            row.item.quantity.map_or_else(|| "-".to_string(), |d| d.to_string()),
            row.item.value.map_or_else(|| "-".to_string(), |d| d.to_string()),
            status_label(&row.outcome)
        ));
    }

    output
}
