//! docx-report - fill a DOCX template with JSON data
//!
//! ```text
//! docx-report --template report.docx --data data.json --output out.docx
//! ```

mod settings;

use anyhow::{Context as _, Result};
use clap::Parser;
use doc_template::{Context, DocxTemplate, ErrorRecord, MissingPolicy};
use settings::ReportSettings;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docx-report")]
#[command(about = "Fill a DOCX template with JSON data")]
struct Args {
    /// Template document
    #[arg(short, long, value_name = "TEMPLATE")]
    template: PathBuf,

    /// JSON object with the values for the template tags
    #[arg(short, long, value_name = "DATA", required_unless_present = "list_tags")]
    data: Option<PathBuf>,

    /// Where to write the generated document
    #[arg(short, long, value_name = "OUTPUT", required_unless_present = "list_tags")]
    output: Option<PathBuf>,

    /// Settings file (JSON); defaults apply when absent
    #[arg(short, long, value_name = "SETTINGS")]
    settings: Option<PathBuf>,

    /// Fail when a tag has no value
    #[arg(long)]
    strict: bool,

    /// Write warnings or errors as JSON records to this file
    #[arg(long, value_name = "REPORT")]
    report: Option<PathBuf>,

    /// Print the template's tags and exit
    #[arg(long)]
    list_tags: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut settings = match args.settings {
        Some(ref path) => ReportSettings::load_sync(path)?,
        None => ReportSettings::default(),
    };
    if args.strict {
        settings.render.missing = MissingPolicy::Strict;
    }

    let template_bytes =
        fs::read(&args.template).with_context(|| format!("Failed to read template: {}", args.template.display()))?;
    let template = match DocxTemplate::from_bytes(&template_bytes, settings.render.clone()) {
        Ok(template) => template,
        Err(failure) => {
            print_records(&failure.errors);
            write_report(args.report.as_deref(), &failure.errors)?;
            anyhow::bail!("{}: {}", args.template.display(), failure);
        }
    };

    if args.list_tags {
        for (part, tag) in template.tags() {
            println!("{}\t{}\t{}", part, tag.offset, tag.path);
        }
        return Ok(());
    }

    let data_path = args.data.context("--data is required")?;
    let output_path = args.output.context("--output is required")?;

    let json = fs::read_to_string(&data_path)
        .with_context(|| format!("Failed to read data file: {}", data_path.display()))?;
    let context = Context::from_json_str(&json)
        .with_context(|| format!("Invalid data file: {}", data_path.display()))?;

    let data_dir = data_path.parent().unwrap_or_else(|| Path::new("."));
    let images = settings.images.provider(data_dir);

    match template.render(&context, &images) {
        Ok(generated) => {
            print_records(&generated.warnings);
            write_report(args.report.as_deref(), &generated.warnings)?;
            fs::write(&output_path, &generated.bytes)
                .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
            tracing::info!(
                output = %output_path.display(),
                warnings = generated.warnings.len(),
                "report written"
            );
            Ok(())
        }
        Err(failure) => {
            print_records(&failure.errors);
            write_report(args.report.as_deref(), &failure.errors)?;
            anyhow::bail!("{}", failure)
        }
    }
}

fn print_records(records: &[ErrorRecord]) {
    for record in records {
        eprintln!("{}", record);
    }
}

fn write_report(path: Option<&Path>, records: &[ErrorRecord]) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let content = serde_json::to_string_pretty(records)?;
    fs::write(path, content).with_context(|| format!("Failed to write report: {}", path.display()))
}
