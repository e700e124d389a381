use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_reading_order::{
    ColumnBand, ContentExtractor, DEFAULT_COLUMN_TOLERANCE, LayoutOptions, LopdfExtractor,
    PageSelection, ParseResult, RawDocument, detect_columns, extract_text_blocks, parse_document,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pdf2text",
    version,
    about = "Extract PDF text in reading order"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract blocks, sort them into reading order and assemble the text.
    Parse(ParseArgs),
    /// Report the column bands detected on each selected page.
    Columns(ColumnsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output path; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the assembled text or the whole parse result.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Treat the input as a JSON content tree instead of a PDF.
    #[arg(long)]
    raw: bool,
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Page selection like 1-3,5. Defaults to every page.
    #[arg(long)]
    pages: Option<String>,

    /// Maximum left-edge distance for blocks sharing a column.
    #[arg(long, default_value_t = DEFAULT_COLUMN_TOLERANCE)]
    column_tolerance: f64,

    /// Treat the input as a JSON content tree instead of a PDF.
    #[arg(long)]
    raw: bool,
}

#[derive(Debug, Serialize)]
struct PageColumns {
    page: u32,
    columns: Vec<ColumnBand>,
}

fn load_raw(input: &Path, raw: bool) -> Result<RawDocument> {
    if raw {
        let json = std::fs::read_to_string(input)
            .with_context(|| format!("failed to read '{}'", input.display()))?;
        return serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid content tree", input.display()));
    }

    let bytes =
        std::fs::read(input).with_context(|| format!("failed to read '{}'", input.display()))?;
    LopdfExtractor
        .extract(&bytes)
        .with_context(|| format!("failed to extract content from '{}'", input.display()))
}

fn run_parse(args: &ParseArgs) -> Result<ParseResult> {
    let result = parse_document(load_raw(&args.input, args.raw)?);

    let rendered = match args.format {
        OutputFormat::Text => result.full_text.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
    };
    write_output(args.output.as_deref(), &rendered)?;
    Ok(result)
}

fn run_columns(args: &ColumnsArgs) -> Result<Vec<PageColumns>> {
    let options = LayoutOptions {
        column_tolerance: args.column_tolerance,
    };
    options.validate()?;

    let selection = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid --pages value: {error}"))?;

    let raw = load_raw(&args.input, args.raw)?;
    let blocks = extract_text_blocks(&raw);
    let page_count = u32::try_from(raw.page_count()).unwrap_or(u32::MAX);

    let pages = (1..=page_count)
        .filter(|page| selection.as_ref().is_none_or(|selection| selection.contains(*page)))
        .map(|page| PageColumns {
            page,
            columns: detect_columns(&blocks, page, options.column_tolerance),
        })
        .collect::<Vec<_>>();

    write_output(None, &serde_json::to_string_pretty(&pages)?)?;
    Ok(pages)
}

fn write_output(output: Option<&Path>, rendered: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, format!("{rendered}\n"))
            .with_context(|| format!("failed to write '{}'", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

fn exit_code(produced_blocks: bool) -> ExitCode {
    if produced_blocks {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdf_reading_order=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Parse(args) => run_parse(&args).map(|result| !result.blocks.is_empty()),
        Commands::Columns(args) => run_columns(&args)
            .map(|pages| pages.iter().any(|page| !page.columns.is_empty())),
    };

    match outcome {
        Ok(produced_blocks) => exit_code(produced_blocks),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
