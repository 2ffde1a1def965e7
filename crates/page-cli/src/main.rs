use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::{
    BlockId, DbResult, PageConfig,
    pretty::{self, TableStyleKind},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use storage::{InsertOutcome, PageStats, SlotId, SlotInfo, SlotState, SlottedPage};
use tabled::Tabled;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_WORDS: [&str; 12] = [
    "anchor", "harbor", "scroll", "lantern", "tunnel", "hoard", "ember", "trap", "gem", "shaft",
    "candle", "burrow",
];

const PREVIEW_CHARS: usize = 24;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fill(args) => fill(args),
        Command::Inspect(args) => inspect(args),
    }
}

#[derive(Parser, Debug)]
#[command(name = "slotted")]
#[command(about = "Fill, drain, and inspect slotted pages", long_about = None)]
struct Cli {
    /// Log page operations at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill a fresh page with words until it runs out of room
    Fill(FillArgs),
    /// Print the directory and statistics of a saved page image
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct FillArgs {
    /// Page capacity in bytes
    #[arg(long, default_value_t = 4096)]
    page_size: usize,
    /// Block id written into the page header
    #[arg(long, default_value_t = 0)]
    block_id: i32,
    /// File with one word per line; a built-in list is used otherwise
    #[arg(long)]
    words: Option<PathBuf>,
    /// Stop after this many records even if more would fit
    #[arg(long)]
    limit: Option<usize>,
    /// Tombstone and reclaim every record, newest first, after filling
    #[arg(long)]
    drain: bool,
    /// Write the final page image to this file
    #[arg(long)]
    out: Option<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Path to a page image
    image: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output format (table or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Style used for table rendering
    #[arg(long, value_enum, default_value_t = CliTableStyle::Modern)]
    style: CliTableStyle,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliTableStyle {
    Modern,
    Ascii,
    Plain,
}

impl From<CliTableStyle> for TableStyleKind {
    fn from(value: CliTableStyle) -> Self {
        match value {
            CliTableStyle::Modern => TableStyleKind::Modern,
            CliTableStyle::Ascii => TableStyleKind::Ascii,
            CliTableStyle::Plain => TableStyleKind::Plain,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("storage=trace,slotted=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn fill(args: FillArgs) -> Result<()> {
    let words = match &args.words {
        Some(path) => load_words(path)?,
        None => DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
    };

    let config = PageConfig::builder()
        .page_size(args.page_size)
        .block_id(BlockId(args.block_id))
        .build();
    let mut page = SlottedPage::with_config(&config).context("failed to create page")?;

    let slots = fill_page(&mut page, &words, args.limit)?;
    info!(records = slots.len(), page_size = args.page_size, "filled page");
    println!(
        "Inserted {} records into a page of {} bytes.",
        slots.len(),
        page.capacity()
    );
    println!("{}", render_report(&page, &args.output)?);

    if args.drain {
        drain_page(&mut page, &slots)?;
        println!("Drained {} records.", slots.len());
        println!("{}", render_report(&page, &args.output)?);
    }

    if let Some(out) = &args.out {
        std::fs::write(out, page.buffer().as_slice())
            .with_context(|| format!("failed to write page image to {}", out.display()))?;
        info!(path = %out.display(), "wrote page image");
    }

    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let page = load_page(&args.image)?;
    println!("{}", render_report(&page, &args.output)?);
    Ok(())
}

fn load_words(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read words from {}", path.display()))?;
    let words: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    if words.is_empty() {
        bail!("no words found in {}", path.display());
    }
    Ok(words)
}

fn load_page(path: &Path) -> Result<SlottedPage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read page image {}", path.display()))?;
    SlottedPage::from_bytes(&bytes)
        .with_context(|| format!("{} is not a valid page image", path.display()))
}

/// Insert words round-robin until the page is full or `limit` is reached.
fn fill_page(page: &mut SlottedPage, words: &[String], limit: Option<usize>) -> Result<Vec<SlotId>> {
    if words.is_empty() {
        bail!("word list is empty");
    }
    let limit = limit.unwrap_or(usize::MAX);
    let mut slots = Vec::new();
    for word in words.iter().cycle() {
        if slots.len() >= limit {
            break;
        }
        match page.insert(word.as_bytes())? {
            InsertOutcome::Inserted(slot) => slots.push(slot),
            InsertOutcome::PageFull => break,
        }
    }
    Ok(slots)
}

fn drain_page(page: &mut SlottedPage, slots: &[SlotId]) -> DbResult<()> {
    for &slot in slots.iter().rev() {
        page.tombstone(slot)?;
        page.reclaim(slot)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport {
    stats: PageStats,
    slots: Vec<SlotInfo>,
}

fn render_report(page: &SlottedPage, output: &OutputArgs) -> Result<String> {
    let stats = page.stats()?;
    let slots = page.slots()?;
    match output.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport { stats, slots })?),
        OutputFormat::Table => {
            let style: TableStyleKind = output.style.into();
            let directory = render_slots(page, &slots, style)?;
            Ok(format!("{directory}\n{}", render_stats(&stats, style)))
        }
    }
}

#[derive(Clone, Tabled)]
struct SlotRow {
    #[tabled(rename = "Slot")]
    slot: SlotId,
    #[tabled(rename = "Offset")]
    offset: usize,
    #[tabled(rename = "State")]
    state: &'static str,
    #[tabled(rename = "Len")]
    len: usize,
    #[tabled(rename = "Data")]
    data: String,
}

fn render_slots(page: &SlottedPage, slots: &[SlotInfo], style: TableStyleKind) -> DbResult<String> {
    let mut rows = Vec::with_capacity(slots.len());
    for info in slots {
        let (state, data) = match info.state {
            SlotState::Empty => ("empty", String::new()),
            SlotState::Live(_) => ("live", preview(page.read(info.slot)?)),
            SlotState::Tombstoned(len) => (
                "tombstoned",
                preview(page.buffer().read_bytes(info.offset, len as usize)?),
            ),
        };
        rows.push(SlotRow {
            slot: info.slot,
            offset: info.offset,
            state,
            len: info.state.len(),
            data,
        });
    }
    Ok(pretty::render_structured_rows(&rows, style))
}

fn render_stats(stats: &PageStats, style: TableStyleKind) -> String {
    let rows = vec![
        vec!["block id".into(), stats.block_id.to_string()],
        vec!["capacity".into(), stats.capacity.to_string()],
        vec!["slots".into(), stats.slot_count.to_string()],
        vec!["live".into(), stats.live_slots.to_string()],
        vec!["tombstoned".into(), stats.tombstoned_slots.to_string()],
        vec!["empty".into(), stats.empty_slots.to_string()],
        vec!["live bytes".into(), stats.live_bytes.to_string()],
        vec!["dead bytes".into(), stats.dead_bytes.to_string()],
        vec!["free space offset".into(), stats.free_space_offset.to_string()],
        vec!["space available".into(), stats.space_available.to_string()],
    ];
    pretty::render_string_table(&["Field", "Value"], rows, style)
}

fn preview(bytes: &[u8]) -> String {
    pretty::format_record_preview(bytes, PREVIEW_CHARS)
}
