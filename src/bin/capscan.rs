//! Probes the host capability catalog and prints the results.
//!
//! By default the binary waits for every probe to settle and prints a table.
//! With `--json` it streams one NDJSON snapshot per line instead: the initial
//! all-pending snapshot, then one line per settled probe. `--only` (or
//! `CAPSCAN_PROBES`) restricts the run to a subset of capability ids.

use anyhow::{Context, Result, anyhow, bail};
use capscan::render::{render_catalog, render_table, snapshot_ndjson};
use capscan::{CapabilityCatalog, ProbeAggregator, logging, split_list};
use std::env;
use std::io::{self, Write};

const PROBES_ENV: &str = "CAPSCAN_PROBES";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse()?;
    logging::init_logging();

    let catalog = resolve_catalog(&cli)?;
    if cli.list {
        let mut output = String::new();
        render_catalog(&catalog, &mut output)?;
        return emit(&output);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(probe(catalog, cli.format))
}

fn resolve_catalog(cli: &Cli) -> Result<CapabilityCatalog> {
    let requested = cli
        .only
        .clone()
        .or_else(|| env::var(PROBES_ENV).ok().map(|raw| split_list(&raw)))
        .unwrap_or_default();

    let builtin = CapabilityCatalog::builtin();
    if requested.is_empty() {
        return Ok(builtin.clone());
    }
    builtin
        .select(requested.as_slice())
        .context("selecting capabilities to probe")
}

async fn probe(catalog: CapabilityCatalog, format: OutputFormat) -> Result<()> {
    let aggregator = ProbeAggregator::new();
    let initial = aggregator.initialize(catalog)?;

    match format {
        OutputFormat::Table => {
            aggregator.start()?;
            let snapshot = aggregator.wait_settled().await;
            let mut output = String::new();
            render_table(&snapshot, &mut output)?;
            emit(&output)
        }
        OutputFormat::Json => {
            // Subscribe before starting so no settlement is missed.
            let (_subscription, mut updates) = aggregator.updates();
            emit(&format!("{}\n", snapshot_ndjson(&initial)?))?;
            aggregator.start()?;
            if initial.is_settled() {
                return Ok(());
            }
            while let Some(snapshot) = updates.recv().await {
                emit(&format!("{}\n", snapshot_ndjson(&snapshot)?))?;
                if snapshot.is_settled() {
                    break;
                }
            }
            Ok(())
        }
    }
}

fn emit(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .context("writing to stdout")
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

struct Cli {
    format: OutputFormat,
    only: Option<Vec<String>>,
    list: bool,
}

impl Cli {
    fn parse() -> Result<Self> {
        let mut args = env::args_os();
        let _program = args.next();
        let mut format = OutputFormat::Table;
        let mut only = None;
        let mut list = false;

        while let Some(arg) = args.next() {
            let arg_str = arg
                .to_str()
                .ok_or_else(|| anyhow!("invalid UTF-8 in argument"))?;
            match arg_str {
                "--json" => format = OutputFormat::Json,
                "--list" => list = true,
                "--only" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--only requires a value"))?
                        .into_string()
                        .map_err(|_| anyhow!("--only must be valid UTF-8"))?;
                    let ids = split_list(&value);
                    if ids.is_empty() {
                        bail!("--only must name at least one capability id");
                    }
                    only = Some(ids);
                }
                "--help" | "-h" => usage(0),
                other => bail!("unknown argument: {other}"),
            }
        }

        Ok(Self { format, only, list })
    }
}

fn usage(code: i32) -> ! {
    eprintln!(
        "Usage: capscan [--json] [--only IDS] [--list]\n\nOptions:\n  --json        Stream every snapshot as NDJSON instead of printing a final table.\n  --only IDS    Probe only these capability ids (comma or space separated; or set CAPSCAN_PROBES).\n  --list        Print the capability catalog without probing.\n  --help        Show this help text.\n\nLogging goes to stderr; set CAPSCAN_LOG (or RUST_LOG), e.g. CAPSCAN_LOG=capscan=debug."
    );
    std::process::exit(code);
}
