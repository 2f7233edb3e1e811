//! CLI binary for nfce2list.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`
//! and prints the items found on each receipt.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nfce2list::pipeline::currency::format_brl;
use nfce2list::{
    ProgressCallback, ScanConfig, ScanError, ScanOutput, ScanProgressCallback, ScanState, Scanner,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the whole batch; the message follows the latest state change.
/// Runs may finish out of order when several receipts are scanned at once.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos}/{len} receipts  {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let total = self.bar.length().unwrap_or(0) as usize;
        let failed = self.failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} receipts scanned", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} receipts scanned  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, source: &str) {
        self.bar.set_message(dim(source));
    }

    fn on_state(&self, state: &ScanState) {
        self.bar.set_message(state.to_string());
    }

    fn on_scan_complete(&self, item_count: usize) {
        self.bar
            .println(format!("  {} {} items", green("✓"), item_count));
        self.bar.inc(1);
    }

    fn on_scan_error(&self, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!("  {} {}", red("✗"), red(first_line)));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan a receipt photo
  nfce2list cupom.jpg

  # Several photos, JSON to a file
  nfce2list cupom1.jpg cupom2.png -o compras.json

  # QR already read elsewhere: start from the portal URL
  nfce2list "https://www.sefaz.rs.gov.br/NFCE/NFCE-COM.aspx?p=4323..."

  # Offline heuristics only, no LLM calls
  nfce2list --no-llm cupom.jpg

  # Pick the extraction model
  nfce2list --provider anthropic --model claude-haiku-4-20250514 cupom.jpg

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used together with EDGEQUAKE_LLM_PROVIDER
  RUST_LOG                Overrides the log filter (e.g. nfce2list=debug)

Without any provider the LLM stage is skipped and the built-in table and
span heuristics extract the items.
"#;

/// Turn NFC-e receipt photos into categorised item lists.
#[derive(Parser, Debug)]
#[command(
    name = "nfce2list",
    version,
    about = "Turn NFC-e receipt photos into categorised item lists",
    long_about = "Reads the QR code on a Brazilian NFC-e receipt, fetches the receipt from the \
issuing state's tax portal and extracts the purchased items with name, price and category. \
An LLM reads the page when one is configured; built-in layout heuristics cover the rest.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Receipt photos (JPEG/PNG) or receipt URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the JSON report to this file instead of printing a table.
    #[arg(short, long, env = "NFCE2LIST_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the JSON report to stdout.
    #[arg(long, env = "NFCE2LIST_JSON")]
    json: bool,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "NFCE2LIST_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gpt-4.1-nano).
    #[arg(long, env = "NFCE2LIST_MODEL")]
    model: Option<String>,

    /// Skip the LLM and use the layout heuristics only.
    #[arg(long, env = "NFCE2LIST_NO_LLM")]
    no_llm: bool,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "NFCE2LIST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Portal request timeout in seconds.
    #[arg(long, env = "NFCE2LIST_FETCH_TIMEOUT", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    fetch_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "NFCE2LIST_LLM_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    llm_timeout: u64,

    /// Maximum characters of page text sent to the LLM.
    #[arg(long, env = "NFCE2LIST_MAX_LLM_CHARS", default_value_t = 8000)]
    max_llm_chars: usize,

    /// Max LLM output tokens.
    #[arg(long, env = "NFCE2LIST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "NFCE2LIST_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Verify the portal's TLS certificate (off by default; many portals fail it).
    #[arg(long, env = "NFCE2LIST_VERIFY_TLS")]
    verify_tls: bool,

    /// Receipts scanned at once.
    #[arg(short, long, env = "NFCE2LIST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Disable the progress spinner.
    #[arg(long, env = "NFCE2LIST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NFCE2LIST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NFCE2LIST_QUIET")]
    quiet: bool,
}

/// One line of the JSON report.
#[derive(Serialize)]
struct InputReport<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a ScanOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; library INFO logs
    // would tear it, so they are hidden while it is shown.
    let machine_output = cli.json || cli.output.is_some();
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build scanner ────────────────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;
    let scanner = Scanner::new(config).context("Failed to set up scanner")?;

    if !cli.quiet && !cli.no_llm && !scanner.has_llm() {
        eprintln!(
            "{} no LLM provider configured; using layout heuristics only",
            cyan("ℹ")
        );
    }

    // ── Scan ─────────────────────────────────────────────────────────────
    let results = scanner.scan_many(&cli.inputs).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }

    let failed = results.iter().filter(|r| r.is_err()).count();

    // ── Report ───────────────────────────────────────────────────────────
    if machine_output {
        let reports: Vec<InputReport<'_>> = cli
            .inputs
            .iter()
            .zip(&results)
            .map(|(input, result)| InputReport {
                input,
                output: result.as_ref().ok(),
                error: result.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise report")?;

        if let Some(ref path) = cli.output {
            write_atomic(path, &json).await?;
            if !cli.quiet {
                eprintln!("{} report written to {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        if cli.json {
            println!("{json}");
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for (input, result) in cli.inputs.iter().zip(&results) {
            match result {
                Ok(output) => print_items(&mut handle, input, output)
                    .context("Failed to write to stdout")?,
                Err(e) => print_error(input, e, cli.quiet),
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} receipts could not be scanned", failed, results.len());
    }
    Ok(())
}

/// Map CLI args to `ScanConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ScanConfig::builder()
        .fetch_timeout_secs(cli.fetch_timeout)
        .accept_invalid_certs(!cli.verify_tls)
        .use_llm(!cli.no_llm)
        .llm_timeout_secs(cli.llm_timeout)
        .max_llm_input_chars(cli.max_llm_chars)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .concurrency(cli.concurrency);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Item table for one receipt.
fn print_items(out: &mut impl Write, input: &str, output: &ScanOutput) -> io::Result<()> {
    writeln!(out, "{} {}", bold(input), dim(&output.url))?;
    for item in &output.items {
        let name: String = item.name.chars().take(42).collect();
        writeln!(
            out,
            "  {:<42}  {:<10}  {:>12}",
            name,
            item.category.label(),
            format_brl(item.price)
        )?;
    }
    let count = format!("{} items", output.items.len());
    let total = format!("{:>12}", format_brl(output.total_price()));
    writeln!(
        out,
        "  {}  {:<10}  {}",
        bold(&format!("{count:<42}")),
        "",
        bold(&total)
    )?;
    writeln!(out)
}

fn print_error(input: &str, err: &ScanError, quiet: bool) {
    eprintln!("{} {}: {}", red("✗"), bold(input), err);
    if !quiet {
        if let Some(url) = err.url() {
            eprintln!("  {}", dim(url));
        }
    }
}

/// Write to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move report into {}", path.display()))?;
    Ok(())
}
