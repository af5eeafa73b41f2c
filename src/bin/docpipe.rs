//! CLI binary for docpipe.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docpipe::{
    classify, engine_status, extract, extract_many, extract_webpage, render, ConversionConfig,
    ConversionProgressCallback, DocxStyle, MediaType, Outcome, ParagraphSeparator, Payload,
    ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current stage of each request.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage(&self, reference: &str, stage: Stage) {
        match stage {
            Stage::Done => self
                .bar
                .println(format!("  {} {}", green("✓"), dim(reference))),
            Stage::Failed => {}
            _ => {
                self.bar.set_prefix(stage.to_string());
                self.bar.set_message(reference.to_string());
            }
        }
    }

    fn on_failure(&self, reference: &str, error: &str) {
        // Keep the log line to one row; the full message goes to stdout/stderr later.
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            reference,
            red(first_line)
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text from a document (format from the suffix)
  docpipe extract https://example.com/report.pdf

  # Several documents at once, as JSON outcomes
  docpipe --json extract https://example.com/a.docx https://example.com/b.pptx

  # Paragraph text of a web page
  docpipe webpage https://example.com/blog/post

  # Markdown → PDF / DOCX
  docpipe render --to pdf notes.md -o notes.pdf
  cat notes.md | docpipe render --to docx --font "Arial" --font-size 12 -o notes.docx

  # Which suffix maps to which format?
  docpipe classify scan.JPEG

  # Check external engines
  docpipe doctor

SUPPORTED SUFFIXES:
  pdf, docx, pptx, txt, png, jpg, jpeg, gif, bmp (any case)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  DOCPIPE_TESSERACT       Path to the tesseract binary
  DOCPIPE_WKHTMLTOPDF     Path to the wkhtmltopdf binary
  DOCPIPE_PANDOC          Path to the pandoc binary
  RUST_LOG                Override log filter (e.g. docpipe=debug)
"#;

/// Extract text from documents and render Markdown to PDF or DOCX.
#[derive(Parser, Debug)]
#[command(
    name = "docpipe",
    version,
    about = "Extract text from documents and render Markdown to PDF or DOCX",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch documents and extract their text (format chosen by suffix).
    Extract {
        /// HTTP/HTTPS URLs ending in a supported suffix.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Fetch an HTML page and extract the text of its paragraphs.
    Webpage {
        /// HTTP/HTTPS URL of the page.
        url: String,
    },

    /// Render Markdown to PDF or DOCX.
    Render {
        /// Output format.
        #[arg(long, value_enum)]
        to: RenderTarget,

        /// Markdown file; `-` or omitted reads stdin.
        input: Option<PathBuf>,

        /// Output file; `-` writes to stdout. Default: output.pdf / output.docx.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the format a reference would be extracted as.
    Classify {
        /// URL or file name.
        reference: String,
    },

    /// Report which external engines are available.
    Doctor,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Print the boundary Outcome as JSON instead of plain output.
    #[arg(long, global = true, env = "DOCPIPE_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "DOCPIPE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCPIPE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCPIPE_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "DOCPIPE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Reject downloads larger than this many bytes.
    #[arg(long, global = true, env = "DOCPIPE_MAX_BYTES")]
    max_bytes: Option<u64>,

    /// How extracted segments are joined: native, space, newline.
    #[arg(long, global = true, env = "DOCPIPE_SEPARATOR", value_enum, default_value = "native")]
    separator: SeparatorArg,

    /// Keep single newlines in Markdown as soft breaks (no <br>).
    #[arg(long, global = true, env = "DOCPIPE_SOFT_BREAKS")]
    soft_breaks: bool,

    /// Font family forced onto every DOCX run.
    #[arg(long, global = true, env = "DOCPIPE_FONT", default_value = "Calibri")]
    font: String,

    /// Font size in points forced onto every DOCX run.
    #[arg(long, global = true, env = "DOCPIPE_FONT_SIZE", default_value_t = 11.0)]
    font_size: f32,

    /// Tesseract language pack used for OCR.
    #[arg(long, global = true, env = "DOCPIPE_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Number of documents extracted at once.
    #[arg(short, long, global = true, env = "DOCPIPE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Path to the tesseract binary.
    #[arg(long, global = true, env = "DOCPIPE_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Path to the pandoc binary.
    #[arg(long, global = true, env = "DOCPIPE_PANDOC")]
    pandoc: Option<PathBuf>,

    /// Path to the wkhtmltopdf binary.
    #[arg(long, global = true, env = "DOCPIPE_WKHTMLTOPDF")]
    wkhtmltopdf: Option<PathBuf>,

    /// Path to libpdfium (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RenderTarget {
    Pdf,
    Docx,
}

impl From<RenderTarget> for MediaType {
    fn from(v: RenderTarget) -> Self {
        match v {
            RenderTarget::Pdf => MediaType::Pdf,
            RenderTarget::Docx => MediaType::Docx,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SeparatorArg {
    Native,
    Space,
    Newline,
}

impl From<SeparatorArg> for ParagraphSeparator {
    fn from(v: SeparatorArg) -> Self {
        match v {
            SeparatorArg::Native => ParagraphSeparator::Native,
            SeparatorArg::Space => ParagraphSeparator::Space,
            SeparatorArg::Newline => ParagraphSeparator::Newline,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs would fight with the spinner; the spinner
    // gives the feedback that matters.
    let uses_progress = matches!(
        cli.command,
        Command::Extract { .. } | Command::Webpage { .. } | Command::Render { .. }
    );
    let show_progress = uses_progress && !opts.quiet && !opts.no_progress && !opts.json;
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
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

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        opts,
        progress.clone().map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    let result = run(&cli, &config).await;
    if let Some(cb) = progress {
        cb.finish();
    }
    result
}

async fn run(cli: &Cli, config: &ConversionConfig) -> Result<()> {
    let opts = &cli.opts;
    match &cli.command {
        Command::Classify { reference } => {
            let tag = classify(reference);
            if opts.json {
                println!("{}", serde_json::json!({ "reference": reference, "format": tag }));
            } else {
                println!("{tag}");
            }
            Ok(())
        }

        Command::Doctor => doctor(config, opts.json),

        Command::Extract { urls } if urls.len() == 1 => {
            let result = extract(&urls[0], config).await;
            emit_text(result.map(Payload::Text), opts.json)
        }

        Command::Extract { urls } => {
            let results = extract_many(urls.iter().cloned(), config)
                .await
                .context("Failed to start extraction")?;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();

            if opts.json {
                let entries: Vec<_> = results
                    .into_iter()
                    .map(|(reference, result)| {
                        serde_json::json!({
                            "reference": reference,
                            "outcome": Outcome::from(result.map(Payload::Text)),
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).context("Failed to serialise output")?
                );
            } else {
                let mut out = io::stdout().lock();
                for (reference, result) in &results {
                    match result {
                        Ok(text) => {
                            writeln!(out, "{}", bold(&format!("==> {reference} <==")))?;
                            write_text(&mut out, text)?;
                        }
                        Err(e) => eprintln!("{} {reference}: {e}", red("✗")),
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{failed} of {} references failed", urls.len());
            }
            Ok(())
        }

        Command::Webpage { url } => {
            let result = extract_webpage(url, config).await;
            emit_text(result.map(Payload::Text), opts.json)
        }

        Command::Render { to, input, output } => {
            let markdown = read_markdown(input.as_ref())?;
            let result = render(&markdown, (*to).into(), config).await;

            if opts.json {
                return emit_outcome(Outcome::from(result.map(Payload::Document)));
            }

            let doc = result.context("Rendering failed")?;
            let target = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&doc.file_name));
            if target.as_os_str() == "-" {
                io::stdout()
                    .lock()
                    .write_all(&doc.bytes)
                    .context("Failed to write to stdout")?;
            } else {
                std::fs::write(&target, &doc.bytes)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                if !opts.quiet {
                    eprintln!(
                        "{}  {}  {} bytes  →  {}",
                        green("✔"),
                        doc.media_type.mime(),
                        doc.bytes.len(),
                        bold(&target.display().to_string())
                    );
                }
            }
            Ok(())
        }
    }
}

/// Print a text result (plain or JSON) and fail the process on error.
fn emit_text(result: Result<Payload, docpipe::DocpipeError>, json: bool) -> Result<()> {
    if json {
        return emit_outcome(Outcome::from(result));
    }
    match result.context("Extraction failed")? {
        Payload::Text(text) => write_text(&mut io::stdout().lock(), &text),
        Payload::Document(_) => anyhow::bail!("Unexpected document payload"),
    }
}

fn emit_outcome(outcome: Outcome) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialise output")?
    );
    match outcome.error() {
        Some(e) => anyhow::bail!("{e}"),
        None => Ok(()),
    }
}

fn write_text(out: &mut impl Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    // Ensure a trailing newline on stdout.
    if !text.ends_with('\n') {
        out.write_all(b"\n").ok();
    }
    Ok(())
}

fn read_markdown(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Markdown from {}", path.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read Markdown from stdin")?;
            Ok(buf)
        }
    }
}

fn doctor(config: &ConversionConfig, json: bool) -> Result<()> {
    let report = engine_status(config);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }
    for status in &report {
        match (&status.location, &status.error) {
            (_, Some(err)) => {
                let first_line = err.lines().next().unwrap_or(err);
                println!("{} {:<12} {}", red("✗"), status.engine, dim(first_line));
            }
            (Some(path), None) => {
                println!("{} {:<12} {}", green("✓"), status.engine, path.display())
            }
            (None, None) => println!("{} {:<12} {}", green("✓"), status.engine, dim("system library")),
        }
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(opts: &GlobalOpts, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .download_timeout_secs(opts.download_timeout)
        .paragraph_separator(opts.separator.into())
        .hard_line_breaks(!opts.soft_breaks)
        .docx_style(DocxStyle::new(opts.font.clone(), opts.font_size))
        .ocr_language(opts.ocr_lang.clone())
        .concurrency(opts.concurrency);

    if let Some(max) = opts.max_bytes {
        builder = builder.max_download_bytes(max);
    }
    if let Some(ref path) = opts.tesseract {
        builder = builder.tesseract_path(path);
    }
    if let Some(ref path) = opts.pandoc {
        builder = builder.pandoc_path(path);
    }
    if let Some(ref path) = opts.wkhtmltopdf {
        builder = builder.wkhtmltopdf_path(path);
    }
    if let Some(ref path) = opts.pdfium_lib {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
