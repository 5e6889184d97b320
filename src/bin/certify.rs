//! CLI binary for certify-points.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ClassifierConfig` and prints the classification.

use anyhow::{Context, Result};
use certify_points::{
    classify, load_submission, ClassificationProgressCallback, ClassificationResult,
    ClassifierConfig, ErrorKind, FailureReport, ProgressCallback, RuleSet, Stage, Submission,
    Technique, TesseractCommand,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Terminal progress: a spinner naming the current stage plus one log line
/// per OCR variant, printed in completion order.
struct CliProgressCallback {
    bar: ProgressBar,
    variants: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Certify");
        bar.set_message("Reading submission…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            variants: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }
}

impl ClassificationProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        let msg = match stage {
            Stage::Received => "Detecting media type…",
            Stage::Decoded => "Loading page images…",
            Stage::Rasterized => "Preprocessing pages…",
            Stage::Preprocessed => "Running OCR…",
            Stage::Extracted => "Validating text…",
            Stage::Validated => "Applying rules…",
            Stage::Classified => "Done",
        };
        self.bar.set_message(msg);
    }

    fn on_variant_complete(&self, page: usize, technique: Technique, chars: usize) {
        self.variants.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>2}  {:<16}  {}",
            green("✓"),
            page + 1,
            technique.name(),
            dim(&format!("{chars:>5} chars")),
        ));
    }

    fn on_variant_error(&self, page: usize, technique: Technique, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>2}  {:<16}  {}",
            red("✗"),
            page + 1,
            technique.name(),
            red(&msg),
        ));
    }

    fn on_complete(&self, result: &ClassificationResult) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} variant(s) read, {} failed  →  {}",
            green("✔"),
            self.variants.load(Ordering::SeqCst),
            self.errors.load(Ordering::SeqCst),
            bold(&result.category),
        );
    }

    fn on_failure(&self, kind: ErrorKind, _detail: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), bold(&kind.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify a certificate
  certify nptel_certificate.pdf

  # Attach the submitting user and emit JSON
  certify --username ravi --json hackathon.png

  # The file holds a base64 payload or data URL (as sent by the upload form)
  certify --base64 upload.txt

  # Use a custom rule table
  certify --rules rules.json internship.jpg

  # Dump the built-in rule table as a starting point
  certify --print-rules > rules.json

POINT TABLE (built-in rules, first match wins):
  NPTEL                     50
  Hackathon/Competition     40
  Internship                30
  Professional Development  20
  Other                     10

ENVIRONMENT VARIABLES:
  TESSERACT_CMD    Path to the tesseract executable (default: tesseract on PATH)
  PDFIUM_LIB_PATH  Path to libpdfium, or the directory containing it
  RUST_LOG         Log filter, overrides -v / -q

SETUP:
  Install tesseract with the English model (e.g. apt install tesseract-ocr)
  and place libpdfium next to the binary or point PDFIUM_LIB_PATH at it.
"#;

/// Classify a certificate image or PDF and award activity points.
#[derive(Parser, Debug)]
#[command(
    name = "certify",
    version,
    about = "Classify a certificate image or PDF and award activity points",
    long_about = "Extracts certificate text with tesseract OCR from several enhanced variants \
of each page, checks that the text looks like a certificate, and assigns the first matching \
category from a priority-ordered rule table.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Certificate file (PDF, PNG or JPEG).
    #[arg(required_unless_present = "print_rules")]
    input: Option<PathBuf>,

    /// Treat the input file as a base64 payload or data URL.
    #[arg(long, env = "CERTIFY_BASE64")]
    base64: bool,

    /// Declared media type, used when sniffing and the extension are inconclusive.
    #[arg(long, env = "CERTIFY_MEDIA_TYPE")]
    media_type: Option<String>,

    /// Username passed through to the result.
    #[arg(short, long, env = "CERTIFY_USERNAME")]
    username: Option<String>,

    /// JSON rule table replacing the built-in rules.
    #[arg(long, env = "CERTIFY_RULES")]
    rules: Option<PathBuf>,

    /// Print the active rule table as JSON and exit.
    #[arg(long)]
    print_rules: bool,

    /// Rendering DPI for PDF pages (72–600).
    #[arg(long, env = "CERTIFY_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// PDF pages to read; later pages are ignored.
    #[arg(long, env = "CERTIFY_MAX_PAGES", default_value_t = 3)]
    max_pages: usize,

    /// OCR fragments of this many characters or fewer are discarded.
    #[arg(long, env = "CERTIFY_MIN_FRAGMENT_LEN", default_value_t = 10)]
    min_fragment_len: usize,

    /// Minimum length of the extracted text.
    #[arg(long, env = "CERTIFY_MIN_TEXT_LEN", default_value_t = 50)]
    min_text_len: usize,

    /// Distinct certificate indicator words required.
    #[arg(long, env = "CERTIFY_MIN_INDICATORS", default_value_t = 2)]
    min_indicators: usize,

    /// Preprocessing techniques, comma-separated.
    #[arg(long, env = "CERTIFY_TECHNIQUES", value_delimiter = ',',
          default_value = "original,grayscale,binarize,adaptive_denoise")]
    techniques: Vec<String>,

    /// Concurrent preprocessing / OCR jobs (default: CPU count).
    #[arg(short, long, env = "CERTIFY_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Overall time budget in seconds (0 disables).
    #[arg(long, env = "CERTIFY_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// OCR engine to use.
    #[arg(long, env = "CERTIFY_ENGINE", value_enum, default_value = "command")]
    engine: EngineArg,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_CMD")]
    tesseract_cmd: Option<PathBuf>,

    /// Tesseract language model.
    #[arg(long, env = "CERTIFY_LANG", default_value = "eng")]
    lang: String,

    /// Output structured JSON instead of a one-line summary.
    #[arg(long, env = "CERTIFY_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "CERTIFY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CERTIFY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CERTIFY_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum EngineArg {
    /// The `tesseract` executable.
    Command,
    /// libtesseract linked in-process (requires the `tesseract` feature).
    Library,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.print_rules;
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

    let rules = match cli.rules {
        Some(ref path) => RuleSet::from_json_file(path)
            .with_context(|| format!("Failed to load rules from {:?}", path))?,
        None => RuleSet::default(),
    };

    // ── Print-rules mode ─────────────────────────────────────────────────
    if cli.print_rules {
        let json = serde_json::to_string_pretty(&rules.to_spec())
            .context("Failed to serialise rule table")?;
        println!("{json}");
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input file is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ClassificationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, rules, progress_cb)?;

    // ── Read submission ──────────────────────────────────────────────────
    let mut submission = if cli.base64 {
        let encoded = tokio::fs::read_to_string(&input)
            .await
            .with_context(|| format!("Failed to read {:?}", input))?;
        let mut s = Submission::from_encoded(&encoded).context("Failed to decode payload")?;
        if let Some(name) = input.file_stem().and_then(|n| n.to_str()) {
            s = s.with_filename(name);
        }
        s
    } else {
        load_submission(&input)
            .await
            .with_context(|| format!("Failed to read {:?}", input))?
    };
    if let Some(ref mime) = cli.media_type {
        submission = submission.with_media_hint(mime.clone());
    }
    if let Some(ref user) = cli.username {
        submission = submission.with_username(user.clone());
    }

    // ── Run classification ───────────────────────────────────────────────
    match classify(submission, &config).await {
        Ok(output) => {
            if cli.json {
                let json = serde_json::to_string_pretty(&output)
                    .context("Failed to serialise output")?;
                println!("{json}");
            } else {
                println!("{}\t{}", output.category, output.points);
                if !cli.quiet {
                    eprintln!(
                        "{}",
                        dim(&format!(
                            "   {} page(s), {} variant(s), {} chars, matched {:?}, {}ms",
                            output.stats.pages,
                            output.stats.variants,
                            output.stats.text_chars,
                            output.matched_pattern.as_deref().unwrap_or("-"),
                            output.stats.total_duration_ms,
                        ))
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            let report = FailureReport::new(&e, cli.username.as_deref());
            if cli.json {
                let json = serde_json::to_string_pretty(&report)
                    .context("Failed to serialise failure report")?;
                println!("{json}");
            } else {
                eprintln!("{} {}: {}", red("error"), bold(&report.error_kind.to_string()), e);
            }
            std::process::exit(exit_code(report.error_kind));
        }
    }
}

/// Content rejections exit 2, everything else 1.
fn exit_code(kind: ErrorKind) -> i32 {
    match kind.status_hint() {
        422 => 2,
        _ => 1,
    }
}

/// Map CLI args to `ClassifierConfig`.
fn build_config(
    cli: &Cli,
    rules: RuleSet,
    progress: Option<ProgressCallback>,
) -> Result<ClassifierConfig> {
    let techniques = cli
        .techniques
        .iter()
        .map(|name| {
            Technique::parse(name).with_context(|| format!("Unknown technique '{}'", name.trim()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut builder = ClassifierConfig::builder()
        .dpi(cli.dpi)
        .max_pages(cli.max_pages)
        .min_fragment_len(cli.min_fragment_len)
        .min_text_len(cli.min_text_len)
        .min_indicators(cli.min_indicators)
        .techniques(techniques)
        .ocr_language(cli.lang.clone())
        .rules(rules);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    builder = if cli.timeout == 0 {
        builder.no_timeout()
    } else {
        builder.timeout(Duration::from_secs(cli.timeout))
    };
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;
    let ocr = config.ocr.clone();

    let engine = match cli.engine {
        EngineArg::Command => {
            let mut engine = TesseractCommand::new(ocr);
            if let Some(ref program) = cli.tesseract_cmd {
                engine = engine.with_program(program.clone());
            }
            Arc::new(engine) as Arc<dyn certify_points::OcrEngine>
        }
        EngineArg::Library => library_engine(ocr)?,
    };

    config.engine = Some(engine);
    Ok(config)
}

#[cfg(feature = "tesseract")]
fn library_engine(
    ocr: certify_points::OcrSettings,
) -> Result<Arc<dyn certify_points::OcrEngine>> {
    Ok(Arc::new(certify_points::pipeline::ocr::LibTesseract::new(ocr)))
}

#[cfg(not(feature = "tesseract"))]
fn library_engine(
    _ocr: certify_points::OcrSettings,
) -> Result<Arc<dyn certify_points::OcrEngine>> {
    anyhow::bail!("--engine library requires building with the `tesseract` feature")
}
