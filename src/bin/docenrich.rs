//! CLI binary for docenrich.
//!
//! A thin shim over the library: builds a request from flags (or reads one
//! as JSON), runs it and prints the response JSON.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use docenrich::{handle_value, BatchProgressCallback, Pipeline, PipelineConfig, Response};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map, Value};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── Batch progress bar ───────────────────────────────────────────────────

struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Converting");
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_document_start(&self, index: usize, _total: usize) {
        self.bar.set_message(format!("document {}", index + 1));
    }

    fn on_document_complete(&self, index: usize, total: usize, content_len: usize) {
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{content_len:>6} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}/{} documents converted",
            if success_count == total { green("✔") } else { red("⚠") },
            success_count,
            total
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a URL with table analysis and content statistics
  docenrich --url https://example.org/report.pdf --include-tables --enhance-content

  # Convert a local file to HTML with every enrichment
  docenrich --file scan.png --format html --all-features -o result.json

  # Run a request JSON (bare or {"input": {...}}) from a file or stdin
  docenrich --request request.json
  cat request.json | docenrich --request -

  # Print model identifiers and capabilities
  docenrich --model-info

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY           OpenAI API key
  ANTHROPIC_API_KEY        Anthropic API key
  DOCENRICH_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  DOCENRICH_MODEL          Override model ID for every role
"#;

#[derive(Parser, Debug)]
#[command(
    name = "docenrich",
    version,
    about = "Convert documents to Markdown/HTML and enrich them with vision and language models",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Request JSON file, or `-` for stdin.
    #[arg(long, conflicts_with_all = ["url", "file", "model_info"])]
    request: Option<String>,

    /// Document URL.
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,

    /// Local document, sent inline as base64.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Print model info instead of converting.
    #[arg(long)]
    model_info: bool,

    /// Output dialect: markdown or html.
    #[arg(long, env = "DOCENRICH_FORMAT", default_value = "markdown")]
    format: String,

    #[arg(long)]
    include_images: bool,

    #[arg(long)]
    include_tables: bool,

    #[arg(long)]
    include_image_descriptions: bool,

    #[arg(long)]
    include_formula_enrichment: bool,

    #[arg(long)]
    enhance_content: bool,

    /// Enable every enrichment flag.
    #[arg(long)]
    all_features: bool,

    /// OCR languages, comma-separated (fra,eng,…).
    #[arg(long, env = "DOCENRICH_OCR_LANGUAGES", value_delimiter = ',')]
    ocr_languages: Vec<String>,

    /// Write the response JSON here instead of stdout.
    #[arg(short, long, env = "DOCENRICH_OUTPUT")]
    output: Option<PathBuf>,

    /// Print only the rendered content of a single-document response.
    #[arg(long)]
    content_only: bool,

    #[arg(long, env = "DOCENRICH_PROVIDER")]
    provider: Option<String>,

    #[arg(long, env = "DOCENRICH_CONVERSION_MODEL")]
    conversion_model: Option<String>,

    #[arg(long, env = "DOCENRICH_CAPTION_MODEL")]
    caption_model: Option<String>,

    #[arg(long, env = "DOCENRICH_TRANSLATION_MODEL")]
    translation_model: Option<String>,

    /// Use a model for formula descriptions instead of templates.
    #[arg(long, env = "DOCENRICH_FORMULA_MODEL")]
    formula_model: Option<String>,

    #[arg(long, env = "DOCENRICH_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    #[arg(long, env = "DOCENRICH_PAGE_CONCURRENCY", default_value_t = 4)]
    page_concurrency: usize,

    #[arg(long, env = "DOCENRICH_MAX_PAGES")]
    max_pages: Option<usize>,

    #[arg(long, env = "DOCENRICH_MAX_BATCH_SIZE", default_value_t = 20)]
    max_batch_size: usize,

    #[arg(long, env = "DOCENRICH_REQUEST_TIMEOUT", default_value_t = 600)]
    request_timeout: u64,

    #[arg(long, env = "DOCENRICH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[arg(long, env = "DOCENRICH_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    #[arg(long, env = "DOCENRICH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    #[arg(long, env = "DOCENRICH_NO_PROGRESS")]
    no_progress: bool,

    #[arg(short, long, env = "DOCENRICH_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "DOCENRICH_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress && !cli.content_only;
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

    let request = build_request(&cli).await?;
    let config = build_config(&cli, show_progress)?;
    let pipeline = Pipeline::from_config(config).context("Failed to set up models")?;

    let response = handle_value(&pipeline, request).await;
    write_response(&cli, &response)?;

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn build_request(cli: &Cli) -> Result<Value> {
    if let Some(ref source) = cli.request {
        let text = if source == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        } else {
            tokio::fs::read_to_string(source)
                .await
                .with_context(|| format!("Failed to read request from {}", source))?
        };
        return serde_json::from_str(&text).context("Request is not valid JSON");
    }

    let mut request = Map::new();
    if cli.model_info {
        request.insert("get_model_info".into(), json!(true));
        return Ok(Value::Object(request));
    }

    if let Some(ref url) = cli.url {
        request.insert("document_url".into(), json!(url));
    } else if let Some(ref path) = cli.file {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        request.insert("document_base64".into(), json!(STANDARD.encode(&bytes)));
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            request.insert("filename".into(), json!(name));
        }
    } else {
        bail!("Provide --request, --url, --file or --model-info");
    }

    let all = cli.all_features;
    request.insert("output_format".into(), json!(cli.format));
    request.insert("include_images".into(), json!(all || cli.include_images));
    request.insert("include_tables".into(), json!(all || cli.include_tables));
    request.insert(
        "include_image_descriptions".into(),
        json!(all || cli.include_image_descriptions),
    );
    request.insert(
        "include_formula_enrichment".into(),
        json!(all || cli.include_formula_enrichment),
    );
    request.insert("enhance_content".into(), json!(all || cli.enhance_content));
    if !cli.ocr_languages.is_empty() {
        request.insert("ocr_languages".into(), json!(cli.ocr_languages));
    }
    Ok(Value::Object(request))
}

fn build_config(cli: &Cli, show_progress: bool) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .max_batch_size(cli.max_batch_size)
        .request_timeout_secs(cli.request_timeout)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .max_retries(cli.max_retries)
        .dpi(cli.dpi)
        .page_concurrency(cli.page_concurrency);

    if let Some(n) = cli.max_pages {
        builder = builder.max_pages(n);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = cli.conversion_model {
        builder = builder.conversion_model(m);
    }
    if let Some(ref m) = cli.caption_model {
        builder = builder.caption_model(m);
    }
    if let Some(ref m) = cli.translation_model {
        builder = builder.translation_model(m);
    }
    if let Some(ref m) = cli.formula_model {
        builder = builder.formula_model(m);
    }
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }
    builder.build().context("Invalid configuration")
}

fn write_response(cli: &Cli, response: &Response) -> Result<()> {
    let text = match (cli.content_only, response) {
        (true, Response::Document(doc)) => doc.result.content.clone(),
        _ => serde_json::to_string_pretty(response).context("Failed to serialise response")?,
    };

    match cli.output {
        Some(ref path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), path.display());
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}
