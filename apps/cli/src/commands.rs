//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use contentgen_artifacts::{bundle_dir, write_bundle};
use contentgen_core::{
    CancellationToken, ContentBundle, JobManager, JobStatus, Pipeline, ProgressReporter,
    RunRequest, StageDiagnostic, StageId, StageStatus, plan, render_plan, validate_plan,
};
use contentgen_generation::ClientRegistry;
use contentgen_shared::{
    AppConfig, ContentGenError, JobId, PipelineConfig, Provider, init_config, load_config,
    validate_api_key,
};

use crate::input::load_product;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contentgen: generate product pages, FAQs and comparisons from product data.
#[derive(Parser)]
#[command(
    name = "contentgen",
    version,
    about = "Generate validated product pages, FAQs and comparison pages from product JSON.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Generation overrides shared by `run` and `batch`.
#[derive(clap::Args)]
pub(crate) struct GenerationArgs {
    /// Generation provider: rules, openrouter or ollama.
    #[arg(long, env = "CONTENTGEN_PROVIDER")]
    pub provider: Option<Provider>,

    /// Model id (defaults to the provider's configured default).
    #[arg(long, env = "CONTENTGEN_MODEL")]
    pub model: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline for one product and wait for the result.
    Run {
        /// Product JSON file.
        #[arg(short, long)]
        product: PathBuf,

        /// Second product JSON file to compare against.
        #[arg(short, long)]
        compare: Option<PathBuf>,

        /// Output root (defaults to `[output] dir` from config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Do not write artifact files.
        #[arg(long)]
        no_write: bool,

        /// Print the full bundle as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Submit one job per product file and wait for all of them.
    Batch {
        /// Product JSON files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Product JSON file every job is compared against.
        #[arg(short, long)]
        compare: Option<PathBuf>,

        /// Output root (defaults to `[output] dir` from config).
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Print the static stage plan.
    Plan {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contentgen=info",
        1 => "contentgen=debug",
        _ => "contentgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            product,
            compare,
            out,
            no_write,
            json,
            generation,
        } => {
            let out = (!no_write).then_some(out);
            cmd_run(&product, compare.as_deref(), out, json, &generation).await
        }
        Command::Batch {
            files,
            compare,
            out,
            generation,
        } => cmd_batch(&files, compare.as_deref(), out, &generation).await,
        Command::Plan { json } => cmd_plan(json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Load config, apply CLI overrides, and build a pipeline.
fn build_pipeline(generation: &GenerationArgs) -> Result<(AppConfig, Pipeline)> {
    let app = load_config()?;

    let mut config = PipelineConfig::from(&app);
    if let Some(provider) = generation.provider {
        config = config.with_provider(provider, &app);
    }
    if let Some(model) = &generation.model {
        config.model = model.clone();
    }
    validate_api_key(&app, config.provider)?;

    info!(provider = %config.provider, model = %config.model, "pipeline configured");
    let registry = Arc::new(ClientRegistry::from_config(&app));
    Ok((app, Pipeline::new(config, registry)))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current stage");
            token.cancel();
        }
    });
}

fn output_root(app: &AppConfig, out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(&app.output.dir))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// `out` is `None` when writing is disabled.
async fn cmd_run(
    product: &Path,
    compare: Option<&Path>,
    out: Option<Option<PathBuf>>,
    json: bool,
    generation: &GenerationArgs,
) -> Result<()> {
    let (app, pipeline) = build_pipeline(generation)?;

    let mut request = RunRequest::new(load_product(product)?);
    if let Some(path) = compare {
        request = request.compare_with(load_product(path)?);
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let reporter = CliProgress::new();
    let bundle = pipeline.run(&request, &reporter, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
    } else {
        print_summary(&bundle);
    }

    if let Some(out) = out {
        let dir = bundle_dir(&output_root(&app, out), &bundle);
        write_bundle(&dir, &bundle)?;
        if !json {
            println!("  Output:      {}", dir.display());
            println!();
        }
    }

    Ok(())
}

async fn cmd_batch(
    files: &[PathBuf],
    compare: Option<&Path>,
    out: Option<PathBuf>,
    generation: &GenerationArgs,
) -> Result<()> {
    let (app, pipeline) = build_pipeline(generation)?;
    let other = compare.map(load_product).transpose()?;

    let mut requests = Vec::with_capacity(files.len());
    for path in files {
        let mut request = RunRequest::new(load_product(path)?);
        if let Some(other) = &other {
            request = request.compare_with(other.clone());
        }
        requests.push(request);
    }

    let jobs = JobManager::from_config(Arc::new(pipeline), &app.jobs);
    let mut ids: Vec<JobId> = Vec::with_capacity(requests.len());
    for request in requests {
        ids.push(jobs.submit(request).await);
    }
    info!(count = ids.len(), "batch submitted");

    let interrupted = CancellationToken::new();
    cancel_on_ctrl_c(interrupted.clone());

    let spinner = spinner();
    let mut cancelled = false;
    loop {
        if interrupted.is_cancelled() && !cancelled {
            for id in &ids {
                // Pruned jobs have nothing left to cancel.
                let _ = jobs.cancel(*id).await;
            }
            cancelled = true;
        }

        let mut finished = 0;
        let mut running = 0;
        for id in &ids {
            match jobs.get(*id).await {
                Ok(record) if record.status.is_terminal() => finished += 1,
                Ok(record) if record.status == JobStatus::Running => running += 1,
                Ok(_) => {}
                Err(ContentGenError::JobNotFound(_)) => finished += 1,
                Err(e) => return Err(e.into()),
            }
        }
        spinner.set_message(format!(
            "[{finished}/{}] jobs finished, {running} running",
            ids.len()
        ));
        if finished == ids.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    spinner.finish_and_clear();

    let root = output_root(&app, out);
    let mut failed = 0;
    println!();
    println!("  {:<38} {:<32} {:<10} NOTE", "JOB", "PRODUCT", "STATUS");
    for id in &ids {
        let record = match jobs.get(*id).await {
            Ok(record) => record,
            Err(ContentGenError::JobNotFound(_)) => {
                failed += 1;
                println!(
                    "  {:<38} {:<32} {:<10} pruned before collection",
                    id.to_string(),
                    "-",
                    "-"
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let note = match (&record.result, &record.error) {
            (Some(bundle), _) => {
                let dir = bundle_dir(&root, bundle);
                write_bundle(&dir, bundle)?;
                let degraded = bundle.degraded_stages();
                if degraded.is_empty() {
                    dir.display().to_string()
                } else {
                    format!("{} (degraded: {})", dir.display(), stage_list(&degraded))
                }
            }
            (None, Some(error)) => {
                failed += 1;
                error.clone()
            }
            (None, None) => String::new(),
        };
        println!(
            "  {:<38} {:<32} {:<10} {note}",
            record.id.to_string(),
            truncate(&record.product_name, 32),
            record.status.as_str()
        );
    }
    println!();

    if failed > 0 {
        return Err(eyre!("{failed} of {} job(s) did not complete", ids.len()));
    }
    Ok(())
}

fn cmd_plan(json: bool) -> Result<()> {
    let steps = plan();
    validate_plan(&steps)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        print!("{}", render_plan(&steps));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_summary(bundle: &ContentBundle) {
    println!();
    println!("  Content generated for {}", bundle.product_page.product_name);
    println!("  Provider:    {}", bundle.meta.provider);
    if let Some(model) = &bundle.meta.model {
        println!("  Model:       {model}");
    }
    println!("  Questions:   {}", bundle.questions.questions.len());
    println!("  FAQs:        {}", bundle.faq.faqs.len());
    if let Some(page) = &bundle.comparison_page {
        println!(
            "  Comparison:  vs {} (cheaper: {}, difference {})",
            page.product_b.name,
            page.comparison.cheaper_product.as_str(),
            contentgen_shared::format_amount(page.comparison.price_difference)
        );
    }
    println!(
        "  Time:        {:.1}s",
        Duration::from_millis(bundle.meta.elapsed_ms).as_secs_f64()
    );
    println!();
    println!("  {:<13} {:<10} {:<9} NOTE", "STAGE", "STATUS", "ATTEMPTS");
    for d in &bundle.diagnostics {
        println!(
            "  {:<13} {:<10} {:<9} {}",
            d.stage.as_str(),
            status_label(d.status),
            d.attempts,
            diagnostic_note(d)
        );
    }
    println!();
}

fn status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Succeeded => "ok",
        StageStatus::Degraded => "degraded",
        StageStatus::Skipped => "skipped",
    }
}

fn diagnostic_note(d: &StageDiagnostic) -> String {
    match d.status {
        StageStatus::Degraded => d
            .violations
            .first()
            .or(d.last_error.as_ref())
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn stage_list(stages: &[StageId]) -> String {
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self { spinner: spinner() }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: StageId) {
        self.spinner.set_message(format!("Running {stage}"));
    }

    fn stage_finished(&self, diagnostic: &StageDiagnostic) {
        if diagnostic.status == StageStatus::Degraded {
            self.spinner.println(format!(
                "  ! {} degraded after {} attempts",
                diagnostic.stage, diagnostic.attempts
            ));
        }
    }

    fn done(&self, _bundle: &ContentBundle) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
