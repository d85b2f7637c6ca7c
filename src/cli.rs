use crate::{
    config::Config,
    document::{DocumentSpec, OutputSpec},
    service::ConversionService,
    util::{ensure_dir, now_rfc3339, split_pair},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "wkconvert")]
#[command(about = "Convert HTML to PDF with an external renderer (wkhtmltopdf)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./wkconvert.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the effective environment and whether the renderer is present.
    Doctor {},
    Convert(ConvertArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Page to fetch and convert.
    #[arg(long, conflicts_with = "html_file", required_unless_present = "html_file")]
    pub url: Option<String>,
    /// HTML file piped to the renderer's stdin.
    #[arg(long)]
    pub html_file: Option<PathBuf>,
    /// Output PDF path, or `-` for stdout.
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long)]
    pub header_url: Option<String>,
    #[arg(long)]
    pub footer_url: Option<String>,
    #[arg(long)]
    pub header_left: Option<String>,
    #[arg(long)]
    pub header_center: Option<String>,
    #[arg(long)]
    pub header_right: Option<String>,
    #[arg(long)]
    pub footer_left: Option<String>,
    #[arg(long)]
    pub footer_center: Option<String>,
    #[arg(long)]
    pub footer_right: Option<String>,
    /// KEY=VALUE, repeatable.
    #[arg(long = "cookie")]
    pub cookies: Vec<String>,
    /// Extra renderer option as KEY=VALUE (passed as --KEY VALUE), repeatable.
    #[arg(long = "param")]
    pub params: Vec<String>,
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Echo renderer stderr at debug level as it arrives.
    #[arg(long)]
    pub debug: bool,
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Convert(convert_args) => convert(&cfg, convert_args),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("wkconvert.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout may carry the PDF, so console logging goes to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let env = cfg.environment().with_env_overrides();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "checked_at": now_rfc3339(),
            "environment": &env,
            "executable_found": env.executable_path.is_file(),
            "temp_dir_found": env.temp_dir.is_dir(),
        }))?
    );
    Ok(())
}

fn convert(cfg: &Config, args: &ConvertArgs) -> Result<()> {
    let mut env = cfg.environment().with_env_overrides();
    if let Some(ms) = args.timeout_ms {
        env = env.with_timeout(Duration::from_millis(ms));
    }
    if args.debug {
        env = env.with_debug(true);
    }

    let mut doc = match (&args.url, &args.html_file) {
        (Some(url), _) => DocumentSpec::from_url(url),
        (None, Some(path)) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("reading html: {}", path.display()))?;
            DocumentSpec::from_html(html)
        }
        (None, None) => return Err(anyhow!("either --url or --html-file is required")),
    };
    doc.header_url = args.header_url.clone();
    doc.footer_url = args.footer_url.clone();
    doc.header_left = args.header_left.clone();
    doc.header_center = args.header_center.clone();
    doc.header_right = args.header_right.clone();
    doc.footer_left = args.footer_left.clone();
    doc.footer_center = args.footer_center.clone();
    doc.footer_right = args.footer_right.clone();
    doc.cookies = args.cookies.iter().map(|c| split_pair(c)).collect();
    doc.extra_params = args.params.iter().map(|p| split_pair(p)).collect();

    let output = if args.out.as_os_str() == "-" {
        OutputSpec::to_stream(std::io::stdout())
    } else {
        OutputSpec::to_file(&args.out)
    };

    ConversionService::new(env)
        .convert(&doc, output)
        .with_context(|| "conversion failed")?;

    if args.out.as_os_str() != "-" {
        info!("wrote {}", args.out.display());
    }
    Ok(())
}
