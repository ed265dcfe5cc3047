use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyclaw::config::Config;
use keyclaw::providers::ProviderRegistry;
use keyclaw::report::{self, ReportFormat};
use keyclaw::session::{self, SessionOptions};
use keyclaw::validator::CancelFlag;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

const EXIT_CLEAN: i32 = 0;
const EXIT_FINDINGS: i32 = 1;
const EXIT_OPERATIONAL_ERROR: i32 = 2;

/// `keyclaw` - find leaked AI provider API keys before someone else does.
#[derive(Parser, Debug)]
#[command(name = "keyclaw")]
#[command(version)]
#[command(about = "Scan repositories for leaked AI provider credentials.", long_about = None)]
struct Cli {
    /// Path to config.toml (default: ~/.keyclaw/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan one or more targets for leaked credentials
    #[command(long_about = "\
Scan targets for leaked AI provider credentials.

A target is a local directory or a remote repository URL. Remote \
targets are shallow-cloned into a temporary directory that is \
removed when the scan finishes.

Examples:
  keyclaw scan .
  keyclaw scan https://github.com/acme/widgets --validate
  keyclaw scan ~/src/app --format sarif --output findings.sarif
  keyclaw scan . --providers openai,anthropic")]
    Scan {
        /// Local paths or repository URLs to scan
        #[arg(required = true)]
        targets: Vec<String>,

        /// Probe found keys against provider endpoints
        #[arg(long)]
        validate: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated provider names to scan for (default: all)
        #[arg(long, value_delimiter = ',')]
        providers: Vec<String>,

        /// Lines of context captured around each finding
        #[arg(long)]
        context_lines: Option<usize>,

        /// Drop findings with entropy below this floor
        #[arg(long)]
        min_entropy: Option<f64>,

        /// Skip files larger than this many bytes
        #[arg(long)]
        max_file_size: Option<u64>,

        /// Per-probe timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Maximum probes in flight
        #[arg(long)]
        max_concurrent: Option<usize>,
    },

    /// List supported providers and their detection patterns
    Providers,
}

fn resolve_options(cli_config: Option<&PathBuf>, cli: &Commands) -> Result<(SessionOptions, Config)> {
    let config = Config::load(cli_config.map(PathBuf::as_path))?;
    let mut options = SessionOptions::from_config(&config);

    if let Commands::Scan {
        validate,
        providers,
        context_lines,
        min_entropy,
        max_file_size,
        timeout,
        max_concurrent,
        ..
    } = cli
    {
        if *validate {
            options.validate = true;
        }
        if !providers.is_empty() {
            options.provider_filter = providers.clone();
        }
        if let Some(lines) = context_lines {
            options.context_lines = *lines;
        }
        if let Some(floor) = min_entropy {
            options.min_entropy = Some(*floor);
        }
        if let Some(cap) = max_file_size {
            options.max_file_size = *cap;
        }
        if let Some(secs) = timeout {
            options.timeout = Duration::from_secs(*secs);
        }
        if let Some(limit) = max_concurrent {
            options.max_concurrent = *limit;
        }
    }

    Ok((options, config))
}

fn unknown_providers(options: &SessionOptions) -> Vec<String> {
    let registry = ProviderRegistry::global();
    options
        .provider_filter
        .iter()
        .filter(|name| registry.get(name).is_none())
        .cloned()
        .collect()
}

async fn run_scan(
    targets: Vec<String>,
    format: ReportFormat,
    output: Option<PathBuf>,
    options: SessionOptions,
    config: &Config,
) -> Result<i32> {
    let unknown = unknown_providers(&options);
    if !unknown.is_empty() {
        anyhow::bail!(
            "unknown provider(s): {} (see `keyclaw providers`)",
            unknown.join(", ")
        );
    }

    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, finishing in-flight work");
            ctrl_c_flag.cancel();
        }
    });

    let session = session::run(&targets, &options, cancel).await;
    let rendered = report::render(&session, format, &config.redaction)?;

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            file.write_all(rendered.as_bytes())?;
            eprintln!("report written to {}", path.display());
        }
        None => print!("{rendered}"),
    }

    let operational_failure = session.results.iter().any(|r| !r.errors.is_empty());
    if operational_failure {
        Ok(EXIT_OPERATIONAL_ERROR)
    } else if session.has_findings() {
        Ok(EXIT_FINDINGS)
    } else {
        Ok(EXIT_CLEAN)
    }
}

fn print_providers() {
    let registry = ProviderRegistry::global();
    println!("{} supported providers:\n", registry.len());
    for provider in registry.iter() {
        println!("  {:<14} {}", provider.name(), provider.display_name());
        for pattern in provider.patterns() {
            println!("    pattern  {}", pattern.name);
        }
        println!("    endpoint {}", provider.validation_endpoint());
    }
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match &cli.command {
        Commands::Providers => {
            print_providers();
            EXIT_CLEAN
        }
        command @ Commands::Scan {
            targets,
            format,
            output,
            ..
        } => {
            let result = match resolve_options(cli.config.as_ref(), command) {
                Ok((options, config)) => {
                    run_scan(targets.clone(), *format, output.clone(), options, &config).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    EXIT_OPERATIONAL_ERROR
                }
            }
        }
    };

    std::process::exit(exit_code);
}
