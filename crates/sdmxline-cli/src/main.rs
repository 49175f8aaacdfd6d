//! sdmxline - CLI for SDMX-JSON statistical dataset pipelines
//!
//! Retrieves OECD datasets partition by partition and keeps the latest
//! state of every series in a local store.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "sdmxline")]
#[command(about = "Retrieve SDMX-JSON statistical datasets into a local series store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./sdmxline.toml or ~/.config/sdmxline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch datasets into the store
    Fetch(cmd::fetch::FetchArgs),
    /// List known datasets
    Datasets,
    /// Show a stored dataset
    Show(cmd::show::ShowArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    sdmxline_core::install_signal_handlers()?;

    // Progress context (TTY auto-detect)
    let progress = sdmxline_core::ProgressContext::new();

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    sdmxline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // Config file defaults, CLI overrides
    sdmxline_core::set_http_config(sdmxline_core::HttpConfig {
        read_timeout: std::time::Duration::from_secs(
            cli.read_timeout.unwrap_or(config.http.read_timeout),
        ),
        max_retries: cli.max_retries.unwrap_or(config.http.max_retries),
    });

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, &progress),
        Command::Datasets => cmd::datasets::run(&config),
        Command::Show(args) => cmd::show::run(args, &config),
        Command::Config => {
            let mut table = cmd::table(&["Setting", "Value"]);
            table.add_row(vec!["OECD base URL", &config.oecd.base_url]);
            table.add_row(vec![
                "Datasets",
                &config.registry().codes().join(", "),
            ]);
            table.add_row(vec!["Store directory", &config.store.dir.display().to_string()]);
            table.add_row(vec!["Cache directory", &config.cache.dir.display().to_string()]);
            table.add_row(vec![
                "Reuse cache",
                if config.cache.reuse { "yes" } else { "no" },
            ]);
            table.add_row(vec![
                "Keep downloads",
                if config.cache.keep_downloads { "yes" } else { "no" },
            ]);
            table.add_row(vec![
                "Workers",
                &format!("{} (max: {})", config.workers.default, config.workers.max),
            ]);
            table.add_row(vec![
                "Read timeout",
                &format!("{}s", config.http.read_timeout),
            ]);
            table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
