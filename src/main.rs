use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mysql_fixture::config::{self, DockerSettings, FileConfig, FixtureOptions};
use mysql_fixture::logging::{self, LoggingConfig};
use mysql_fixture::{DatabaseFixture, DockerCli, MySqlProvider};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "mysql-fixture")]
#[command(about = "Disposable MySQL containers for integration tests", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write debug logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Debug output on the console
    #[arg(short, long)]
    verbose: bool,

    /// Write the log file as JSON lines (with --log-dir)
    #[arg(long)]
    log_json: bool,

    /// Level for forwarded container output (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    container_log_level: String,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Fixture options given on the command line; they win over the file
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Image reference, e.g. mysql:5.6
    #[arg(long, global = true)]
    image: Option<String>,

    /// Database name
    #[arg(long, global = true)]
    database: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Readiness timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// MySQL configuration file to inject into the container
    #[arg(long, global = true)]
    overlay: Option<PathBuf>,

    /// Forward container output to the log before teardown (`--container-logs false` disables it)
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    container_logs: Option<bool>,
}

impl Overrides {
    fn into_options(self) -> FixtureOptions {
        let mut options = FixtureOptions {
            image: self.image,
            database: self.database,
            username: self.username,
            password: self.password,
            startup_timeout_seconds: self.timeout,
            forward_container_logs: self.container_logs,
            ..FixtureOptions::default()
        };
        if let Some(path) = self.overlay {
            options = options.config_overlay(path);
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and print the resolved settings
    Validate,

    /// Start a fixture, run one query, print the first row and stop
    Check {
        /// Statement to run
        #[arg(short, long, default_value = "SELECT 1")]
        query: String,
    },

    /// Start a fixture and keep it running until Ctrl-C
    Up,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging_config = LoggingConfig::default()
        .verbose(cli.verbose)
        .json_file(cli.log_json)
        .with_container_level(logging::parse_level(&cli.container_log_level));
    if let Some(dir) = cli.log_dir {
        logging_config = logging_config.with_log_directory(dir);
    }
    let _log_guard = logging::init_logging(&logging_config)?;

    let file_config = match cli.config {
        Some(ref path) => config::load_file_config(path)
            .with_context(|| format!("Failed to load config file {:?}", path))?,
        None => FileConfig::default(),
    };
    let options = file_config.fixture.merge(cli.overrides.into_options());
    let fixture_config = config::configure(options).context("Invalid fixture configuration")?;
    let docker = file_config.docker;
    config::validate_docker(&docker).context("Invalid [docker] settings")?;

    match cli.command {
        Commands::Validate => {
            println!("✓ Configuration is valid\n");
            println!("Image:           {}", fixture_config.image);
            println!("Database:        {}", fixture_config.database);
            println!("Username:        {}", fixture_config.username);
            println!("Container port:  {}", fixture_config.container_port);
            println!("Startup timeout: {:?}", fixture_config.startup_timeout);
            if let Some(ref overlay) = fixture_config.config_overlay {
                println!(
                    "Config overlay:  {} -> {}",
                    overlay.source.display(),
                    overlay.destination
                );
            }
            println!(
                "Container logs:  {}",
                if fixture_config.forward_container_logs { "forwarded" } else { "off" }
            );
            println!("Docker binary:   {}", docker.binary);
        }

        Commands::Check { query } => {
            let mut fixture = start_fixture(fixture_config, &docker)?;
            let row = fixture.run_query(&query);
            fixture.stop();

            let row = row?;
            let rendered: Vec<String> = row
                .columns
                .iter()
                .zip(row.values.iter())
                .map(|(column, value)| format!("{} = {}", column, value))
                .collect();
            println!("✓ {}", rendered.join(", "));
        }

        Commands::Up => {
            let mut fixture = start_fixture(fixture_config, &docker)?;
            if let Some(endpoint) = fixture.endpoint() {
                println!("✓ MySQL fixture ready");
                println!("Host:     {}", endpoint.host);
                println!("Port:     {}", endpoint.port);
                println!("Database: {}", endpoint.database);
                println!("URL:      {}", endpoint.url());
            }
            println!("\nPress Ctrl-C to stop");

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(tokio::signal::ctrl_c())?;

            info!("Interrupted, stopping fixture");
            fixture.stop();
            println!("✓ Fixture stopped");
        }
    }

    Ok(())
}

fn start_fixture(
    config: mysql_fixture::FixtureConfig,
    docker: &DockerSettings,
) -> Result<DatabaseFixture> {
    let runtime = DockerCli::locate(docker)?;
    if !runtime.is_available() {
        anyhow::bail!("Docker daemon is not reachable via {}", runtime.binary());
    }
    let provider = MySqlProvider::new()?;

    let mut fixture = DatabaseFixture::with_parts(config, runtime, provider);
    println!(
        "Starting {} (timeout {:?})...",
        fixture.config().image,
        fixture.config().startup_timeout
    );
    fixture.start()?;
    Ok(fixture)
}
