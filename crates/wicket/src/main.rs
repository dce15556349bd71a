//! Wicket - Entry point
//!
//! Loads configuration, installs telemetry and serves the demo application.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use wicket::config::{ConfigLoader, DEFAULT_ENV_PREFIX};
use wicket::demo::demo_app;
use wicket::server::ConcurrencyManager;
use wicket::telemetry::init_telemetry;

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Start from the development preset.
    development: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut development = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--dev" => development = true,
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("wicket {}", wicket::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self {
            config,
            development,
        }
    }
}

fn print_help() {
    println!(
        r"Wicket - minimal synchronous HTTP application gateway

USAGE:
    wicket [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
        --dev              Start from the development preset
    -h, --help             Print help information
    -v, --version          Print version information

Without --config, ./wicket.toml is loaded when present.

ENVIRONMENT VARIABLES:
    WICKET__SERVER__HTTP_ADDR              Bind address (default: :8888)
    WICKET__SERVER__READ_BUFFER_SIZE       Request read size in bytes (default: 1024)
    WICKET__SERVER__SERVER_NAME            SERVER_NAME override
    WICKET__TELEMETRY__LOGGING__LEVEL      Log filter (default: info)
    WICKET__TELEMETRY__LOGGING__FORMAT     json or pretty (default: json)
    WICKET__TELEMETRY__METRICS__ENABLED    Serve Prometheus metrics (default: false)

DEMO ROUTES:
    /environ    Request context as JSON
    /echo       Echo the request body
    /*          Greeting
"
    );
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loader = if args.development {
        ConfigLoader::new().with_development()
    } else {
        ConfigLoader::new().with_defaults()
    };
    let loader = match &args.config {
        Some(path) => loader.with_file(path)?,
        None => loader.with_optional_file("wicket.toml")?,
    };
    let config = loader
        .with_dotenv()?
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
        .context("failed to load configuration")?;

    init_telemetry(&config.telemetry_config()).context("failed to initialize telemetry")?;

    let mut server = ConcurrencyManager::new(&config.server_config(), demo_app)
        .context("failed to start server")?;
    info!(
        version = wicket::VERSION,
        addr = %server.local_addr(),
        server_name = server.identity().name(),
        "Wicket: serving HTTP"
    );

    server.serve_forever()?;
    Ok(())
}
