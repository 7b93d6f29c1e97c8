use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use camvisor::{CameraRegistry, CamvisorConfig, CamvisorOrchestrator, JsonRegistry};

#[derive(Parser, Debug)]
#[command(name = "camvisor")]
#[command(about = "Supervises capture workers for a fleet of USB and RTSP cameras")]
#[command(version)]
#[command(long_about = "Runs one capture worker per enabled camera in the registry, \
reconnecting failed cameras with backoff, limiting each camera to its configured frame rate \
and keeping the running set in line with the registry as it changes.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camvisor.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting any camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Print the effective configuration (file + environment) and exit
    #[arg(long, help = "Print the configuration after file and environment overrides and exit")]
    show_config: bool,

    /// Dry run mode - load everything but start nothing
    #[arg(long, help = "Load configuration and registry, list the cameras that would start, and exit")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting camvisor v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = CamvisorConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.show_config {
        print!("{}", config.to_toml().context("Failed to render configuration")?);
        return Ok(());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if args.dry_run {
        return dry_run(&config);
    }

    let mut orchestrator = CamvisorOrchestrator::new(config)
        .await
        .context("Failed to create orchestrator")?;

    orchestrator
        .start()
        .await
        .context("Failed to start camera workers")?;

    // Run until SIGINT/SIGTERM
    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("camvisor exited with code: {}", exit_code);

    // Exit with appropriate code for systemd
    std::process::exit(exit_code);
}

fn dry_run(config: &CamvisorConfig) -> Result<()> {
    let registry = JsonRegistry::open(&config.registry.path).with_context(|| {
        format!(
            "Failed to open camera registry {}",
            config.registry.path.display()
        )
    })?;
    camvisor::camera::backend_from_config(&config.capture)
        .context("Capture backend unavailable")?;

    let cameras = registry.list(true);
    println!(
        "✓ Dry run: {} cameras in {}",
        cameras.len(),
        config.registry.path.display()
    );
    for camera in cameras {
        println!(
            "  {} {:<12} {:<4} {:>2} fps  {}  {}",
            if camera.enabled { "+" } else { "-" },
            camera.id,
            camera.kind,
            camera.fps_limit,
            camera.name,
            camera.source
        );
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camvisor={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# camvisor Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every value can be overridden with CAMVISOR_<SECTION>__<KEY>, e.g.");
    println!("# CAMVISOR_WORKER__STOP_TIMEOUT_MS=500");
    println!();

    let default_config = r#"[registry]
# JSON file holding camera definitions (created if missing)
path = "config/cameras.json"

[worker]
# First reconnect wait after a capture failure, in seconds
initial_backoff_secs = 1.5
# Upper bound for the reconnect wait, in seconds
max_backoff_secs = 20.0
# How long stopping a camera waits for its worker before abandoning it
stop_timeout_ms = 2000

[supervisor]
# Reload the registry and reconcile workers this often (0 disables)
reconcile_interval_secs = 5
# Log a status snapshot this often (0 disables)
status_interval_secs = 30
# Upper bound for stopping every worker on shutdown
shutdown_timeout_secs = 10

[capture]
# Capture backend: "synthetic" (test pattern) or "gstreamer" (needs the camera feature)
backend = "synthetic"
# Synthetic source frame rate and size
synthetic_fps = 30
synthetic_width = 320
synthetic_height = 240
"#;

    println!("{}", default_config);
}
