use clap::{Parser, Subcommand};
use log::info;
use puente::{
    Command, Config, ConfigError, EnvGate, FeatureToggle, LogObservability, MemoryStore,
    MigrationGate, MultiStore, StoreBackend, Value, METHOD_MISSING_TOTAL, READ_FALLBACK_TOTAL,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "puente")]
#[command(about = "A dual-store router for zero-downtime key-value store migrations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Puente Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exercise the routing rules against in-memory stand-in stores
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/dev.toml")]
        config: PathBuf,
    },
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            run_check(config).await?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

/// Build a router from the configuration and walk it through the
/// routing scenarios an operator cares about before flipping the
/// migration toggle in production.
async fn run_check(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from_file(&config_path)
        .map_err(|e| format!("Failed to load config from {:?}: {}", config_path, e))?;

    init_logging(&config)?;

    info!("Starting puente v{} routing check", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {:?}", config_path);
    info!(
        "Stores: primary '{}', secondary '{}' (in-memory stand-ins)",
        config.primary.name, config.secondary.name
    );

    let primary = Arc::new(MemoryStore::new(config.primary.name.clone()));
    let secondary = Arc::new(MemoryStore::new(config.secondary.name.clone()));

    let gate: Arc<dyn MigrationGate> = match &config.migration.env_override {
        Some(variable) if std::env::var_os(variable).is_some() => {
            info!("Migration toggle read from environment variable {variable}");
            Arc::new(EnvGate::new(variable.clone()))
        }
        _ => Arc::new(FeatureToggle::new(config.migration.use_multi_store)),
    };
    let enabled = gate.multi_store_enabled();
    info!("Dual-store mode enabled: {enabled}");

    let observe = Arc::new(LogObservability::new());
    let router = MultiStore::new(
        primary.clone(),
        secondary.clone(),
        gate,
        observe.clone(),
    );

    // Write/read round-trip through the router
    router.set("check:key", "check-value").await?;
    let value = router.get("check:key").await?;
    if value != Value::bulk("check-value") {
        return Err(format!("round-trip returned unexpected value: {value:?}").into());
    }
    println!("✓ set/get round-trip");

    // Unclassified command passes through to the secondary
    router.call("dbsize", vec![]).await?;
    if enabled && observe.counter_value(METHOD_MISSING_TOTAL, "dbsize") != 1 {
        return Err("dbsize passthrough did not register as unclassified".into());
    }
    println!("✓ unclassified passthrough to secondary");

    if enabled {
        // Seed the secondary behind the router's back and verify the
        // fallback path serves the read
        secondary
            .call(&Command::set("check:fallback", "only-secondary"))
            .await?;
        let value = router.get("check:fallback").await?;
        if value != Value::bulk("only-secondary") {
            return Err(format!("fallback read returned unexpected value: {value:?}").into());
        }
        if observe.counter_value(READ_FALLBACK_TOTAL, "get") != 1 {
            return Err("fallback read did not increment read_fallback_total".into());
        }
        println!("✓ fallback read from secondary");

        // Pipelined block pins one store per run
        router
            .pipelined(|store| async move {
                store.sadd("check:set", "a").await?;
                store.sadd("check:set", "b").await?;
                store.scard("check:set").await
            })
            .await?;
        println!("✓ pipelined block pinned per store");
    } else {
        println!("- dual-store mode disabled; all commands routed to secondary only");
    }

    println!();
    println!("Counters:");
    for (counter, command, value) in observe.snapshot() {
        println!("  {counter}{{command=\"{command}\"}} = {value}");
    }

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating example configuration file: {:?}", output);

    Config::create_example_config(&output)
        .map_err(|e| format!("Failed to generate config: {}", e))?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  puente validate --config {:?}", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!(
                "  Primary store: '{}' ({})",
                config.primary.name, config.primary.backend
            );
            if let Some(addr) = &config.primary.addr {
                println!("    addr: {addr}");
            }
            println!(
                "  Secondary store: '{}' ({})",
                config.secondary.name, config.secondary.backend
            );
            if let Some(addr) = &config.secondary.addr {
                println!("    addr: {addr}");
            }
            println!(
                "  Dual-store mode initially: {}",
                config.migration.use_multi_store
            );
            if let Some(variable) = &config.migration.env_override {
                println!("  Runtime override variable: {variable}");
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(Box::new(e));
        }
    }

    Ok(())
}

fn show_version() {
    println!("puente v{}", env!("CARGO_PKG_VERSION"));
    println!("A dual-store router for zero-downtime key-value store migrations");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Fallback reads: primary first, secondary answers misses");
    println!("  • Dual writes with the secondary store authoritative");
    println!("  • Live migration toggle, consulted fresh on every call");
    println!("  • Pinned pipelined blocks for multi-step operations");
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = match config.logging.level.as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    // Structured events from the library go through tracing. The global
    // `log` slot already belongs to env_logger, so install the tracing
    // subscriber directly instead of through `try_init`, which would
    // also try to claim that slot and fail.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize tracing: {e}"))?;

    info!("Logging initialized at level: {:?}", log_level);
    Ok(())
}
