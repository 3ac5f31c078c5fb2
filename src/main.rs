// Main entry point for the scout CLI

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use scout_reporting::cli::{Cli, Commands};
use scout_reporting::commands::{handle_completion, handle_record, handle_upload_events};
use scout_reporting::config;

#[tokio::main]
async fn main() -> Result<()> {
    // Install the default crypto provider (ring) to avoid panics with rustls 0.23+
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load configuration from file (if exists)
    let config = config::Config::load();

    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        "scout_reporting=debug,warn"
    } else {
        "scout_reporting=info,warn"
    };

    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .event_format(scout_reporting::logging::ScoutFormatter)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.verbose {
        info!("Starting scout v{}", env!("CARGO_PKG_VERSION"));
    }

    // Handle config flag
    if cli.config {
        print_config(config.as_ref());
        return Ok(());
    }

    // Handle init_config flag
    if let Some(config_file) = cli.init_config {
        let config = config::Config::default();
        std::fs::write(&config_file, config.to_toml())?;
        println!("Configuration file created: {}", config_file.display());
        println!("\nYou can now edit the file to customize your settings.");
        print_precedence();
        return Ok(());
    }

    // Handle completion flag
    if let Some(shell_type) = cli.completion {
        handle_completion(&shell_type)?;
        return Ok(());
    }

    match &cli.command {
        Some(Commands::UploadEvents(args)) => handle_upload_events(args, config.as_ref()).await,
        Some(Commands::Record(args)) => handle_record(args, config.as_ref()),
        None => {
            warn!("No command provided. Use 'scout --help' for usage.");
            Ok(())
        }
    }
}

fn print_config(config: Option<&config::Config>) {
    println!("Current configuration:");

    if let Some(cfg) = config {
        println!("\n  Configuration file loaded:");
        println!("    Report output root: {}", cfg.output_root().display());
        if let Some(ref es_url) = cfg.upload.es_url {
            println!("    Elasticsearch URL: {}", es_url);
        }
        println!("    Verify TLS certs: {}", cfg.upload.verify_tls_certs);
        println!("    Flush bytes: {}", cfg.upload.flush_bytes);
        println!("    Data stream: {}", cfg.upload.data_stream);
    } else {
        println!("\n  No configuration file loaded");
        println!("  Create one with: scout --init-config .scoutrc.toml");
    }

    println!("\n  Environment variables:");
    for (name, secret) in [
        (config::ENV_ES_URL, false),
        (config::ENV_ES_API_KEY, true),
        (config::ENV_SCOUT_REPORT_OUTPUT_ROOT, false),
    ] {
        match std::env::var(name) {
            Ok(_) if secret => println!("    {}: <set>", name),
            Ok(value) => println!("    {}: {}", name, value),
            Err(_) => println!("    {}: not set", name),
        }
    }

    print_precedence();
}

fn print_precedence() {
    println!("\nConfiguration precedence:");
    println!("  1. Command-line arguments (highest)");
    println!("  2. Environment variables");
    println!("  3. Configuration file");
    println!("  4. Built-in defaults (lowest)");
}
