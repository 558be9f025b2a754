//! Subflow - Automated Subtitle Production Pipeline
//!
//! Entry point: parses arguments, sets up logging to console and file,
//! loads configuration and hands off to the workflow.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subflow::cli::{Args, Commands};
use subflow::config::Config;
use subflow::metadata::Step;
use subflow::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    setup_logging(&config, args.verbose)?;
    info!("Starting Subflow - Automated Subtitle Production Pipeline");

    match args.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            let workflow = Workflow::new(config)?;
            workflow.run_watch().await?;
        }
        Commands::Resume { base, from_step } => {
            let workflow = Workflow::new(config)?;
            workflow.run_resume(&base, from_step).await?;
        }
        Commands::Status { base } => {
            let workflow = Workflow::new(config)?;
            let record = workflow.store().load(&base)?;

            println!("\nJob: {}", base);
            println!("{:<15} {:<10}", "Step", "Complete");
            println!("{}", "-".repeat(25));
            for step in Step::ALL {
                println!(
                    "{:<15} {:<10}",
                    step.as_str(),
                    if record.is_complete(step) { "yes" } else { "no" }
                );
            }
            match &record.ass_hash {
                Some(hash) => println!("Subtitle hash: {}", hash),
                None => println!("Subtitle hash: (none)"),
            }
            println!("Last updated:  {}", record.last_updated.to_rfc3339());
        }
    }

    Ok(())
}

/// Setup logging to both console and a daily-rolling file under the state
/// directory.
fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let log_dir = config.paths.state_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "subflow.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
