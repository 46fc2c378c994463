//! agentry - run recurring agents from a configuration directory.
//!
//! Usage:
//!   agentry run <config-dir>              Start every configured agent
//!   agentry validate <config-dir>         Validate agents.json / agents.yaml
//!   agentry list <config-dir>             List resolved agent configurations
//!   agentry next <config-dir>             Show upcoming executions
//!   agentry trigger <config-dir> <name>   Run one agent once

use agentry::scheduler::{STATUS_DATE_FORMAT, format_duration};
use agentry::{
    AgentConfiguration, AgentRegistry, ConfigError, ConfigurationDocument, ConfigurationRegistry,
    FileLoader, ScheduleKind, Source, Task, TaskCatalog, next_aligned_instant,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// agentry - an embeddable agent scheduler
#[derive(Parser)]
#[command(name = "agentry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every configured agent and run until Ctrl+C
    Run {
        /// Directory containing agents.json and/or agents.yaml
        #[arg(value_name = "CONFIG_DIR")]
        config_dir: PathBuf,

        /// Only start agents whose implementation lies within this scope
        #[arg(short, long, default_value = "")]
        scope: String,
    },

    /// Validate agent configurations without running
    Validate {
        /// Directory containing agents.json and/or agents.yaml
        #[arg(value_name = "CONFIG_DIR")]
        config_dir: PathBuf,
    },

    /// List resolved agent configurations
    List {
        /// Directory containing agents.json and/or agents.yaml
        #[arg(value_name = "CONFIG_DIR")]
        config_dir: PathBuf,
    },

    /// Show the upcoming executions of each agent
    Next {
        /// Directory containing agents.json and/or agents.yaml
        #[arg(value_name = "CONFIG_DIR")]
        config_dir: PathBuf,

        /// Number of cron executions to show per agent
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,
    },

    /// Run one agent's task once, outside its schedule
    Trigger {
        /// Directory containing agents.json and/or agents.yaml
        #[arg(value_name = "CONFIG_DIR")]
        config_dir: PathBuf,

        /// Agent name
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config_dir, scope } => {
            run_agents(config_dir, scope).await?;
        }
        Commands::Validate { config_dir } => {
            validate_configuration(config_dir)?;
        }
        Commands::List { config_dir } => {
            list_agents(config_dir)?;
        }
        Commands::Next { config_dir, count } => {
            show_next(config_dir, count)?;
        }
        Commands::Trigger { config_dir, name } => {
            trigger_agent(config_dir, name).await?;
        }
    }

    Ok(())
}

/// Every file-backed document present in `dir`, in precedence order.
fn load_documents(dir: &Path) -> Result<Vec<(Source, ConfigurationDocument)>, ConfigError> {
    let loader = FileLoader::new(dir);
    let mut documents = Vec::new();
    for source in Source::FILES {
        if let Some(document) = loader.try_load(source)? {
            documents.push((source, document));
        }
    }
    Ok(documents)
}

/// Build a registry whose catalog holds one command task per implementation
/// that names a `command`.
fn build_registry(dir: &Path) -> Result<AgentRegistry, Box<dyn std::error::Error>> {
    let documents = load_documents(dir)?;
    if documents.is_empty() {
        return Err(format!("No configuration files found in {}", dir.display()).into());
    }

    let mut configurations = ConfigurationRegistry::new();
    for (source, document) in &documents {
        configurations.load_document(*source, document);
    }

    Ok(AgentRegistry::new(command_catalog(&documents)).with_configurations(configurations))
}

/// Register each implementation's command from the highest-precedence
/// document that names one.
fn command_catalog(documents: &[(Source, ConfigurationDocument)]) -> TaskCatalog {
    let mut catalog = TaskCatalog::new();

    for (_, document) in documents.iter().rev() {
        for entry in &document.agents {
            let Some(implementation) = entry.agent.implementation_id() else {
                continue;
            };
            if catalog.contains(implementation) {
                continue;
            }
            let Some(spec) = &entry.command else {
                continue;
            };

            let task = match spec.to_task(implementation) {
                Ok(task) => Arc::new(task) as Arc<dyn Task>,
                Err(e) => {
                    warn!(implementation = %implementation, error = %e, "Skipping agent");
                    continue;
                }
            };
            if let Err(e) = catalog.register_task(entry.agent.clone(), task) {
                warn!(implementation = %implementation, error = %e, "Skipping agent");
            }
        }
    }

    catalog
}

/// Start every agent and run until Ctrl+C.
async fn run_agents(config_dir: PathBuf, scope: String) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading agents from: {}", config_dir.display());

    let registry = build_registry(&config_dir)?;
    let discovered = registry.discover(&scope);

    if discovered == 0 {
        warn!("No runnable agents found in {}", config_dir.display());
        return Ok(());
    }

    info!("Registered {} agent(s):", discovered);
    for agent in registry.agents() {
        let config = agent.config();
        info!(
            "  - {} ({} '{}', source: {})",
            config.name(),
            config.kind(),
            config.schedule(),
            config.source()
        );
    }

    for (name, e) in registry.start_all().await {
        error!("Agent '{}' failed to start: {}", name, e);
    }

    info!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    let stopped = registry.stop_all().await;
    info!("Stopped {} agent(s)", stopped);

    for name in registry.names() {
        if let Ok(json) = registry.status_json(&name) {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Resolve each implementation to its highest-precedence configuration.
fn resolved_configurations(configurations: &ConfigurationRegistry) -> Vec<AgentConfiguration> {
    configurations
        .implementations()
        .filter_map(|implementation| configurations.highest_precedence(implementation))
        .cloned()
        .collect()
}

/// Validate configuration files without running.
fn validate_configuration(config_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating agents in: {}", config_dir.display());

    let documents = match load_documents(&config_dir) {
        Ok(documents) => documents,
        Err(e) => {
            error!("Validation failed: {}", e);
            return Err(e.into());
        }
    };

    let mut failures = 0;
    let mut valid = 0;
    for (source, document) in &documents {
        for entry in &document.agents {
            let result = entry
                .agent
                .build_with_source(*source)
                .and_then(|config| config.validate().map(|_| config));
            match result {
                Ok(config) => {
                    valid += 1;
                    info!("  - {} ({}): OK", config.name(), source);
                }
                Err(e) => {
                    failures += 1;
                    error!(
                        "  - {} ({}): {}",
                        entry.agent.implementation_id().unwrap_or("<unnamed>"),
                        source,
                        e
                    );
                }
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} invalid agent configuration(s)", failures).into());
    }

    info!("All {} agent configuration(s) are valid", valid);
    Ok(())
}

/// List resolved agent configurations.
fn list_agents(config_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut configurations = ConfigurationRegistry::new();
    configurations.load(&FileLoader::new(&config_dir));
    let resolved = resolved_configurations(&configurations);

    if resolved.is_empty() {
        println!("No agents found in {}", config_dir.display());
        return Ok(());
    }

    println!("Agents in {}:", config_dir.display());
    println!();

    for config in &resolved {
        println!("Name: {}", config.name());
        println!("  Implementation: {}", config.implementation());
        println!("  Schedule: {} '{}'", config.kind(), config.schedule());
        if config.kind() == ScheduleKind::Interval {
            println!("  Aligned: {}", config.modulate());
        }
        println!("  Statistics: {}", config.statistics());
        println!("  Source: {}", config.source());

        let candidates = configurations.candidates(config.implementation());
        if candidates.len() > 1 {
            let sources: Vec<String> = candidates.iter().map(|c| c.source().to_string()).collect();
            println!("  Candidates: {}", sources.join(", "));
        }
        println!();
    }

    println!("History size: {}", configurations.global().history_size());

    Ok(())
}

/// Print upcoming executions for each resolved agent.
fn show_next(config_dir: PathBuf, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut configurations = ConfigurationRegistry::new();
    configurations.load(&FileLoader::new(&config_dir));
    let now = Local::now();

    for config in resolved_configurations(&configurations) {
        println!("{}:", config.name());
        match config.kind() {
            ScheduleKind::Cron => {
                let schedule = config.cron()?;
                let upcoming = schedule.upcoming(&now, count);
                if upcoming.is_empty() {
                    println!("  no future executions");
                }
                for at in upcoming {
                    println!("  {}", at.format(STATUS_DATE_FORMAT));
                }
            }
            ScheduleKind::Interval => {
                let interval = config.interval()?;
                if config.modulate() {
                    let first = next_aligned_instant(&interval, &now);
                    println!(
                        "  every {}, first at {}",
                        interval,
                        first.format(STATUS_DATE_FORMAT)
                    );
                } else {
                    println!("  every {} after start", interval);
                }
            }
        }
    }

    Ok(())
}

/// Run a single agent once and report the outcome.
async fn trigger_agent(
    config_dir: PathBuf,
    name: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = build_registry(&config_dir)?;
    registry.discover("");

    if let Err(e) = registry.find_by_name(&name) {
        error!("Agent '{}' not found", name);
        error!("Available agents: {}", registry.names().join(", "));
        return Err(e.into());
    }

    info!("Triggering agent '{}'...", name);
    registry.run_now(&name).await?;

    let status = registry.status(&name)?;
    match status.last_run_duration {
        Some(duration) => info!("Agent '{}' finished in {}", name, format_duration(duration)),
        None => warn!("Agent '{}' did not complete successfully", name),
    }

    Ok(())
}
