//! Command-line interface for openmhz-player.
//!
//! With no subcommand (or `listen`) the player picks a system, then polls it
//! and plays new calls until interrupted. `systems` and `config` are
//! one-shot helpers.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::{CallSource, FlareSolverrClient, MediaPlayer, OpenMhzClient};
use crate::config::{self, Overrides, Settings};
use crate::core::{Pipeline, PipelineOptions};
use crate::domain::{find_system, System};

/// openmhz-player - play new OpenMHz scanner calls as they come in
#[derive(Parser, Debug)]
#[command(name = "openmhz-player")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Short name of the system (skips the interactive prompt)
    #[arg(long, global = true)]
    pub shortname: Option<String>,

    /// Enable debug mode
    #[arg(long, global = true)]
    pub debug: bool,

    /// FlareSolverr endpoint (default: http://localhost:8191/v1)
    #[arg(long, global = true)]
    pub proxy_url: Option<String>,

    /// Seconds between call listing fetches
    #[arg(long, value_name = "SECS", global = true)]
    pub interval: Option<u64>,

    /// Maximum number of calls waiting to be played
    #[arg(long, global = true)]
    pub queue_capacity: Option<usize>,

    /// Seconds to let in-flight work finish after an interrupt
    #[arg(long, value_name = "SECS", global = true)]
    pub grace_period: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Poll a system and play new calls (default)
    Listen,

    /// List available systems and exit
    Systems,

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Default log filter when RUST_LOG is not set
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            system: self.shortname.clone(),
            proxy_url: self.proxy_url.clone(),
            fetch_interval_secs: self.interval,
            queue_capacity: self.queue_capacity,
            grace_period_secs: self.grace_period,
        }
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = config::load(&self.overrides())?;

        match self.command.unwrap_or(Commands::Listen) {
            Commands::Listen => listen(settings).await,
            Commands::Systems => list_systems(&settings).await,
            Commands::Config => show_config(&settings),
        }
    }
}

fn build_source(settings: &Settings) -> Result<OpenMhzClient> {
    let proxy = FlareSolverrClient::new(&settings.proxy_url, settings.proxy_max_timeout_ms)?;
    Ok(OpenMhzClient::new(&settings.api_base, proxy))
}

/// Startup checks, system selection, then run until interrupted.
///
/// Every error returned from here happens before the loops start.
async fn listen(settings: Settings) -> Result<()> {
    let source = Arc::new(build_source(&settings)?);
    source.health_check().await?;

    let player = Arc::new(MediaPlayer::new(
        settings.media.clone(),
        &settings.download_dir,
    )?);
    player.prepare_download_dir().await?;
    player.check_binaries().await;

    let system = match settings.system.clone() {
        Some(system) => system,
        None => {
            let systems = source.list_systems().await?;
            prompt_for_system(&systems).await?
        }
    };

    Pipeline::new(
        source,
        player,
        system,
        PipelineOptions::from(&settings),
    )
    .spawn()?
    .run_until_interrupt()
    .await
}

async fn list_systems(settings: &Settings) -> Result<()> {
    let source = build_source(settings)?;
    source.health_check().await?;

    let systems = source.list_systems().await?;

    println!();
    println!("{:<20} {:<40} {:<20} {:<8}", "SHORT NAME", "NAME", "LOCATION", "ACTIVE");
    println!("{}", "-".repeat(90));
    for system in &systems {
        let location = match (system.city.is_empty(), system.state.is_empty()) {
            (false, false) => format!("{}, {}", system.city, system.state),
            (false, true) => system.city.clone(),
            (true, false) => system.state.clone(),
            (true, true) => "-".to_string(),
        };
        println!(
            "{:<20} {:<40} {:<20} {:<8}",
            system.short_name,
            truncate(&system.name, 38),
            truncate(&location, 18),
            if system.active { "yes" } else { "no" }
        );
    }
    println!();
    println!("{} system(s)", systems.len());

    Ok(())
}

fn show_config(settings: &Settings) -> Result<()> {
    println!();
    println!("openmhz-player Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    match &settings.config_file {
        Some(path) => println!("Config file:      {}", path.display()),
        None => println!("Config file:      (none, using defaults)"),
    }
    println!("Proxy URL:        {}", settings.proxy_url);
    println!("Proxy timeout:    {} ms", settings.proxy_max_timeout_ms);
    println!("API base:         {}", settings.api_base);
    println!(
        "System:           {}",
        settings.system.as_deref().unwrap_or("(prompt at startup)")
    );
    println!("Fetch interval:   {:?}", settings.fetch_interval);
    println!("Queue capacity:   {}", settings.queue_capacity);
    println!("Grace period:     {:?}", settings.grace_period);
    println!("Download dir:     {}", settings.download_dir.display());
    println!(
        "Binaries:         {} / {} / {}",
        settings.media.ffmpeg, settings.media.ffprobe, settings.media.mpg123
    );
    println!();

    Ok(())
}

/// Log the systems and read a short name from stdin
async fn prompt_for_system(systems: &[System]) -> Result<String> {
    info!("Available systems:");
    for system in systems {
        info!("- {} ({})", system.name, system.short_name);
    }

    print!("Enter the shortName of the system you want to use: ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await
    .context("Input task failed")?
    .context("Error reading user input")?;

    choose_system(systems, &line)
}

/// Validate the user's answer to the system prompt
fn choose_system(systems: &[System], input: &str) -> Result<String> {
    let short_name = input.split_whitespace().next().unwrap_or_default();
    if short_name.is_empty() {
        anyhow::bail!("No system selected");
    }

    if find_system(systems, short_name).is_none() {
        warn!("'{}' is not in the system list; trying it anyway", short_name);
    }

    Ok(short_name.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
