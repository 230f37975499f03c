/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! aftercastctl - administrative access to an Aftercast server's stores.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aftercast::config::{AftercastConfig, ConfigLoader};

mod commands;

use commands::submit::SubmitCommand;

/// Aftercast - aftershock forecast scheduling
#[derive(Parser)]
#[command(name = "aftercastctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server configuration file (defaults to AFTERCAST_CONFIG or the search path)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Local store URL, overriding the configuration
    #[arg(long, global = true)]
    db_url: Option<String>,

    /// Relay store URL, overriding the configuration
    #[arg(long, global = true)]
    relay_db_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a task for the server
    Submit {
        #[command(subcommand)]
        command: SubmitCommand,
    },
    /// List queued tasks
    Tasks {
        /// Only tasks for this event
        #[arg(long)]
        event: Option<String>,
    },
    /// Show the current status of an event's timeline
    Timeline {
        event_id: String,

        /// Also print every stored entry
        #[arg(long)]
        entries: bool,
    },
    /// Collapse an event's timeline into a single snapshot entry
    Rebuild { event_id: String },
    /// Show the heartbeat of both servers
    Relay,
    /// Show recent task log entries
    Logs {
        /// Only entries for this event
        #[arg(long)]
        event: Option<String>,

        /// How far back to look (e.g. "24h", "7d", "1h30m")
        #[arg(long, default_value = "24h")]
        since: String,

        /// Maximum number of entries
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Submit { command } => commands::submit::run(&config, command).await?,
        Commands::Tasks { event } => commands::inspect::tasks(&config, event).await?,
        Commands::Timeline { event_id, entries } => {
            commands::inspect::timeline(&config, &event_id, entries).await?
        }
        Commands::Rebuild { event_id } => commands::rebuild::run(&config, &event_id).await?,
        Commands::Relay => commands::inspect::relay(&config).await?,
        Commands::Logs {
            event,
            since,
            limit,
        } => commands::inspect::logs(&config, event, &since, limit).await?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AftercastConfig> {
    let mut config = ConfigLoader::new()
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(url) = &cli.db_url {
        config.server.db_url = url.clone();
    }
    if let Some(url) = &cli.relay_db_url {
        config.server.relay_db_url = url.clone();
    }
    Ok(config)
}
