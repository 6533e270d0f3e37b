use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Loads Lua object scripts and key configs, then replays recorded input \
             through the action binding table",
    version
)]
pub struct Args {
    /// Lua object script defining `create(self)`; may be repeated
    #[arg(long = "object", value_name = "LUA")]
    pub objects: Vec<PathBuf>,

    /// Key config to apply after the objects are created (`.cfg` console file
    /// or `.lua`); may be repeated
    #[arg(long = "config", value_name = "FILE")]
    pub configs: Vec<PathBuf>,

    /// Console line to run after the configs, e.g. `bind SDLK_p "pause()"`; may be repeated
    #[arg(long = "command", value_name = "LINE")]
    pub commands: Vec<String>,

    /// JSON array of recorded input events to replay
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Path to write the final binding table as JSON
    #[arg(long)]
    pub bindings_json: Option<PathBuf>,

    /// Path to write the actions fired during replay as JSON (requires --events)
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Log registrations and rebinds
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.event_log_json.is_some() && self.events.is_none() {
            bail!("--event-log-json requires --events");
        }
        Ok(())
    }

    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
