use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

mod cli;
mod lua_host;
mod replay;

use cli::Args;
use lua_host::ScriptHost;

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();
    args.validate()?;

    let mut host = ScriptHost::new()?;
    for object in &args.objects {
        host.load_object(object)?;
    }
    for config in &args.configs {
        let report = host.load_config(config)?;
        if !report.is_clean() {
            info!(
                "[host] {} line(s) of {} were skipped",
                report.failures.len(),
                config.display()
            );
        }
    }
    for line in &args.commands {
        host.run_console_line(line)
            .with_context(|| format!("running console line {line:?}"))?;
    }

    if let Some(events_path) = &args.events {
        let events = replay::load_events(events_path)?;
        let summary = host.replay(&events)?;
        println!(
            "[keybind_host] {} event(s) replayed, {} action(s) fired{}",
            summary.events_processed,
            summary.actions_fired,
            if summary.quit_requested { ", quit" } else { "" }
        );
    }

    if let Some(path) = &args.bindings_json {
        write_json(path, &host.snapshot())?;
        println!("[keybind_host] bindings written to {}", path.display());
    }
    if let Some(path) = &args.event_log_json {
        write_json(path, &host.event_log())?;
        println!("[keybind_host] event log written to {}", path.display());
    }

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing JSON output")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
