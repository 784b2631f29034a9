//! `flyscan`: plan, convert and run Bragg monochromator fly scans.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod scan;

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use eyre::{Result, WrapErr};
use flyscan_config::Config;
use flyscan_core::CrystalGeometry;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, LAST_REQUEST};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    let result = run(cli);
    if let Err(err) = &result {
        tracing::debug!(error = ?err, "exiting with error");
    }
    flush_file_log();

    if let Err(err) = result {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn flush_file_log() {
    if let Some(slot) = FILE_GUARD.get()
        && let Ok(mut guard) = slot.lock()
    {
        guard.take();
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref(), cli.crystal.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cfg, "config loaded");

    match cli.cmd {
        Commands::Plan { range } => {
            let _ = LAST_REQUEST.set(range);
            let geometry = CrystalGeometry::try_from(&cfg.crystal)?;
            scan::print_plan(&cfg, &geometry, &range, cli.json)
        }
        Commands::Convert { energy, angle } => {
            let geometry = CrystalGeometry::try_from(&cfg.crystal)?;
            scan::convert(&geometry, energy, angle, cli.json)
        }
        Commands::Scan {
            range,
            print_frames,
            progress,
        } => {
            let _ = LAST_REQUEST.set(range);
            let geometry = CrystalGeometry::try_from(&cfg.crystal)?;
            scan::run_sim_scan(&cfg, &geometry, &range, print_frames, progress, cli.json)
        }
        Commands::SelfCheck => scan::self_check(&cfg, cli.json),
    }
}

fn load_config(path: Option<&Path>, crystal: Option<&str>) -> Result<Config> {
    let mut cfg = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            flyscan_config::load_toml(&text)?
        }
        None => Config::default(),
    };
    if let Some(name) = crystal {
        cfg.crystal.name = Some(name.to_string());
        cfg.crystal.d_spacing_angstrom = None;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout carries only results. `RUST_LOG`
/// wins over `--log-level`; the optional file layer always writes JSON.
fn init_tracing(json: bool, log_level: &str, logging: &flyscan_config::Logging) -> Result<()> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(log_level)
            .wrap_err_with(|| format!("invalid --log-level '{log_level}'"))?,
    };
    let (pretty, json_layer) = if json {
        let layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter);
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter);
        (Some(layer), None)
    };

    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(Mutex::new(Some(guard)));
            let level = logging.level.as_deref().unwrap_or("info");
            let file_filter = EnvFilter::try_new(level)
                .wrap_err_with(|| format!("invalid logging.level '{level}'"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
