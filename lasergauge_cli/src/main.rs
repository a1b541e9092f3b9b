#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;
mod frames;
mod rig;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use lasergauge_config::Config;
use lasergauge_core::CancelToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::commands::Ctx;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg)?;
    cfg.validate()
        .map_err(|e| lasergauge_core::GaugeError::InvalidConfiguration(e.to_string()).report())?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("interrupt received; cancelling");
            cancel.cancel();
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    let ctx = Ctx {
        cfg,
        cancel,
        json: cli.json,
    };
    match cli.cmd {
        Commands::Detect { save_frames } => commands::detect(&ctx, save_frames.as_deref()),
        Commands::DetectFiles { on, off, mask } => {
            commands::detect_files(&ctx, &on, &off, mask.as_deref())
        }
        Commands::Calibrate { start, export_csv } => {
            commands::calibrate(&ctx, start, export_csv.as_deref())
        }
        Commands::Fit {
            samples,
            max_degree,
        } => commands::fit(&ctx, &samples, max_degree),
        Commands::Measure { x, y } => commands::measure(&ctx, x.zip(y)),
        Commands::Scan {
            origin,
            pitch,
            cols,
            rows,
        } => commands::scan(&ctx, origin, pitch, cols, rows),
        Commands::Show => commands::show(&ctx),
        Commands::List => commands::list(&ctx),
        Commands::SelfCheck => commands::self_check(&ctx),
    }
}

/// Missing config file means built-in defaults; a present but broken one is an error.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    lasergauge_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))
}

fn init_tracing(cli: &Cli, cfg: &Config) -> Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    // Console output goes to stderr so stdout stays machine-readable.
    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match cfg.logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file must name a file"))?;
            let appender = match cfg.logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("initialize logging")?;
    Ok(())
}
