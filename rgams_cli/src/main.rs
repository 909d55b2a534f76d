mod cli;
mod error_fmt;
mod output;
mod run;

use std::fs;
use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use rgams_config::Logging;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    // Flushes the file log when dropped; must outlive every log call.
    let mut file_guard = None;
    let code = match real_main(&cli, &mut file_guard) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            exit_code_for_error(&err)
        }
    };
    drop(file_guard);
    std::process::exit(code);
}

fn real_main(cli: &Cli, file_guard: &mut Option<WorkerGuard>) -> eyre::Result<()> {
    if matches!(cli.cmd, Commands::Ports) {
        *file_guard = init_tracing(cli, None)?;
        return run::list_ports(cli.json);
    }

    let text = fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("read config {}", cli.config.display()))?;
    let cfg = rgams_config::load_toml(&text).wrap_err("parse config TOML")?;
    cfg.validate().wrap_err("invalid configuration")?;
    *file_guard = init_tracing(cli, Some(&cfg.logging))?;

    let base_dir = cli.config.parent().unwrap_or_else(|| Path::new("."));
    let mut session = run::open_session(&cfg)?;
    run::execute(&mut session, &cli.cmd, &cfg, base_dir, cli.json)
}

/// Console logs go to stderr so stdout carries only data records.
fn init_tracing(cli: &Cli, logging: Option<&Logging>) -> eyre::Result<Option<WorkerGuard>> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if cli.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let mut guard = None;
    let file = match logging.and_then(|l| l.file.as_deref()) {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.and_then(|l| l.rotation.as_deref()) {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(guard)
}
