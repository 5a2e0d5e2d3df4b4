#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `nutriscale` command-line front end.

mod app;
mod cli;
mod error_fmt;
mod persist;
mod scale;
mod scan;
mod status;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use nutriscale_config::Logging;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console layer on stderr plus an optional JSON-lines file from `[logging]`.
/// `RUST_LOG` overrides `--log-level` on the console.
fn init_tracing(cli: &Cli, logging: Option<&Logging>) -> Option<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let console: BoxedLayer = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };
    let mut layers = vec![console];

    let mut guard = None;
    if let Some(file) = logging.and_then(|l| l.file.as_deref()) {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "nutriscale.log".into(), |n| n.to_string_lossy().into_owned());
        let rotation = logging.and_then(|l| l.rotation.as_deref()).unwrap_or("never");
        let appender = match rotation {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, g) = tracing_appender::non_blocking(appender);
        let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(level))
                .boxed(),
        );
        guard = Some(g);
    }

    if let Err(e) = tracing_subscriber::registry().with(layers).try_init() {
        eprintln!("logging disabled: {e}");
    }
    guard
}

fn run(cli: &Cli, cfg: &nutriscale_config::Config) -> eyre::Result<()> {
    let json = cli.json;
    match &cli.cmd {
        Commands::Weigh { count, interval_ms } => scale::weigh(cfg, *count, *interval_ms, json),
        Commands::Tare { save } => scale::tare(cfg, save.as_deref(), json),
        Commands::Calibrate {
            grams,
            place_ms,
            save,
        } => scale::calibrate(cfg, *grams, *place_ms, save.as_deref(), json),
        Commands::Scan {
            height_cm,
            body_kg,
            age,
        } => {
            let body = match (height_cm, body_kg, age) {
                (Some(h), Some(w), Some(a)) => Some(scan::Body {
                    height_cm: *h,
                    weight_kg: *w,
                    age: *a,
                }),
                _ => None,
            };
            scan::run_scan(cfg, body, json)
        }
        Commands::Foods { search } => status::foods(cfg, search.as_deref(), json),
        Commands::SelfCheck => status::self_check(cfg, json),
        Commands::Health => status::health(cfg, json),
    }
}

fn report(cli: &Cli, err: &eyre::Report) -> ExitCode {
    tracing::error!(error = %err, "command failed");
    if cli.json {
        println!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
    ExitCode::from(exit_code_for_error(err))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = color_eyre::install() {
        eprintln!("error hook not installed: {e}");
    }

    let cfg = app::load_config(&cli.config, cli.calibration.as_deref());
    let _guard = init_tracing(&cli, cfg.as_ref().ok().map(|c| &c.logging));
    let cfg = match cfg {
        Ok(c) => c,
        Err(e) => return report(&cli, &e),
    };
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match run(&cli, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&cli, &e),
    }
}
