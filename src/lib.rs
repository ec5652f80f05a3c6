pub mod bydhvs;
pub mod config;
pub mod error;
pub mod options;
pub mod prelude;
pub mod utils;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use std::io::Write;

/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(loglevel: &str) {
    let env = env_logger::Env::default().default_filter_or(loglevel);
    let result = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

/// One cycle against every enabled battery, all at the same time.
pub async fn poll_all(config: &Config) -> Vec<(String, PollOutcome)> {
    let engines: Vec<_> = config
        .enabled_batteries()
        .into_iter()
        .map(BydHvs::<TcpTransport>::from_config)
        .collect();

    let cycles = engines.iter().map(|engine| engine.run_poll_cycle());
    let outcomes = futures::future::join_all(cycles).await;

    engines
        .iter()
        .map(|engine| engine.label().to_string())
        .zip(outcomes)
        .collect()
}

pub fn render(label: &str, outcome: &PollOutcome, pretty: bool) -> Result<String> {
    let value = serde_json::json!({
        "battery": label,
        "outcome": outcome,
    });

    let output = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };

    Ok(output)
}

/// Runs the whole application. `Ok(true)` means every battery produced a
/// complete report.
pub async fn app(options: Options) -> Result<bool> {
    let config = match Config::new(options.config_file.clone()) {
        Ok(config) => config,
        Err(err) => {
            init_logging("info");
            error!("Failed to load config: {:?}", err);
            return Err(err);
        }
    };

    init_logging(config.loglevel());
    info!(
        "byd-hvs-bridge {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    config.log_summary();

    let results = poll_all(&config).await;
    if results.is_empty() {
        warn!("no enabled batteries, nothing to do");
    }

    let mut all_complete = true;
    for (label, outcome) in &results {
        if !outcome.is_complete() {
            all_complete = false;
        }
        println!("{}", render(label, outcome, options.pretty)?);
    }

    info!(
        "polled {} batteries, {} complete",
        results.len(),
        results.iter().filter(|(_, o)| o.is_complete()).count()
    );

    Ok(all_complete)
}
