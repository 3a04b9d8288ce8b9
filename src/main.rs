//! Air-quality harvest - Main binary
//!
//! Harvests the latest WAQI readings for every station inside the configured
//! bounding box and appends them to the `air_quality` warehouse table.
//!
//! Usage:
//!   cargo run --release                                 # One run, exit 0 on success
//!   cargo run --release -- --config air_quality.toml    # Explicit config file
//!   cargo run --release -- --daemon                     # Run daily on the configured schedule
//!   cargo run --release -- --daemon --endpoint 8080     # Daemon plus HTTP status endpoint
//!
//! Environment:
//!   WAQI_API_TOKEN - WAQI API token (required)
//!   WAREHOUSE_*    - warehouse connection overrides
//!   RUST_LOG       - log filter (default: info)

use aqi_harvest::config::AppConfig;
use aqi_harvest::daemon::Daemon;
use aqi_harvest::endpoint;
use aqi_harvest::logging::init_logging;
use aqi_harvest::pipeline::Pipeline;
use std::env;
use std::path::PathBuf;
use std::process;

struct Args {
    config: Option<PathBuf>,
    daemon: bool,
    endpoint_port: Option<u16>,
}

fn usage(program: &str) -> String {
    format!("Usage: {} [--config PATH] [--daemon] [--endpoint PORT]", program)
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let program = args.first().map(String::as_str).unwrap_or("aqi_harvest");
    let mut parsed = Args {
        config: None,
        daemon: false,
        endpoint_port: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| format!("--config requires a path\n{}", usage(program)))?;
                parsed.config = Some(PathBuf::from(path));
                i += 2;
            }
            "--daemon" => {
                parsed.daemon = true;
                i += 1;
            }
            "--endpoint" => {
                let port = args
                    .get(i + 1)
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(|| format!("--endpoint requires a port number\n{}", usage(program)))?;
                parsed.endpoint_port = Some(port);
                i += 2;
            }
            "-h" | "--help" => return Err(usage(program)),
            other => return Err(format!("Unknown argument: {}\n{}", other, usage(program))),
        }
    }

    if parsed.endpoint_port.is_some() && !parsed.daemon {
        return Err(format!("--endpoint is only available with --daemon\n{}", usage(program)));
    }

    Ok(parsed)
}

fn main() {
    init_logging();

    let raw: Vec<String> = env::args().collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(1);
        }
    };

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("Initialization failed: {}", e);
            process::exit(1);
        }
    };

    if !args.daemon {
        let report = pipeline.run();
        process::exit(if report.succeeded() { 0 } else { 1 });
    }

    let schedule = match config.schedule() {
        Ok(schedule) => schedule,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    let daemon = Daemon::new(pipeline, schedule);

    if let Some(port) = args.endpoint_port {
        let latest = daemon.latest_report();
        std::thread::spawn(move || {
            if let Err(e) = endpoint::start_endpoint_server(port, latest) {
                log::error!("Endpoint server error: {}", e);
            }
        });
    }

    daemon.run();
}
