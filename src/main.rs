//! # gatekeep - A Minimal HTTP Gate
//!
//! gatekeep sits in front of another service and answers `GET /` in one of
//! two ways: callers whose User-Agent contains a forbidden substring, or whose
//! address falls in a forbidden network, get a canned HTML page; everyone
//! else is redirected to the configured URL.
//!
//! ## Features
//! - JSON configuration loaded and validated once at startup
//! - User-agent substring and CIDR network block rules
//! - Client address taken from `X-Forwarded-For`/`X-Real-IP` only when the
//!   peer is a loopback proxy
//! - Thread-per-connection serving with per-connection timeouts
use std::env;
use std::net::TcpListener;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

mod client_ip;
mod config;
mod gate;
mod parsers;
mod routing;
mod server;

use config::Config;
use gate::Gate;
use server::Server;

const DEFAULT_CONFIG_PATH: &str = "config.json";

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!(path = %config_path, "Loading configuration");

    // Serving with an empty policy would silently disable blocking, so any
    // load failure stops the process here.
    let config = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "gatekeep requires a valid, non-empty configuration file");
            process::exit(1);
        }
    };
    info!(?config, "Parsed config");

    let listener = match TcpListener::bind(&config.listen_address) {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %config.listen_address, error = %e, "Failed to bind listener");
            process::exit(1);
        }
    };

    let server = Arc::new(Server::new(Gate::new(config)));
    if let Err(e) = server.run(listener) {
        error!(error = %e, "Server error");
        process::exit(1);
    }
}
