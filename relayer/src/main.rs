//! Cross-chain bridge relayer entrypoint.
//!
//! Loads the directions and chain gateways named in the config file, runs them until
//! a shutdown signal arrives. Exit codes follow `spec.md` §6: `0` on a clean
//! shutdown, `1` on a configuration error at boot, `2` on an unrecoverable runtime
//! error.

mod config;
mod sig_down;
mod supervisor;
mod telemetry;

use std::process;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _telemetry = telemetry::Telemetry::init();

    let config = match config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            process::exit(1);
        }
    };

    if let Err(e) = supervisor::run(config).await {
        tracing::error!(error = %e, "relayer exited with an error");
        process::exit(2);
    }
}
