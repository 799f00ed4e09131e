use std::process::ExitCode;

use tracing::error;
use vision_relay::{config::RelayConfig, server};

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    server::init_tracing();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            error!("Refusing to start until the relay is configured");
            return ExitCode::FAILURE;
        }
    };

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Relay stopped: {e:#}");
            ExitCode::FAILURE
        }
    }
}
