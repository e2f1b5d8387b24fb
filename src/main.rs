use std::panic;

use clap::Parser;
use tracing::{error, info};

use clinic_access::{logging, run_probe, AppError, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match clinic_access::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize logging FIRST
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    // NOW set up panic handler (so it can use logging)
    panic::set_hook(Box::new(|panic_info| {
        error!(?panic_info, "FATAL: Panic occurred");
        std::process::exit(1);
    }));

    info!(base_url = %config.api.base_url, "clinic-access probe starting");

    match run_probe(&config, &cli).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                let err = AppError::Internal(e.into());
                error!(error = %err, "Failed to render report");
                std::process::exit(err.exit_code());
            }
        },
        Err(err) => {
            error!(error = %logging::sanitize_log_message(&err.to_string()), "Probe failed");
            std::process::exit(err.exit_code());
        }
    }
}
