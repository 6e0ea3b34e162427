use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod availability;
mod browser;
mod config;
mod error;
mod guard;
mod models;
mod notify;
mod processor;
mod table;
mod urls;

use config::AppArgs;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = AppArgs::parse();

    // Load configuration
    let config = match config::build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to build configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mailer = match notify::SmtpMailer::new(&config.smtp) {
        Ok(mailer) => mailer,
        Err(e) => {
            error!("Failed to set up SMTP transport: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let notifier = notify::Notifier::new(
        mailer,
        config.smtp.from.clone(),
        config.notification.clone(),
    );
    let launcher = Arc::new(browser::ChromeLauncher::new(config.browser.clone()));

    let result = processor::execute(&config, launcher, &notifier, Utc::now()).await;
    processor::exit_code(&result)
}
