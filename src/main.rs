mod cli;
mod config;
mod error;
mod ledger;
mod notify;
mod recipients;
mod rpc;
mod schedule;
mod transfer;
mod types;
mod worker;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::{Commands, parse_args};
use config::{Config, SAMPLE_CONFIG};
use futures::stream::{FuturesUnordered, StreamExt};
use ledger::EvmConnector;
use recipients::{FileRecipientStore, RecipientFiles, RecipientStore};
use rpc::{EndpointRotator, RateLimitedCaller};
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use worker::{AccountWorker, WorkerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = parse_args();

    match cli.command {
        Commands::Start {
            config: config_path,
        } => {
            let config = Config::load(&config_path)
                .context(format!("Failed to load config from {:?}", config_path))?;
            info!("Configuration loaded successfully");

            let endpoints = config.endpoints()?;
            let accounts = config.accounts()?;
            info!(
                "Loaded {} RPC endpoints and {} accounts",
                endpoints.len(),
                accounts.len()
            );

            let notifier = notify::from_config(config.telegram.as_ref());
            let store: Arc<dyn RecipientStore> = Arc::new(FileRecipientStore);
            let settings = WorkerSettings {
                resilience: config.resilience.clone(),
                schedule: config.schedule.clone(),
                explorer_tx_url: config.explorer_tx_url.clone(),
            };
            let confirmation_timeout =
                Duration::from_secs(config.resilience.confirmation_timeout_secs);

            let mut workers = FuturesUnordered::new();
            for account in accounts {
                let connector = EvmConnector::new(
                    &account.private_key,
                    &account.token_address,
                    confirmation_timeout,
                )
                .context(format!("Invalid credentials for {}", account.tag))?;
                info!("[{}] Wallet address: {}", account.tag, connector.address());

                let caller = RateLimitedCaller::new(
                    EndpointRotator::new(endpoints.clone())?,
                    Arc::new(connector),
                    config.resilience.rate_limit_cool_down(),
                )?;
                let files = RecipientFiles::for_account(
                    &config.recipients_file,
                    &config.data_dir,
                    &account.file_tag(),
                );
                let worker = AccountWorker::new(
                    account,
                    caller,
                    files,
                    &settings,
                    store.clone(),
                    notifier.clone(),
                );

                info!("Spawning distribution worker for {}", worker.tag());
                let tag = worker.tag().to_string();
                let handle = tokio::spawn(worker.run());
                workers.push(async move { (tag, handle.await) });
            }

            loop {
                tokio::select! {
                    finished = workers.next() => match finished {
                        Some((tag, Err(e))) => error!("Worker for {} terminated: {}", tag, e),
                        Some((tag, Ok(()))) => info!("Worker for {} stopped", tag),
                        None => break,
                    },

                    // Handle program termination
                    _ = signal::ctrl_c() => {
                        info!("Received shutdown signal, exiting...");
                        break;
                    }
                }
            }
        }

        Commands::GenerateConfig { output } => {
            let mut file = File::create(&output)
                .context(format!("Failed to create config file at {:?}", output))?;
            file.write_all(SAMPLE_CONFIG.as_bytes())?;

            info!("Sample configuration file generated at {:?}", output);
            info!(
                "Please edit the file with your actual configuration before starting the service."
            );
        }
    }

    Ok(())
}
