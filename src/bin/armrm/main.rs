use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace};

use armrm_rs::config::Config;
use armrm_rs::{CLIArgs, RunCoordinator, create_provider, create_run_cancellation_token, is_cancelled_error};

mod ctrl_c_handler;
mod tracing_init;

/// armrm - Azure test resource cleanup.
///
/// This binary is a thin wrapper over the armrm-rs library.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "armrm",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    run(config).await
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config) -> Result<()> {
    let cancellation_token = create_run_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("cleanup run start.");

    let provider = create_provider(&config).await?;
    let mut coordinator = RunCoordinator::new(config, provider, cancellation_token);
    let errors = coordinator.run().await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if !errors.is_empty() {
        let entries = errors.take_entries();
        if entries.iter().all(|entry| is_cancelled_error(&entry.error)) {
            debug!("cleanup cancelled by user.");
            return Ok(());
        }
        error!(
            duration_sec = duration_sec,
            failed = entries.len(),
            "armrm failed."
        );
        return Err(anyhow::anyhow!("armrm failed."));
    }

    debug!(duration_sec = duration_sec, "armrm has been completed.");
    Ok(())
}
