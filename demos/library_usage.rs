//! Example: Using armrm-rs as a library.
//!
//! This example demonstrates how to:
//! 1. Build a [`Config`] from CLI-style arguments
//! 2. Wire Ctrl+C to the run's cancellation token
//! 3. Run the [`RunCoordinator`] and inspect the aggregated failures
//!
//! Run with:
//! ```sh
//! cargo run --example library_usage -- --subscription-id <id> --access-token <token> --family netapp
//! ```

use anyhow::Result;
use armrm_rs::{
    Config, RunCoordinator, build_config_from_args, create_provider,
    create_run_cancellation_token, is_cancelled_error,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Build Config from real CLI arguments (same parser as the armrm binary).
    //    Without --actually-delete the run only previews what it would remove.
    let config: Config =
        build_config_from_args(std::env::args_os()).map_err(|e| anyhow::anyhow!(e))?;

    // 2. Cancel the run on Ctrl+C. Resources already being deleted finish
    //    their current request; nothing new is started.
    let token = create_run_cancellation_token();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    // 3. Connect and run.
    let provider = create_provider(&config).await?;
    let mut coordinator = RunCoordinator::new(config, provider, token);
    let errors = coordinator.run().await?;

    for entry in errors.take_entries() {
        if is_cancelled_error(&entry.error) {
            println!("  Cancelled: {}", entry.resource);
        } else {
            eprintln!("  FAILED:    {entry}");
        }
    }

    let stats = coordinator.stats();
    println!(
        "Summary: {} deleted, {} already gone, {} previewed, {} skipped, {} failed",
        stats.deleted, stats.already_gone, stats.previewed, stats.skipped, stats.failed,
    );

    Ok(())
}
