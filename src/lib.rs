/*!
# Overview
armrm-rs removes leftover Azure acceptance-test resources.
It walks the resources of each supported family, skips everything whose
resource group name does not start with a configured prefix, and tears the
rest down depth-first: nested resources before their parents, with any
detach or security-disable step the provider requires before a delete.

## Features
- **Dependency-ordered deletion**: each family is described by a static
  [`DeletionPlan`](plan::DeletionPlan); one generic cleaner walks it
- **Long-running operations**: `Azure-AsyncOperation` / `Location` polling
  until a terminal state, with post-delete verification
- **Safety first**: prefix guard before every mutating call, dry-run by
  default, max top-level resource count, one run deadline
- **Error aggregation**: a failure in one subtree never stops its siblings;
  every failed resource is reported at the end
- **Library-first**: the `armrm` CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
armrm-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use armrm_rs::config::args::parse_from_args;
use armrm_rs::{Config, RunCoordinator, create_provider, create_run_cancellation_token};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = vec!["armrm", "--prefix", "acctest", "--family", "netapp"];

    let parsed_args = parse_from_args(args)?;
    let config = Config::try_from(parsed_args).map_err(anyhow::Error::msg)?;
    let provider = create_provider(&config).await?;

    let mut coordinator = RunCoordinator::new(config, provider, create_run_cancellation_token());
    let errors = coordinator.run().await?;
    for message in errors.messages() {
        eprintln!("{message}");
    }
    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod cleaner;
pub mod config;
pub mod coordinator;
pub mod deleter;
pub mod plan;
pub mod poller;
pub mod provider;
pub mod safety;
pub mod types;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use coordinator::RunCoordinator;
pub use provider::{Provider, ProviderTrait, create_provider};
pub use types::error::{
    ArmrmError, exit_code_from_error, is_cancelled_error, is_run_interrupted_error,
};
pub use types::token::{RunCancellationToken, create_run_cancellation_token};
pub use types::{CleanupStats, ErrorAggregate, ResourceRef};
