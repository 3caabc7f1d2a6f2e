//! Shared integration test infrastructure for armrm-rs.
//!
//! Provides [`FakeArm`], a thin layer over an `httptest` server that plays the
//! resource manager, and helpers to build a config pointing at it and run a
//! cleanup.

#![allow(dead_code)]

use armrm_rs::config::args::build_config_from_args;
use armrm_rs::{CleanupStats, Config, RunCoordinator, create_provider, create_run_cancellation_token};
use httptest::{Expectation, Server, matchers::*, responders::*};
use serde_json::{Value, json};

pub const SUBSCRIPTION: &str = "sub1";
pub const TOKEN: &str = "integration-token";
const AUTHORIZATION: &str = "Bearer integration-token";

/// Outcome of one cleanup run.
#[derive(Debug)]
pub struct RunResult {
    pub stats: CleanupStats,
    /// One `"{id}: {cause}"` line per failed resource.
    pub errors: Vec<String>,
}

/// A fake resource manager. Every request must match an expectation.
pub struct FakeArm {
    pub server: Server,
}

impl FakeArm {
    pub fn new() -> Self {
        FakeArm {
            server: Server::run(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        self.server.url_str(path)
    }

    /// Build a config for this server. Polling and verification barely wait;
    /// the run stays a dry run unless `args` pass `--actually-delete`.
    pub fn config(&self, args: &[&str]) -> Config {
        let endpoint = format!("http://{}", self.server.addr());
        let mut full_args: Vec<String> = [
            "armrm",
            "--subscription-id",
            SUBSCRIPTION,
            "--access-token",
            TOKEN,
            "--endpoint-url",
            &endpoint,
            "--poll-interval-milliseconds",
            "1",
            "--settle-delay-milliseconds",
            "0",
            "--force-retry-count",
            "0",
            "-qqq",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        full_args.extend(args.iter().map(|s| s.to_string()));

        build_config_from_args(full_args)
            .unwrap_or_else(|e| panic!("Failed to build config from args: {e}"))
    }

    /// `GET {path}` answers one page with `resources`.
    pub fn expect_list(&self, path: &str, resources: Value) {
        self.server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path(eq(path.to_string())),
                request::headers(contains(("authorization", AUTHORIZATION))),
            ])
            .respond_with(json_encoded(json!({ "value": resources }))),
        );
    }

    pub fn expect_empty_list(&self, path: &str) {
        self.expect_list(path, json!([]));
    }

    /// Post-delete verification of `id` finds nothing.
    pub fn expect_gone(&self, id: &str) {
        self.server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path(eq(id.to_string())),
            ])
            .respond_with(status_code(404)),
        );
    }

    /// `DELETE {id}` answers `200 OK`.
    pub fn expect_sync_delete(&self, id: &str) {
        self.server.expect(
            Expectation::matching(all_of![
                request::method("DELETE"),
                request::path(eq(id.to_string())),
            ])
            .respond_with(status_code(200)),
        );
    }

    /// `DELETE {id}` answers `202 Accepted` with an `Azure-AsyncOperation`
    /// locator whose status checks return `statuses` in order.
    pub fn expect_async_delete(&self, id: &str, operation: &str, statuses: &[Value]) {
        let operation_path = format!("/operations/{operation}");
        self.server.expect(
            Expectation::matching(all_of![
                request::method("DELETE"),
                request::path(eq(id.to_string())),
            ])
            .respond_with(
                status_code(202).append_header("Azure-AsyncOperation", self.url(&operation_path)),
            ),
        );
        self.expect_status_checks(&operation_path, statuses);
    }

    pub fn expect_status_checks(&self, operation_path: &str, statuses: &[Value]) {
        let responders: Vec<Box<dyn Responder>> = statuses
            .iter()
            .map(|status| Box::new(json_encoded(status.clone())) as Box<dyn Responder>)
            .collect();
        self.server.expect(
            Expectation::matching(all_of![
                request::method("GET"),
                request::path(eq(operation_path.to_string())),
            ])
            .times(statuses.len())
            .respond_with(cycle(responders)),
        );
    }
}

pub fn status(value: &str) -> Value {
    json!({ "status": value })
}

pub fn failed(code: &str, message: &str) -> Value {
    json!({ "status": "Failed", "error": { "code": code, "message": message } })
}

pub fn resource(id: &str) -> Value {
    json!({ "id": id, "properties": {} })
}

/// Run one cleanup with `config` against its endpoint.
pub async fn run_cleanup(config: Config) -> anyhow::Result<RunResult> {
    let provider = create_provider(&config).await?;
    let mut coordinator = RunCoordinator::new(config, provider, create_run_cancellation_token());
    let errors = coordinator.run().await?;

    Ok(RunResult {
        stats: coordinator.stats(),
        errors: errors.messages(),
    })
}
