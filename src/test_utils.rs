//! Shared test utilities for the armrm library crate.
//!
//! Provides the tracing and config helpers used across test modules and a
//! recording in-memory [`MockProvider`] that models a resource tree.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use url::Url;

use crate::config::{CleanupOptions, Config, ForceRetryConfig, PollingConfig};
use crate::plan::ResourceKind;
use crate::provider::{AZURE_ASYNC_OPERATION_HEADER, ProviderResponse, ProviderTrait};
use crate::types::error::ArmrmError;
use crate::types::{ListedResource, ResourceRef};

pub(crate) const TEST_SUBSCRIPTION: &str = "sub1";

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a [`Config`] for unit tests: real deletion, prefix `acctest`,
/// no waiting between polls or verifications, no read retries.
pub(crate) fn make_test_config() -> Config {
    Config {
        cleanup_options: CleanupOptions {
            prefix: "acctest".to_string(),
            dry_run: false,
            max_top_level_resources: 1000,
        },
        polling_config: PollingConfig {
            poll_interval_override_milliseconds: Some(0),
            settle_delay_milliseconds: 0,
            verify_attempts: 3,
            max_transient_status_failures: 3,
        },
        force_retry_config: ForceRetryConfig {
            force_retry_count: 0,
            force_retry_interval_milliseconds: 0,
        },
        worker_size: 4,
        ..Config::for_subscription(TEST_SUBSCRIPTION)
    }
}

pub(crate) fn resource_id(id: &str) -> ResourceRef {
    id.parse().unwrap()
}

pub(crate) fn accepted_response(locator: &str) -> ProviderResponse {
    ProviderResponse::new(202).with_header(AZURE_ASYNC_OPERATION_HEADER, locator)
}

pub(crate) fn status_response(status: &str) -> ProviderResponse {
    ProviderResponse::new(200).with_body(format!(r#"{{"status":"{status}"}}"#))
}

pub(crate) fn failed_status_response(message: &str) -> ProviderResponse {
    ProviderResponse::new(200).with_body(
        serde_json::json!({
            "status": "Failed",
            "error": {"code": "ResourceDeletionFailed", "message": message}
        })
        .to_string(),
    )
}

/// One call received by the [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProviderCall {
    List { path: String },
    Get { id: String },
    Delete { id: String },
    Patch { id: String, body: serde_json::Value },
    Post { id: String, action: String },
    Status { locator: String },
}

impl ProviderCall {
    pub(crate) fn is_mutating(&self) -> bool {
        matches!(
            self,
            ProviderCall::Delete { .. } | ProviderCall::Patch { .. } | ProviderCall::Post { .. }
        )
    }
}

#[derive(Debug)]
struct MockResource {
    resource: ListedResource,
    collection_path: String,
}

#[derive(Default)]
struct MockState {
    resources: Vec<MockResource>,
    delete_responses: HashMap<String, VecDeque<ProviderResponse>>,
    status_responses: HashMap<String, VecDeque<ProviderResponse>>,
    patch_responses: HashMap<String, VecDeque<ProviderResponse>>,
    get_properties: HashMap<String, VecDeque<serde_json::Value>>,
    list_errors: HashMap<String, ArmrmError>,
    delete_errors: HashMap<String, ArmrmError>,
    undeletable: HashSet<String>,
}

/// In-memory resource tree with scripted responses and a call log.
///
/// Resources live under the collection path of their parent and kind. A
/// successful delete removes the resource (unless it is undeletable), so later
/// listings and fetches no longer see it.
#[derive(Clone)]
pub(crate) struct MockProvider {
    subscription_id: String,
    state: Arc<Mutex<MockState>>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    delete_delay: Duration,
    in_flight_deletes: Arc<AtomicUsize>,
    max_in_flight_deletes: Arc<AtomicUsize>,
}

fn key(value: &str) -> String {
    value.to_ascii_lowercase()
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        MockProvider {
            subscription_id: TEST_SUBSCRIPTION.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delete_delay: Duration::ZERO,
            in_flight_deletes: Arc::new(AtomicUsize::new(0)),
            max_in_flight_deletes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every delete sleeps this long before answering.
    pub(crate) fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub(crate) fn add(&self, parent: &ResourceRef, kind: &ResourceKind, id: &str) -> ResourceRef {
        self.add_with_properties(parent, kind, id, serde_json::Value::Null)
    }

    pub(crate) fn add_with_properties(
        &self,
        parent: &ResourceRef,
        kind: &ResourceKind,
        id: &str,
        properties: serde_json::Value,
    ) -> ResourceRef {
        let id = resource_id(id);
        self.state.lock().unwrap().resources.push(MockResource {
            resource: ListedResource::with_properties(id.clone(), properties),
            collection_path: key(&kind.collection_path(parent)),
        });
        id
    }

    /// Queue responses returned by successive deletes of `id`. Once drained,
    /// deletes fall back to the default behavior.
    pub(crate) fn script_delete(&self, id: &ResourceRef, responses: Vec<ProviderResponse>) {
        self.state
            .lock()
            .unwrap()
            .delete_responses
            .entry(key(&id.to_string()))
            .or_default()
            .extend(responses);
    }

    /// Queue responses for successive status checks of `locator`. Once
    /// drained, status checks report `Succeeded`.
    pub(crate) fn script_status(&self, locator: &str, responses: Vec<ProviderResponse>) {
        self.state
            .lock()
            .unwrap()
            .status_responses
            .entry(locator.to_string())
            .or_default()
            .extend(responses);
    }

    pub(crate) fn script_patch(&self, id: &ResourceRef, responses: Vec<ProviderResponse>) {
        self.state
            .lock()
            .unwrap()
            .patch_responses
            .entry(key(&id.to_string()))
            .or_default()
            .extend(responses);
    }

    /// Queue the properties reported by successive fetches of `id`. Once
    /// drained, fetches report the stored properties.
    pub(crate) fn script_get_properties(&self, id: &ResourceRef, properties: Vec<serde_json::Value>) {
        self.state
            .lock()
            .unwrap()
            .get_properties
            .entry(key(&id.to_string()))
            .or_default()
            .extend(properties);
    }

    pub(crate) fn fail_listing(&self, parent: &ResourceRef, kind: &ResourceKind, error: ArmrmError) {
        self.state
            .lock()
            .unwrap()
            .list_errors
            .insert(key(&kind.collection_path(parent)), error);
    }

    /// Deletes of `id` fail before any response is received.
    pub(crate) fn fail_delete(&self, id: &ResourceRef, error: ArmrmError) {
        self.state
            .lock()
            .unwrap()
            .delete_errors
            .insert(key(&id.to_string()), error);
    }

    /// Deletes of `id` report success but the resource stays visible.
    pub(crate) fn make_undeletable(&self, id: &ResourceRef) {
        self.state
            .lock()
            .unwrap()
            .undeletable
            .insert(key(&id.to_string()));
    }

    pub(crate) fn exists(&self, id: &ResourceRef) -> bool {
        let id = key(&id.to_string());
        self.state
            .lock()
            .unwrap()
            .resources
            .iter()
            .any(|entry| key(&entry.resource.id.to_string()) == id)
    }

    pub(crate) fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Delete { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn listed_paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::List { path } => Some(path),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn status_checks(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Status { .. }))
            .count()
    }

    pub(crate) fn mutating_calls(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(ProviderCall::is_mutating)
            .collect()
    }

    pub(crate) fn max_in_flight_deletes(&self) -> usize {
        self.max_in_flight_deletes.load(Ordering::SeqCst)
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn remove(&self, id: &ResourceRef) {
        let id = key(&id.to_string());
        let mut state = self.state.lock().unwrap();
        if state.undeletable.contains(&id) {
            return;
        }
        state
            .resources
            .retain(|entry| key(&entry.resource.id.to_string()) != id);
    }
}

#[async_trait]
impl ProviderTrait for MockProvider {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn list_resources(
        &self,
        parent: &ResourceRef,
        kind: &ResourceKind,
    ) -> Result<Vec<ListedResource>> {
        let path = kind.collection_path(parent);
        self.record(ProviderCall::List { path: path.clone() });

        let state = self.state.lock().unwrap();
        if let Some(error) = state.list_errors.get(&key(&path)) {
            return Err(anyhow!(error.clone()));
        }
        Ok(state
            .resources
            .iter()
            .filter(|entry| entry.collection_path == key(&path))
            .map(|entry| entry.resource.clone())
            .collect())
    }

    async fn get_resource(
        &self,
        id: &ResourceRef,
        _kind: &ResourceKind,
    ) -> Result<Option<ListedResource>> {
        self.record(ProviderCall::Get { id: id.to_string() });

        let wanted = key(&id.to_string());
        let mut state = self.state.lock().unwrap();
        let scripted = state
            .get_properties
            .get_mut(&wanted)
            .and_then(VecDeque::pop_front);
        Ok(state
            .resources
            .iter()
            .find(|entry| key(&entry.resource.id.to_string()) == wanted)
            .map(|entry| match scripted {
                Some(properties) => {
                    ListedResource::with_properties(entry.resource.id.clone(), properties)
                }
                None => entry.resource.clone(),
            }))
    }

    async fn delete_resource(
        &self,
        id: &ResourceRef,
        _kind: &ResourceKind,
    ) -> Result<ProviderResponse> {
        self.record(ProviderCall::Delete { id: id.to_string() });
        if let Some(error) = self.state.lock().unwrap().delete_errors.get(&key(&id.to_string())) {
            return Err(anyhow!(error.clone()));
        }

        let in_flight = self.in_flight_deletes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_deletes
            .fetch_max(in_flight, Ordering::SeqCst);
        if !self.delete_delay.is_zero() {
            tokio::time::sleep(self.delete_delay).await;
        }
        self.in_flight_deletes.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .state
            .lock()
            .unwrap()
            .delete_responses
            .get_mut(&key(&id.to_string()))
            .and_then(|queue| queue.pop_front());
        let response = match scripted {
            Some(response) => response,
            None if self.exists(id) => ProviderResponse::new(200),
            None => ProviderResponse::new(404),
        };
        if response.is_success() {
            self.remove(id);
        }
        Ok(response)
    }

    async fn patch_resource(
        &self,
        id: &ResourceRef,
        _kind: &ResourceKind,
        body: serde_json::Value,
    ) -> Result<ProviderResponse> {
        self.record(ProviderCall::Patch {
            id: id.to_string(),
            body,
        });

        let scripted = self
            .state
            .lock()
            .unwrap()
            .patch_responses
            .get_mut(&key(&id.to_string()))
            .and_then(|queue| queue.pop_front());
        Ok(scripted.unwrap_or_else(|| ProviderResponse::new(200)))
    }

    async fn post_action(
        &self,
        id: &ResourceRef,
        _kind: &ResourceKind,
        action: &str,
    ) -> Result<ProviderResponse> {
        self.record(ProviderCall::Post {
            id: id.to_string(),
            action: action.to_string(),
        });
        Ok(ProviderResponse::new(200))
    }

    async fn get_operation_status(&self, locator: &Url) -> Result<ProviderResponse> {
        self.record(ProviderCall::Status {
            locator: locator.to_string(),
        });

        let scripted = self
            .state
            .lock()
            .unwrap()
            .status_responses
            .get_mut(locator.as_str())
            .and_then(|queue| queue.pop_front());
        Ok(scripted.unwrap_or_else(|| status_response("Succeeded")))
    }
}
