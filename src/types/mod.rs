use std::fmt;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod resource_id;
pub mod token;

pub use resource_id::ResourceRef;

/// A resource returned by a provider listing or fetch.
///
/// Produced by the typed decode step at the provider boundary. `properties`
/// stays as JSON so that family-specific pre-delete steps can decode the
/// parts they need.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedResource {
    pub id: ResourceRef,
    pub properties: serde_json::Value,
}

impl ListedResource {
    pub fn new(id: ResourceRef) -> Self {
        ListedResource {
            id,
            properties: serde_json::Value::Null,
        }
    }

    pub fn with_properties(id: ResourceRef, properties: serde_json::Value) -> Self {
        ListedResource { id, properties }
    }
}

/// Azure clouds with well-known endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmEnvironment {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl ArmEnvironment {
    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            ArmEnvironment::Public => "https://management.azure.com",
            ArmEnvironment::UsGovernment => "https://management.usgovcloudapi.net",
            ArmEnvironment::China => "https://management.chinacloudapi.cn",
        }
    }

    pub fn login_endpoint(&self) -> &'static str {
        match self {
            ArmEnvironment::Public => "https://login.microsoftonline.com",
            ArmEnvironment::UsGovernment => "https://login.microsoftonline.us",
            ArmEnvironment::China => "https://login.chinacloudapi.cn",
        }
    }
}

impl FromStr for ArmEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "public" | "azurecloud" => Ok(ArmEnvironment::Public),
            "usgovernment" | "azureusgovernmentcloud" => Ok(ArmEnvironment::UsGovernment),
            "china" | "azurechinacloud" => Ok(ArmEnvironment::China),
            other => Err(format!(
                "unknown ARM environment {other:?} (expected public, usgovernment or china)"
            )),
        }
    }
}

/// Credentials used to obtain resource-manager bearer tokens.
#[derive(Debug, Clone)]
pub enum ArmCredentials {
    ClientSecret {
        tenant_id: String,
        client_id: String,
        secret: ClientSecret,
    },
    AccessToken(ClientSecret),
}

/// A secret value that is cleared from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientSecret {
    value: String,
}

impl ClientSecret {
    pub fn new(value: impl Into<String>) -> Self {
        ClientSecret {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl Debug for ClientSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("\"** redacted **\"")
    }
}

/// Counters updated while a run progresses.
#[derive(Debug, Default)]
pub struct CleanupStatsReport {
    deleted: AtomicU64,
    already_gone: AtomicU64,
    previewed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// A point-in-time copy of [`CleanupStatsReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub deleted: u64,
    pub already_gone: u64,
    pub previewed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl CleanupStatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_already_gone(&self) {
        self.already_gone.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_previewed(&self) {
        self.previewed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CleanupStats {
        CleanupStats {
            deleted: self.deleted.load(Ordering::SeqCst),
            already_gone: self.already_gone.load(Ordering::SeqCst),
            previewed: self.previewed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// One failed resource and its cause.
#[derive(Debug)]
pub struct ResourceError {
    pub resource: ResourceRef,
    pub error: anyhow::Error,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.resource, self.error)
    }
}

/// Ordered failures collected during a run.
///
/// Clones share the same underlying list, so concurrent leaf deletions can
/// all append to it.
#[derive(Debug, Clone, Default)]
pub struct ErrorAggregate {
    entries: Arc<Mutex<Vec<ResourceError>>>,
}

impl ErrorAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, resource: ResourceRef, error: anyhow::Error) {
        self.entries
            .lock()
            .unwrap()
            .push(ResourceError { resource, error });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// The failed resources in recording order.
    pub fn resources(&self) -> Vec<ResourceRef> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.resource.clone())
            .collect()
    }

    /// One `"{id}: {cause}"` line per failure, in recording order.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.to_string())
            .collect()
    }

    /// Drains the recorded failures.
    pub fn take_entries(&self) -> Vec<ResourceError> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }
}
