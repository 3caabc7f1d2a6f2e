//! Azure File Sync: service → sync group → cloud endpoint.

use std::time::Duration;

use super::ResourceKind;

const API_VERSION: &str = "2020-03-01";
const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub static CLOUD_ENDPOINT: ResourceKind = ResourceKind {
    name: "Storage Sync Cloud Endpoint",
    namespace: None,
    collection: "cloudEndpoints",
    api_version: API_VERSION,
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static SYNC_GROUP: ResourceKind = ResourceKind {
    name: "Storage Sync Group",
    namespace: None,
    collection: "syncGroups",
    api_version: API_VERSION,
    children: &[&CLOUD_ENDPOINT],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static STORAGE_SYNC_SERVICE: ResourceKind = ResourceKind {
    name: "Storage Sync Service",
    namespace: Some("Microsoft.StorageSync"),
    collection: "storageSyncServices",
    api_version: API_VERSION,
    children: &[&SYNC_GROUP],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};
