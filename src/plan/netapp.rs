//! Azure NetApp Files.
//!
//! ```text
//! netAppAccount
//! ├── backupPolicies      (detach referencing volumes first)
//! ├── backupVaults
//! │   └── backups         (parallel)
//! ├── capacityPools
//! │   └── volumes         (break replication first, force delete)
//! │       └── snapshots   (parallel)
//! └── snapshotPolicies
//! ```

use std::time::Duration;

use super::{Mutation, ResourceKind};

const NAMESPACE: &str = "Microsoft.NetApp";
const API_VERSION: &str = "2025-01-01";
const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub static BACKUP_POLICY: ResourceKind = ResourceKind {
    name: "NetApp Backup Policy",
    namespace: Some(NAMESPACE),
    collection: "backupPolicies",
    api_version: API_VERSION,
    children: &[],
    mutation: Some(Mutation::DetachBackupPolicyVolumes),
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static BACKUP: ResourceKind = ResourceKind {
    name: "NetApp Backup",
    namespace: Some(NAMESPACE),
    collection: "backups",
    api_version: API_VERSION,
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: true,
    poll_interval: POLL_INTERVAL,
};

pub static BACKUP_VAULT: ResourceKind = ResourceKind {
    name: "NetApp Backup Vault",
    namespace: Some(NAMESPACE),
    collection: "backupVaults",
    api_version: API_VERSION,
    children: &[&BACKUP],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static SNAPSHOT: ResourceKind = ResourceKind {
    name: "NetApp Snapshot",
    namespace: Some(NAMESPACE),
    collection: "snapshots",
    api_version: API_VERSION,
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: true,
    poll_interval: POLL_INTERVAL,
};

pub static VOLUME: ResourceKind = ResourceKind {
    name: "NetApp Volume",
    namespace: Some(NAMESPACE),
    collection: "volumes",
    api_version: API_VERSION,
    children: &[&SNAPSHOT],
    mutation: Some(Mutation::BreakVolumeReplication),
    delete_parameters: &[("forceDelete", "true")],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static CAPACITY_POOL: ResourceKind = ResourceKind {
    name: "NetApp Capacity Pool",
    namespace: Some(NAMESPACE),
    collection: "capacityPools",
    api_version: API_VERSION,
    children: &[&VOLUME],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static SNAPSHOT_POLICY: ResourceKind = ResourceKind {
    name: "NetApp Snapshot Policy",
    namespace: Some(NAMESPACE),
    collection: "snapshotPolicies",
    api_version: API_VERSION,
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};

pub static NETAPP_ACCOUNT: ResourceKind = ResourceKind {
    name: "NetApp Account",
    namespace: Some(NAMESPACE),
    collection: "netAppAccounts",
    api_version: API_VERSION,
    children: &[&BACKUP_POLICY, &BACKUP_VAULT, &CAPACITY_POOL, &SNAPSHOT_POLICY],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: POLL_INTERVAL,
};
