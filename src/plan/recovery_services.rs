//! Recovery Services vaults. Vault security features are switched off before
//! protected items are removed, otherwise the items linger in soft-deleted state.

use std::time::Duration;

use super::{Mutation, ResourceKind};

const API_VERSION: &str = "2024-10-01";

pub static PROTECTED_ITEM: ResourceKind = ResourceKind {
    name: "Backup Protected Item",
    namespace: None,
    collection: "backupProtectedItems",
    api_version: API_VERSION,
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(15),
};

pub static VAULT: ResourceKind = ResourceKind {
    name: "Recovery Services Vault",
    namespace: Some("Microsoft.RecoveryServices"),
    collection: "vaults",
    api_version: API_VERSION,
    children: &[&PROTECTED_ITEM],
    mutation: Some(Mutation::DisableVaultSecurity),
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(15),
};
