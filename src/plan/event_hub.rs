//! Event Hubs. A namespace that is still paired for geo disaster recovery
//! cannot be deleted, so the pairing of every alias is broken first.
//!
//! ```text
//! namespace
//! └── disasterRecoveryConfigs   (break pairing, wait until unpaired)
//! ```

use std::time::Duration;

use super::{Mutation, ResourceKind};

const NAMESPACE: &str = "Microsoft.EventHub";
const API_VERSION: &str = "2021-11-01";

pub static DISASTER_RECOVERY_CONFIG: ResourceKind = ResourceKind {
    name: "EventHub Disaster Recovery Config",
    namespace: Some(NAMESPACE),
    collection: "disasterRecoveryConfigs",
    api_version: API_VERSION,
    children: &[],
    mutation: Some(Mutation::BreakPairing),
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(30),
};

pub static EVENTHUB_NAMESPACE: ResourceKind = ResourceKind {
    name: "EventHub Namespace",
    namespace: Some(NAMESPACE),
    collection: "namespaces",
    api_version: API_VERSION,
    children: &[&DISASTER_RECOVERY_CONFIG],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(15),
};
