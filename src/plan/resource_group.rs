//! Resource groups. Management locks block the group delete, so they go first.

use std::time::Duration;

use super::ResourceKind;

pub static MANAGEMENT_LOCK: ResourceKind = ResourceKind {
    name: "Management Lock",
    namespace: Some("Microsoft.Authorization"),
    collection: "locks",
    api_version: "2020-05-01",
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(5),
};

pub static RESOURCE_GROUP: ResourceKind = ResourceKind {
    name: "Resource Group",
    namespace: None,
    collection: "resourcegroups",
    api_version: "2022-09-01",
    children: &[&MANAGEMENT_LOCK],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(15),
};
