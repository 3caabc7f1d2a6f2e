//! Notification Hubs. Namespaces are not reliably removed together with
//! their resource group, so they are torn down explicitly.

use std::time::Duration;

use super::ResourceKind;

const NAMESPACE: &str = "Microsoft.NotificationHubs";
const API_VERSION: &str = "2023-09-01";

pub static NOTIFICATION_HUB: ResourceKind = ResourceKind {
    name: "Notification Hub",
    namespace: Some(NAMESPACE),
    collection: "notificationHubs",
    api_version: API_VERSION,
    children: &[],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: true,
    poll_interval: Duration::from_secs(10),
};

pub static NOTIFICATION_HUB_NAMESPACE: ResourceKind = ResourceKind {
    name: "Notification Hub Namespace",
    namespace: Some(NAMESPACE),
    collection: "namespaces",
    api_version: API_VERSION,
    children: &[&NOTIFICATION_HUB],
    mutation: None,
    delete_parameters: &[],
    parallel_delete: false,
    poll_interval: Duration::from_secs(15),
};
