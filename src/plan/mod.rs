//! Dependency-ordered deletion plans.
//!
//! Each resource family is described as static data: a root [`ResourceKind`]
//! whose `children` list the kinds that must be gone before it may be deleted,
//! in the order they are torn down. The cleaner walks this tree generically;
//! nothing family-specific lives in control flow except the pre-delete
//! [`Mutation`]s.

use std::fmt;
use std::time::Duration;

use crate::types::ResourceRef;

pub mod event_hub;
pub mod netapp;
pub mod notification_hub;
pub mod recovery_services;
pub mod resource_group;
pub mod storage_sync;

/// One kind of resource in a deletion plan.
#[derive(Debug)]
pub struct ResourceKind {
    /// Human-readable name used in log lines.
    pub name: &'static str,
    /// Provider namespace used when listing below a scope that is not itself
    /// a provider resource (a subscription or resource group). `None` lists
    /// the collection directly below the parent.
    pub namespace: Option<&'static str>,
    /// Collection segment appended to the parent id to list live instances.
    pub collection: &'static str,
    pub api_version: &'static str,
    /// Kinds deleted before this one, in order.
    pub children: &'static [&'static ResourceKind],
    pub mutation: Option<Mutation>,
    /// Extra query parameters sent with the delete call.
    pub delete_parameters: &'static [(&'static str, &'static str)],
    /// Siblings of this kind may be deleted concurrently (leaf kinds only).
    pub parallel_delete: bool,
    pub poll_interval: Duration,
}

impl ResourceKind {
    /// Path of the collection holding instances of this kind below `parent`.
    ///
    /// ```
    /// use armrm_rs::plan::netapp::{CAPACITY_POOL, NETAPP_ACCOUNT};
    /// use armrm_rs::types::ResourceRef;
    ///
    /// let subscription = ResourceRef::for_subscription("sub1");
    /// assert_eq!(
    ///     NETAPP_ACCOUNT.collection_path(&subscription),
    ///     "/subscriptions/sub1/providers/Microsoft.NetApp/netAppAccounts"
    /// );
    ///
    /// let account: ResourceRef =
    ///     "/subscriptions/sub1/resourceGroups/rg/providers/Microsoft.NetApp/netAppAccounts/a"
    ///         .parse()
    ///         .unwrap();
    /// assert_eq!(
    ///     CAPACITY_POOL.collection_path(&account),
    ///     format!("{account}/capacityPools")
    /// );
    /// ```
    pub fn collection_path(&self, parent: &ResourceRef) -> String {
        match self.namespace {
            Some(namespace) if !parent.is_provider_resource() => {
                format!("{parent}/providers/{namespace}/{}", self.collection)
            }
            _ => format!("{parent}/{}", self.collection),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether live children of this kind are deleted by a bounded worker group.
    pub fn deletes_in_parallel(&self) -> bool {
        self.parallel_delete && self.is_leaf()
    }

    pub fn mutation_in_phase(&self, phase: MutationPhase) -> Option<Mutation> {
        self.mutation.filter(|mutation| mutation.phase() == phase)
    }
}

/// A state change that must complete before deletion can proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Clear the backup policy reference on every volume the policy still protects.
    DetachBackupPolicyVolumes,
    /// Remove the replication relationship of a replicated volume.
    BreakVolumeReplication,
    /// Turn off soft delete, immutability and multi-user authorization on a vault.
    DisableVaultSecurity,
    /// Break the geo disaster recovery pairing of an alias and wait until the
    /// partner namespace is gone from it.
    BreakPairing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    BeforeChildren,
    BeforeDelete,
}

impl Mutation {
    pub fn phase(&self) -> MutationPhase {
        match self {
            Mutation::DisableVaultSecurity => MutationPhase::BeforeChildren,
            Mutation::DetachBackupPolicyVolumes
            | Mutation::BreakVolumeReplication
            | Mutation::BreakPairing => MutationPhase::BeforeDelete,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mutation::DetachBackupPolicyVolumes => "detach volumes from backup policy",
            Mutation::BreakVolumeReplication => "break volume replication",
            Mutation::DisableVaultSecurity => "disable vault soft delete and immutability",
            Mutation::BreakPairing => "break disaster recovery pairing",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Resource families with a known teardown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Family {
    #[value(name = "netapp")]
    NetApp,
    #[value(name = "recovery-services")]
    RecoveryServices,
    #[value(name = "storage-sync")]
    StorageSync,
    #[value(name = "eventhub")]
    EventHub,
    #[value(name = "notification-hubs")]
    NotificationHubs,
    #[value(name = "resource-groups")]
    ResourceGroups,
}

impl Family {
    /// All families in processing order. Resource groups come last so that
    /// nested services are torn down explicitly before their group.
    pub const ALL: [Family; 6] = [
        Family::NetApp,
        Family::RecoveryServices,
        Family::StorageSync,
        Family::EventHub,
        Family::NotificationHubs,
        Family::ResourceGroups,
    ];

    pub fn plan(&self) -> DeletionPlan {
        let root = match self {
            Family::NetApp => &netapp::NETAPP_ACCOUNT,
            Family::RecoveryServices => &recovery_services::VAULT,
            Family::StorageSync => &storage_sync::STORAGE_SYNC_SERVICE,
            Family::EventHub => &event_hub::EVENTHUB_NAMESPACE,
            Family::NotificationHubs => &notification_hub::NOTIFICATION_HUB_NAMESPACE,
            Family::ResourceGroups => &resource_group::RESOURCE_GROUP,
        };
        DeletionPlan { family: *self, root }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plan().root.name)
    }
}

/// The teardown order for one family, rooted at its top-level kind.
#[derive(Debug, Clone, Copy)]
pub struct DeletionPlan {
    pub family: Family,
    pub root: &'static ResourceKind,
}

impl DeletionPlan {
    /// Every kind in the plan in post-order (children before parents).
    pub fn kinds_in_delete_order(&self) -> Vec<&'static ResourceKind> {
        fn visit(kind: &'static ResourceKind, out: &mut Vec<&'static ResourceKind>) {
            for child in kind.children {
                visit(child, out);
            }
            out.push(kind);
        }

        let mut kinds = Vec::new();
        visit(self.root, &mut kinds);
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(plan: &DeletionPlan) -> Vec<&'static str> {
        plan.kinds_in_delete_order()
            .iter()
            .map(|kind| kind.name)
            .collect()
    }

    #[test]
    fn netapp_children_before_parents() {
        assert_eq!(
            names(&Family::NetApp.plan()),
            vec![
                "NetApp Backup Policy",
                "NetApp Backup",
                "NetApp Backup Vault",
                "NetApp Snapshot",
                "NetApp Volume",
                "NetApp Capacity Pool",
                "NetApp Snapshot Policy",
                "NetApp Account",
            ]
        );
    }

    #[test]
    fn every_plan_ends_with_its_root() {
        for family in Family::ALL {
            let plan = family.plan();
            let kinds = plan.kinds_in_delete_order();
            assert!(std::ptr::eq(*kinds.last().unwrap(), plan.root));
            assert_eq!(plan.family, family);
        }
    }

    #[test]
    fn parallel_deletion_only_for_leaves() {
        for family in Family::ALL {
            for kind in family.plan().kinds_in_delete_order() {
                if kind.parallel_delete {
                    assert!(kind.is_leaf(), "{} is parallel but has children", kind.name);
                }
            }
        }
    }

    #[test]
    fn mutation_phases() {
        assert_eq!(
            netapp::BACKUP_POLICY.mutation_in_phase(MutationPhase::BeforeDelete),
            Some(Mutation::DetachBackupPolicyVolumes)
        );
        assert_eq!(
            netapp::BACKUP_POLICY.mutation_in_phase(MutationPhase::BeforeChildren),
            None
        );
        assert_eq!(
            recovery_services::VAULT.mutation_in_phase(MutationPhase::BeforeChildren),
            Some(Mutation::DisableVaultSecurity)
        );
        assert_eq!(
            event_hub::DISASTER_RECOVERY_CONFIG.mutation_in_phase(MutationPhase::BeforeDelete),
            Some(Mutation::BreakPairing)
        );
    }

    #[test]
    fn eventhub_and_notification_hub_plans() {
        assert_eq!(
            names(&Family::EventHub.plan()),
            vec!["EventHub Disaster Recovery Config", "EventHub Namespace"]
        );
        assert_eq!(
            names(&Family::NotificationHubs.plan()),
            vec!["Notification Hub", "Notification Hub Namespace"]
        );

        let subscription = ResourceRef::for_subscription("sub1");
        assert_eq!(
            event_hub::EVENTHUB_NAMESPACE.collection_path(&subscription),
            "/subscriptions/sub1/providers/Microsoft.EventHub/namespaces"
        );
    }

    #[test]
    fn resource_groups_are_processed_last() {
        assert_eq!(Family::ALL.last(), Some(&Family::ResourceGroups));
    }

    #[test]
    fn collection_path_for_scopes() {
        let group = ResourceRef::for_resource_group("sub1", "acctest-rg");
        assert_eq!(
            resource_group::MANAGEMENT_LOCK.collection_path(&group),
            "/subscriptions/sub1/resourceGroups/acctest-rg/providers/Microsoft.Authorization/locks"
        );
        assert_eq!(
            resource_group::RESOURCE_GROUP
                .collection_path(&ResourceRef::for_subscription("sub1")),
            "/subscriptions/sub1/resourcegroups"
        );
    }

    #[test]
    fn family_display_uses_root_name() {
        assert_eq!(Family::StorageSync.to_string(), "Storage Sync Service");
    }
}
