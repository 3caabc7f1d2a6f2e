//! State changes that must complete before a node (or its children) can be
//! deleted.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use super::SubtreeCleaner;
use crate::deleter::{DeleteOutcome, classify_response};
use crate::plan::netapp::VOLUME;
use crate::plan::{Mutation, ResourceKind};
use crate::provider::ProviderResponse;
use crate::types::{ListedResource, ResourceRef};

const DISABLED: &str = "Disabled";

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BackupPolicyProperties {
    #[serde(default)]
    volume_backups: Vec<VolumeBackup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeBackup {
    #[serde(default)]
    volume_resource_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VolumeProperties {
    #[serde(default)]
    data_protection: Option<VolumeDataProtection>,
}

#[derive(Deserialize)]
struct VolumeDataProtection {
    #[serde(default)]
    replication: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VaultProperties {
    #[serde(default)]
    security_settings: Option<VaultSecuritySettings>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VaultSecuritySettings {
    #[serde(default)]
    immutability_settings: Option<ImmutabilitySettings>,
    #[serde(default)]
    soft_delete_settings: Option<SoftDeleteSettings>,
    #[serde(default)]
    multi_user_authorization: Option<String>,
}

#[derive(Deserialize)]
struct ImmutabilitySettings {
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftDeleteSettings {
    #[serde(default)]
    soft_delete_state: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DisasterRecoveryProperties {
    #[serde(default)]
    partner_namespace: Option<String>,
}

impl DisasterRecoveryProperties {
    fn is_paired(&self) -> bool {
        self.partner_namespace
            .as_deref()
            .is_some_and(|partner| !partner.is_empty())
    }
}

impl VaultSecuritySettings {
    // Soft delete is on unless the vault says otherwise; the other two are
    // off unless set.
    fn needs_disabling(&self) -> bool {
        let enabled = |state: Option<&str>, default_enabled: bool| match state {
            Some(state) => !state.eq_ignore_ascii_case(DISABLED),
            None => default_enabled,
        };

        enabled(
            self.soft_delete_settings
                .as_ref()
                .and_then(|settings| settings.soft_delete_state.as_deref()),
            true,
        ) || enabled(
            self.immutability_settings
                .as_ref()
                .and_then(|settings| settings.state.as_deref()),
            false,
        ) || enabled(self.multi_user_authorization.as_deref(), false)
    }
}

fn decode_properties<T: DeserializeOwned + Default>(resource: &ListedResource) -> Result<T> {
    if resource.properties.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(resource.properties.clone())
        .with_context(|| format!("decoding properties of {} failed.", resource.id))
}

impl SubtreeCleaner {
    pub(super) async fn apply_mutation(
        &self,
        mutation: Mutation,
        resource: &ListedResource,
        kind: &ResourceKind,
    ) -> Result<()> {
        match mutation {
            Mutation::DetachBackupPolicyVolumes => self.detach_backup_policy_volumes(resource).await,
            Mutation::BreakVolumeReplication => self.break_volume_replication(resource, kind).await,
            Mutation::DisableVaultSecurity => self.disable_vault_security(resource, kind).await,
            Mutation::BreakPairing => self.break_pairing(resource, kind).await,
        }
    }

    async fn detach_backup_policy_volumes(&self, policy: &ListedResource) -> Result<()> {
        let properties: BackupPolicyProperties = decode_properties(policy)?;
        let volumes = properties
            .volume_backups
            .into_iter()
            .filter_map(|backup| backup.volume_resource_id)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<ResourceRef>()
                    .with_context(|| format!("invalid volume id {id:?} on {}.", policy.id))
            })
            .collect::<Result<Vec<_>>>()?;

        if volumes.is_empty() {
            debug!(resource = %policy.id, "no volumes reference backup policy.");
            return Ok(());
        }

        for volume in volumes {
            self.safety_checker.check_before_mutation(&volume)?;
            if self.dry_run {
                info!(
                    resource = %volume,
                    policy = %policy.id,
                    "[dry-run] would {}.",
                    Mutation::DetachBackupPolicyVolumes
                );
                continue;
            }

            info!(resource = %volume, policy = %policy.id, "detaching volume from backup policy.");
            let body = json!({
                "properties": {"dataProtection": {"backup": {"backupPolicyId": ""}}}
            });
            let response = self
                .context
                .guard(self.provider.patch_resource(&volume, &VOLUME, body))
                .await
                .with_context(|| format!("detaching {volume} failed."))?;
            self.finish_mutation(&volume, &VOLUME, response).await?;
        }
        Ok(())
    }

    async fn break_volume_replication(
        &self,
        volume: &ListedResource,
        kind: &ResourceKind,
    ) -> Result<()> {
        let properties: VolumeProperties = decode_properties(volume)?;
        let replicated = properties
            .data_protection
            .and_then(|protection| protection.replication)
            .is_some_and(|replication| !replication.is_null());
        if !replicated {
            return Ok(());
        }

        if self.dry_run {
            info!(
                resource = %volume.id,
                "[dry-run] would {}.",
                Mutation::BreakVolumeReplication
            );
            return Ok(());
        }

        info!(resource = %volume.id, "removing volume replication.");
        let response = self
            .context
            .guard(self.provider.post_action(&volume.id, kind, "deleteReplication"))
            .await
            .with_context(|| format!("removing replication of {} failed.", volume.id))?;
        self.finish_mutation(&volume.id, kind, response).await
    }

    async fn disable_vault_security(
        &self,
        vault: &ListedResource,
        kind: &ResourceKind,
    ) -> Result<()> {
        let properties: VaultProperties = decode_properties(vault)?;
        let settings = properties.security_settings.unwrap_or_default();
        if !settings.needs_disabling() {
            debug!(resource = %vault.id, "vault security settings already disabled.");
            return Ok(());
        }

        if self.dry_run {
            info!(
                resource = %vault.id,
                "[dry-run] would {}.",
                Mutation::DisableVaultSecurity
            );
            return Ok(());
        }

        info!(resource = %vault.id, "disabling vault soft delete and immutability.");
        let body = json!({
            "properties": {
                "securitySettings": {
                    "immutabilitySettings": {"state": DISABLED},
                    "softDeleteSettings": {"softDeleteState": DISABLED},
                    "multiUserAuthorization": DISABLED,
                }
            }
        });
        let response = self
            .context
            .guard(self.provider.patch_resource(&vault.id, kind, body))
            .await
            .with_context(|| format!("updating security settings of {} failed.", vault.id))?;
        self.finish_mutation(&vault.id, kind, response).await
    }

    /// The break is acknowledged synchronously, but the alias keeps its
    /// partner until the service finishes, so the alias is fetched until the
    /// partner is gone.
    async fn break_pairing(&self, config: &ListedResource, kind: &ResourceKind) -> Result<()> {
        let properties: DisasterRecoveryProperties = decode_properties(config)?;
        if !properties.is_paired() {
            debug!(resource = %config.id, "disaster recovery config is not paired.");
            return Ok(());
        }

        if self.dry_run {
            info!(
                resource = %config.id,
                partner = properties.partner_namespace.as_deref().unwrap_or_default(),
                "[dry-run] would {}.",
                Mutation::BreakPairing
            );
            return Ok(());
        }

        info!(
            resource = %config.id,
            partner = properties.partner_namespace.as_deref().unwrap_or_default(),
            "breaking disaster recovery pairing."
        );
        let response = self
            .context
            .guard(self.provider.post_action(&config.id, kind, "breakPairing"))
            .await
            .with_context(|| format!("breaking pairing of {} failed.", config.id))?;
        self.finish_mutation(&config.id, kind, response).await?;

        let interval = self.polling_config.poll_interval_for(kind.poll_interval);
        loop {
            let current = self
                .context
                .guard(self.provider.get_resource(&config.id, kind))
                .await
                .with_context(|| format!("fetching {} failed.", config.id))?;
            let Some(current) = current else {
                return Ok(());
            };
            let properties: DisasterRecoveryProperties = decode_properties(&current)?;
            if !properties.is_paired() {
                debug!(resource = %config.id, "disaster recovery pairing broken.");
                return Ok(());
            }
            debug!(resource = %config.id, "waiting for pairing to break.");
            self.context.sleep(interval).await?;
        }
    }

    /// Classify the mutation response and wait for it when it is asynchronous.
    async fn finish_mutation(
        &self,
        target: &ResourceRef,
        kind: &ResourceKind,
        response: ProviderResponse,
    ) -> Result<()> {
        match classify_response(target, response)? {
            DeleteOutcome::NotFound => {
                debug!(resource = %target, "mutation target no longer exists.");
                Ok(())
            }
            DeleteOutcome::Deleted => Ok(()),
            DeleteOutcome::Accepted(operation) => {
                self.wait_for(&operation, kind).await?;
                Ok(())
            }
        }
    }
}
