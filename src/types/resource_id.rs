//! Hierarchical Azure Resource Manager identifiers.
//!
//! An identifier is a sequence of `key/value` pairs rooted at a subscription:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]
//! ```
//!
//! The well-known keys (`subscriptions`, `resourceGroups`, `providers`) are
//! matched case-insensitively and always serialized in their canonical
//! spelling, so the string form produced by [`ResourceRef`] parses back to an
//! equal value whatever casing the provider returned.

use std::fmt;
use std::str::FromStr;

use crate::types::error::ArmrmError;

const SUBSCRIPTIONS_KEY: &str = "subscriptions";
const RESOURCE_GROUPS_KEY: &str = "resourceGroups";
const PROVIDERS_KEY: &str = "providers";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Segment {
    key: String,
    value: String,
}

/// A parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    segments: Vec<Segment>,
}

impl ResourceRef {
    /// The subscription scope, used as the parent of top-level listings.
    ///
    /// ```
    /// use armrm_rs::types::ResourceRef;
    ///
    /// let scope = ResourceRef::for_subscription("00000000-0000-0000-0000-000000000000");
    /// assert_eq!(scope.to_string(), "/subscriptions/00000000-0000-0000-0000-000000000000");
    /// assert!(scope.resource_group().is_none());
    /// ```
    pub fn for_subscription(subscription_id: &str) -> Self {
        ResourceRef {
            segments: vec![Segment {
                key: SUBSCRIPTIONS_KEY.to_string(),
                value: subscription_id.to_string(),
            }],
        }
    }

    pub fn for_resource_group(subscription_id: &str, resource_group: &str) -> Self {
        let mut id = Self::for_subscription(subscription_id);
        id.segments.push(Segment {
            key: RESOURCE_GROUPS_KEY.to_string(),
            value: resource_group.to_string(),
        });
        id
    }

    pub fn subscription_id(&self) -> &str {
        &self.segments[0].value
    }

    /// Name of the enclosing resource group, if the identifier has one.
    pub fn resource_group(&self) -> Option<&str> {
        self.segments
            .get(1)
            .filter(|segment| segment.key == RESOURCE_GROUPS_KEY)
            .map(|segment| segment.value.as_str())
    }

    /// The last value in the path.
    pub fn name(&self) -> &str {
        &self.segments[self.segments.len() - 1].value
    }

    /// Namespace of the innermost provider, e.g. `Microsoft.NetApp`.
    pub fn provider_namespace(&self) -> Option<&str> {
        self.last_provider_index()
            .map(|index| self.segments[index].value.as_str())
    }

    /// Fully-qualified type such as `Microsoft.NetApp/netAppAccounts/capacityPools`.
    pub fn resource_type(&self) -> Option<String> {
        match self.last_provider_index() {
            Some(index) if index + 1 < self.segments.len() => {
                let mut parts = vec![self.segments[index].value.as_str()];
                parts.extend(self.segments[index + 1..].iter().map(|s| s.key.as_str()));
                Some(parts.join("/"))
            }
            Some(_) => None,
            None if self.resource_group().is_some() && self.segments.len() == 2 => {
                Some("Microsoft.Resources/resourceGroups".to_string())
            }
            None => None,
        }
    }

    /// True when the path addresses a provider resource rather than a scope.
    pub fn is_provider_resource(&self) -> bool {
        matches!(self.last_provider_index(), Some(index) if index + 1 < self.segments.len())
    }

    /// The identifier one level up. A top-level provider resource's parent is
    /// its resource group; a subscription has no parent.
    pub fn parent(&self) -> Option<ResourceRef> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut segments = self.segments[..self.segments.len() - 1].to_vec();
        if segments.last().map(|s| s.key.as_str()) == Some(PROVIDERS_KEY) {
            segments.pop();
        }
        Some(ResourceRef { segments })
    }

    /// Appends a nested `key/value` pair, e.g. `capacityPools/pool1`.
    pub fn child(&self, key: &str, name: &str) -> ResourceRef {
        let mut segments = self.segments.clone();
        segments.push(Segment {
            key: key.to_string(),
            value: name.to_string(),
        });
        ResourceRef { segments }
    }

    /// Appends `providers/{namespace}/{type}/{name}`.
    pub fn provider_child(&self, namespace: &str, resource_type: &str, name: &str) -> ResourceRef {
        self.child(PROVIDERS_KEY, namespace).child(resource_type, name)
    }

    /// Case-insensitive comparison, matching how the resource manager treats identifiers.
    pub fn eq_ignore_case(&self, other: &ResourceRef) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| {
                a.key.eq_ignore_ascii_case(&b.key) && a.value.eq_ignore_ascii_case(&b.value)
            })
    }

    fn last_provider_index(&self) -> Option<usize> {
        self.segments.iter().rposition(|s| s.key == PROVIDERS_KEY)
    }
}

fn canonical_key(key: &str) -> String {
    for known in [SUBSCRIPTIONS_KEY, RESOURCE_GROUPS_KEY, PROVIDERS_KEY] {
        if key.eq_ignore_ascii_case(known) {
            return known.to_string();
        }
    }
    key.to_string()
}

impl FromStr for ResourceRef {
    type Err = ArmrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ArmrmError::InvalidResourceId(format!("{reason}: {s:?}"));

        let trimmed = s.trim();
        let Some(path) = trimmed.strip_prefix('/') else {
            return Err(invalid("identifier must start with '/'"));
        };
        let path = path.strip_suffix('/').unwrap_or(path);

        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid("identifier contains an empty segment"));
        }
        if parts.len() % 2 != 0 {
            return Err(invalid("identifier has a key without a value"));
        }

        let segments: Vec<Segment> = parts
            .chunks(2)
            .map(|pair| Segment {
                key: canonical_key(pair[0]),
                value: pair[1].to_string(),
            })
            .collect();

        if segments[0].key != SUBSCRIPTIONS_KEY {
            return Err(invalid("identifier must start with /subscriptions/{id}"));
        }
        let misplaced_group = segments
            .iter()
            .enumerate()
            .any(|(index, segment)| segment.key == RESOURCE_GROUPS_KEY && index != 1);
        if misplaced_group {
            return Err(invalid("resourceGroups may only follow the subscription"));
        }
        if segments.iter().skip(1).any(|s| s.key == SUBSCRIPTIONS_KEY) {
            return Err(invalid("nested subscriptions are not supported"));
        }

        Ok(ResourceRef { segments })
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}/{}", segment.key, segment.value)?;
        }
        Ok(())
    }
}
