//! Property-based tests for the resource group prefix guard.

#[cfg(test)]
mod tests {
    use crate::safety::SafetyChecker;
    use crate::types::ResourceRef;
    use proptest::prelude::*;

    fn random_case(value: &str, flips: &[bool]) -> String {
        value
            .chars()
            .zip(flips.iter().cycle())
            .map(|(c, upper)| {
                if *upper {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn groups_starting_with_prefix_are_in_scope(
            prefix in "[a-z][a-z0-9-]{0,11}",
            suffix in "[a-zA-Z0-9_-]{0,20}",
            flips in prop::collection::vec(any::<bool>(), 1..8),
        ) {
            let checker = SafetyChecker::with_prefix(&prefix, false);
            let group = format!("{}{}", random_case(&prefix, &flips), suffix);
            let resource = ResourceRef::for_resource_group("sub1", &group);

            prop_assert!(checker.is_in_scope(&resource));
            prop_assert!(checker.check_before_mutation(&resource).is_ok());
        }

        #[test]
        fn groups_not_starting_with_prefix_are_refused(
            prefix in "[a-z]{3,8}",
            group in "[a-z0-9-]{1,20}",
        ) {
            prop_assume!(!group.starts_with(&prefix));
            let checker = SafetyChecker::with_prefix(&prefix, false);
            let account = ResourceRef::for_resource_group("sub1", &group)
                .provider_child("Microsoft.NetApp", "netAppAccounts", &format!("{prefix}-account"));

            prop_assert!(!checker.is_in_scope(&account));
            prop_assert!(checker.check_before_mutation(&account).is_err());
        }
    }
}
