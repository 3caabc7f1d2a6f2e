// Property-based tests for resource identifier parsing.
//
// Serializing a parsed identifier and parsing it again yields the same value,
// whatever casing the well-known keys had in the input.

#[cfg(test)]
mod tests {
    use crate::types::ResourceRef;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Generators
    // -----------------------------------------------------------------------

    fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9_.-]{0,15}"
    }

    /// Spell a well-known key in a random mix of cases.
    fn arb_casing(key: &'static str) -> impl Strategy<Value = String> {
        prop::collection::vec(any::<bool>(), key.len()).prop_map(move |flips| {
            key.chars()
                .zip(flips)
                .map(|(c, upper)| {
                    if upper {
                        c.to_ascii_uppercase()
                    } else {
                        c.to_ascii_lowercase()
                    }
                })
                .collect()
        })
    }

    fn arb_resource_type() -> impl Strategy<Value = String> {
        "[a-z][A-Za-z]{1,12}".prop_filter("well-known keys are not resource types", |key| {
            !["subscriptions", "resourcegroups", "providers"]
                .contains(&key.to_ascii_lowercase().as_str())
        })
    }

    /// A nested provider resource identifier with arbitrary key casing.
    fn arb_identifier() -> impl Strategy<Value = String> {
        (
            arb_casing("subscriptions"),
            arb_name(),
            arb_casing("resourceGroups"),
            arb_name(),
            arb_casing("providers"),
            "Microsoft\\.[A-Za-z]{2,10}",
            prop::collection::vec((arb_resource_type(), arb_name()), 1..4),
        )
            .prop_map(|(subs, sub, groups, group, providers, namespace, nested)| {
                let mut id = format!("/{subs}/{sub}/{groups}/{group}/{providers}/{namespace}");
                for (resource_type, name) in nested {
                    id.push_str(&format!("/{resource_type}/{name}"));
                }
                id
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 200,
            .. ProptestConfig::default()
        })]

        #[test]
        fn parse_serialize_round_trip(id in arb_identifier()) {
            let parsed: ResourceRef = id.parse().unwrap();
            let serialized = parsed.to_string();
            let reparsed: ResourceRef = serialized.parse().unwrap();

            prop_assert_eq!(&reparsed, &parsed);
            prop_assert_eq!(reparsed.to_string(), serialized.clone());
            prop_assert!(serialized.starts_with("/subscriptions/"));
            prop_assert!(serialized.contains("/resourceGroups/"));
            prop_assert!(parsed.eq_ignore_case(&id.to_ascii_lowercase().parse().unwrap()));
        }

        #[test]
        fn parent_chain_reaches_the_subscription(id in arb_identifier()) {
            let parsed: ResourceRef = id.parse().unwrap();
            let group = parsed.resource_group().unwrap().to_string();

            let mut current = parsed.clone();
            let mut depth = 0;
            while let Some(parent) = current.parent() {
                prop_assert!(current.to_string().starts_with(&parent.to_string()));
                current = parent;
                depth += 1;
            }
            prop_assert!(depth >= 2);
            prop_assert_eq!(current, ResourceRef::for_subscription(parsed.subscription_id()));
            prop_assert_eq!(parsed.resource_group(), Some(group.as_str()));
        }
    }
}
