// Property-based tests for cleanup runs over generated NetApp trees.
//
// Ordering: no resource is deleted before every resource nested below it.
// Dry-run: a preview issues no mutating call and lists exactly what a real
// run lists.
// Safety: resources in groups outside the prefix never see a mutating call.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::coordinator::RunCoordinator;
    use crate::plan::Family;
    use crate::plan::netapp::{CAPACITY_POOL, NETAPP_ACCOUNT, SNAPSHOT, SNAPSHOT_POLICY, VOLUME};
    use crate::test_utils::{MockProvider, ProviderCall, make_test_config};
    use crate::types::ResourceRef;
    use crate::types::token::create_run_cancellation_token;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Generators
    // -----------------------------------------------------------------------

    /// Shape of one NetApp account: snapshots per volume, volumes per pool.
    #[derive(Debug, Clone)]
    struct AccountShape {
        group: String,
        pools: Vec<Vec<usize>>,
        snapshot_policies: usize,
    }

    fn arb_account(group: impl Strategy<Value = String>) -> impl Strategy<Value = AccountShape> {
        (
            group,
            prop::collection::vec(prop::collection::vec(0usize..4, 0..3), 0..3),
            0usize..2,
        )
            .prop_map(|(group, pools, snapshot_policies)| AccountShape {
                group,
                pools,
                snapshot_policies,
            })
    }

    fn arb_in_scope_group() -> impl Strategy<Value = String> {
        "(acctest|AccTest|ACCTEST)-[a-z0-9]{1,8}"
    }

    fn arb_any_group() -> impl Strategy<Value = String> {
        prop_oneof![
            arb_in_scope_group(),
            "(prod|shared|test-acctest)-[a-z0-9]{1,8}",
        ]
    }

    fn build(mock: &MockProvider, shapes: &[AccountShape]) -> Vec<ResourceRef> {
        let subscription = ResourceRef::for_subscription("sub1");
        let mut accounts = Vec::new();
        for (index, shape) in shapes.iter().enumerate() {
            let account_id = format!(
                "/subscriptions/sub1/resourceGroups/{}/providers/Microsoft.NetApp/netAppAccounts/acct{index}",
                shape.group
            );
            let account = mock.add(&subscription, &NETAPP_ACCOUNT, &account_id);
            for (p, volumes) in shape.pools.iter().enumerate() {
                let pool_id = format!("{account_id}/capacityPools/pool{p}");
                let pool = mock.add(&account, &CAPACITY_POOL, &pool_id);
                for (v, snapshots) in volumes.iter().enumerate() {
                    let volume_id = format!("{pool_id}/volumes/vol{v}");
                    let volume = mock.add(&pool, &VOLUME, &volume_id);
                    for s in 0..*snapshots {
                        mock.add(&volume, &SNAPSHOT, &format!("{volume_id}/snapshots/snap{s}"));
                    }
                }
            }
            for s in 0..shape.snapshot_policies {
                mock.add(
                    &account,
                    &SNAPSHOT_POLICY,
                    &format!("{account_id}/snapshotPolicies/policy{s}"),
                );
            }
            accounts.push(account);
        }
        accounts
    }

    fn run(mock: &MockProvider, dry_run: bool) {
        let mut config = Config {
            families: vec![Family::NetApp],
            ..make_test_config()
        };
        config.cleanup_options.dry_run = dry_run;

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut coordinator =
                RunCoordinator::new(config, Box::new(mock.clone()), create_run_cancellation_token());
            let errors = coordinator.run().await.unwrap();
            assert!(errors.is_empty(), "{:?}", errors.messages());
        });
    }

    fn is_nested_below(id: &str, ancestor: &str) -> bool {
        id.len() > ancestor.len()
            && id[..ancestor.len()].eq_ignore_ascii_case(ancestor)
            && id.as_bytes()[ancestor.len()] == b'/'
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            .. ProptestConfig::default()
        })]

        #[test]
        fn nested_resources_are_deleted_before_their_parents(
            shapes in prop::collection::vec(arb_account(arb_in_scope_group()), 1..3),
        ) {
            let mock = MockProvider::new();
            let accounts = build(&mock, &shapes);
            run(&mock, false);

            let deleted = mock.deleted_ids();
            for (index, id) in deleted.iter().enumerate() {
                let later_descendant = deleted[index + 1..]
                    .iter()
                    .find(|later| is_nested_below(later, id));
                prop_assert!(
                    later_descendant.is_none(),
                    "{} deleted before {:?}",
                    id,
                    later_descendant
                );
            }
            for account in &accounts {
                prop_assert!(!mock.exists(account));
            }
        }

        #[test]
        fn dry_run_only_lists_and_lists_the_same(
            shapes in prop::collection::vec(arb_account(arb_in_scope_group()), 1..3),
        ) {
            let preview = MockProvider::new();
            build(&preview, &shapes);
            run(&preview, true);

            let real = MockProvider::new();
            build(&real, &shapes);
            run(&real, false);

            prop_assert!(preview.mutating_calls().is_empty());
            prop_assert!(
                preview
                    .calls()
                    .iter()
                    .all(|call| matches!(call, ProviderCall::List { .. })),
                "dry run issued a call other than a listing: {:?}",
                preview.calls()
            );

            let mut previewed = preview.listed_paths();
            let mut listed = real.listed_paths();
            previewed.sort();
            listed.sort();
            prop_assert_eq!(previewed, listed);
        }

        #[test]
        fn groups_outside_the_prefix_see_no_mutating_call(
            shapes in prop::collection::vec(arb_account(arb_any_group()), 1..5),
        ) {
            let mock = MockProvider::new();
            build(&mock, &shapes);
            run(&mock, false);

            for call in mock.mutating_calls() {
                let id = match call {
                    ProviderCall::Delete { id }
                    | ProviderCall::Patch { id, .. }
                    | ProviderCall::Post { id, .. } => id,
                    other => panic!("unexpected mutating call {other:?}"),
                };
                let group = id.parse::<ResourceRef>().unwrap().resource_group().unwrap().to_lowercase();
                prop_assert!(group.starts_with("acctest"), "mutated {}", id);
            }
        }
    }
}
