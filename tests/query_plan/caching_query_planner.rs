use fusion_federation::query_plan::operation::{Field, InlineFragment, Operation, SelectionSet};
use fusion_federation::query_plan::query_planner::QueryPlannerConfig;
use fusion_federation::Supergraph;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::fixtures;

fn names_and_prices() -> Operation {
    Operation::query(SelectionSet::new([Field::new("topProducts")
        .selection(Field::new("name"))
        .selection(Field::new("price"))
        .into()]))
}

#[test]
fn equivalent_operations_share_a_plan() {
    let planner = fixtures::shop().caching_query_planner(QueryPlannerConfig::default());
    let first = planner.plan(&names_and_prices()).unwrap();

    // Same operation once normalized: split selections and a fragment without condition.
    let respelled = Operation::query(SelectionSet::new([
        Field::new("topProducts").selection(Field::new("name")).into(),
        InlineFragment {
            type_condition: None,
            selection_set: SelectionSet::new([Field::new("topProducts")
                .selection(Field::new("price"))
                .into()]),
        }
        .into(),
    ]));
    let second = planner.plan(&respelled).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(planner.len(), 1);
}

#[test]
fn schema_updates_drop_cached_plans() {
    let planner = fixtures::shop().caching_query_planner(QueryPlannerConfig::default());
    let before = planner.plan(&names_and_prices()).unwrap();

    let updated = Supergraph::compose(&[fixtures::products(), fixtures::reviews()]).unwrap();
    planner.update_schema(updated.schema().clone());
    assert!(planner.is_empty());
    assert_eq!(planner.schema().version(), updated.schema().version());

    let after = planner.plan(&names_and_prices()).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(planner.len(), 1);
}

#[test]
fn errors_are_not_cached() {
    let planner = fixtures::shop().caching_query_planner(QueryPlannerConfig::default());
    let invalid = Operation::query(SelectionSet::new([Field::new("unknown").into()]));
    assert!(planner.plan(&invalid).is_err());
    assert!(planner.is_empty());
}

#[test]
fn least_recently_used_plans_are_evicted() {
    let config = QueryPlannerConfig {
        cache_capacity: NonZeroUsize::new(1).unwrap(),
        ..Default::default()
    };
    let planner = fixtures::shop().caching_query_planner(config);
    let first = planner.plan(&names_and_prices()).unwrap();
    let other = Operation::query(SelectionSet::new([Field::new("topProducts")
        .selection(Field::new("inStock"))
        .into()]));
    planner.plan(&other).unwrap();
    assert_eq!(planner.len(), 1);

    let replanned = planner.plan(&names_and_prices()).unwrap();
    assert!(!Arc::ptr_eq(&first, &replanned));
    assert_eq!(first, replanned);
}
