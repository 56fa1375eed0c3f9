#![forbid(unsafe_code)]

use proptest::prelude::*;
use tp_core::model::InvariantViolation;
use tp_core::weight::effective_weight;
use tp_core::{
    Category, CategoryId, CategorySet, EngineConfig, EngineError, InMemoryStore, Organizer,
    WeightValue,
};

const POOL: i64 = 8;

fn id(value: i64) -> CategoryId {
    CategoryId::new(value)
}

/// Eight categories: 1 is a group holding 2 and 3, the rest are root leaves.
fn seed() -> Vec<Category> {
    (1..=POOL)
        .map(|value| {
            let mut c = Category::manual(id(value), &format!("topic {value}"));
            if value == 2 || value == 3 {
                c.parent_id = Some(id(1));
            }
            c
        })
        .collect()
}

fn organizer() -> Organizer<InMemoryStore> {
    Organizer::open(InMemoryStore::with_categories(seed()), EngineConfig::default())
        .expect("open organizer")
}

#[derive(Clone, Debug)]
enum Op {
    Move(Vec<i64>, i64),
    Ungroup(Vec<i64>),
    UngroupGroup(i64),
    Delete(Vec<i64>),
    Hide(i64),
    Unhide(i64),
    Merge(i64, i64),
    Drop(i64, String),
    CreateGroup(Vec<i64>),
}

fn any_id() -> impl Strategy<Value = i64> {
    1..=POOL + 1
}

fn any_ids() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(any_id(), 0..4)
}

fn any_drop_target() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ungroup-zone".to_string()),
        any_id().prop_map(|v| format!("group:{v}")),
        any_id().prop_map(|v| format!("category:{v}")),
        Just("nowhere".to_string()),
    ]
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any_ids(), any_id()).prop_map(|(ids, target)| Op::Move(ids, target)),
        any_ids().prop_map(Op::Ungroup),
        any_id().prop_map(Op::UngroupGroup),
        any_ids().prop_map(Op::Delete),
        any_id().prop_map(Op::Hide),
        any_id().prop_map(Op::Unhide),
        (any_id(), any_id()).prop_map(|(a, b)| Op::Merge(a, b)),
        (any_id(), any_drop_target()).prop_map(|(a, t)| Op::Drop(a, t)),
        any_ids().prop_map(Op::CreateGroup),
    ]
}

fn ids(values: &[i64]) -> Vec<CategoryId> {
    values.iter().copied().map(id).collect()
}

fn apply(org: &mut Organizer<InMemoryStore>, op: &Op, step: usize) {
    // Rejections are expected; only the resulting state matters here.
    let _ = match op {
        Op::Move(values, target) => org.move_to_group(&ids(values), id(*target)),
        Op::Ungroup(values) => org.ungroup(&ids(values)),
        Op::UngroupGroup(group) => org.ungroup_group(id(*group)),
        Op::Delete(values) => org.delete_categories(&ids(values)),
        Op::Hide(value) => org.hide(id(*value)),
        Op::Unhide(value) => org.unhide(id(*value)),
        Op::Merge(source, target) => org.merge_categories(id(*source), id(*target)),
        Op::Drop(active, target) => org.handle_drop(id(*active), Some(target.as_str())).map(|_| ()),
        Op::CreateGroup(values) => org
            .create_group_and_move(&format!("group {step}"), &ids(values))
            .map(|_| ()),
    };
}

#[derive(Clone, Copy, Debug)]
enum Batch {
    Ungroup,
    Delete,
    Hide,
}

fn any_batch() -> impl Strategy<Value = Batch> {
    prop_oneof![Just(Batch::Ungroup), Just(Batch::Delete), Just(Batch::Hide)]
}

fn run_batch(
    org: &mut Organizer<InMemoryStore>,
    batch: Batch,
    values: &[i64],
) -> Result<(), EngineError> {
    match batch {
        Batch::Ungroup => org.ungroup(&ids(values)),
        Batch::Delete => org.delete_categories(&ids(values)),
        Batch::Hide => org.hide_categories(&ids(values)),
    }
}

fn structural_violations(view: &CategorySet) -> Vec<InvariantViolation> {
    view.check_invariants()
}

proptest! {
    #[test]
    fn hierarchy_stays_two_levels_deep(ops in prop::collection::vec(any_op(), 1..24)) {
        let mut org = organizer();
        for (step, op) in ops.iter().enumerate() {
            apply(&mut org, op, step);
            let local = structural_violations(org.view());
            prop_assert!(local.is_empty(), "view after {:?}: {:?}", op, local);
            let durable = structural_violations(org.store().categories());
            prop_assert!(durable.is_empty(), "store after {:?}: {:?}", op, durable);
        }
    }

    #[test]
    fn move_batch_ignores_id_order(
        values in prop::collection::vec(1..=POOL, 1..6),
        target in 1..=POOL,
    ) {
        let mut forward = organizer();
        let mut backward = organizer();
        let mut reversed = values.clone();
        reversed.reverse();

        let a = forward.move_to_group(&ids(&values), id(target));
        let b = backward.move_to_group(&ids(&reversed), id(target));

        prop_assert_eq!(a.is_ok(), b.is_ok());
        prop_assert_eq!(a.err(), b.err());
        prop_assert_eq!(forward.view(), backward.view());
        prop_assert_eq!(forward.store().categories(), backward.store().categories());
    }

    #[test]
    fn batch_operations_ignore_id_order(
        batch in any_batch(),
        values in prop::collection::vec(any_id(), 1..6),
    ) {
        let mut forward = organizer();
        let mut backward = organizer();
        let mut reversed = values.clone();
        reversed.reverse();

        let a = run_batch(&mut forward, batch, &values);
        let b = run_batch(&mut backward, batch, &reversed);

        prop_assert_eq!(a, b);
        prop_assert_eq!(forward.view(), backward.view());
        prop_assert_eq!(forward.store().categories(), backward.store().categories());
        prop_assert_eq!(forward.store().calls(), backward.store().calls());
    }

    #[test]
    fn effective_weight_follows_override_then_parent(
        weights in prop::collection::vec(
            prop::option::of(prop::sample::select(WeightValue::ALL.to_vec())),
            POOL as usize,
        ),
    ) {
        let categories: Vec<Category> = seed()
            .into_iter()
            .zip(weights)
            .map(|(mut c, w)| {
                c.weight = w;
                c
            })
            .collect();
        let set = CategorySet::from_categories(categories);

        for category in set.iter() {
            let expected = match (category.weight, set.parent_of(category.id)) {
                (Some(own), _) => own,
                (None, Some(parent)) => effective_weight(parent, None),
                (None, None) => WeightValue::Neutral,
            };
            prop_assert_eq!(set.effective_weight(category.id), Some(expected));
        }
    }

    #[test]
    fn hide_is_idempotent(target in 1..=POOL) {
        let mut once = organizer();
        once.hide(id(target)).expect("hide");
        let mut twice = organizer();
        twice.hide(id(target)).expect("hide");
        twice.hide(id(target)).expect("hide again");
        prop_assert_eq!(once.view(), twice.view());
    }
}
