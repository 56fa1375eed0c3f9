#![forbid(unsafe_code)]

use std::time::{Duration, Instant};
use tp_core::memory::StoreOp;
use tp_core::{
    Category, CategoryId, CategoryStore, DropDecision, DropOutcome, EngineConfig, EngineError,
    InMemoryStore, MutationKey, Organizer, StructureError, WeightValue,
};

fn id(value: i64) -> CategoryId {
    CategoryId::new(value)
}

fn root(value: i64, name: &str) -> Category {
    Category::manual(id(value), name)
}

fn child(value: i64, name: &str, parent: i64) -> Category {
    let mut c = root(value, name);
    c.parent_id = Some(id(parent));
    c
}

fn organizer(categories: Vec<Category>) -> Organizer<InMemoryStore> {
    Organizer::open(
        InMemoryStore::with_categories(categories),
        EngineConfig::default(),
    )
    .expect("open organizer")
}

fn find(org: &Organizer<InMemoryStore>, name: &str) -> Category {
    org.view()
        .iter()
        .find(|c| c.display_name == name)
        .cloned()
        .unwrap_or_else(|| panic!("category {name} not found"))
}

#[test]
fn delete_group_releases_children_with_overrides() {
    let mut rust = child(2, "rust", 1);
    rust.weight = Some(WeightValue::High);
    let mut org = organizer(vec![root(1, "programming"), rust, child(3, "go", 1)]);

    org.delete_category(id(1)).expect("delete");

    let rust = org.category(id(2)).expect("rust survives");
    let go = org.category(id(3)).expect("go survives");
    assert!(rust.is_root());
    assert!(go.is_root());
    assert_eq!(rust.weight, Some(WeightValue::High));
    assert_eq!(go.weight, None);
    assert_eq!(
        org.weight(id(3)).expect("resolved").value,
        WeightValue::Neutral
    );
    assert!(org.category(id(1)).is_none());

    let stored = org.store().list_categories().expect("list");
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|c| c.parent_id.is_none()));
}

#[test]
fn rename_normalizes_and_rejects_collisions() {
    let mut org = organizer(vec![root(1, "ml"), root(2, "Databases")]);

    org.rename_category(id(1), "  Machine   Learning ")
        .expect("rename");
    let renamed = org.category(id(1)).expect("renamed");
    assert_eq!(renamed.display_name, "Machine Learning");
    assert_eq!(renamed.slug, "machine-learning");

    org.store_mut().clear_calls();
    let err = org
        .rename_category(id(1), "databases")
        .expect_err("collision");
    assert_eq!(err.code(), "DUPLICATE_NAME");
    assert_eq!(org.category(id(1)).expect("kept").slug, "machine-learning");
    assert!(org.store().calls().is_empty(), "no store call on rejection");
}

#[test]
fn dragging_leaf_onto_leaf_promotes_the_target() {
    let mut org = organizer(vec![root(1, "databases"), root(2, "storage")]);

    let outcome = org
        .handle_drop(id(2), Some("category:1"))
        .expect("drop");
    assert_eq!(
        outcome,
        DropOutcome::Apply(DropDecision::PromoteAndMove {
            leaf: id(1),
            id: id(2)
        })
    );

    let tree = org.tree();
    assert_eq!(tree.groups.len(), 1);
    assert_eq!(tree.groups[0].group.display_name, "databases");
    assert_eq!(tree.groups[0].group.id, id(1));
    let children: Vec<&str> = tree.groups[0]
        .children
        .iter()
        .map(|c| c.display_name.as_str())
        .collect();
    assert_eq!(children, vec!["storage"]);
    assert!(tree.ungrouped.is_empty());
}

#[test]
fn clearing_override_restores_inherited_weight() {
    let mut backend = root(1, "backend");
    backend.weight = Some(WeightValue::Medium);
    let mut org = organizer(vec![backend, child(2, "apis", 1)]);

    org.set_weight(id(2), Some(WeightValue::Blocked))
        .expect("set");
    assert!(org.is_blocked(&[id(2)]));
    org.set_weight_named(id(2), "inherit").expect("reset");

    let resolved = org.weight(id(2)).expect("resolved");
    assert_eq!(resolved.value, WeightValue::Medium);
    assert!(!resolved.overridden);
    assert_eq!(resolved.inherited_from, Some(id(1)));
}

#[test]
fn acknowledge_twice_matches_once() {
    let mut store = InMemoryStore::new();
    let x = store.discover("x").expect("discover");
    let mut org = Organizer::open(store, EngineConfig::default()).expect("open");
    assert!(org.novelty().new.contains(&x.id));
    assert_eq!(org.unseen_badge(), 1);

    org.acknowledge(&[x.id]).expect("first");
    let once = org.novelty();
    org.acknowledge(&[x.id]).expect("second");
    let twice = org.novelty();

    assert_eq!(once, twice);
    assert!(!twice.new.contains(&x.id));
    assert!(!twice.returned.contains(&x.id));
    assert_eq!(org.unseen_badge(), 0);
}

#[test]
fn hide_twice_matches_once() {
    let mut org = organizer(vec![root(1, "news"), child(2, "celebs", 1)]);
    org.hide(id(2)).expect("hide");
    let once = org.view().clone();
    org.store_mut().clear_calls();
    org.hide(id(2)).expect("hide again");

    assert_eq!(org.view(), &once);
    assert!(org.store().calls().is_empty());
    let hidden = org.category(id(2)).expect("kept");
    assert_eq!(hidden.parent_id, Some(id(1)));
    assert!(org.tree().is_hidden(id(2)));
}

#[test]
fn store_failure_rolls_back_and_notifies() {
    let mut org = organizer(vec![root(1, "programming"), root(2, "rust")]);
    let before = org.view().clone();
    org.store_mut().fail_next(StoreOp::SaveGroupStructure);

    let err = org.move_to_group(&[id(2)], id(1)).expect_err("store down");
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(org.view(), &before);
    assert!(!org.is_pending(&MutationKey::Structure));

    let notices = org.drain_notices();
    assert_eq!(notices.len(), 1);

    org.move_to_group(&[id(2)], id(1)).expect("retry by caller");
    assert_eq!(org.category(id(2)).expect("moved").parent_id, Some(id(1)));
}

#[test]
fn failed_delete_after_release_matches_store() {
    let mut rust = child(2, "rust", 1);
    rust.weight = Some(WeightValue::Low);
    let mut org = organizer(vec![root(1, "programming"), rust, child(3, "go", 1)]);
    org.store_mut().fail_next(StoreOp::DeleteCategory);

    let err = org.delete_category(id(1)).expect_err("delete step fails");
    assert!(matches!(err, EngineError::Store(_)));

    // The release already landed; the view follows the store, not the snapshot.
    assert_eq!(org.view(), org.store().categories());
    assert!(org.category(id(1)).is_some());
    assert_eq!(org.category(id(2)).expect("rust").parent_id, None);
    assert_eq!(org.category(id(2)).expect("rust").weight, Some(WeightValue::Low));
    assert!(!org.is_pending(&MutationKey::Structure));
    assert_eq!(org.drain_notices().len(), 1);

    org.delete_category(id(1)).expect("second attempt");
    assert!(org.category(id(1)).is_none());
    assert_eq!(org.view(), org.store().categories());
}

#[test]
fn create_group_and_move_validates_first() {
    let mut org = organizer(vec![
        root(1, "programming"),
        child(2, "rust", 1),
        root(3, "go"),
    ]);

    let err = org
        .create_group_and_move("languages", &[id(1)])
        .expect_err("group cannot be nested");
    assert_eq!(
        err,
        EngineError::Structure(StructureError::GroupUnderGroup { id: id(1) })
    );
    assert!(org.store().calls().is_empty());

    let err = org
        .create_group_and_move("Programming", &[id(3)])
        .expect_err("duplicate name");
    assert!(err.is_validation());

    let group = org
        .create_group_and_move("Languages", &[id(3), id(2)])
        .expect("create and move");
    assert!(group.is_manually_created);
    assert_eq!(org.view().child_ids(group.id), vec![id(2), id(3)]);
    assert!(!org.view().has_children(id(1)));
}

#[test]
fn merge_folds_children_and_counts() {
    let mut a = root(1, "ai");
    a.article_count = 3;
    let mut b = root(2, "artificial intelligence");
    b.article_count = 4;
    let mut org = organizer(vec![a, b, child(3, "llms", 1)]);

    org.merge_categories(id(1), id(2)).expect("merge");
    assert!(org.category(id(1)).is_none());
    let target = org.category(id(2)).expect("target");
    assert_eq!(target.article_count, 7);
    assert_eq!(org.view().child_ids(id(2)), vec![id(3)]);
    assert!(org.store().is_tombstoned("ai"));

    // A later rediscovery of the merged-away label comes back as returned.
    let back = org.store_mut().discover("AI").expect("discover");
    org.reload().expect("reload");
    assert!(org.novelty_flags(back.id).is_returned);
    assert_eq!(find(&org, "AI").id, back.id);
}

#[test]
fn ungroup_group_releases_every_child() {
    let mut org = organizer(vec![
        root(1, "programming"),
        child(2, "rust", 1),
        child(3, "go", 1),
    ]);
    org.ungroup_group(id(1)).expect("ungroup");
    let tree = org.tree();
    assert!(tree.groups.is_empty());
    assert_eq!(tree.ungrouped.len(), 3);
}

#[test]
fn ungroup_zone_drop_releases_child() {
    let mut org = organizer(vec![root(1, "programming"), child(2, "rust", 1)]);
    org.start_drag(id(2)).expect("start");
    let outcome = org.drop_on(Some("ungroup-zone")).expect("drop");
    assert_eq!(outcome, DropOutcome::Apply(DropDecision::Ungroup { id: id(2) }));
    assert!(org.category(id(2)).expect("rust").is_root());

    let ignored = org.handle_drop(id(1), Some("category:1")).expect("drop");
    assert!(matches!(ignored, DropOutcome::Ignore(_)));
    assert!(org.drain_notices().is_empty());
}

#[test]
fn novelty_poll_is_best_effort() {
    let mut store = InMemoryStore::new();
    store.discover("rust").expect("discover");
    let config = EngineConfig {
        novelty_poll_interval: Duration::from_secs(30),
        ..EngineConfig::default()
    };
    let mut org = Organizer::open(store, config).expect("open");

    let start = Instant::now();
    assert!(org.refresh_novelty(start));
    org.store_mut().discover("go").expect("discover");
    assert!(!org.refresh_novelty(start + Duration::from_secs(5)));
    assert_eq!(org.unseen_badge(), 1);
    assert!(org.refresh_novelty(start + Duration::from_secs(31)));
    assert_eq!(org.unseen_badge(), 2);
}
