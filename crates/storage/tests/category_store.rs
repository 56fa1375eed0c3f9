#![forbid(unsafe_code)]

use std::path::PathBuf;
use tp_core::model::{GroupStructure, Placement};
use tp_core::names::CategoryName;
use tp_core::{CategoryId, CategoryStore, StoreFailure, WeightValue};
use tp_storage::{DiscoverRequest, OpsLogRequest, SqliteStore, StoreError};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("tp_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn name(raw: &str) -> CategoryName {
    CategoryName::parse(raw, 100).expect("valid name")
}

fn place(id: CategoryId, parent: Option<CategoryId>) -> Placement {
    Placement { id, parent_id: parent }
}

#[test]
fn create_and_rename_enforce_unique_names() {
    let storage_dir = temp_dir("create_and_rename_enforce_unique_names");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let rust = store.create(&name("Rust")).expect("create rust");
    assert!(rust.is_seen);
    assert!(rust.is_manually_created);
    assert_eq!(rust.slug, "rust");

    let err = store.create(&name("  RUST ")).expect_err("case-folded duplicate");
    assert!(matches!(err, StoreError::NameTaken { ref name } if name == "Rust"));
    assert_eq!(err.code(), "CONFLICT");

    let go = store.create(&name("Go")).expect("create go");
    let err = store
        .rename(go.id, &name("rust"))
        .expect_err("rename onto an existing name");
    assert_eq!(StoreFailure::from(err), StoreFailure::Conflict("Rust".to_string()));

    let renamed = store.rename(rust.id, &name("RUST")).expect("case-only rename");
    assert_eq!(renamed.display_name, "RUST");
    assert_eq!(renamed.slug, "rust");

    let err = store
        .rename(CategoryId::new(99), &name("Zig"))
        .expect_err("unknown id");
    assert!(matches!(err, StoreError::UnknownId(id) if id == CategoryId::new(99)));
}

#[test]
fn group_structure_save_is_all_or_nothing() {
    let storage_dir = temp_dir("group_structure_save_is_all_or_nothing");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let a = store.create(&name("programming")).expect("a").id;
    let b = store.create(&name("rust")).expect("b").id;
    let c = store.create(&name("go")).expect("c").id;

    let nested = GroupStructure::from_placements([place(b, Some(a)), place(c, Some(b))]);
    let err = store.apply_structure(&nested).expect_err("three levels");
    assert!(matches!(err, StoreError::DepthViolation { id, parent } if id == c && parent == b));
    assert!(
        store
            .categories()
            .expect("list")
            .iter()
            .all(|category| category.parent_id.is_none()),
        "rejected save must not leave partial placements"
    );

    let flat = GroupStructure::from_placements([place(b, Some(a)), place(c, Some(a))]);
    store.apply_structure(&flat).expect("two levels");

    let groups = store.groups().expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group.id, a);
    assert_eq!(groups[0].child_ids, vec![b, c]);

    let err = store
        .apply_structure(&GroupStructure::from_placements([place(a, Some(a))]))
        .expect_err("self parent");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn delete_releases_children_and_tombstones_slug() {
    let storage_dir = temp_dir("delete_releases_children_and_tombstones_slug");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let group = store.create(&name("Databases")).expect("group").id;
    let child = store.create(&name("postgres")).expect("child").id;
    store
        .apply_structure(&GroupStructure::from_placements([place(child, Some(group))]))
        .expect("group");
    store
        .update_weight(child, Some(WeightValue::High))
        .expect("weight");

    store.remove(group).expect("delete group");

    let child_row = store.category(child).expect("load").expect("child kept");
    assert!(child_row.is_root());
    assert_eq!(child_row.weight, Some(WeightValue::High));
    assert!(store.category(group).expect("load").is_none());
    assert!(store.is_tombstoned("databases").expect("tombstone"));

    let back = store
        .discover(DiscoverRequest::new("databases"))
        .expect("rediscover");
    assert!(back.is_returned);
    assert!(!back.is_seen);
    assert_ne!(back.id, group);
    assert!(!store.is_tombstoned("databases").expect("tombstone cleared"));

    store.mark_seen(&[back.id]).expect("acknowledge");
    let seen = store.category(back.id).expect("load").expect("exists");
    assert!(seen.is_seen);
    assert!(!seen.is_returned);
}

#[test]
fn discover_counts_articles_and_unseen() {
    let storage_dir = temp_dir("discover_counts_articles_and_unseen");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");

    let first = store
        .discover(DiscoverRequest::new("Machine Learning"))
        .expect("discover");
    assert_eq!(first.article_count, 1);
    assert!(!first.is_returned);

    let again = store
        .discover(DiscoverRequest {
            name: "machine learning".to_string(),
            articles: 4,
        })
        .expect("discover again");
    assert_eq!(again.id, first.id);
    assert_eq!(again.article_count, 5);

    let other = store.discover(DiscoverRequest::new("Kernels")).expect("other");
    assert_eq!(store.count_unseen().expect("count"), 2);

    store.set_hidden(other.id, true).expect("hide");
    assert_eq!(store.unseen_count().expect("count"), 1);

    let changed = store
        .mark_seen(&[first.id, CategoryId::new(404)])
        .expect("acknowledge");
    assert_eq!(changed, 1);
    assert_eq!(store.count_unseen().expect("count"), 0);
    assert_eq!(store.mark_seen(&[first.id]).expect("again"), 0);
}

#[test]
fn rediscovering_hidden_category_unhides_it_as_returned() {
    let storage_dir = temp_dir("rediscovering_hidden_category_unhides_it_as_returned");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let crypto = store.discover(DiscoverRequest::new("Crypto")).expect("discover");
    store.mark_seen(&[crypto.id]).expect("acknowledge");
    store.set_hidden(crypto.id, true).expect("hide");

    let back = store
        .discover(DiscoverRequest::new("crypto"))
        .expect("rediscover");
    assert_eq!(back.id, crypto.id);
    assert!(!back.is_hidden);
    assert!(back.is_returned);
    assert!(!back.is_seen);
    assert_eq!(back.article_count, 2);
    assert_eq!(store.count_unseen().expect("count"), 1);

    let log = store.ops_log(OpsLogRequest::default()).expect("log");
    let last = log.last().expect("discover entry");
    assert_eq!(last.op, "discover");
    assert_eq!(last.payload["outcome"], "returned");

    let visible = store
        .discover(DiscoverRequest::new("Crypto"))
        .expect("discover visible");
    assert!(visible.is_returned);
    assert_eq!(visible.article_count, 3);
}

#[test]
fn merge_folds_children_and_counts() {
    let storage_dir = temp_dir("merge_folds_children_and_counts");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let source = store.discover(DiscoverRequest::new("ml")).expect("source").id;
    let target = store
        .discover(DiscoverRequest {
            name: "Machine Learning".to_string(),
            articles: 3,
        })
        .expect("target")
        .id;
    let child = store.create(&name("transformers")).expect("child").id;
    store
        .apply_structure(&GroupStructure::from_placements([place(child, Some(source))]))
        .expect("group");

    let merged = store.merge(source, target).expect("merge");
    assert_eq!(merged.id, target);
    assert_eq!(merged.article_count, 4);
    assert!(store.category(source).expect("load").is_none());
    assert_eq!(
        store.category(child).expect("load").expect("child").parent_id,
        Some(target)
    );
    assert!(store.is_tombstoned("ml").expect("tombstone"));

    let err = store.merge(target, target).expect_err("self merge");
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn merge_that_would_nest_three_levels_rolls_back() {
    let storage_dir = temp_dir("merge_that_would_nest_three_levels_rolls_back");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let group = store.create(&name("science")).expect("group").id;
    let target = store.create(&name("physics")).expect("target").id;
    let source = store.create(&name("chemistry")).expect("source").id;
    let leaf = store.create(&name("organic")).expect("leaf").id;
    store
        .apply_structure(&GroupStructure::from_placements([
            place(target, Some(group)),
            place(leaf, Some(source)),
        ]))
        .expect("structure");

    let err = store
        .merge_categories(source, target)
        .expect_err("depth violation");
    assert!(matches!(err, StoreFailure::Rejected(_)));

    assert!(store.category(source).expect("load").is_some());
    assert_eq!(
        store.category(leaf).expect("load").expect("leaf").parent_id,
        Some(source)
    );
    assert!(!store.is_tombstoned("chemistry").expect("tombstone"));
}

#[test]
fn ops_log_records_each_mutation_in_order() {
    let storage_dir = temp_dir("ops_log_records_each_mutation_in_order");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let a = store.create(&name("alpha")).expect("a").id;
    store.set_hidden(a, true).expect("hide");
    store.set_hidden(a, false).expect("unhide");
    store.update_weight(a, Some(WeightValue::Low)).expect("weight");
    store.update_weight(a, None).expect("inherit");
    store.remove(a).expect("delete");

    let log = store.ops_log(OpsLogRequest::default()).expect("log");
    let ops: Vec<&str> = log.iter().map(|record| record.op.as_str()).collect();
    assert_eq!(
        ops,
        vec!["create", "hide", "unhide", "set_weight", "set_weight", "delete"]
    );
    assert!(log.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    assert_eq!(log[3].payload["weight"], "low");
    assert!(log[4].payload["weight"].is_null());
    assert_eq!(log[5].payload["slug"], "alpha");

    let page = store
        .ops_log(OpsLogRequest {
            limit: 2,
            offset: 1,
        })
        .expect("page");
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].op, "hide");
}

#[test]
fn reopen_preserves_categories() {
    let storage_dir = temp_dir("reopen_preserves_categories");
    let id = {
        let mut store = SqliteStore::open(&storage_dir).expect("open store");
        let id = store.create(&name("persistent")).expect("create").id;
        store.update_weight(id, Some(WeightValue::Medium)).expect("weight");
        id
    };

    let store = SqliteStore::open(&storage_dir).expect("reopen");
    let category = store.category(id).expect("load").expect("exists");
    assert_eq!(category.display_name, "persistent");
    assert_eq!(category.weight, Some(WeightValue::Medium));
    assert_eq!(store.storage_dir(), storage_dir.as_path());
}
