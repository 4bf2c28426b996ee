use vobjgraph_core::{
    parse_links, Link, LinkTarget, ObjectService, RealId, Record, SqliteObjectRepository, Store,
};

type Service<'conn> = ObjectService<SqliteObjectRepository<'conn>>;

fn create(service: &Service<'_>, name: &str) -> RealId {
    service.create(name, Record::empty()).unwrap()
}

fn connect(service: &Service<'_>, from: RealId, to: RealId) {
    service
        .add_link(from, 0, Link::new(LinkTarget::new(to, 0), "ref"))
        .unwrap();
}

fn targets(service: &Service<'_>, id: RealId) -> Vec<RealId> {
    service
        .load(id)
        .unwrap()
        .records
        .iter()
        .flat_map(parse_links)
        .map(|link| link.target.real_id)
        .collect()
}

fn ref_count(service: &Service<'_>, id: RealId) -> u32 {
    service.load(id).unwrap().meta.ref_count
}

#[test]
fn deep_clone_is_isomorphic_with_fresh_ids() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let a = create(&service, "A");
    let b = create(&service, "B");
    connect(&service, a, b);

    let outcome = service.clone_deep(a, 10).unwrap();
    let a_clone = outcome.new_root_id;
    let b_clone = outcome.clone_map[&b];

    assert_ne!(a_clone, a);
    assert_ne!(b_clone, b);
    assert_ne!(a_clone, b_clone);
    assert_eq!(outcome.clone_map[&a], a_clone);
    assert!(!outcome.truncated);

    assert_eq!(targets(&service, a_clone), vec![b_clone]);
    assert_eq!(ref_count(&service, b_clone), 1);
    assert_eq!(ref_count(&service, a_clone), 0);
    assert_eq!(service.load(b_clone).unwrap().meta.name, "B");

    assert_eq!(ref_count(&service, b), 1);
    assert_eq!(targets(&service, a), vec![b]);
    assert!(service.reconcile().unwrap().is_clean());
}

#[test]
fn deep_clone_of_a_cycle_clones_each_object_once() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let a = create(&service, "A");
    let b = create(&service, "B");
    let c = create(&service, "C");
    connect(&service, a, b);
    connect(&service, b, c);
    connect(&service, c, a);
    let before = service.list_ids().unwrap().len();

    let outcome = service.clone_deep(a, 10).unwrap();

    assert_eq!(outcome.clone_map.len(), 3);
    assert_eq!(service.list_ids().unwrap().len(), before + 3);
    let (a2, b2, c2) = (outcome.clone_map[&a], outcome.clone_map[&b], outcome.clone_map[&c]);
    assert_eq!(targets(&service, a2), vec![b2]);
    assert_eq!(targets(&service, b2), vec![c2]);
    assert_eq!(targets(&service, c2), vec![a2]);
    for clone in [a2, b2, c2] {
        assert_eq!(ref_count(&service, clone), 1);
    }
    assert!(service.reconcile().unwrap().is_clean());
}

#[test]
fn shared_target_is_cloned_once() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let root = create(&service, "root");
    let left = create(&service, "left");
    let right = create(&service, "right");
    let shared = create(&service, "shared");
    connect(&service, root, left);
    connect(&service, root, right);
    connect(&service, left, shared);
    connect(&service, right, shared);

    let outcome = service.clone_deep(root, 10).unwrap();

    assert_eq!(outcome.clone_map.len(), 4);
    let shared_clone = outcome.clone_map[&shared];
    assert_eq!(targets(&service, outcome.clone_map[&left]), vec![shared_clone]);
    assert_eq!(targets(&service, outcome.clone_map[&right]), vec![shared_clone]);
    assert_eq!(ref_count(&service, shared_clone), 2);
}

#[test]
fn deep_clone_respects_the_node_budget() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let ids = (0..5)
        .map(|index| create(&service, &format!("n{index}")))
        .collect::<Vec<_>>();
    for pair in ids.windows(2) {
        connect(&service, pair[0], pair[1]);
    }
    let before = service.list_ids().unwrap().len();

    let outcome = service.clone_deep(ids[0], 2).unwrap();

    assert!(outcome.truncated);
    assert_eq!(outcome.clone_map.len(), 2);
    assert_eq!(service.list_ids().unwrap().len(), before + 2);

    let second_clone = outcome.clone_map[&ids[1]];
    assert_eq!(targets(&service, second_clone), vec![ids[2]]);
    assert_eq!(ref_count(&service, ids[2]), 2);
    assert!(service.reconcile().unwrap().is_clean());
}

#[test]
fn shallow_clone_copies_records_and_counts_their_links() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let source = create(&service, "source");
    let target = create(&service, "target");
    connect(&service, source, target);
    service.set_default_handler(source, "text", "Text").unwrap();

    let copy = service.clone_shallow(source, "copy").unwrap();

    let copied = service.load(copy).unwrap();
    assert_ne!(copy, source);
    assert_eq!(copied.meta.name, "copy");
    assert_eq!(copied.meta.ref_count, 0);
    assert_eq!(copied.records, service.load(source).unwrap().records);
    assert!(copied.meta.default_handlers.contains_key("text"));
    assert_eq!(ref_count(&service, target), 2);
    assert!(service.reconcile().unwrap().is_clean());
}
