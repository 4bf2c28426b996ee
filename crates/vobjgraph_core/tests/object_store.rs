use uuid::Uuid;
use vobjgraph_core::{
    parse_links, Link, LinkRect, LinkTarget, ObjectService, RealId, Record, RepoError,
    SqliteObjectRepository, Store,
};

fn link_to(target: RealId, name: &str) -> Link {
    Link::new(LinkTarget::new(target, 0), name)
}

fn ref_count(service: &ObjectService<SqliteObjectRepository<'_>>, id: RealId) -> u32 {
    service.load(id).unwrap().meta.ref_count
}

#[test]
fn create_link_unlink_scenario() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();

    let jan = service.create("Jan", Record::empty()).unwrap();
    assert_eq!(ref_count(&service, jan), 0);

    assert_eq!(service.link_to(jan).unwrap(), 1);
    assert_eq!(ref_count(&service, jan), 1);
    assert!(!service.list_unreferenced().unwrap().contains(&jan));

    assert_eq!(service.unlink_from(jan).unwrap(), 0);
    assert!(service.list_unreferenced().unwrap().contains(&jan));
}

#[test]
fn unlink_floors_at_zero() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let id = service.create("lonely", Record::empty()).unwrap();

    assert_eq!(service.unlink_from(id).unwrap(), 0);
    assert_eq!(ref_count(&service, id), 0);
}

#[test]
fn missing_ids_surface_not_found() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let missing = Uuid::new_v4();

    assert!(matches!(service.load(missing), Err(RepoError::NotFound(id)) if id == missing));
    assert!(matches!(service.link_to(missing), Err(RepoError::NotFound(_))));
    assert!(matches!(
        service.physical_delete(missing),
        Err(RepoError::NotFound(_))
    ));
    assert!(matches!(
        service.clone_deep(missing, 10),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn list_unreferenced_follows_creation_order() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let first = service.create("first", Record::empty()).unwrap();
    let second = service.create("second", Record::empty()).unwrap();
    let third = service.create("third", Record::empty()).unwrap();
    service.link_to(second).unwrap();

    assert_eq!(service.list_unreferenced().unwrap(), vec![first, third]);
    assert_eq!(service.list_ids().unwrap(), vec![first, second, third]);
}

#[test]
fn link_edits_keep_ref_counts_equal_to_live_links() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let desk = service.create("desk", Record::empty()).unwrap();
    let tray = service.create("tray", Record::empty()).unwrap();
    let memo = service.create("memo", Record::empty()).unwrap();

    service.add_link(desk, 0, link_to(memo, "memo")).unwrap();
    service.add_link(tray, 0, link_to(memo, "memo again")).unwrap();
    let index = service.add_link(desk, 0, link_to(tray, "tray")).unwrap();
    assert_eq!(index, 1);
    assert_eq!(ref_count(&service, memo), 2);
    assert_eq!(ref_count(&service, tray), 1);

    let removed = service.remove_link(desk, 0, 0).unwrap();
    assert_eq!(removed.target.real_id, memo);
    assert_eq!(ref_count(&service, memo), 1);

    let remaining = parse_links(&service.load(desk).unwrap().records[0]);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].target.real_id, tray);

    assert!(service.reconcile().unwrap().is_clean());
}

#[test]
fn add_link_rejects_missing_targets_and_records() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let source = service.create("source", Record::empty()).unwrap();
    let target = service.create("target", Record::empty()).unwrap();

    assert!(matches!(
        service.add_link(source, 0, link_to(Uuid::new_v4(), "ghost")),
        Err(RepoError::NotFound(_))
    ));
    assert!(matches!(
        service.add_link(source, 3, link_to(target, "target")),
        Err(RepoError::RecordNotFound { record_no: 3, .. })
    ));
    assert!(matches!(
        service.add_link(
            source,
            0,
            link_to(target, "inverted").at(LinkRect::new(10, 10, 0, 0))
        ),
        Err(RepoError::InvalidLink(_))
    ));
    assert!(matches!(
        service.remove_link(source, 0, 0),
        Err(RepoError::LinkNotFound { index: 0, .. })
    ));
    assert_eq!(ref_count(&service, target), 0);
}

#[test]
fn append_record_counts_embedded_links() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let holder = service.create("holder", Record::empty()).unwrap();
    let target = service.create("target", Record::empty()).unwrap();

    let content = format!(
        "<document>\n<link id=\"{target}_0\">target</link>\n</document>\n"
    );
    let record_no = service.append_record(holder, Record::new(content)).unwrap();

    assert_eq!(record_no, 1);
    assert_eq!(ref_count(&service, target), 1);
    assert_eq!(service.load(holder).unwrap().records.len(), 2);
}

#[test]
fn save_preserves_ref_count_and_creation_time() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let id = service.create("draft", Record::empty()).unwrap();
    service.link_to(id).unwrap();

    let mut object = service.load(id).unwrap();
    let created_at = object.meta.created_at;
    object.meta.name = "final".to_string();
    object.meta.ref_count = 42;
    object.records[0] = Record::new("<document>edited</document>");
    service.save(id, &object).unwrap();

    let saved = service.load(id).unwrap();
    assert_eq!(saved.meta.name, "final");
    assert_eq!(saved.meta.ref_count, 1);
    assert_eq!(saved.meta.created_at, created_at);
    assert!(saved.meta.modified_at >= created_at);
    assert_eq!(saved.records[0].content, "<document>edited</document>");
}

#[test]
fn rename_and_default_handler_update_metadata() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let id = service.create("old", Record::empty()).unwrap();

    service.rename(id, "new").unwrap();
    service.set_default_handler(id, "text", "Text editor").unwrap();
    service.set_default_handler(id, "figure", "Figure editor").unwrap();

    let meta = service.load(id).unwrap().meta;
    assert_eq!(meta.name, "new");
    assert!(!meta.default_handlers["text"].is_default);
    assert!(meta.default_handlers["figure"].is_default);
    assert_eq!(meta.default_handlers["figure"].display_name, "Figure editor");
}

#[test]
fn reconcile_repairs_drift_and_is_idempotent() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let source = service.create("source", Record::empty()).unwrap();
    let target = service.create("target", Record::empty()).unwrap();
    service.add_link(source, 0, link_to(target, "target")).unwrap();

    service.link_to(target).unwrap();
    service.link_to(target).unwrap();
    service.link_to(source).unwrap();

    let report = service.reconcile().unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.repairs.len(), 2);
    assert_eq!(ref_count(&service, target), 1);
    assert_eq!(ref_count(&service, source), 0);

    let snapshot = service
        .list_ids()
        .unwrap()
        .into_iter()
        .map(|id| service.load(id).unwrap())
        .collect::<Vec<_>>();
    let second = service.reconcile().unwrap();
    assert!(second.is_clean());
    let after = service
        .list_ids()
        .unwrap()
        .into_iter()
        .map(|id| service.load(id).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(snapshot, after);
}

#[test]
fn physical_delete_leaves_dangling_links_for_reconcile() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let source = service.create("source", Record::empty()).unwrap();
    let target = service.create("target", Record::empty()).unwrap();
    service.add_link(source, 0, link_to(target, "target")).unwrap();

    service.physical_delete(target).unwrap();

    assert!(matches!(service.load(target), Err(RepoError::NotFound(_))));
    assert_eq!(parse_links(&service.load(source).unwrap().records[0]).len(), 1);

    let report = service.reconcile().unwrap();
    assert_eq!(report.dangling_links, 1);
    assert!(report.is_clean());

    let removed = service.remove_link(source, 0, 0).unwrap();
    assert_eq!(removed.target.real_id, target);
}

#[test]
fn malformed_link_does_not_hide_the_rest_of_a_record() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let holder = service.create("holder", Record::empty()).unwrap();
    let target = service.create("target", Record::empty()).unwrap();

    let content = format!(
        "<document>\n<link id=\"not-a-token\">broken</link>\n<link id=\"{target}_0\" vobjleft=\"5\">ok</link>\n</document>\n"
    );
    service.append_record(holder, Record::new(content)).unwrap();

    assert_eq!(ref_count(&service, target), 1);
    let report = service.reconcile().unwrap();
    assert!(report.is_clean());
}

#[test]
fn add_link_keeps_content_after_an_unterminated_element() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let holder = service.create("holder", Record::empty()).unwrap();
    let first = service.create("first", Record::empty()).unwrap();
    let second = service.create("second", Record::empty()).unwrap();

    let content = format!(
        "<document><link id=\"{first}_0\">unterminated <p>keep me</p><link id=\"{second}_0\">second</link></document>"
    );
    service.append_record(holder, Record::new(content)).unwrap();
    assert_eq!(ref_count(&service, second), 1);
    assert_eq!(ref_count(&service, first), 0);

    service.add_link(holder, 1, link_to(first, "first")).unwrap();

    let record = &service.load(holder).unwrap().records[1];
    assert!(record.content.contains("unterminated <p>keep me</p>"));
    let targets = parse_links(record)
        .into_iter()
        .map(|link| link.target.real_id)
        .collect::<Vec<_>>();
    assert_eq!(targets, vec![second, first]);
    assert!(service.reconcile().unwrap().is_clean());
}

#[test]
fn physical_delete_removes_objects_with_corrupt_records() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let id = service.create("corrupt", Record::empty()).unwrap();
    service.link_to(id).unwrap();
    store
        .connection()
        .execute("DELETE FROM records WHERE real_id = ?1;", [id.to_string()])
        .unwrap();
    assert!(matches!(service.load(id), Err(RepoError::Validation(_))));

    service.physical_delete(id).unwrap();

    assert!(service.list_ids().unwrap().is_empty());
    assert!(matches!(service.load(id), Err(RepoError::NotFound(_))));
}
