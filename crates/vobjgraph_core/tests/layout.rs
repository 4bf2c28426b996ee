use vobjgraph_core::{
    layout_hierarchical, Canvas, ForceConfig, ForceSimulation, HierarchicalConfig, Link,
    LinkTarget, LodPolicy, NodeDetail, RealId, Record, StepOutcome, Store, Viewport,
};

fn fan_out(store: &Store, children: usize) -> (RealId, Vec<RealId>) {
    let service = store.service().unwrap();
    let root = service.create("root", Record::empty()).unwrap();
    let ids = (0..children)
        .map(|index| {
            let child = service
                .create(format!("child {index}"), Record::empty())
                .unwrap();
            service
                .add_link(root, 0, Link::new(LinkTarget::new(child, 0), "child"))
                .unwrap();
            child
        })
        .collect();
    (root, ids)
}

#[test]
fn hierarchical_layout_of_a_traversal_stacks_children() {
    let store = Store::open_in_memory().unwrap();
    let (root, children) = fan_out(&store, 3);
    let graph = store
        .service()
        .unwrap()
        .build_reference_graph(root, 16)
        .unwrap();
    let config = HierarchicalConfig::default();

    let mut nodes = graph.nodes.clone();
    let layout = layout_hierarchical(&nodes, &config);
    layout.apply_to(&mut nodes);

    let column_x = config.node_width + config.horizontal_gap;
    for (row, child) in children.iter().enumerate() {
        let node = graph.node_of(*child).unwrap();
        let placed = &nodes[node.node_id];
        assert_eq!(placed.position.x, column_x);
        assert_eq!(
            placed.position.y,
            row as f64 * (config.node_height + config.vertical_gap)
        );
    }
    assert_eq!(nodes[0].position.x, 0.0);
}

#[test]
fn force_layout_sizes_hubs_by_in_degree_and_terminates() {
    let store = Store::open_in_memory().unwrap();
    let service = store.service().unwrap();
    let (root, children) = fan_out(&store, 3);
    for child in &children[1..] {
        service
            .add_link(*child, 0, Link::new(LinkTarget::new(children[0], 0), "hub"))
            .unwrap();
    }
    let graph = service.build_reference_graph(root, 16).unwrap();
    let config = ForceConfig::default();

    let mut simulation = ForceSimulation::from_graph(&graph, Canvas::new(1000.0, 800.0), config);
    let hub = graph.node_of(children[0]).unwrap().node_id;
    let leaf = graph.node_of(children[1]).unwrap().node_id;
    assert!(simulation.nodes()[hub].radius > simulation.nodes()[leaf].radius);

    let outcome = simulation.run();
    assert!(matches!(
        outcome,
        StepOutcome::Settled | StepOutcome::IterationCap
    ));
    assert!(simulation.iterations() <= config.max_iterations);
}

#[test]
fn viewport_detail_follows_zoom() {
    let policy = LodPolicy::default();
    let mut viewport = Viewport::new(0.0, 0.0, 800.0, 600.0);
    let radius = 30.0;
    assert_eq!(
        policy.node_detail(radius, viewport.scale, 800.0),
        NodeDetail::Marker
    );

    for _ in 0..12 {
        viewport.zoom(-1, 400.0, 300.0, 800.0, 600.0);
    }
    assert_eq!(
        policy.node_detail(radius, viewport.scale, 800.0),
        NodeDetail::Full
    );
}
