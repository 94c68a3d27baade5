use flowcanvas::events::GraphEvent;
use flowcanvas::extensions::{Capability, Extension};
use flowcanvas::geometry::coords::{GraphPoint, Viewport};
use flowcanvas::json::GraphDocument;
use flowcanvas::model::{Connection, Node, NodeId, Port};
use flowcanvas::Editor;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn sample() -> Editor {
    let mut ed = Editor::default();
    ed.add_node(Node::new("frame", -20.0, -20.0, 600.0, 300.0).group()).unwrap();
    ed.add_node(
        Node::new("a", 0.0, 0.0, 100.0, 60.0)
            .with_port(Port::output("out").with_offset(100.0, 20.0))
            .with_data(json!({"label": "source"})),
    )
    .unwrap();
    ed.add_node(Node::new("b", 300.0, 100.0, 100.0, 60.0).with_port(Port::input("in").single())).unwrap();
    ed.set_group_members("frame", &[NodeId::from("a"), NodeId::from("b")]).unwrap();
    ed.add_connection(Connection::new("ab", ("a", "out"), ("b", "in"))).unwrap();
    ed.add_control_point("ab", 0, GraphPoint::new(200.0, 20.0)).unwrap();
    ed.set_connection_locked("ab", true).unwrap();
    ed.set_metadata("title", json!("pipeline"));
    ed.set_viewport(Viewport::new(15.0, -30.0, 1.5)).unwrap();
    ed
}

#[test]
fn documents_survive_a_json_round_trip() {
    let src = sample();
    let doc = src.to_document();
    let text = src.to_json_string();

    let mut dst = Editor::default();
    dst.from_json_str(&text).unwrap();
    assert_eq!(dst.to_document(), doc);
    assert_eq!(dst.viewport(), Viewport::new(15.0, -30.0, 1.5));
    assert_eq!(dst.group_members("frame"), vec![NodeId::from("a"), NodeId::from("b")]);
    assert!(dst.connection("ab").unwrap().locked);
    assert_eq!(dst.metadata().get("title"), Some(&json!("pipeline")));
    assert!(dst.connection_path("ab").is_some());
    assert!(dst.store().indexes_consistent());
}

#[test]
fn loading_is_one_batch() {
    let doc = sample().to_document();
    let mut ed = Editor::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    ed.subscribe(move |e: &GraphEvent| sink.borrow_mut().push(e.clone()));
    let before = ed.spatial_version();

    ed.load_document(&doc).unwrap();

    assert_eq!(ed.spatial_version(), before + 1);
    let seen = seen.borrow();
    assert_eq!(seen.len(), 4, "{:?}", seen);
    assert_eq!(seen[0], GraphEvent::BatchStarted { reason: "load_document".into() });
    assert_eq!(seen[1], GraphEvent::SpatialIndexChanged { version: before + 1 });
    assert_eq!(seen[2], GraphEvent::BatchEnded { reason: "load_document".into() });
    assert!(matches!(seen[3], GraphEvent::ViewportChanged { .. }));
}

#[test]
fn a_bad_document_changes_nothing() {
    let mut ed = sample();
    let before = ed.to_document();
    let version = ed.spatial_version();

    let err = ed
        .from_json_value(json!({
            "nodes": [
                {"id": "ok", "x": 0, "y": 0, "width": 10, "height": 10},
                {"id": "far", "x": 1e300, "y": 0, "width": 10, "height": 10}
            ]
        }))
        .unwrap_err();
    assert_eq!(err.code(), "invalid_document");

    let err = ed.from_json_str("{\"nodes\": 3}").unwrap_err();
    assert_eq!(err.code(), "invalid_document");

    let err = ed
        .from_json_value(json!({
            "nodes": [{"id": "g", "x": 0, "y": 0, "width": 10, "height": 10, "members": ["nobody"]}]
        }))
        .unwrap_err();
    assert_eq!(err.code(), "invalid_document");

    assert_eq!(ed.to_document(), before);
    assert_eq!(ed.spatial_version(), version);
}

#[test]
fn newer_versions_are_refused() {
    let doc: GraphDocument = serde_json::from_value(json!({"version": 99})).unwrap();
    assert!(doc.nodes.is_empty());
    assert_eq!(Editor::default().load_document(&doc).unwrap_err().code(), "invalid_document");
}

#[test]
fn loading_cancels_an_active_drag() {
    let doc = sample().to_document();
    let mut ed = sample();
    ed.start_node_drag("a").unwrap();
    ed.load_document(&doc).unwrap();
    assert!(ed.interaction().is_idle());
    assert_eq!(ed.node("a").unwrap().position, GraphPoint::new(0.0, 0.0));
}

struct Tap {
    id: String,
    caps: Vec<Capability>,
    log: Rc<RefCell<Vec<String>>>,
}

impl Extension for Tap {
    fn id(&self) -> &str {
        &self.id
    }
    fn capabilities(&self) -> &[Capability] {
        &self.caps
    }
    fn on_event(&mut self, event: &GraphEvent) {
        self.log.borrow_mut().push(format!("{}:{}", self.id, short(event)));
    }
}

fn short(e: &GraphEvent) -> String {
    match e {
        GraphEvent::NodeRemoved { id } => format!("node-{}", id),
        GraphEvent::ConnectionRemoved { id } => format!("conn-{}", id),
        GraphEvent::BatchStarted { .. } => "begin".into(),
        GraphEvent::BatchEnded { .. } => "end".into(),
        GraphEvent::SpatialIndexChanged { .. } => "index".into(),
        GraphEvent::SelectionChanged => "selection".into(),
        other => format!("{:?}", other),
    }
}

fn tapped() -> (Editor, Rc<RefCell<Vec<String>>>) {
    let mut ed = sample();
    let log = Rc::new(RefCell::new(Vec::new()));
    let bus = log.clone();
    ed.subscribe(move |e: &GraphEvent| bus.borrow_mut().push(format!("bus:{}", short(e))));
    for id in ["first", "second"] {
        ed.extensions_mut().register(Box::new(Tap {
            id: id.into(),
            caps: vec![Capability::Custom("tap".into())],
            log: log.clone(),
        }));
    }
    (ed, log)
}

#[test]
fn listeners_hear_events_before_extensions() {
    let (mut ed, log) = tapped();
    ed.remove_node("a").unwrap();
    let got = log.borrow().clone();
    let expected: Vec<String> = ["begin", "conn-ab", "node-a", "index", "end"]
        .iter()
        .flat_map(|e| ["bus", "first", "second"].iter().map(move |who| format!("{}:{}", who, e)))
        .collect();
    assert_eq!(got, expected);
    assert_eq!(ed.extensions().with_capability(&Capability::Custom("tap".into())), vec!["first", "second"]);
}

#[test]
fn delete_selection_is_a_single_batch() {
    let (mut ed, log) = tapped();
    ed.select_node("b", false).unwrap();
    log.borrow_mut().clear();

    let (nodes, conns) = ed.delete_selection();
    assert_eq!(nodes, vec![NodeId::from("b")]);
    // The locked connection goes with its node, not as a selected connection.
    assert!(conns.is_empty());
    assert!(ed.connections().is_empty());

    let bus: Vec<String> = log.borrow().iter().filter(|l| l.starts_with("bus:")).cloned().collect();
    assert_eq!(bus, vec!["bus:begin", "bus:conn-ab", "bus:node-b", "bus:selection", "bus:index", "bus:end"]);
}

#[test]
fn nested_batches_bump_the_index_once() {
    let mut ed = sample();
    let before = ed.spatial_version();
    let starts = Rc::new(RefCell::new(0));
    let sink = starts.clone();
    ed.subscribe(move |e: &GraphEvent| {
        if matches!(e, GraphEvent::BatchStarted { .. }) {
            *sink.borrow_mut() += 1;
        }
    });
    ed.batch("outer", |ed| {
        ed.move_node_to("a", GraphPoint::new(40.0, 40.0)).unwrap();
        ed.batch("inner", |ed| ed.move_node_to("b", GraphPoint::new(400.0, 100.0)).unwrap());
    });
    assert_eq!(*starts.borrow(), 1);
    assert_eq!(ed.spatial_version(), before + 1);
}
