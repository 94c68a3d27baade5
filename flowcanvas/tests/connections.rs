use flowcanvas::connection::{ConnectRejection, StartRejection, Validation};
use flowcanvas::events::GraphEvent;
use flowcanvas::geometry::coords::GraphPoint;
use flowcanvas::model::{Connection, Node, Port, PortRef};
use flowcanvas::store::GraphStore;
use flowcanvas::Editor;
use std::cell::RefCell;
use std::rc::Rc;

// a.out (multi) --> b.in (single) <-- c.out (multi); d has two multi ports.
fn editor() -> Editor {
    let mut ed = Editor::default();
    ed.add_node(Node::new("a", 0.0, 0.0, 100.0, 60.0).with_port(Port::output("out"))).unwrap();
    ed.add_node(Node::new("b", 300.0, 0.0, 100.0, 60.0).with_port(Port::input("in").single())).unwrap();
    ed.add_node(Node::new("c", 0.0, 200.0, 100.0, 60.0).with_port(Port::output("out"))).unwrap();
    ed.add_node(
        Node::new("d", 300.0, 200.0, 100.0, 60.0)
            .with_port(Port::input("in"))
            .with_port(Port::output("out")),
    )
    .unwrap();
    ed
}

fn ids(ed: &Editor) -> Vec<String> {
    ed.connections().iter().map(|c| c.id.to_string()).collect()
}

#[test]
fn single_input_replaces_its_connection() {
    let mut ed = editor();
    ed.add_connection(Connection::new("ab", ("a", "out"), ("b", "in"))).unwrap();

    assert_eq!(ed.start_connection_drag("c", "out", true), Ok(vec![]));
    let created = ed.complete_connection_drag("b", "in").unwrap();
    assert_eq!(created.source(), PortRef::new("c", "out"));
    assert_eq!(created.target(), PortRef::new("b", "in"));
    assert_eq!(ids(&ed), vec![created.id.to_string()]);
    assert!(ed.interaction().is_idle());
    assert!(ed.store().indexes_consistent());
}

#[test]
fn dragging_out_of_a_single_port_detaches_it() {
    let mut ed = editor();
    ed.add_connection(Connection::new("ab", ("a", "out"), ("b", "in"))).unwrap();
    let removed = ed.start_connection_drag("b", "in", false).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].as_str(), "ab");
    assert!(ed.connections().is_empty());
    // Cancelling does not bring it back.
    ed.cancel_connection_drag().unwrap();
    assert!(ed.connections().is_empty());
}

#[test]
fn pulling_from_an_input_drops_on_a_source() {
    let mut ed = editor();
    ed.start_connection_drag("d", "in", false).unwrap();
    let c = ed.complete_connection_drag("a", "out").unwrap();
    assert_eq!(c.source(), PortRef::new("a", "out"));
    assert_eq!(c.target(), PortRef::new("d", "in"));
}

#[test]
fn duplicates_are_rejected_without_side_effects() {
    let mut ed = editor();
    ed.add_connection(Connection::new("ad", ("a", "out"), ("d", "in"))).unwrap();
    let version = ed.spatial_version();
    ed.start_connection_drag("a", "out", true).unwrap();
    assert_eq!(
        ed.complete_connection_drag("d", "in"),
        Err(ConnectRejection::DuplicateConnection(PortRef::new("a", "out"), PortRef::new("d", "in")))
    );
    assert_eq!(ids(&ed), vec!["ad".to_string()]);
    assert_eq!(ed.spatial_version(), version);
    assert!(ed.interaction().is_idle());
}

#[test]
fn rejection_order() {
    let mut ed = editor();
    assert_eq!(ed.can_connect("b", "in", Validation::Full), Err(ConnectRejection::NoActiveDrag));

    ed.start_connection_drag("a", "out", true).unwrap();
    assert_eq!(ed.can_connect("a", "out", Validation::Full), Err(ConnectRejection::SelfConnection));
    assert_eq!(
        ed.can_connect("ghost", "in", Validation::Full),
        Err(ConnectRejection::TargetNodeNotFound("ghost".into()))
    );
    assert_eq!(ed.can_connect("c", "out", Validation::Full), Err(ConnectRejection::SameDirectionPorts));
    assert_eq!(
        ed.can_connect("d", "nope", Validation::Full),
        Err(ConnectRejection::TargetPortNotFound(PortRef::new("d", "nope")))
    );
    assert_eq!(ed.can_connect("d", "in", Validation::Full), Ok(()));
    ed.cancel_connection_drag().unwrap();

    // Another port on the origin node is fine.
    ed.start_connection_drag("d", "out", true).unwrap();
    assert_eq!(ed.can_connect("d", "in", Validation::Full), Ok(()));
}

#[test]
fn start_is_validated() {
    let mut ed = editor();
    assert_eq!(ed.start_connection_drag("ghost", "out", true), Err(StartRejection::NodeNotFound("ghost".into())));
    assert_eq!(
        ed.start_connection_drag("a", "in", true),
        Err(StartRejection::PortNotFound(PortRef::new("a", "in")))
    );
    assert_eq!(
        ed.start_connection_drag("a", "out", false),
        Err(StartRejection::WrongDirection(PortRef::new("a", "out")))
    );
    ed.add_node(Node::new("e", 600.0, 0.0, 50.0, 50.0).with_port(Port::output("x").not_connectable())).unwrap();
    assert_eq!(
        ed.start_connection_drag("e", "x", true),
        Err(StartRejection::PortNotConnectable(PortRef::new("e", "x")))
    );
    assert!(ed.interaction().is_idle());
}

#[test]
fn max_connections_on_the_drop_port() {
    let mut ed = editor();
    ed.add_node(Node::new("f", 600.0, 0.0, 100.0, 60.0).with_port(Port::input("in").with_max_connections(1))).unwrap();
    ed.add_connection(Connection::new("af", ("a", "out"), ("f", "in"))).unwrap();
    ed.start_connection_drag("c", "out", true).unwrap();
    assert_eq!(
        ed.can_connect("f", "in", Validation::Full),
        Err(ConnectRejection::MaxConnectionsOnTarget(PortRef::new("f", "in")))
    );
    // A full port cannot start a drag either.
    ed.cancel_connection_drag().unwrap();
    assert_eq!(
        ed.start_connection_drag("f", "in", false),
        Err(StartRejection::MaxConnectionsReached(PortRef::new("f", "in")))
    );
}

#[test]
fn custom_validator_only_runs_in_full_mode() {
    let mut ed = editor();
    ed.set_validator(Some(Box::new(|_: &GraphStore, s: &PortRef, _: &PortRef| -> Result<(), String> {
        if s.node.as_str() == "c" {
            Err("c may not feed anything".into())
        } else {
            Ok(())
        }
    })));
    ed.start_connection_drag("c", "out", true).unwrap();
    assert_eq!(ed.can_connect("d", "in", Validation::Structural), Ok(()));
    assert_eq!(
        ed.can_connect("d", "in", Validation::Full),
        Err(ConnectRejection::Vetoed("c may not feed anything".into()))
    );
    assert!(ed.complete_connection_drag("d", "in").is_err());
    assert!(ed.connections().is_empty());
}

#[test]
fn hover_snaps_to_valid_ports_only() {
    let mut ed = editor();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    ed.subscribe(move |e: &GraphEvent| {
        if let GraphEvent::PortHoverChanged { port } = e {
            sink.borrow_mut().push(port.clone());
        }
    });
    ed.start_connection_drag("a", "out", true).unwrap();

    let target = PortRef::new("b", "in");
    let placed = ed.update_connection_drag(GraphPoint::new(310.0, 40.0), Some(&target)).unwrap();
    // b's only input sits half way down its left edge.
    assert_eq!(placed, GraphPoint::new(300.0, 30.0));
    assert_eq!(ed.highlighted_port(), Some(&target));

    let invalid = PortRef::new("c", "out");
    let free = GraphPoint::new(20.0, 220.0);
    assert_eq!(ed.update_connection_drag(free, Some(&invalid)).unwrap(), free);
    assert_eq!(ed.highlighted_port(), None);

    ed.update_connection_drag(GraphPoint::new(25.0, 225.0), None).unwrap();
    ed.cancel_connection_drag().unwrap();
    assert_eq!(*seen.borrow(), vec![Some(target), None]);
}

#[test]
fn completing_without_a_drag_is_a_rejection() {
    let mut ed = editor();
    assert_eq!(ed.complete_connection_drag("b", "in"), Err(ConnectRejection::NoActiveDrag));
    assert_eq!(ed.cancel_connection_drag().unwrap_err().code(), "no_interaction");
}

#[test]
fn generated_ids_skip_existing_ones() {
    let mut ed = editor();
    ed.add_connection(Connection::new("conn-1", ("c", "out"), ("d", "in"))).unwrap();
    ed.start_connection_drag("a", "out", true).unwrap();
    let c = ed.complete_connection_drag("d", "in").unwrap();
    assert_ne!(c.id.as_str(), "conn-1");
    assert!(ed.connection(c.id.as_str()).is_some());
}
