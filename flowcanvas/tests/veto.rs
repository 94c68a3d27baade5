use flowcanvas::connection::ConnectRejection;
use flowcanvas::model::{Connection, Node, Port, PortRef};
use flowcanvas::veto::{DeleteRejection, DeleteRequest, VetoFuture};
use flowcanvas::Editor;
use spin_on::spin_on;
use std::cell::RefCell;
use std::rc::Rc;

fn editor() -> Editor {
    let mut ed = Editor::default();
    ed.add_node(Node::new("a", 0.0, 0.0, 100.0, 60.0).with_port(Port::output("out"))).unwrap();
    ed.add_node(Node::new("b", 300.0, 0.0, 100.0, 60.0).with_port(Port::input("in"))).unwrap();
    ed.add_connection(Connection::new("ab", ("a", "out"), ("b", "in"))).unwrap();
    ed
}

fn answer(yes: bool) -> VetoFuture {
    Box::pin(async move { yes })
}

#[test]
fn without_a_veto_deletes_go_through() {
    let mut ed = editor();
    assert!(spin_on(ed.request_delete_connection("ab")));
    assert!(ed.connections().is_empty());
    assert!(!spin_on(ed.request_delete_connection("ab")));
}

#[test]
fn declined_delete_leaves_the_graph_alone() {
    let mut ed = editor();
    let asked = Rc::new(RefCell::new(Vec::new()));
    let log = asked.clone();
    ed.set_delete_veto(Some(Rc::new(move |req: &DeleteRequest| -> VetoFuture {
        log.borrow_mut().push(req.clone());
        answer(false)
    })));
    assert_eq!(spin_on(ed.try_delete_connection("ab")), Err(DeleteRejection::Declined("ab".into())));
    assert_eq!(ed.connections().len(), 1);
    assert!(matches!(asked.borrow()[0], DeleteRequest::Connection(ref c) if c.id.as_str() == "ab"));
}

#[test]
fn locked_connections_never_reach_the_veto() {
    let mut ed = editor();
    let calls = Rc::new(RefCell::new(0));
    let count = calls.clone();
    ed.set_delete_veto(Some(Rc::new(move |_: &DeleteRequest| -> VetoFuture {
        *count.borrow_mut() += 1;
        answer(true)
    })));
    ed.set_connection_locked("ab", true).unwrap();
    assert_eq!(spin_on(ed.try_delete_connection("ab")), Err(DeleteRejection::Locked("ab".into())));
    assert_eq!(spin_on(ed.try_delete_connection("zz")), Err(DeleteRejection::NotFound("zz".into())));
    assert_eq!(*calls.borrow(), 0);

    ed.set_connection_locked("ab", false).unwrap();
    assert_eq!(spin_on(ed.try_delete_connection("ab")), Ok(()));
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn node_delete_request_lists_its_connections() {
    let mut ed = editor();
    let seen = Rc::new(RefCell::new(0usize));
    let sink = seen.clone();
    ed.set_delete_veto(Some(Rc::new(move |req: &DeleteRequest| -> VetoFuture {
        if let DeleteRequest::Node { connections, .. } = req {
            *sink.borrow_mut() = connections.len();
        }
        answer(true)
    })));
    // Locks do not protect a connection from its node's removal.
    ed.set_connection_locked("ab", true).unwrap();
    assert!(spin_on(ed.request_delete_node("a")));
    assert_eq!(*seen.borrow(), 1);
    assert!(ed.node("a").is_none());
    assert!(ed.connections().is_empty());
    assert!(!spin_on(ed.request_delete_node("a")));
}

#[test]
fn connect_veto_can_decline_a_valid_drop() {
    let mut ed = editor();
    ed.add_node(Node::new("c", 300.0, 200.0, 100.0, 60.0).with_port(Port::input("in"))).unwrap();
    ed.set_connect_veto(Some(Rc::new(|_: &PortRef, t: &PortRef| -> VetoFuture {
        answer(t.node.as_str() != "c")
    })));

    ed.start_connection_drag("a", "out", true).unwrap();
    let declined = spin_on(ed.complete_connection_drag_confirmed("c", "in"));
    assert!(matches!(declined, Err(ConnectRejection::Vetoed(_))));
    assert!(ed.interaction().is_idle());
    assert_eq!(ed.connections().len(), 1);

    // Structural rejections never get as far as the veto.
    ed.start_connection_drag("a", "out", true).unwrap();
    assert!(matches!(
        spin_on(ed.complete_connection_drag_confirmed("b", "in")),
        Err(ConnectRejection::DuplicateConnection(..))
    ));

    ed.remove_connection("ab").unwrap();
    ed.start_connection_drag("a", "out", true).unwrap();
    let made = spin_on(ed.complete_connection_drag_confirmed("b", "in")).unwrap();
    assert_eq!(made.target(), PortRef::new("b", "in"));
}
