use flowcanvas::drag::{EdgeAlignSnap, SnapResult};
use flowcanvas::events::{DragKind, GraphEvent};
use flowcanvas::geometry::coords::{GraphPoint, GraphRect, GraphSize, GraphVector, ScreenVector};
use flowcanvas::model::{Connection, Node, NodeId, Port};
use flowcanvas::resize::ResizeHandle;
use flowcanvas::spatial::SpatialKey;
use flowcanvas::store::GraphStore;
use flowcanvas::Editor;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

fn node(id: &str, x: f64, y: f64) -> Node {
    Node::new(id, x, y, 100.0, 60.0).with_port(Port::input("in")).with_port(Port::output("out"))
}

fn editor() -> Editor {
    let mut ed = Editor::default();
    ed.add_node(node("a", 0.0, 0.0)).unwrap();
    ed.add_node(node("b", 200.0, 0.0)).unwrap();
    ed.add_node(node("c", 0.0, 200.0)).unwrap();
    ed.add_connection(Connection::new("ab", ("a", "out"), ("b", "in"))).unwrap();
    ed
}

fn pos(ed: &Editor, id: &str) -> (GraphPoint, GraphPoint) {
    let n = ed.node(id).unwrap();
    (n.position, n.visual_position)
}

#[test]
fn selected_nodes_move_together() {
    let mut ed = editor();
    ed.select_nodes(&[NodeId::from("a"), NodeId::from("b")], false);
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(40.0, 20.0)).unwrap();
    ed.move_node_drag(GraphVector::new(40.0, 20.0)).unwrap();
    let moved = ed.end_node_drag().unwrap();
    assert_eq!(moved.len(), 2);
    assert_eq!(pos(&ed, "a").1, GraphPoint::new(80.0, 40.0));
    assert_eq!(pos(&ed, "b").1, GraphPoint::new(280.0, 40.0));
    assert_eq!(pos(&ed, "c").1, GraphPoint::new(0.0, 200.0));
    assert!(!ed.node("a").unwrap().dragging);
}

#[test]
fn dragging_an_unselected_node_selects_it_alone() {
    let mut ed = editor();
    ed.select_node("b", false).unwrap();
    ed.start_node_drag("c").unwrap();
    assert_eq!(ed.selected_nodes(), vec![NodeId::from("c")]);
    ed.move_node_drag(GraphVector::new(20.0, 0.0)).unwrap();
    ed.end_node_drag().unwrap();
    assert_eq!(pos(&ed, "b").1, GraphPoint::new(200.0, 0.0));
}

#[test]
fn grid_snaps_visual_but_intended_position_accumulates() {
    let mut ed = editor();
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(7.0, 13.0)).unwrap();
    let (p, v) = pos(&ed, "a");
    assert_eq!(p, GraphPoint::new(7.0, 13.0));
    assert_eq!(v, GraphPoint::new(0.0, 20.0));
    // A second small move escapes the x snap.
    ed.move_node_drag(GraphVector::new(5.0, 0.0)).unwrap();
    assert_eq!(pos(&ed, "a").1, GraphPoint::new(20.0, 20.0));
    ed.end_node_drag().unwrap();
    assert_eq!(pos(&ed, "a"), (GraphPoint::new(20.0, 20.0), GraphPoint::new(20.0, 20.0)));
}

#[test]
fn delegate_claims_an_axis_and_grid_handles_the_other() {
    let mut ed = editor();
    ed.set_snap_delegate(Some(Box::new(EdgeAlignSnap { threshold: 5.0 })));
    ed.add_node(node("d", 103.0, 500.0)).unwrap();
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(100.0, 33.0)).unwrap();
    // x aligns with d's left edge, y falls back to the 20 grid.
    assert_eq!(pos(&ed, "a").1, GraphPoint::new(103.0, 40.0));
    ed.cancel_node_drag(None).unwrap();
}

#[test]
fn closure_snap_delegate() {
    let mut ed = editor();
    let calls = Rc::new(RefCell::new(0));
    let seen = calls.clone();
    ed.set_snap_delegate(Some(Box::new(move |_: &GraphStore, _: &[NodeId], _: &NodeId, p: GraphPoint| {
        *seen.borrow_mut() += 1;
        SnapResult { position: GraphPoint::new(p.x, 1.0), snapped_x: false, snapped_y: true }
    })));
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(31.0, 50.0)).unwrap();
    assert_eq!(pos(&ed, "a").1, GraphPoint::new(40.0, 1.0));
    assert_eq!(*calls.borrow(), 1);
    ed.end_node_drag().unwrap();
}

#[test]
fn cancel_restores_captured_positions() {
    let mut ed = editor();
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(300.0, 300.0)).unwrap();
    ed.cancel_node_drag(None).unwrap();
    assert_eq!(pos(&ed, "a"), (GraphPoint::new(0.0, 0.0), GraphPoint::new(0.0, 0.0)));
    assert!(ed.interaction().is_idle());
    assert!(!ed.pending_updates().has_pending());
}

#[test]
fn cancel_with_supplied_positions() {
    let mut ed = editor();
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(300.0, 300.0)).unwrap();
    let mut original = HashMap::new();
    original.insert(NodeId::from("a"), GraphPoint::new(41.0, 59.0));
    ed.cancel_node_drag(Some(&original)).unwrap();
    assert_eq!(pos(&ed, "a"), (GraphPoint::new(41.0, 59.0), GraphPoint::new(40.0, 60.0)));
}

#[test]
fn index_is_untouched_until_the_drag_ends() {
    let mut ed = editor();
    let changes = Rc::new(RefCell::new(0));
    let sink = changes.clone();
    ed.subscribe(move |e: &GraphEvent| {
        if let GraphEvent::SpatialIndexChanged { .. } = e {
            *sink.borrow_mut() += 1;
        }
    });
    let v0 = ed.spatial_version();
    ed.start_node_drag("a").unwrap();
    for _ in 0..25 {
        ed.move_node_drag(GraphVector::new(8.0, 4.0)).unwrap();
    }
    assert_eq!(ed.spatial_version(), v0);
    assert!(ed.pending_updates().is_node_pending("a"));
    assert!(ed.pending_updates().pending_connections().iter().any(|c| c.as_str() == "ab"));
    ed.end_node_drag().unwrap();
    assert_eq!(ed.spatial_version(), v0 + 1);
    assert_eq!(*changes.borrow(), 1);
    assert!(!ed.pending_updates().has_pending());
}

#[test]
fn deferred_and_live_updates_agree() {
    let run = |live: bool| {
        let mut ed = editor();
        ed.set_live_index_updates(live);
        let v0 = ed.spatial_version();
        ed.start_node_drag("a").unwrap();
        for _ in 0..10 {
            ed.move_node_drag(GraphVector::new(13.0, 7.0)).unwrap();
        }
        ed.end_node_drag().unwrap();
        let key = SpatialKey::Node("a".into());
        let rects = ed.spatial().geometry(&key).map(|r| r.to_vec());
        let conn = ed.connection_path("ab").cloned();
        (ed.spatial_version() - v0, rects, conn)
    };
    let (deferred_bumps, deferred_rects, deferred_path) = run(false);
    let (live_bumps, live_rects, live_path) = run(true);
    assert_eq!(deferred_bumps, 1);
    assert!(live_bumps > 1);
    assert_eq!(deferred_rects, live_rects);
    assert_eq!(deferred_path, live_path);
}

#[test]
fn manual_flush_mid_drag() {
    let mut ed = editor();
    ed.start_node_drag("c").unwrap();
    ed.move_node_drag(GraphVector::new(400.0, 0.0)).unwrap();
    let stale = ed.hit_test_graph(GraphPoint::new(450.0, 230.0));
    assert_eq!(stale, None);
    let v = ed.spatial_version();
    assert!(ed.flush_pending());
    assert_eq!(ed.spatial_version(), v + 1);
    assert!(matches!(
        ed.hit_test_graph(GraphPoint::new(450.0, 230.0)),
        Some(flowcanvas::algorithms::picking::Hit::Node { ref id }) if id.as_str() == "c"
    ));
    assert!(!ed.flush_pending());
    ed.end_node_drag().unwrap();
}

#[test]
fn dragged_nodes_stay_visible_before_flush() {
    let mut ed = editor();
    ed.add_node(node("far", 5000.0, 0.0)).unwrap();
    assert!(!ed.visible_nodes().contains(&NodeId::from("far")));
    ed.start_node_drag("far").unwrap();
    ed.move_node_drag(GraphVector::new(-4600.0, 300.0)).unwrap();
    // The index still has it off screen.
    assert_eq!(ed.hit_test_graph(GraphPoint::new(450.0, 330.0)), None);
    assert!(ed.visible_nodes().contains(&NodeId::from("far")));
    ed.end_node_drag().unwrap();
    assert!(ed.visible_nodes().contains(&NodeId::from("far")));
}

#[test]
fn resize_crossing_the_opposite_edge_swaps_handles() {
    let mut ed = editor();
    ed.start_resize("a", ResizeHandle::Right, GraphPoint::new(100.0, 30.0)).unwrap();
    let r = ed.update_resize(GraphPoint::new(-50.0, 30.0)).unwrap();
    assert_eq!(r, GraphRect::new(GraphPoint::new(-50.0, 0.0), GraphSize::new(50.0, 60.0)));
    assert_eq!(ed.interaction().resize().unwrap().active_handle, ResizeHandle::Left);
    let v = ed.spatial_version();
    let end = ed.end_resize().unwrap();
    assert_eq!(end, r);
    assert_eq!(ed.spatial_version(), v + 1);
    assert_eq!(ed.node("a").unwrap().size, GraphSize::new(50.0, 60.0));
}

#[test]
fn resize_cancel_and_not_resizable() {
    let mut ed = editor();
    ed.start_resize("a", ResizeHandle::BottomRight, GraphPoint::new(100.0, 60.0)).unwrap();
    ed.update_resize(GraphPoint::new(300.0, 300.0)).unwrap();
    ed.cancel_resize().unwrap();
    assert_eq!(ed.node("a").unwrap().bounds(), GraphRect::new(GraphPoint::new(0.0, 0.0), GraphSize::new(100.0, 60.0)));

    let mut fixed = node("f", 600.0, 0.0);
    fixed.resizable = false;
    ed.add_node(fixed).unwrap();
    let err = ed.start_resize("f", ResizeHandle::Top, GraphPoint::new(650.0, 0.0)).unwrap_err();
    assert_eq!(err.code(), "not_resizable");
}

#[test]
fn marquee_replaces_or_toggles() {
    let mut ed = editor();
    ed.start_marquee(GraphPoint::new(-10.0, -10.0)).unwrap();
    let hits = ed.update_marquee(GraphPoint::new(250.0, 30.0)).unwrap();
    assert_eq!(hits, vec![NodeId::from("a"), NodeId::from("b")]);
    assert_eq!(ed.finish_marquee(false).unwrap(), hits);
    assert_eq!(ed.selected_nodes(), hits);

    // Dragged upwards; the rect is normalised.
    ed.start_marquee(GraphPoint::new(-10.0, 300.0)).unwrap();
    ed.update_marquee(GraphPoint::new(150.0, 30.0)).unwrap();
    let toggled = ed.finish_marquee(true).unwrap();
    // a was selected and hit again; c is new.
    assert_eq!(toggled, vec![NodeId::from("b"), NodeId::from("c")]);
}

#[test]
fn starting_an_interaction_cancels_the_previous_one() {
    let mut ed = editor();
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = kinds.clone();
    ed.subscribe(move |e: &GraphEvent| {
        if let GraphEvent::DragEnded { kind, cancelled, .. } = e {
            sink.borrow_mut().push((*kind, *cancelled));
        }
    });
    ed.start_node_drag("a").unwrap();
    ed.move_node_drag(GraphVector::new(100.0, 0.0)).unwrap();
    ed.start_marquee(GraphPoint::new(0.0, 0.0)).unwrap();
    assert_eq!(pos(&ed, "a").1, GraphPoint::new(0.0, 0.0));
    ed.start_connection_drag("a", "out", true).unwrap();
    assert_eq!(*kinds.borrow(), vec![(DragKind::Node, true), (DragKind::Marquee, true)]);
    assert!(ed.interaction().temp_connection().is_some());
}

#[test]
fn canvas_is_locked_while_dragging() {
    let mut ed = editor();
    assert!(ed.pan_by(ScreenVector::new(10.0, 0.0)).unwrap());
    ed.start_node_drag("a").unwrap();
    assert!(ed.is_canvas_locked());
    assert!(!ed.pan_by(ScreenVector::new(10.0, 0.0)).unwrap());
    ed.end_node_drag().unwrap();
    assert!(ed.pan_by(ScreenVector::new(10.0, 0.0)).unwrap());
    assert_eq!(ed.viewport().x, 20.0);
}

#[test]
fn moves_without_a_drag_are_errors() {
    let mut ed = editor();
    assert_eq!(ed.move_node_drag(GraphVector::new(1.0, 1.0)).unwrap_err().code(), "no_interaction");
    assert_eq!(ed.end_node_drag().unwrap_err().code(), "no_interaction");
    assert_eq!(ed.update_marquee(GraphPoint::new(1.0, 1.0)).unwrap_err().code(), "no_interaction");
    ed.start_node_drag("a").unwrap();
    assert_eq!(ed.move_node_drag(GraphVector::new(f64::NAN, 0.0)).unwrap_err().code(), "non_finite");
}

#[test]
fn group_members_follow_their_group() {
    let mut ed = Editor::default();
    ed.add_node(Node::new("g", 0.0, 0.0, 400.0, 400.0).group()).unwrap();
    ed.add_node(Node::new("inner", 40.0, 40.0, 100.0, 100.0).group()).unwrap();
    ed.add_node(Node::new("leaf", 60.0, 60.0, 20.0, 20.0)).unwrap();
    ed.set_group_members("g", &[NodeId::from("inner")]).unwrap();
    ed.set_group_members("inner", &[NodeId::from("leaf")]).unwrap();
    ed.start_node_drag("g").unwrap();
    ed.move_node_drag(GraphVector::new(100.0, 0.0)).unwrap();
    let moved = ed.end_node_drag().unwrap();
    assert_eq!(moved[0].as_str(), "g");
    assert_eq!(moved.len(), 3);
    assert_eq!(pos(&ed, "leaf").1, GraphPoint::new(160.0, 60.0));
    // The nested group ends up above its container.
    assert!(ed.node("inner").unwrap().z_index > ed.node("g").unwrap().z_index);
}

#[test]
fn removing_the_drag_primary_hands_over_to_the_rest() {
    let mut ed = editor();
    ed.select_nodes(&[NodeId::from("a"), NodeId::from("b")], false);
    ed.start_node_drag("a").unwrap();
    ed.remove_node("a").unwrap();
    let drag = ed.interaction().node_drag().unwrap();
    assert_eq!(drag.primary.as_str(), "b");
    assert_eq!(drag.nodes, vec![NodeId::from("b")]);

    ed.move_node_drag(GraphVector::new(100.0, 0.0)).unwrap();
    assert_eq!(pos(&ed, "b").1, GraphPoint::new(300.0, 0.0));
    assert_eq!(ed.end_node_drag().unwrap(), vec![NodeId::from("b")]);
    assert_eq!(pos(&ed, "b"), (GraphPoint::new(300.0, 0.0), GraphPoint::new(300.0, 0.0)));
    assert!(ed.spatial().contains(&SpatialKey::Node(NodeId::from("b"))));
}

#[test]
fn removing_the_only_dragged_node_ends_the_drag() {
    let mut ed = editor();
    let ended = Rc::new(RefCell::new(Vec::new()));
    let sink = ended.clone();
    ed.subscribe(move |e: &GraphEvent| {
        if let GraphEvent::DragEnded { kind, cancelled, .. } = e {
            sink.borrow_mut().push((*kind, *cancelled));
        }
    });
    ed.start_node_drag("c").unwrap();
    ed.move_node_drag(GraphVector::new(20.0, 0.0)).unwrap();
    ed.remove_node("c").unwrap();
    assert!(ed.interaction().is_idle());
    assert!(!ed.is_canvas_locked());
    assert!(!ed.pending_updates().has_pending());
    assert_eq!(ed.move_node_drag(GraphVector::new(1.0, 0.0)).unwrap_err().code(), "no_interaction");
    assert_eq!(*ended.borrow(), vec![(DragKind::Node, true)]);
}

#[test]
fn resize_and_connection_drags_end_with_their_node() {
    let mut ed = editor();
    ed.start_resize("a", ResizeHandle::BottomRight, GraphPoint::new(100.0, 60.0)).unwrap();
    ed.update_resize(GraphPoint::new(150.0, 90.0)).unwrap();
    ed.remove_node("a").unwrap();
    assert!(ed.interaction().is_idle());
    assert_eq!(ed.update_resize(GraphPoint::new(1.0, 1.0)).unwrap_err().code(), "no_interaction");

    ed.start_connection_drag("b", "out", true).unwrap();
    ed.remove_node("b").unwrap();
    assert!(ed.interaction().temp_connection().is_none());
    assert!(ed.cancel_connection_drag().is_err());
}

#[test]
fn removed_nodes_leave_the_marquee() {
    let mut ed = editor();
    ed.start_marquee(GraphPoint::new(-1e300, -1e300)).unwrap();
    let hits = ed.update_marquee(GraphPoint::new(1e300, 1e300)).unwrap();
    assert_eq!(hits, vec![NodeId::from("a"), NodeId::from("b"), NodeId::from("c")]);
    ed.remove_node("b").unwrap();
    assert_eq!(ed.finish_marquee(false).unwrap(), vec![NodeId::from("a"), NodeId::from("c")]);
}
