use flowcanvas::events::GraphEvent;
use flowcanvas::geometry::coords::{GraphPoint, ScreenPoint, Viewport};
use flowcanvas::geometry::tolerance::{approx_eq_rel, EPS_ROUNDTRIP};
use flowcanvas::model::{Connection, ConnectionId, Node, NodeId, Port};
use flowcanvas::Editor;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

proptest! {
    #[test]
    fn screen_graph_round_trip(
        x in -1.0e6f64..1.0e6,
        y in -1.0e6f64..1.0e6,
        px in -1.0e5f64..1.0e5,
        py in -1.0e5f64..1.0e5,
        zoom in 0.05f64..8.0,
    ) {
        let vp = Viewport::new(px, py, zoom);
        let back = vp.to_graph(vp.to_screen(GraphPoint::new(x, y)));
        prop_assert!(approx_eq_rel(back.x, x, EPS_ROUNDTRIP), "{} vs {}", back.x, x);
        prop_assert!(approx_eq_rel(back.y, y, EPS_ROUNDTRIP), "{} vs {}", back.y, y);
    }

    #[test]
    fn zoom_keeps_the_anchor_fixed(
        ax in 0.0f64..800.0,
        ay in 0.0f64..600.0,
        factor in 0.2f64..5.0,
    ) {
        let mut ed = Editor::default();
        let anchor = ScreenPoint::new(ax, ay);
        let before = ed.to_graph(anchor);
        ed.zoom_at(factor, anchor).unwrap();
        let after = ed.to_graph(anchor);
        prop_assert!(approx_eq_rel(before.x, after.x, EPS_ROUNDTRIP));
        prop_assert!(approx_eq_rel(before.y, after.y, EPS_ROUNDTRIP));
        let z = ed.viewport().zoom;
        prop_assert!(z >= ed.config().min_zoom && z <= ed.config().max_zoom);
    }
}

fn chain(n: usize) -> Editor {
    let mut ed = Editor::default();
    for i in 0..n {
        let node = Node::new(format!("n{}", i), i as f64 * 400.0, 100.0, 100.0, 60.0)
            .with_port(Port::input("in"))
            .with_port(Port::output("out"));
        ed.add_node(node).unwrap();
        if i > 0 {
            let c = Connection::new(format!("c{}", i), (format!("n{}", i - 1), "out"), (format!("n{}", i), "in"));
            ed.add_connection(c).unwrap();
        }
    }
    ed
}

#[test]
fn culling_returns_only_nearby_nodes() {
    let mut ed = chain(50);
    let visible = ed.visible_nodes();
    assert!(visible.contains(&NodeId::from("n0")));
    assert!(!visible.contains(&NodeId::from("n40")));
    // Pan far to the right: the set follows.
    ed.pan_by(flowcanvas::geometry::coords::ScreenVector::new(-16000.0, 0.0)).unwrap();
    let visible = ed.visible_nodes();
    assert!(visible.contains(&NodeId::from("n40")));
    assert!(!visible.contains(&NodeId::from("n0")));
}

#[test]
fn hidden_endpoints_hide_their_connections() {
    let mut ed = chain(3);
    let conns = ed.visible_connections();
    assert_eq!(conns, vec![ConnectionId::from("c1"), ConnectionId::from("c2")]);
    ed.set_node_visible("n2", false).unwrap();
    assert_eq!(ed.visible_connections(), vec![ConnectionId::from("c1")]);
    assert!(!ed.visible_nodes().contains(&NodeId::from("n2")));
    ed.set_node_visible("n2", true).unwrap();
    assert_eq!(ed.visible_connections().len(), 2);
}

#[test]
fn fit_to_nodes_frames_everything() {
    let mut ed = chain(10);
    assert!(ed.fit_to_nodes(20.0));
    let vr = ed.visible_rect();
    for n in ed.nodes() {
        let b = n.bounds();
        assert!(b.min_x() >= vr.min_x() - 1e-6 && b.max_x() <= vr.max_x() + 1e-6, "{} outside", n.id);
        assert!(b.min_y() >= vr.min_y() - 1e-6 && b.max_y() <= vr.max_y() + 1e-6, "{} outside", n.id);
    }
    assert!(!Editor::default().fit_to_nodes(20.0));
}

#[test]
fn viewport_changes_are_clamped_and_announced() {
    let mut ed = Editor::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    ed.subscribe(move |e: &GraphEvent| {
        if let GraphEvent::ViewportChanged { viewport } = e {
            sink.borrow_mut().push(*viewport);
        }
    });
    assert!(ed.set_viewport(Viewport::new(10.0, 20.0, 100.0)).unwrap());
    assert_eq!(ed.viewport().zoom, ed.config().max_zoom);
    // Same clamped value again: nothing to announce.
    assert!(!ed.set_viewport(Viewport::new(10.0, 20.0, 50.0)).unwrap());
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(ed.set_viewport(Viewport::new(f64::NAN, 0.0, 1.0)).unwrap_err().code(), "non_finite");
    assert_eq!(ed.zoom_at(0.0, ScreenPoint::new(0.0, 0.0)).unwrap_err().code(), "non_finite");
}

#[test]
fn hit_test_goes_through_the_viewport() {
    let mut ed = chain(2);
    ed.set_viewport(Viewport::new(50.0, 0.0, 2.0)).unwrap();
    // n0 spans graph x 0..100, y 100..160 -> screen x 50..250, y 200..320.
    assert!(matches!(
        ed.hit_test(ScreenPoint::new(150.0, 260.0)),
        Some(flowcanvas::algorithms::picking::Hit::Node { ref id }) if id.as_str() == "n0"
    ));
    assert_eq!(ed.hit_test(ScreenPoint::new(10.0, 10.0)), None);
}
