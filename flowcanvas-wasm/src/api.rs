use crate::error;
use crate::interop;
use crate::Editor;
use flowcanvas::config::EditorConfig;
use flowcanvas::connection::Validation;
use flowcanvas::error::{GraphError, Result};
use flowcanvas::events::GraphEvent;
use flowcanvas::geometry::coords::{GraphPoint, ScreenPoint, ScreenVector, Viewport};
use flowcanvas::json::{ConnectionDoc, NodeDoc};
use flowcanvas::model::{Connection, ConnectionId, Node, NodeId, PortRef};
use flowcanvas::resize::ResizeHandle;
use wasm_bindgen::prelude::*;
type JsValue = wasm_bindgen::JsValue;

#[wasm_bindgen]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Route `log` output to the browser console. `level` is one of
/// error/warn/info/debug/trace; returns false for an unknown level or when a
/// logger is already installed.
#[wasm_bindgen]
pub fn init_logging(level: &str) -> bool {
    match level.parse::<log::Level>() {
        Ok(l) => console_log::init_with_level(l).is_ok(),
        Err(_) => false,
    }
}

fn wrap<T>(r: Result<T>, f: impl FnOnce(T) -> JsValue) -> JsValue {
    match r {
        Ok(v) => error::ok(f(v)),
        Err(e) => error::graph(&e),
    }
}

fn finite(pairs: &[(&str, f64)]) -> Option<JsValue> {
    pairs.iter().find(|(_, v)| !v.is_finite()).map(|(name, _)| error::non_finite(name))
}

fn screen(x: f64, y: f64) -> ScreenPoint {
    ScreenPoint::new(x, y)
}

fn parse_node(v: JsValue) -> std::result::Result<Node, JsValue> {
    let doc: NodeDoc = serde_wasm_bindgen::from_value(v).map_err(|e| error::invalid_argument("node", e.to_string()))?;
    Node::try_from(&doc).map_err(|e| error::graph(&e))
}

fn parse_connection(v: JsValue) -> std::result::Result<Connection, JsValue> {
    let doc: ConnectionDoc =
        serde_wasm_bindgen::from_value(v).map_err(|e| error::invalid_argument("connection", e.to_string()))?;
    Connection::try_from(&doc).map_err(|e| error::graph(&e))
}

fn parse_ids(v: JsValue) -> std::result::Result<Vec<NodeId>, JsValue> {
    serde_wasm_bindgen::from_value(v).map_err(|e| error::invalid_argument("ids", e.to_string()))
}

#[wasm_bindgen]
impl Editor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Editor {
        Editor::rs_new(flowcanvas::Editor::default())
    }
    /// Construct from a partial config object; unknown keys are ignored and
    /// missing ones take their defaults.
    pub fn with_config(config: JsValue) -> std::result::Result<Editor, JsValue> {
        let v: serde_json::Value =
            serde_wasm_bindgen::from_value(config).map_err(|e| error::invalid_argument("config", e.to_string()))?;
        let cfg = EditorConfig::from_json_value(v).map_err(|e| error::graph(&e))?;
        Ok(Editor::rs_new(flowcanvas::Editor::new(cfg)))
    }
    pub fn config(&self) -> JsValue {
        interop::to_js(self.inner.config())
    }
    pub fn spatial_version(&self) -> u64 {
        self.inner.spatial_version()
    }

    // Events
    pub fn subscribe(&mut self, callback: js_sys::Function) -> u32 {
        let lid = self.inner.subscribe(move |e: &GraphEvent| {
            if let Err(thrown) = callback.call1(&JsValue::NULL, &interop::event(e)) {
                log::warn!("event listener threw: {:?}", thrown);
            }
        });
        let handle = self.next_listener;
        self.next_listener += 1;
        self.listeners.insert(handle, lid);
        handle
    }
    pub fn unsubscribe(&mut self, handle: u32) -> bool {
        match self.listeners.remove(&handle) {
            Some(lid) => self.inner.unsubscribe(lid),
            None => false,
        }
    }

    // Viewport
    pub fn set_screen_size(&mut self, width: f64, height: f64) -> bool {
        self.inner.set_screen_size(width, height).is_ok()
    }
    pub fn set_screen_size_res(&mut self, width: f64, height: f64) -> JsValue {
        wrap(self.inner.set_screen_size(width, height), |_| JsValue::NULL)
    }
    pub fn viewport(&self) -> JsValue {
        interop::to_js(&self.inner.viewport())
    }
    pub fn set_viewport(&mut self, x: f64, y: f64, zoom: f64) -> bool {
        self.inner.set_viewport(Viewport::new(x, y, zoom)).unwrap_or(false)
    }
    pub fn set_viewport_res(&mut self, x: f64, y: f64, zoom: f64) -> JsValue {
        wrap(self.inner.set_viewport(Viewport::new(x, y, zoom)), JsValue::from_bool)
    }
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        self.inner.pan_by(ScreenVector::new(dx, dy)).unwrap_or(false)
    }
    pub fn pan_by_res(&mut self, dx: f64, dy: f64) -> JsValue {
        wrap(self.inner.pan_by(ScreenVector::new(dx, dy)), JsValue::from_bool)
    }
    pub fn zoom_at(&mut self, factor: f64, x: f64, y: f64) -> bool {
        self.inner.zoom_at(factor, screen(x, y)).unwrap_or(false)
    }
    pub fn zoom_at_res(&mut self, factor: f64, x: f64, y: f64) -> JsValue {
        wrap(self.inner.zoom_at(factor, screen(x, y)), JsValue::from_bool)
    }
    pub fn fit_to_nodes(&mut self, padding: f64) -> bool {
        self.inner.fit_to_nodes(padding)
    }
    pub fn to_graph(&self, x: f64, y: f64) -> JsValue {
        interop::point(self.inner.to_graph(screen(x, y)))
    }
    pub fn to_screen(&self, x: f64, y: f64) -> JsValue {
        let p = self.inner.to_screen(GraphPoint::new(x, y));
        interop::to_js(&[p.x, p.y])
    }
    pub fn is_canvas_locked(&self) -> bool {
        self.inner.is_canvas_locked()
    }

    // Nodes
    pub fn add_node(&mut self, node: JsValue) -> bool {
        match parse_node(node) {
            Ok(n) => self.inner.add_node(n).is_ok(),
            Err(_) => false,
        }
    }
    pub fn add_node_res(&mut self, node: JsValue) -> JsValue {
        match parse_node(node) {
            Ok(n) => wrap(self.inner.add_node(n), |_| JsValue::NULL),
            Err(e) => e,
        }
    }
    pub fn remove_node(&mut self, id: &str) -> bool {
        self.inner.remove_node(id).is_ok()
    }
    pub fn remove_node_res(&mut self, id: &str) -> JsValue {
        wrap(self.inner.remove_node(id), |n| interop::node(&n))
    }
    pub fn get_node(&self, id: &str) -> JsValue {
        self.inner.node(id).map_or(JsValue::NULL, interop::node)
    }
    pub fn get_node_res(&self, id: &str) -> JsValue {
        match self.inner.node(id) {
            Some(n) => error::ok(interop::node(n)),
            None => error::graph(&GraphError::NodeNotFound(id.into())),
        }
    }
    pub fn node_count(&self) -> u32 {
        self.inner.store().node_count() as u32
    }
    pub fn move_node_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        self.inner.move_node_to(id, GraphPoint::new(x, y)).is_ok()
    }
    pub fn move_node_to_res(&mut self, id: &str, x: f64, y: f64) -> JsValue {
        wrap(self.inner.move_node_to(id, GraphPoint::new(x, y)), |_| JsValue::NULL)
    }
    pub fn set_node_size_res(&mut self, id: &str, width: f64, height: f64) -> JsValue {
        wrap(self.inner.set_node_size(id, width, height), |_| JsValue::NULL)
    }
    pub fn set_node_visible(&mut self, id: &str, visible: bool) -> bool {
        self.inner.set_node_visible(id, visible).is_ok()
    }
    pub fn set_node_data_res(&mut self, id: &str, data: JsValue) -> JsValue {
        match serde_wasm_bindgen::from_value::<serde_json::Value>(data) {
            Ok(v) => wrap(self.inner.set_node_data(id, v), |_| JsValue::NULL),
            Err(e) => error::invalid_argument("data", e.to_string()),
        }
    }
    pub fn bring_to_front(&mut self, id: &str) -> bool {
        self.inner.bring_to_front(id).is_ok()
    }
    pub fn send_to_back(&mut self, id: &str) -> bool {
        self.inner.send_to_back(id).is_ok()
    }
    pub fn nodes_by_z(&self) -> JsValue {
        interop::ids(&self.inner.nodes_by_z())
    }
    pub fn set_group_members_res(&mut self, group: &str, members: JsValue) -> JsValue {
        match parse_ids(members) {
            Ok(ids) => wrap(self.inner.set_group_members(group, &ids), |_| JsValue::NULL),
            Err(e) => e,
        }
    }
    pub fn group_members(&self, group: &str) -> JsValue {
        interop::ids(&self.inner.group_members(group))
    }

    // Connections
    pub fn add_connection(&mut self, conn: JsValue) -> bool {
        match parse_connection(conn) {
            Ok(c) => self.inner.add_connection(c).is_ok(),
            Err(_) => false,
        }
    }
    pub fn add_connection_res(&mut self, conn: JsValue) -> JsValue {
        match parse_connection(conn) {
            Ok(c) => wrap(self.inner.add_connection(c), |_| JsValue::NULL),
            Err(e) => e,
        }
    }
    pub fn remove_connection(&mut self, id: &str) -> bool {
        self.inner.remove_connection(id).is_ok()
    }
    pub fn remove_connection_res(&mut self, id: &str) -> JsValue {
        wrap(self.inner.remove_connection(id), |c| interop::to_js(&ConnectionDoc::from(&c)))
    }
    pub fn get_connection(&self, id: &str) -> JsValue {
        self.inner.connection(id).map_or(JsValue::NULL, |c| interop::to_js(&ConnectionDoc::from(c)))
    }
    pub fn connection_count(&self) -> u32 {
        self.inner.store().connection_count() as u32
    }
    /// Flat `[x0, y0, x1, y1, ...]` polyline of the routed path, or null.
    pub fn connection_path(&self, id: &str) -> JsValue {
        match self.inner.connection_path(id) {
            Some(path) => {
                let flat: Vec<f64> = path.points.iter().flat_map(|p| [p.x, p.y]).collect();
                interop::arr_f64(&flat).into()
            }
            None => JsValue::NULL,
        }
    }
    pub fn set_connection_locked_res(&mut self, id: &str, locked: bool) -> JsValue {
        wrap(self.inner.set_connection_locked(id, locked), |_| JsValue::NULL)
    }
    pub fn add_control_point_res(&mut self, id: &str, index: u32, x: f64, y: f64) -> JsValue {
        wrap(self.inner.add_control_point(id, index as usize, GraphPoint::new(x, y)), |_| JsValue::NULL)
    }
    pub fn move_control_point_res(&mut self, id: &str, index: u32, x: f64, y: f64) -> JsValue {
        wrap(self.inner.move_control_point(id, index as usize, GraphPoint::new(x, y)), |_| JsValue::NULL)
    }
    pub fn remove_control_point_res(&mut self, id: &str, index: u32) -> JsValue {
        wrap(self.inner.remove_control_point(id, index as usize), interop::point)
    }
    pub fn has_cycles(&self) -> bool {
        self.inner.has_cycles()
    }
    pub fn get_cycles(&self) -> JsValue {
        interop::to_js(&self.inner.get_cycles())
    }

    // Selection
    pub fn select_node(&mut self, id: &str, additive: bool) -> bool {
        self.inner.select_node(id, additive).unwrap_or(false)
    }
    pub fn select_node_res(&mut self, id: &str, additive: bool) -> JsValue {
        wrap(self.inner.select_node(id, additive), JsValue::from_bool)
    }
    pub fn select_connection_res(&mut self, id: &str, additive: bool) -> JsValue {
        wrap(self.inner.select_connection(id, additive), JsValue::from_bool)
    }
    pub fn select_all(&mut self) -> bool {
        self.inner.select_all()
    }
    pub fn clear_selection(&mut self) -> bool {
        self.inner.clear_selection()
    }
    pub fn selected_nodes(&self) -> JsValue {
        interop::ids(&self.inner.selected_nodes())
    }
    pub fn selected_connections(&self) -> JsValue {
        interop::ids(&self.inner.selected_connections())
    }
    /// `{ nodes, connections }` actually removed.
    pub fn delete_selection(&mut self) -> JsValue {
        let (nodes, connections): (Vec<NodeId>, Vec<ConnectionId>) = self.inner.delete_selection();
        interop::to_js(&serde_json::json!({ "nodes": nodes, "connections": connections }))
    }

    // Queries
    pub fn hit_test(&self, x: f64, y: f64) -> JsValue {
        self.inner.hit_test(screen(x, y)).map_or(JsValue::NULL, |h| interop::hit(&h))
    }
    pub fn hit_test_res(&self, x: f64, y: f64) -> JsValue {
        if let Some(e) = finite(&[("x", x), ("y", y)]) {
            return e;
        }
        error::ok(self.hit_test(x, y))
    }
    pub fn visible_nodes(&mut self) -> JsValue {
        interop::ids(&self.inner.visible_nodes())
    }
    pub fn visible_connections(&mut self) -> JsValue {
        interop::ids(&self.inner.visible_connections())
    }
    pub fn interaction_kind(&self) -> JsValue {
        interop::interaction_kind(self.inner.interaction().kind())
    }
    pub fn cancel_interaction(&mut self) {
        self.inner.cancel_interaction()
    }

    // Node drag; deltas are in screen pixels
    pub fn start_node_drag_res(&mut self, id: &str) -> JsValue {
        wrap(self.inner.start_node_drag(id), |_| JsValue::NULL)
    }
    pub fn move_node_drag(&mut self, dx: f64, dy: f64) -> bool {
        self.inner.move_node_drag_screen(ScreenVector::new(dx, dy)).is_ok()
    }
    pub fn move_node_drag_res(&mut self, dx: f64, dy: f64) -> JsValue {
        wrap(self.inner.move_node_drag_screen(ScreenVector::new(dx, dy)), |_| JsValue::NULL)
    }
    pub fn end_node_drag_res(&mut self) -> JsValue {
        wrap(self.inner.end_node_drag(), |ids| interop::ids(&ids))
    }
    pub fn cancel_node_drag_res(&mut self) -> JsValue {
        wrap(self.inner.cancel_node_drag(None), |_| JsValue::NULL)
    }
    pub fn flush_pending(&mut self) -> bool {
        self.inner.flush_pending()
    }

    // Resize; pointer positions are screen coordinates
    pub fn start_resize_res(&mut self, id: &str, handle: &str, x: f64, y: f64) -> JsValue {
        let Some(h) = ResizeHandle::parse(handle) else {
            return error::invalid_handle(handle);
        };
        let p = self.inner.to_graph(screen(x, y));
        wrap(self.inner.start_resize(id, h, p), |_| JsValue::NULL)
    }
    pub fn update_resize_res(&mut self, x: f64, y: f64) -> JsValue {
        let p = self.inner.to_graph(screen(x, y));
        wrap(self.inner.update_resize(p), |r| interop::rect(&r))
    }
    pub fn end_resize_res(&mut self) -> JsValue {
        wrap(self.inner.end_resize(), |r| interop::rect(&r))
    }
    pub fn cancel_resize_res(&mut self) -> JsValue {
        wrap(self.inner.cancel_resize(), |_| JsValue::NULL)
    }

    // Marquee
    pub fn start_marquee_res(&mut self, x: f64, y: f64) -> JsValue {
        let p = self.inner.to_graph(screen(x, y));
        wrap(self.inner.start_marquee(p), |_| JsValue::NULL)
    }
    pub fn update_marquee_res(&mut self, x: f64, y: f64) -> JsValue {
        let p = self.inner.to_graph(screen(x, y));
        wrap(self.inner.update_marquee(p), |ids| interop::ids(&ids))
    }
    pub fn finish_marquee_res(&mut self, toggle: bool) -> JsValue {
        wrap(self.inner.finish_marquee(toggle), |ids| interop::ids(&ids))
    }
    pub fn cancel_marquee_res(&mut self) -> JsValue {
        wrap(self.inner.cancel_marquee(), |_| JsValue::NULL)
    }

    // Connection drag
    pub fn start_connection_drag_res(&mut self, node: &str, port: &str, is_output: bool) -> JsValue {
        match self.inner.start_connection_drag(node, port, is_output) {
            Ok(removed) => error::ok(interop::ids(&removed)),
            Err(r) => error::start_rejected(&r),
        }
    }
    /// Hover-time check: structural rules only.
    pub fn can_connect(&self, node: &str, port: &str) -> bool {
        self.inner.can_connect(node, port, Validation::Structural).is_ok()
    }
    pub fn can_connect_res(&self, node: &str, port: &str) -> JsValue {
        match self.inner.can_connect(node, port, Validation::Full) {
            Ok(()) => error::ok(JsValue::NULL),
            Err(r) => error::connect_rejected(&r),
        }
    }
    /// Move the loose end; returns the graph point it was drawn at (snapped
    /// onto `hover_node.hover_port` when that is a valid drop).
    pub fn update_connection_drag_res(
        &mut self,
        x: f64,
        y: f64,
        hover_node: Option<String>,
        hover_port: Option<String>,
    ) -> JsValue {
        if let Some(e) = finite(&[("x", x), ("y", y)]) {
            return e;
        }
        let hovered = match (hover_node, hover_port) {
            (Some(n), Some(p)) => Some(PortRef::new(n, p)),
            _ => None,
        };
        let p = self.inner.to_graph(screen(x, y));
        wrap(self.inner.update_connection_drag(p, hovered.as_ref()), interop::point)
    }
    pub fn highlighted_port(&self) -> JsValue {
        match self.inner.highlighted_port() {
            Some(p) => interop::to_js(&serde_json::json!({ "node": p.node, "port": p.port })),
            None => JsValue::NULL,
        }
    }
    pub fn complete_connection_drag_res(&mut self, node: &str, port: &str) -> JsValue {
        match self.inner.complete_connection_drag(node, port) {
            Ok(c) => error::ok(interop::to_js(&ConnectionDoc::from(&c))),
            Err(r) => error::connect_rejected(&r),
        }
    }
    pub fn cancel_connection_drag_res(&mut self) -> JsValue {
        wrap(self.inner.cancel_connection_drag(), |_| JsValue::NULL)
    }

    // Documents
    pub fn to_json(&self) -> JsValue {
        interop::to_js(&self.inner.to_json_value())
    }
    pub fn from_json(&mut self, v: JsValue) -> bool {
        match serde_wasm_bindgen::from_value::<serde_json::Value>(v) {
            Ok(val) => self.inner.from_json_value(val).is_ok(),
            Err(_) => false,
        }
    }
    pub fn from_json_res(&mut self, v: JsValue) -> JsValue {
        match serde_wasm_bindgen::from_value::<serde_json::Value>(v) {
            Ok(val) => wrap(self.inner.from_json_value(val), |_| JsValue::NULL),
            Err(e) => error::err("invalid_document", e.to_string(), None),
        }
    }
    pub fn to_json_string(&self) -> String {
        self.inner.to_json_string()
    }
    pub fn from_json_str_res(&mut self, s: &str) -> JsValue {
        wrap(self.inner.from_json_str(s), |_| JsValue::NULL)
    }
    pub fn clear(&mut self) {
        self.inner.clear()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new()
    }
}
