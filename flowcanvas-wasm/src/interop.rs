use flowcanvas::algorithms::picking::Hit;
use flowcanvas::events::{DragKind, GraphEvent};
use flowcanvas::geometry::coords::{GraphPoint, GraphRect};
use flowcanvas::model::Node;
use js_sys::{Float64Array, Object, Reflect};
use serde::Serialize;
use serde_json::{json, Value};
use wasm_bindgen::JsValue;

pub fn new_obj() -> Object { Object::new() }
pub fn set_kv(obj: &Object, k: &str, v: &JsValue) {
    let _ = Reflect::set(obj, &JsValue::from_str(k), v);
}
pub fn arr_f64(slice: &[f64]) -> Float64Array {
    let arr = Float64Array::new_with_length(slice.len() as u32);
    arr.copy_from(slice); arr
}

/// Plain JS objects (not `Map`s) so hosts can use the values directly.
pub fn to_js<T: Serialize + ?Sized>(v: &T) -> JsValue {
    v.serialize(&serde_wasm_bindgen::Serializer::json_compatible()).unwrap_or(JsValue::NULL)
}

pub fn point(p: GraphPoint) -> JsValue {
    to_js(&[p.x, p.y])
}

pub fn rect(r: &GraphRect) -> JsValue {
    to_js(&json!({ "x": r.origin.x, "y": r.origin.y, "width": r.size.width, "height": r.size.height }))
}

pub fn ids<T: Serialize>(v: &[T]) -> JsValue {
    to_js(v)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeView<'a> {
    id: &'a str,
    x: f64,
    y: f64,
    visual_x: f64,
    visual_y: f64,
    width: f64,
    height: f64,
    z_index: i32,
    visible: bool,
    resizable: bool,
    is_group: bool,
    dragging: bool,
    data: &'a Value,
}

pub fn node(n: &Node) -> JsValue {
    to_js(&NodeView {
        id: n.id.as_str(),
        x: n.position.x,
        y: n.position.y,
        visual_x: n.visual_position.x,
        visual_y: n.visual_position.y,
        width: n.size.width,
        height: n.size.height,
        z_index: n.z_index,
        visible: n.visible,
        resizable: n.resizable,
        is_group: n.is_group,
        dragging: n.dragging,
        data: &n.data,
    })
}

// Flatten to { kind: 'port'|'node'|'connection', ... }
pub fn hit(h: &Hit) -> JsValue {
    let v = match h {
        Hit::Port { port, dist } => json!({ "kind": "port", "node": port.node, "port": port.port, "dist": dist }),
        Hit::Node { id } => json!({ "kind": "node", "id": id }),
        Hit::Connection { id, dist } => json!({ "kind": "connection", "id": id, "dist": dist }),
    };
    to_js(&v)
}

fn kind_name(k: DragKind) -> &'static str {
    match k {
        DragKind::Node => "node",
        DragKind::Resize => "resize",
        DragKind::Connection => "connection",
        DragKind::Marquee => "marquee",
    }
}

pub fn interaction_kind(k: Option<DragKind>) -> JsValue {
    k.map_or(JsValue::NULL, |k| JsValue::from_str(kind_name(k)))
}

pub fn event(e: &GraphEvent) -> JsValue {
    let v = match e {
        GraphEvent::NodeAdded { id } => json!({ "type": "nodeAdded", "id": id }),
        GraphEvent::NodeRemoved { id } => json!({ "type": "nodeRemoved", "id": id }),
        GraphEvent::NodeResized { id } => json!({ "type": "nodeResized", "id": id }),
        GraphEvent::ConnectionCreated { id } => json!({ "type": "connectionCreated", "id": id }),
        GraphEvent::ConnectionRemoved { id } => json!({ "type": "connectionRemoved", "id": id }),
        GraphEvent::DragStarted { kind, ids } => json!({ "type": "dragStarted", "kind": kind_name(*kind), "ids": ids }),
        GraphEvent::DragEnded { kind, ids, cancelled } => {
            json!({ "type": "dragEnded", "kind": kind_name(*kind), "ids": ids, "cancelled": cancelled })
        }
        GraphEvent::SelectionChanged => json!({ "type": "selectionChanged" }),
        GraphEvent::ViewportChanged { viewport } => json!({ "type": "viewportChanged", "viewport": viewport }),
        GraphEvent::PortHoverChanged { port } => json!({
            "type": "portHoverChanged",
            "port": port.as_ref().map(|p| json!({ "node": p.node, "port": p.port })),
        }),
        GraphEvent::SpatialIndexChanged { version } => json!({ "type": "spatialIndexChanged", "version": version }),
        GraphEvent::BatchStarted { reason } => json!({ "type": "batchStarted", "reason": reason }),
        GraphEvent::BatchEnded { reason } => json!({ "type": "batchEnded", "reason": reason }),
    };
    to_js(&v)
}
