use flowcanvas::connection::{ConnectRejection, StartRejection};
use flowcanvas::error::GraphError;
use js_sys::{Object, Reflect};
use wasm_bindgen::prelude::*;

fn set_kv(obj: &Object, k: &str, v: &JsValue) { let _ = Reflect::set(obj, &JsValue::from_str(k), v); }

fn new_obj() -> Object { Object::new() }

pub fn ok(v: JsValue) -> JsValue {
    let o = new_obj();
    set_kv(&o, "ok", &JsValue::from_bool(true));
    set_kv(&o, "value", &v);
    o.into()
}

pub fn err(code: &'static str, message: impl Into<String>, data: Option<JsValue>) -> JsValue {
    let root = new_obj();
    set_kv(&root, "ok", &JsValue::from_bool(false));
    let e = new_obj();
    set_kv(&e, "code", &JsValue::from_str(code));
    set_kv(&e, "message", &JsValue::from_str(&message.into()));
    if let Some(d) = data { set_kv(&e, "data", &d); }
    set_kv(&root, "error", &e.into());
    root.into()
}

#[inline]
pub fn non_finite(param: &str) -> JsValue {
    let d = new_obj(); set_kv(&d, "param", &JsValue::from_str(param));
    err("non_finite", format!("parameter '{}' must be finite", param), Some(d.into()))
}

#[inline]
pub fn invalid_handle(got: &str) -> JsValue {
    let d = new_obj(); set_kv(&d, "got", &JsValue::from_str(got));
    err("invalid_handle", "handle must be one of top, bottom, left, right, top-left, top-right, bottom-left, bottom-right", Some(d.into()))
}

#[inline]
pub fn invalid_argument(param: &str, message: impl Into<String>) -> JsValue {
    let d = new_obj(); set_kv(&d, "param", &JsValue::from_str(param));
    err("invalid_argument", message, Some(d.into()))
}

/// Envelope for caller misuse reported by the core.
pub fn graph(e: &GraphError) -> JsValue {
    let d = new_obj();
    match e {
        GraphError::NodeNotFound(id) | GraphError::DuplicateNodeId(id) | GraphError::NotResizable(id) => {
            set_kv(&d, "kind", &JsValue::from_str("node"));
            set_kv(&d, "id", &JsValue::from_str(id.as_str()));
        }
        GraphError::ConnectionNotFound(id) | GraphError::DuplicateConnectionId(id) => {
            set_kv(&d, "kind", &JsValue::from_str("connection"));
            set_kv(&d, "id", &JsValue::from_str(id.as_str()));
        }
        GraphError::PortNotFound(p) => {
            set_kv(&d, "kind", &JsValue::from_str("port"));
            set_kv(&d, "node", &JsValue::from_str(p.node.as_str()));
            set_kv(&d, "id", &JsValue::from_str(p.port.as_str()));
        }
        GraphError::NonFinite(param) => set_kv(&d, "param", &JsValue::from_str(param)),
        GraphError::NoActiveInteraction { expected } => set_kv(&d, "expected", &JsValue::from_str(expected)),
        GraphError::ControlPointOutOfRange { id, index } => {
            set_kv(&d, "id", &JsValue::from_str(id.as_str()));
            set_kv(&d, "index", &JsValue::from_f64(*index as f64));
        }
        GraphError::Document(_) | GraphError::Config(_) => {}
    }
    err(e.code(), e.to_string(), Some(d.into()))
}

/// A soft rejection: the request was well formed but the graph said no.
pub fn rejected(reason: &'static str, message: String) -> JsValue {
    let d = new_obj(); set_kv(&d, "reason", &JsValue::from_str(reason));
    err("rejected", message, Some(d.into()))
}

pub fn start_rejected(r: &StartRejection) -> JsValue { rejected(r.reason(), r.to_string()) }

pub fn connect_rejected(r: &ConnectRejection) -> JsValue {
    match r {
        ConnectRejection::Store(e) => graph(e),
        other => rejected(other.reason(), other.to_string()),
    }
}
