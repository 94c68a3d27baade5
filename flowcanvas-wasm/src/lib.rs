use flowcanvas::events::ListenerId;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;
mod api;
mod error;
mod interop;

#[wasm_bindgen]
pub struct Editor {
    pub(crate) inner: flowcanvas::Editor,
    pub(crate) listeners: HashMap<u32, ListenerId>,
    pub(crate) next_listener: u32,
}

impl Editor {
    pub fn rs_new(inner: flowcanvas::Editor) -> Editor {
        Editor { inner, listeners: HashMap::new(), next_listener: 1 }
    }
    pub fn rs_inner(&self) -> &flowcanvas::Editor {
        &self.inner
    }
}
