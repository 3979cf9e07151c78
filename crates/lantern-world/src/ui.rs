use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};

use lantern_bridge::{BridgeError, GuestRuntime, HostObject, HostRef, HostType, Stub};

use crate::canvas::{Canvas, DrawCommand};
use crate::components::{Rect, Tag, Visual};
use crate::event::HostEvent;
use crate::lifecycle::{event_hook, hook_or_default, render_hook, Lifecycle};
use crate::types::{SCRIPTED_UI, UI_NODE};

/// A labelled, focusable rectangle.
#[derive(Debug)]
pub struct UiNode {
    label: RefCell<String>,
    bounds: Cell<Rect>,
    focused: Cell<bool>,
    pub visual: Visual,
    pub tag: Tag,
}

impl UiNode {
    pub fn new(label: &str, bounds: Rect) -> Self {
        Self {
            label: RefCell::new(label.to_string()),
            bounds: Cell::new(bounds),
            focused: Cell::new(false),
            visual: Visual::new("ui"),
            tag: Tag::new("ui"),
        }
    }

    pub fn label(&self) -> String {
        self.label.borrow().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.label.borrow_mut() = label.to_string();
    }

    pub fn bounds(&self) -> Rect {
        self.bounds.get()
    }

    pub fn set_bounds(&self, bounds: Rect) {
        self.bounds.set(bounds);
    }

    pub fn is_focused(&self) -> bool {
        self.focused.get()
    }

    /// Returns whether focus actually changed.
    pub fn set_focused(&self, focused: bool) -> bool {
        self.focused.replace(focused) != focused
    }

    /// Bounds rectangle with the label in its top-left corner.
    pub fn draw(&self, canvas: &Canvas) {
        if !self.visual.is_visible() {
            return;
        }
        let bounds = self.bounds();
        canvas.draw(DrawCommand::Rect {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        });
        canvas.draw(DrawCommand::Text {
            text: self.label(),
            x: bounds.x,
            y: bounds.y,
        });
    }

    fn component_by_id(&self, id: TypeId) -> Option<&dyn Any> {
        if id == TypeId::of::<Visual>() {
            Some(&self.visual)
        } else if id == TypeId::of::<Tag>() {
            Some(&self.tag)
        } else {
            None
        }
    }
}

impl HostObject for UiNode {
    fn host_type(&self) -> &'static HostType {
        &UI_NODE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        self.component_by_id(id)
    }
}

impl Lifecycle for UiNode {
    fn render(&self, _runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        if let Some(canvas) = lantern_bridge::component::<Canvas>(canvas.as_ref()) {
            self.draw(canvas);
        }
        Ok(())
    }
}

/// UI component whose behavior comes from a `ui_component` script.
pub struct ScriptedUi {
    stub: Stub,
    node: UiNode,
}

impl ScriptedUi {
    pub fn new(stub: Stub, node: UiNode) -> Self {
        Self { stub, node }
    }

    pub fn node(&self) -> &UiNode {
        &self.node
    }

    pub fn stub(&self) -> &Stub {
        &self.stub
    }
}

impl HostObject for ScriptedUi {
    fn host_type(&self) -> &'static HostType {
        &SCRIPTED_UI
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        if id == TypeId::of::<UiNode>() {
            return Some(&self.node);
        }
        self.node.component_by_id(id)
    }

    fn as_stub(&self) -> Option<&Stub> {
        Some(&self.stub)
    }
}

impl Lifecycle for ScriptedUi {
    fn create(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        runtime.invoke(&self.stub, "create", ()).map(|_| ())
    }

    fn process(&self, runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        hook_or_default(runtime, &self.stub, "process", delta, || Ok(()))
    }

    fn render(&self, runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        render_hook(runtime, &self.stub, canvas, || {
            if let Some(canvas) = lantern_bridge::component::<Canvas>(canvas.as_ref()) {
                self.node.draw(canvas);
            }
            Ok(())
        })
    }

    fn on_event(&self, runtime: &GuestRuntime, event: &HostEvent) -> Result<bool, BridgeError> {
        event_hook(runtime, &self.stub, event, || Ok(false))
    }

    fn destroy(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        runtime.invoke(&self.stub, "destroy", ()).map(|_| ())
    }
}
