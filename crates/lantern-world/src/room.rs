//! Rooms own the world objects spawned into them.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lantern_bridge::{BridgeError, GuestRuntime, HostId, HostObject, HostRef, HostType, Stub};
use tracing::{debug, warn};

use crate::components::{Rect, Tag};
use crate::event::HostEvent;
use crate::lifecycle::{event_hook, hook_or_default, lifecycle_of, render_hook, Lifecycle};
use crate::objects::{ObjectKind, WorldObject};
use crate::types::{ROOM, SCRIPTED_ROOM};

pub struct Room {
    name: String,
    size: Cell<(f64, f64)>,
    pub tag: Tag,
    children: RefCell<Vec<HostRef>>,
}

impl Room {
    pub fn new(name: &str, width: f64, height: f64) -> Self {
        Self {
            name: name.to_string(),
            size: Cell::new((width, height)),
            tag: Tag::new(name),
            children: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> (f64, f64) {
        self.size.get()
    }

    /// Create a native object and take ownership of it.
    pub fn spawn(&self, kind: ObjectKind, x: f64, y: f64, image: &str) -> HostRef {
        let object: HostRef = Rc::new(WorldObject::new(kind, x, y, image));
        debug!(target: "scripting", "Room '{}' spawned {} at ({}, {})", self.name, kind, x, y);
        self.add(object.clone());
        object
    }

    pub fn add(&self, object: HostRef) {
        self.children.borrow_mut().push(object);
    }

    /// Release a child. Proxies to it go dead once nothing else holds it.
    pub fn remove(&self, id: HostId) -> bool {
        let mut children = self.children.borrow_mut();
        let before = children.len();
        children.retain(|child| HostId::of(child) != id);
        children.len() != before
    }

    /// Snapshot of the children, so callbacks may spawn or remove freely.
    pub fn children(&self) -> Vec<HostRef> {
        self.children.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.children.borrow().len()
    }

    /// Solid children whose bounds intersect `bounds`.
    pub fn overlapping(&self, bounds: &Rect) -> Vec<HostRef> {
        self.children
            .borrow()
            .iter()
            .filter(|child| {
                lantern_bridge::component::<WorldObject>(child.as_ref()).is_some_and(|o| {
                    o.is_alive() && o.is_solid() && o.bounds().intersects(bounds)
                })
            })
            .cloned()
            .collect()
    }

    /// Process every child, then drop the ones that finished.
    pub fn process_children(&self, runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        for child in self.children() {
            if let Some(lifecycle) = lifecycle_of(child.as_ref()) {
                lifecycle.process(runtime, delta)?;
            }
        }

        self.children.borrow_mut().retain(|child| {
            !lifecycle_of(child.as_ref()).is_some_and(|l| l.is_finished())
        });
        Ok(())
    }

    pub fn render_children(&self, runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        for child in self.children() {
            if let Some(lifecycle) = lifecycle_of(child.as_ref()) {
                lifecycle.render(runtime, canvas)?;
            }
        }
        Ok(())
    }

    /// Offer the event to each child until one handles it.
    pub fn forward_event(&self, runtime: &GuestRuntime, event: &HostEvent) -> Result<bool, BridgeError> {
        for child in self.children() {
            if let Some(lifecycle) = lifecycle_of(child.as_ref()) {
                if lifecycle.on_event(runtime, event)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn destroy_children(&self, runtime: &GuestRuntime) {
        for child in self.children.take() {
            if let Some(lifecycle) = lifecycle_of(child.as_ref()) {
                if let Err(e) = lifecycle.destroy(runtime) {
                    warn!(target: "scripting", "Child of room '{}' failed to destroy: {}", self.name, e);
                }
            }
        }
    }
}

impl HostObject for Room {
    fn host_type(&self) -> &'static HostType {
        &ROOM
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        (id == TypeId::of::<Tag>()).then_some(&self.tag as &dyn Any)
    }
}

impl Lifecycle for Room {
    fn process(&self, runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        self.process_children(runtime, delta)
    }

    fn render(&self, runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        self.render_children(runtime, canvas)
    }

    fn on_event(&self, runtime: &GuestRuntime, event: &HostEvent) -> Result<bool, BridgeError> {
        self.forward_event(runtime, event)
    }

    fn destroy(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        self.destroy_children(runtime);
        Ok(())
    }
}

/// Room whose behavior comes from a `room` script.
pub struct ScriptedRoom {
    stub: Stub,
    room: Room,
}

impl ScriptedRoom {
    pub fn new(stub: Stub, room: Room) -> Self {
        Self { stub, room }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn stub(&self) -> &Stub {
        &self.stub
    }
}

impl HostObject for ScriptedRoom {
    fn host_type(&self) -> &'static HostType {
        &SCRIPTED_ROOM
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        if id == TypeId::of::<Room>() {
            Some(&self.room)
        } else {
            self.room.component(id)
        }
    }

    fn as_stub(&self) -> Option<&Stub> {
        Some(&self.stub)
    }
}

impl Lifecycle for ScriptedRoom {
    fn create(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        runtime.invoke(&self.stub, "create", ()).map(|_| ())
    }

    /// Children are always processed; the hook adds room logic on top.
    fn process(&self, runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        hook_or_default(runtime, &self.stub, "process", delta, || Ok(()))?;
        self.room.process_children(runtime, delta)
    }

    fn render(&self, runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        render_hook(runtime, &self.stub, canvas, || {
            self.room.render_children(runtime, canvas)
        })
    }

    fn on_event(&self, runtime: &GuestRuntime, event: &HostEvent) -> Result<bool, BridgeError> {
        event_hook(runtime, &self.stub, event, || {
            self.room.forward_event(runtime, event)
        })
    }

    fn destroy(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        let result = runtime.invoke(&self.stub, "destroy", ()).map(|_| ());
        self.room.destroy_children(runtime);
        result
    }
}
