//! Points and world objects, native and script-backed.

use std::any::{Any, TypeId};
use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use lantern_bridge::{BridgeError, GuestRuntime, HostObject, HostRef, HostType, Stub};

use crate::canvas::{Canvas, DrawCommand};
use crate::components::{Rect, Tag, Transform, Visual};
use crate::event::HostEvent;
use crate::lifecycle::{event_hook, hook_or_default, render_hook, Lifecycle};
use crate::types::{COLLIDER, POINT, PROP, RENDERABLE, SCENERY, SCRIPTED_OBJECT, SPRITE};

/// A bare position with a tag.
#[derive(Debug)]
pub struct Point {
    pub transform: Transform,
    pub tag: Tag,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            transform: Transform::new(x, y),
            tag: Tag::new("point"),
        }
    }
}

impl HostObject for Point {
    fn host_type(&self) -> &'static HostType {
        &POINT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        if id == TypeId::of::<Transform>() {
            Some(&self.transform)
        } else if id == TypeId::of::<Tag>() {
            Some(&self.tag)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Plain,
    Sprite,
    Collider,
    Scenery,
}

impl ObjectKind {
    pub fn host_type(self) -> &'static HostType {
        match self {
            ObjectKind::Plain => &PROP,
            ObjectKind::Sprite => &SPRITE,
            ObjectKind::Collider => &COLLIDER,
            ObjectKind::Scenery => &SCENERY,
        }
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prop" | "object" => Ok(ObjectKind::Plain),
            "sprite" => Ok(ObjectKind::Sprite),
            "collider" => Ok(ObjectKind::Collider),
            "scenery" => Ok(ObjectKind::Scenery),
            other => Err(format!("unknown object kind '{other}'")),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Plain => "prop",
            ObjectKind::Sprite => "sprite",
            ObjectKind::Collider => "collider",
            ObjectKind::Scenery => "scenery",
        };
        f.write_str(s)
    }
}

/// Something that lives in a room: position, velocity, extent and a sprite.
#[derive(Debug)]
pub struct WorldObject {
    kind: ObjectKind,
    pub transform: Transform,
    pub tag: Tag,
    pub visual: Visual,
    velocity: Cell<(f64, f64)>,
    size: Cell<(f64, f64)>,
    solid: Cell<bool>,
    alive: Cell<bool>,
}

impl WorldObject {
    pub fn new(kind: ObjectKind, x: f64, y: f64, image: &str) -> Self {
        Self {
            kind,
            transform: Transform::new(x, y),
            tag: Tag::new(&kind.to_string()),
            visual: Visual::new(image),
            velocity: Cell::new((0.0, 0.0)),
            size: Cell::new((16.0, 16.0)),
            solid: Cell::new(kind == ObjectKind::Collider),
            alive: Cell::new(true),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub fn destroy(&self) {
        self.alive.set(false);
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.velocity.get()
    }

    pub fn set_velocity(&self, vx: f64, vy: f64) {
        self.velocity.set((vx, vy));
    }

    pub fn size(&self) -> (f64, f64) {
        self.size.get()
    }

    pub fn set_size(&self, width: f64, height: f64) {
        self.size.set((width.max(0.0), height.max(0.0)));
    }

    pub fn is_solid(&self) -> bool {
        self.solid.get()
    }

    pub fn set_solid(&self, solid: bool) {
        self.solid.set(solid);
    }

    pub fn bounds(&self) -> Rect {
        let (x, y) = self.transform.position();
        let (w, h) = self.size();
        Rect::new(x, y, w, h)
    }

    /// Move by velocity scaled to `delta` seconds.
    pub fn integrate(&self, delta: f64) {
        if !self.is_alive() {
            return;
        }
        let (vx, vy) = self.velocity();
        self.transform.translate(vx * delta, vy * delta);
    }

    /// Draw the current sprite frame when the object is visible.
    pub fn draw(&self, ty: &'static HostType, canvas: &Canvas) {
        if !self.is_alive() || !self.visual.is_visible() || !ty.is_a(&RENDERABLE) {
            return;
        }
        let (x, y) = self.transform.position();
        canvas.draw(DrawCommand::Sprite {
            image: self.visual.image().to_string(),
            frame: self.visual.frame(),
            x,
            y,
            depth: self.visual.depth(),
        });
    }

    fn component_by_id(&self, id: TypeId) -> Option<&dyn Any> {
        if id == TypeId::of::<Transform>() {
            Some(&self.transform)
        } else if id == TypeId::of::<Tag>() {
            Some(&self.tag)
        } else if id == TypeId::of::<Visual>() {
            Some(&self.visual)
        } else {
            None
        }
    }
}

impl HostObject for WorldObject {
    fn host_type(&self) -> &'static HostType {
        self.kind.host_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        self.component_by_id(id)
    }
}

impl Lifecycle for WorldObject {
    fn process(&self, _runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        if self.kind != ObjectKind::Scenery {
            self.integrate(delta);
        }
        Ok(())
    }

    fn render(&self, _runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        if let Some(canvas) = lantern_bridge::component::<Canvas>(canvas.as_ref()) {
            self.draw(self.host_type(), canvas);
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        !self.is_alive()
    }
}

/// World object whose behavior comes from a `world_object` script.
pub struct ScriptedObject {
    stub: Stub,
    body: WorldObject,
}

impl ScriptedObject {
    pub fn new(stub: Stub, x: f64, y: f64, image: &str) -> Self {
        Self {
            stub,
            body: WorldObject::new(ObjectKind::Sprite, x, y, image),
        }
    }

    pub fn body(&self) -> &WorldObject {
        &self.body
    }

    pub fn stub(&self) -> &Stub {
        &self.stub
    }

    /// Tell the script it touched `other`. Without an `onCollision` hook the
    /// collision is ignored.
    pub fn collide(&self, runtime: &GuestRuntime, other: &HostRef) -> Result<(), BridgeError> {
        let other = runtime.wrap(other)?;
        hook_or_default(runtime, &self.stub, "onCollision", other, || Ok(()))
    }
}

impl HostObject for ScriptedObject {
    fn host_type(&self) -> &'static HostType {
        &SCRIPTED_OBJECT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        if id == TypeId::of::<WorldObject>() {
            return Some(&self.body);
        }
        self.body.component_by_id(id)
    }

    fn as_stub(&self) -> Option<&Stub> {
        Some(&self.stub)
    }
}

impl Lifecycle for ScriptedObject {
    fn create(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        runtime.invoke(&self.stub, "create", ()).map(|_| ())
    }

    fn process(&self, runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        if !self.body.is_alive() {
            return Ok(());
        }
        // Required by the contract, so the script owns movement.
        runtime.invoke(&self.stub, "process", delta).map(|_| ())
    }

    fn render(&self, runtime: &GuestRuntime, canvas: &HostRef) -> Result<(), BridgeError> {
        render_hook(runtime, &self.stub, canvas, || {
            if let Some(canvas) = lantern_bridge::component::<Canvas>(canvas.as_ref()) {
                self.body.draw(&SCRIPTED_OBJECT, canvas);
            }
            Ok(())
        })
    }

    fn on_event(&self, runtime: &GuestRuntime, event: &HostEvent) -> Result<bool, BridgeError> {
        event_hook(runtime, &self.stub, event, || Ok(false))
    }

    fn destroy(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        let result = runtime.invoke(&self.stub, "destroy", ()).map(|_| ());
        self.body.destroy();
        result
    }

    fn is_finished(&self) -> bool {
        !self.body.is_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_scales_by_delta() {
        let object = WorldObject::new(ObjectKind::Sprite, 0.0, 0.0, "ball");
        object.set_velocity(10.0, -4.0);
        object.integrate(0.5);
        assert_eq!(object.transform.position(), (5.0, -2.0));

        object.destroy();
        object.integrate(1.0);
        assert_eq!(object.transform.position(), (5.0, -2.0));
    }

    #[test]
    fn test_only_renderable_kinds_draw() {
        let canvas = Canvas::new();
        let plain = WorldObject::new(ObjectKind::Plain, 0.0, 0.0, "ghost");
        plain.draw(plain.host_type(), &canvas);
        assert!(canvas.is_empty());

        let sprite = WorldObject::new(ObjectKind::Sprite, 1.0, 2.0, "hero");
        sprite.visual.set_frame(3);
        sprite.draw(sprite.host_type(), &canvas);
        assert_eq!(
            canvas.take(),
            vec![DrawCommand::Sprite {
                image: "hero".to_string(),
                frame: 3,
                x: 1.0,
                y: 2.0,
                depth: 0,
            }]
        );
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("collider".parse::<ObjectKind>(), Ok(ObjectKind::Collider));
        assert!("boulder".parse::<ObjectKind>().is_err());
        assert!(WorldObject::new(ObjectKind::Collider, 0.0, 0.0, "").is_solid());
    }
}
