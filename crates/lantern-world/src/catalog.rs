//! The standard capability catalog.
//!
//! Interface capabilities (positionable, taggable, renderable, scripted) are
//! never primary; the concrete type's own capability names it. Operations
//! reach host state through components, so they work on any object that
//! embeds the component.

use std::time::Duration;

use lantern_bridge::mlua::{self, AnyUserData, IntoLuaMulti};
use lantern_bridge::{
    proxy_of, wrap_in, BridgeError, CapabilityDescriptor, CapabilityRegistry, RegistryBuilder,
};

use crate::canvas::{Canvas, DrawCommand};
use crate::components::{Rect, Tag, Transform, Visual};
use crate::objects::{ObjectKind, WorldObject};
use crate::room::Room;
use crate::scheduler::{Scheduler, TimerId};
use crate::task::Task;
use crate::types;
use crate::ui::UiNode;

/// Operations hidden from scenery: it never moves and cannot be destroyed
/// from scripts.
pub const SCENERY_HIDDEN: &[&str] = &[
    "setX",
    "setY",
    "setPosition",
    "move",
    "setVelocity",
    "process",
    "destroy",
];

pub fn standard_capabilities() -> Vec<CapabilityDescriptor> {
    vec![
        positionable(),
        taggable(),
        renderable(),
        scripted(),
        point(),
        world_object(),
        prop(),
        sprite(),
        collider(),
        scenery(),
        scripted_object(),
        room(),
        ui_node(),
        canvas(),
        scheduler(),
        task(),
    ]
}

/// Register the whole catalog, returning every registration error.
pub fn register_standard_capabilities(builder: &mut RegistryBuilder) -> Vec<BridgeError> {
    builder.register_all(standard_capabilities())
}

pub fn standard_registry() -> Result<CapabilityRegistry, BridgeError> {
    let mut builder = RegistryBuilder::new();
    if let Some(err) = register_standard_capabilities(&mut builder).into_iter().next() {
        return Err(err);
    }
    Ok(builder.build())
}

fn positionable() -> CapabilityDescriptor {
    CapabilityDescriptor::new("positionable", &types::POSITIONABLE)
        .operation("getX", |_, p, ()| Ok(p.with("getX", |t: &Transform| t.x())?))
        .operation("getY", |_, p, ()| Ok(p.with("getY", |t: &Transform| t.y())?))
        .operation("setX", |_, p, x: f64| {
            Ok(p.with("setX", |t: &Transform| t.set_x(x))?)
        })
        .operation("setY", |_, p, y: f64| {
            Ok(p.with("setY", |t: &Transform| t.set_y(y))?)
        })
        .operation("getPosition", |_, p, ()| {
            Ok(p.with("getPosition", |t: &Transform| t.position())?)
        })
        .operation("setPosition", |_, p, (x, y): (f64, f64)| {
            Ok(p.with("setPosition", |t: &Transform| t.set_position(x, y))?)
        })
        .operation("move", |_, p, (dx, dy): (f64, f64)| {
            Ok(p.with("move", |t: &Transform| t.translate(dx, dy))?)
        })
}

fn taggable() -> CapabilityDescriptor {
    CapabilityDescriptor::new("taggable", &types::TAGGABLE)
        .operation("getTag", |_, p, ()| Ok(p.with("getTag", |t: &Tag| t.get())?))
        .operation("setTag", |_, p, tag: String| {
            Ok(p.with("setTag", |t: &Tag| t.set(&tag))?)
        })
}

fn renderable() -> CapabilityDescriptor {
    CapabilityDescriptor::new("renderable", &types::RENDERABLE)
        .operation("isVisible", |_, p, ()| {
            Ok(p.with("isVisible", |v: &Visual| v.is_visible())?)
        })
        .operation("setVisible", |_, p, visible: bool| {
            Ok(p.with("setVisible", |v: &Visual| v.set_visible(visible))?)
        })
        .operation("getDepth", |_, p, ()| Ok(p.with("getDepth", |v: &Visual| v.depth())?))
        .operation("setDepth", |_, p, depth: i64| {
            Ok(p.with("setDepth", |v: &Visual| v.set_depth(depth))?)
        })
}

fn scripted() -> CapabilityDescriptor {
    CapabilityDescriptor::new("scripted", &types::SCRIPTED)
        .operation("getContract", |_, p, ()| {
            let host = p.host("getContract")?;
            Ok(host.as_stub().map(|s| s.contract().id().to_string()))
        })
        .operation("getSource", |_, p, ()| {
            let host = p.host("getSource")?;
            Ok(host.as_stub().map(|s| s.source_name().to_string()))
        })
        .operation("hasHook", |_, p, name: String| {
            let host = p.host("hasHook")?;
            Ok(host.as_stub().is_some_and(|s| s.has_hook(&name)))
        })
}

fn point() -> CapabilityDescriptor {
    CapabilityDescriptor::new("point", &types::POINT)
        .primary()
        .operation("distanceTo", |_, p, other: AnyUserData| {
            let other = proxy_of(&other)?;
            Ok(p.with("distanceTo", |a: &Transform| {
                other.with("distanceTo", |b: &Transform| a.distance_to(b))
            })??)
        })
}

fn world_object() -> CapabilityDescriptor {
    CapabilityDescriptor::new("world_object", &types::WORLD_OBJECT)
        .operation("isAlive", |_, p, ()| {
            Ok(p.with("isAlive", |o: &WorldObject| o.is_alive())?)
        })
        .operation("destroy", |_, p, ()| {
            Ok(p.with("destroy", |o: &WorldObject| o.destroy())?)
        })
        .operation("getVelocity", |_, p, ()| {
            Ok(p.with("getVelocity", |o: &WorldObject| o.velocity())?)
        })
        .operation("setVelocity", |_, p, (vx, vy): (f64, f64)| {
            Ok(p.with("setVelocity", |o: &WorldObject| o.set_velocity(vx, vy))?)
        })
        .operation("process", |_, p, delta: f64| {
            Ok(p.with("process", |o: &WorldObject| o.integrate(delta))?)
        })
}

fn prop() -> CapabilityDescriptor {
    CapabilityDescriptor::new("prop", &types::PROP).primary()
}

fn with_frame_ops(descriptor: CapabilityDescriptor) -> CapabilityDescriptor {
    descriptor
        .operation("getFrame", |_, p, ()| Ok(p.with("getFrame", |v: &Visual| v.frame())?))
        .operation("setFrame", |_, p, frame: i64| {
            Ok(p.with("setFrame", |v: &Visual| v.set_frame(frame))?)
        })
}

fn sprite() -> CapabilityDescriptor {
    with_frame_ops(CapabilityDescriptor::new("sprite", &types::SPRITE).primary())
}

fn scripted_object() -> CapabilityDescriptor {
    with_frame_ops(CapabilityDescriptor::new("scripted_object", &types::SCRIPTED_OBJECT).primary())
}

fn collider() -> CapabilityDescriptor {
    CapabilityDescriptor::new("collider", &types::COLLIDER)
        .primary()
        .operation("getSize", |_, p, ()| Ok(p.with("getSize", |o: &WorldObject| o.size())?))
        .operation("setSize", |_, p, (w, h): (f64, f64)| {
            Ok(p.with("setSize", |o: &WorldObject| o.set_size(w, h))?)
        })
        .operation("isSolid", |_, p, ()| {
            Ok(p.with("isSolid", |o: &WorldObject| o.is_solid())?)
        })
        .operation("setSolid", |_, p, solid: bool| {
            Ok(p.with("setSolid", |o: &WorldObject| o.set_solid(solid))?)
        })
        .operation("overlaps", |_, p, other: AnyUserData| {
            let other = proxy_of(&other)?;
            let theirs = other.with("overlaps", |o: &WorldObject| o.bounds())?;
            Ok(p.with("overlaps", |o: &WorldObject| o.bounds().intersects(&theirs))?)
        })
}

fn scenery() -> CapabilityDescriptor {
    CapabilityDescriptor::new("scenery", &types::SCENERY)
        .primary()
        .post_hook(|ops| {
            for name in SCENERY_HIDDEN {
                ops.remove(name);
            }
        })
}

fn room() -> CapabilityDescriptor {
    CapabilityDescriptor::new("room", &types::ROOM)
        .primary()
        .operation("getName", |_, p, ()| {
            Ok(p.with("getName", |r: &Room| r.name().to_string())?)
        })
        .operation("getSize", |_, p, ()| Ok(p.with("getSize", |r: &Room| r.size())?))
        .operation(
            "spawn",
            |lua, p, (kind, x, y, image): (String, f64, f64, Option<String>)| {
                let kind: ObjectKind = kind.parse().map_err(mlua::Error::RuntimeError)?;
                let image = image.unwrap_or_else(|| kind.to_string());
                let child = p.with("spawn", |r: &Room| r.spawn(kind, x, y, &image))?;
                Ok(wrap_in(lua, &child)?)
            },
        )
        .operation("objects", |lua, p, ()| {
            let children = p.with("objects", |r: &Room| r.children())?;
            let handles = children
                .iter()
                .map(|child| wrap_in(lua, child))
                .collect::<Result<Vec<_>, _>>()?;
            lua.create_sequence_from(handles)
        })
        .operation("count", |_, p, ()| Ok(p.with("count", |r: &Room| r.count())?))
        .operation("remove", |_, p, other: AnyUserData| {
            let id = proxy_of(&other)?.id();
            Ok(p.with("remove", |r: &Room| r.remove(id))?)
        })
}

fn ui_node() -> CapabilityDescriptor {
    CapabilityDescriptor::new("ui_node", &types::UI_NODE)
        .primary()
        .operation("getLabel", |_, p, ()| {
            Ok(p.with("getLabel", |n: &UiNode| n.label())?)
        })
        .operation("setLabel", |_, p, label: String| {
            Ok(p.with("setLabel", |n: &UiNode| n.set_label(&label))?)
        })
        .operation("getBounds", |_, p, ()| {
            let b = p.with("getBounds", |n: &UiNode| n.bounds())?;
            Ok((b.x, b.y, b.width, b.height))
        })
        .operation(
            "setBounds",
            |_, p, (x, y, width, height): (f64, f64, f64, f64)| {
                let bounds = Rect::new(x, y, width, height);
                Ok(p.with("setBounds", |n: &UiNode| n.set_bounds(bounds))?)
            },
        )
        .operation("isFocused", |_, p, ()| {
            Ok(p.with("isFocused", |n: &UiNode| n.is_focused())?)
        })
        .operation("setFocused", |lua, p, focused: bool| {
            let changed = p.with("setFocused", |n: &UiNode| n.set_focused(focused))?;
            if !changed {
                return Ok(());
            }
            // Script-backed components hear about focus changes.
            if let Some(host) = p.upgrade() {
                if let Some(stub) = host.as_stub() {
                    stub.invoke("onFocus", focused.into_lua_multi(lua)?)?;
                }
            }
            Ok(())
        })
}

fn canvas() -> CapabilityDescriptor {
    CapabilityDescriptor::new("canvas", &types::CANVAS)
        .primary()
        .operation(
            "drawSprite",
            |_, p, (image, frame, x, y, depth): (String, i64, f64, f64, Option<i64>)| {
                let command = DrawCommand::Sprite {
                    image,
                    frame,
                    x,
                    y,
                    depth: depth.unwrap_or(0),
                };
                Ok(p.with("drawSprite", |c: &Canvas| c.draw(command))?)
            },
        )
        .operation("drawText", |_, p, (text, x, y): (String, f64, f64)| {
            Ok(p.with("drawText", |c: &Canvas| c.draw(DrawCommand::Text { text, x, y }))?)
        })
        .operation(
            "drawRect",
            |_, p, (x, y, width, height): (f64, f64, f64, f64)| {
                let command = DrawCommand::Rect {
                    x,
                    y,
                    width,
                    height,
                };
                Ok(p.with("drawRect", |c: &Canvas| c.draw(command))?)
            },
        )
        .operation("commandCount", |_, p, ()| {
            Ok(p.with("commandCount", |c: &Canvas| c.len())?)
        })
}

fn scheduler() -> CapabilityDescriptor {
    CapabilityDescriptor::new("scheduler", &types::SCHEDULER)
        .primary()
        .operation("schedule", |_, p, (delay_ms, name): (u64, String)| {
            let delay = Duration::from_millis(delay_ms);
            Ok(p.with("schedule", |s: &Scheduler| s.schedule(delay, &name).raw())?)
        })
        .operation(
            "scheduleRecurring",
            |_, p, (interval_ms, name): (u64, String)| {
                let interval = Duration::from_millis(interval_ms);
                Ok(p.with("scheduleRecurring", |s: &Scheduler| {
                    s.schedule_recurring(interval, &name).raw()
                })?)
            },
        )
        .operation("cancel", |_, p, id: u64| {
            Ok(p.with("cancel", |s: &Scheduler| s.cancel(TimerId::from_raw(id)))?)
        })
        .operation("check", |_, p, id: u64| {
            Ok(p.with("check", |s: &Scheduler| s.check(TimerId::from_raw(id)))?)
        })
        .operation("activeCount", |_, p, ()| {
            Ok(p.with("activeCount", |s: &Scheduler| s.active_count())?)
        })
}

fn task() -> CapabilityDescriptor {
    CapabilityDescriptor::new("task", &types::TASK)
        .primary()
        .operation("isFinished", |_, p, ()| {
            Ok(p.with("isFinished", |t: &Task| t.is_finished())?)
        })
        .operation("finish", |_, p, ()| Ok(p.with("finish", |t: &Task| t.finish())?))
        .operation("getElapsed", |_, p, ()| {
            Ok(p.with("getElapsed", |t: &Task| t.elapsed())?)
        })
}
