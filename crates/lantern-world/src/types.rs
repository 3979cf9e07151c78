//! Host type hierarchy for the standard world model.

use lantern_bridge::HostType;

// Interfaces
pub static POSITIONABLE: HostType = HostType::new("Positionable");
pub static TAGGABLE: HostType = HostType::new("Taggable");
pub static RENDERABLE: HostType = HostType::new("Renderable");
pub static SCRIPTED: HostType = HostType::new("Scripted");

pub static POINT: HostType = HostType {
    name: "Point",
    parent: None,
    interfaces: &[&POSITIONABLE, &TAGGABLE],
};

pub static WORLD_OBJECT: HostType = HostType {
    name: "WorldObject",
    parent: None,
    interfaces: &[&POSITIONABLE, &TAGGABLE],
};

pub static PROP: HostType = HostType {
    name: "Prop",
    parent: Some(&WORLD_OBJECT),
    interfaces: &[],
};

pub static SPRITE: HostType = HostType {
    name: "Sprite",
    parent: Some(&WORLD_OBJECT),
    interfaces: &[&RENDERABLE],
};

pub static COLLIDER: HostType = HostType {
    name: "Collider",
    parent: Some(&WORLD_OBJECT),
    interfaces: &[],
};

pub static SCENERY: HostType = HostType {
    name: "Scenery",
    parent: Some(&WORLD_OBJECT),
    interfaces: &[&RENDERABLE],
};

pub static ROOM: HostType = HostType {
    name: "Room",
    parent: None,
    interfaces: &[&TAGGABLE],
};

pub static UI_NODE: HostType = HostType {
    name: "UiNode",
    parent: None,
    interfaces: &[&RENDERABLE, &TAGGABLE],
};

pub static CANVAS: HostType = HostType::new("Canvas");
pub static SCHEDULER: HostType = HostType::new("Scheduler");
pub static TASK: HostType = HostType::new("Task");

// Script-backed roles
pub static SCRIPTED_ROOM: HostType = HostType {
    name: "ScriptedRoom",
    parent: Some(&ROOM),
    interfaces: &[&SCRIPTED],
};

pub static SCRIPTED_OBJECT: HostType = HostType {
    name: "ScriptedObject",
    parent: Some(&WORLD_OBJECT),
    interfaces: &[&RENDERABLE, &SCRIPTED],
};

pub static SCRIPTED_UI: HostType = HostType {
    name: "ScriptedUi",
    parent: Some(&UI_NODE),
    interfaces: &[&SCRIPTED],
};

pub static SCRIPTED_TASK: HostType = HostType {
    name: "ScriptedTask",
    parent: Some(&TASK),
    interfaces: &[&SCRIPTED],
};

/// Every concrete type, for listing and lookup by name.
pub static CONCRETE_TYPES: &[&HostType] = &[
    &POINT,
    &PROP,
    &SPRITE,
    &COLLIDER,
    &SCENERY,
    &ROOM,
    &UI_NODE,
    &CANVAS,
    &SCHEDULER,
    &TASK,
    &SCRIPTED_ROOM,
    &SCRIPTED_OBJECT,
    &SCRIPTED_UI,
    &SCRIPTED_TASK,
];

pub fn type_by_name(name: &str) -> Option<&'static HostType> {
    CONCRETE_TYPES
        .iter()
        .copied()
        .find(|ty| ty.name.eq_ignore_ascii_case(name))
}
