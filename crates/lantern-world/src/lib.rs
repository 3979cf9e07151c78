//! Host object model for lantern: the concrete types scripts can see, the
//! standard capability catalog, and the script-backed roles.

pub mod canvas;
pub mod catalog;
pub mod components;
pub mod config;
pub mod contracts;
pub mod event;
pub mod lifecycle;
pub mod objects;
pub mod room;
pub mod scheduler;
pub mod task;
pub mod types;
pub mod ui;

pub use canvas::{Canvas, DrawCommand};
pub use catalog::{register_standard_capabilities, standard_capabilities, standard_registry};
pub use components::{Rect, Tag, Transform, Visual};
pub use event::{EventValue, HostEvent};
pub use lifecycle::{lifecycle_of, Lifecycle};
pub use objects::{ObjectKind, Point, ScriptedObject, WorldObject};
pub use room::{Room, ScriptedRoom};
pub use scheduler::{Scheduler, TimerId};
pub use task::{ScriptedTask, Task};
pub use ui::{ScriptedUi, UiNode};
