//! The lifecycle every role implements, whether native or script-backed.

use lantern_bridge::mlua::{IntoLuaMulti, Value};
use lantern_bridge::{BridgeError, GuestRuntime, HookOutcome, HostObject, HostRef, Stub};

use crate::event::HostEvent;
use crate::objects::{ScriptedObject, WorldObject};
use crate::room::{Room, ScriptedRoom};
use crate::task::{ScriptedTask, Task};
use crate::ui::{ScriptedUi, UiNode};

/// Frame callbacks driven by the runner. The runner only sees this trait, so
/// a script-backed room and a native room are handled the same way.
pub trait Lifecycle {
    fn create(&self, _runtime: &GuestRuntime) -> Result<(), BridgeError> {
        Ok(())
    }

    fn process(&self, _runtime: &GuestRuntime, _delta: f64) -> Result<(), BridgeError> {
        Ok(())
    }

    fn render(&self, _runtime: &GuestRuntime, _canvas: &HostRef) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Returns whether the event was handled.
    fn on_event(&self, _runtime: &GuestRuntime, _event: &HostEvent) -> Result<bool, BridgeError> {
        Ok(false)
    }

    fn destroy(&self, _runtime: &GuestRuntime) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Whether the runner should drop this instance.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Lifecycle view of a host object, if its type has one.
pub fn lifecycle_of(object: &dyn HostObject) -> Option<&dyn Lifecycle> {
    let any = object.as_any();
    if let Some(o) = any.downcast_ref::<WorldObject>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<ScriptedObject>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<Room>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<ScriptedRoom>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<UiNode>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<ScriptedUi>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<Task>() {
        return Some(o);
    }
    if let Some(o) = any.downcast_ref::<ScriptedTask>() {
        return Some(o);
    }
    None
}

/// Run `hook`, falling back to the host default when the script left it out.
pub(crate) fn hook_or_default<A: IntoLuaMulti>(
    runtime: &GuestRuntime,
    stub: &Stub,
    hook: &str,
    args: A,
    default: impl FnOnce() -> Result<(), BridgeError>,
) -> Result<(), BridgeError> {
    match runtime.invoke(stub, hook, args)? {
        HookOutcome::Returned(_) => Ok(()),
        HookOutcome::Skipped => default(),
    }
}

/// Event hooks report handling by returning a truthy value.
pub(crate) fn event_hook(
    runtime: &GuestRuntime,
    stub: &Stub,
    event: &HostEvent,
    default: impl FnOnce() -> Result<bool, BridgeError>,
) -> Result<bool, BridgeError> {
    match runtime.invoke(stub, "onEvent", event.clone())? {
        HookOutcome::Returned(values) => Ok(is_truthy(values.iter().next())),
        HookOutcome::Skipped => default(),
    }
}

pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Nil) | Some(Value::Boolean(false)))
}

/// Render hooks receive the frame's canvas proxy.
pub(crate) fn render_hook(
    runtime: &GuestRuntime,
    stub: &Stub,
    canvas: &HostRef,
    default: impl FnOnce() -> Result<(), BridgeError>,
) -> Result<(), BridgeError> {
    let canvas_proxy = runtime.wrap(canvas)?;
    hook_or_default(runtime, stub, "onRender", canvas_proxy, default)
}
