use std::any::{Any, TypeId};
use std::cell::Cell;

use lantern_bridge::mlua::Value;
use lantern_bridge::{BridgeError, GuestRuntime, HookOutcome, HostObject, HostType, Stub};
use tracing::debug;

use crate::lifecycle::Lifecycle;
use crate::types::{SCRIPTED_TASK, TASK};

/// A unit of background work that runs every frame until it finishes.
#[derive(Debug)]
pub struct Task {
    name: String,
    finished: Cell<bool>,
    elapsed: Cell<f64>,
}

impl Task {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            finished: Cell::new(false),
            elapsed: Cell::new(0.0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    pub fn finish(&self) {
        if !self.finished.replace(true) {
            debug!(target: "scripting", "Task '{}' finished after {:.3}s", self.name, self.elapsed());
        }
    }

    /// Seconds spent running.
    pub fn elapsed(&self) -> f64 {
        self.elapsed.get()
    }

    fn advance(&self, delta: f64) {
        self.elapsed.set(self.elapsed.get() + delta);
    }
}

impl HostObject for Task {
    fn host_type(&self) -> &'static HostType {
        &TASK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Lifecycle for Task {
    fn process(&self, _runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        if !self.is_finished() {
            self.advance(delta);
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        Task::is_finished(self)
    }
}

/// Task driven by a `task` script. `process` returning true finishes it.
pub struct ScriptedTask {
    stub: Stub,
    task: Task,
}

impl ScriptedTask {
    pub fn new(stub: Stub, name: &str) -> Self {
        Self {
            stub,
            task: Task::new(name),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }
}

impl HostObject for ScriptedTask {
    fn host_type(&self) -> &'static HostType {
        &SCRIPTED_TASK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn component(&self, id: TypeId) -> Option<&dyn Any> {
        (id == TypeId::of::<Task>()).then_some(&self.task as &dyn Any)
    }

    fn as_stub(&self) -> Option<&Stub> {
        Some(&self.stub)
    }
}

impl Lifecycle for ScriptedTask {
    fn create(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        runtime.invoke(&self.stub, "create", ()).map(|_| ())
    }

    fn process(&self, runtime: &GuestRuntime, delta: f64) -> Result<(), BridgeError> {
        if self.task.is_finished() {
            return Ok(());
        }
        self.task.advance(delta);
        if let HookOutcome::Returned(values) = runtime.invoke(&self.stub, "process", delta)? {
            if matches!(values.iter().next(), Some(Value::Boolean(true))) {
                self.task.finish();
            }
        }
        Ok(())
    }

    fn destroy(&self, runtime: &GuestRuntime) -> Result<(), BridgeError> {
        runtime.invoke(&self.stub, "destroy", ()).map(|_| ())
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
