//! Per-frame driver for script-backed rooms, world objects, UI components
//! and tasks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use lantern_bridge::{component, BridgeError, GuestRuntime, HostRef};
use lantern_world::config::ScriptingConfig;
use lantern_world::{
    contracts, lifecycle_of, Canvas, DrawCommand, HostEvent, Lifecycle, Rect, Room, Scheduler,
    ScriptedObject, ScriptedRoom, ScriptedTask, ScriptedUi, UiNode,
};
use tracing::{debug, error, info, warn};

use crate::script_dir::{discover_scripts, ScriptFile, ScriptLoadError};
use crate::script_scanner::ScriptScanner;

/// Frames between proxy cache sweeps.
const SWEEP_INTERVAL_FRAMES: u64 = 120;

const DEFAULT_ROOM: &str = "default";

const DEFAULT_UI_BOUNDS: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 120.0,
    height: 24.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Room,
    WorldObject,
    Ui,
    Task,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Room => "room",
            Role::WorldObject => "world object",
            Role::Ui => "ui component",
            Role::Task => "task",
        };
        f.write_str(s)
    }
}

const PROCESS_ORDER: &[Role] = &[Role::Room, Role::WorldObject, Role::Ui, Role::Task];
const RENDER_ORDER: &[Role] = &[Role::Room, Role::WorldObject, Role::Ui];
const EVENT_ORDER: &[Role] = &[Role::Room, Role::WorldObject, Role::Ui];

/// One host object driven by the runner.
pub struct Instance {
    pub id: String,
    pub role: Role,
    pub host: HostRef,
}

impl Instance {
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        lifecycle_of(self.host.as_ref())
    }

    fn is_finished(&self) -> bool {
        self.lifecycle().is_some_and(|l| l.is_finished())
    }
}

/// What one call to [`FrameRunner::step`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub commands: Vec<DrawCommand>,
    /// Hook or operation failures during the frame, plus any from events
    /// dispatched since the previous frame.
    pub failures: usize,
}

pub struct FrameRunner {
    runtime: GuestRuntime,
    scheduler: Rc<Scheduler>,
    instances: Vec<Instance>,
    script_dir: Option<PathBuf>,
    scripting: ScriptingConfig,
    scanner: Option<ScriptScanner>,
    room_size: (f64, f64),
    frame_interval: Duration,
    frame: u64,
    pending_failures: usize,
}

impl FrameRunner {
    pub(crate) fn new(
        runtime: GuestRuntime,
        script_dir: Option<PathBuf>,
        scripting: ScriptingConfig,
        room_size: (f64, f64),
        frame_interval: Duration,
        start: Instant,
    ) -> Result<Self, BridgeError> {
        let scheduler = Rc::new(Scheduler::new(start));
        let scheduler_host: HostRef = scheduler.clone();
        runtime.set_global("scheduler", runtime.wrap(&scheduler_host)?)?;

        let scanner = match &script_dir {
            Some(dir) if scripting.hot_reload => Some(ScriptScanner::new(
                dir.clone(),
                Duration::from_millis(scripting.hot_reload_interval_ms),
            )),
            _ => None,
        };

        Ok(Self {
            runtime,
            scheduler,
            instances: Vec::new(),
            script_dir,
            scripting,
            scanner,
            room_size,
            frame_interval,
            frame: 0,
            pending_failures: 0,
        })
    }

    pub fn runtime(&self) -> &GuestRuntime {
        &self.runtime
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn script_dir(&self) -> Option<&Path> {
        self.script_dir.as_deref()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Load every enabled script from the script directory. Scripts that fail
    /// to load are logged and skipped. Returns how many loaded.
    pub fn load_scripts(&mut self) -> usize {
        let mut loaded = 0;
        if let (Some(dir), true) = (self.script_dir.clone(), self.scripting.enabled) {
            debug!(target: "scripting", "Loading scripts from {}", dir.display());
            for script in discover_scripts(&dir, &self.scripting) {
                match self.load_script(&script) {
                    Ok(()) => loaded += 1,
                    Err(e) => error!(
                        target: "scripting",
                        "Failed to load script {} from {}: {}",
                        script.id,
                        script.path.display(),
                        e
                    ),
                }
            }
            if loaded > 0 {
                info!(target: "scripting", "Loaded {} script(s)", loaded);
            }
        }
        self.ensure_room();
        loaded
    }

    /// Load one script, attach it to a new host object for its contract and
    /// run its `create` hook.
    pub fn load_script(&mut self, script: &ScriptFile) -> Result<(), ScriptLoadError> {
        let unknown = || ScriptLoadError::UnknownContract {
            path: script.path.clone(),
            contract: script.contract.clone(),
        };
        let contract = contracts::by_id(&script.contract).ok_or_else(unknown)?;
        let stub =
            self.runtime
                .load_contract(&contract, &script.source, &script.source_name())?;

        let (width, height) = self.room_size;
        let (role, host): (Role, HostRef) = match contract.id() {
            contracts::ROOM => (
                Role::Room,
                Rc::new(ScriptedRoom::new(stub, Room::new(&script.id, width, height))),
            ),
            contracts::WORLD_OBJECT => (
                Role::WorldObject,
                Rc::new(ScriptedObject::new(stub, 0.0, 0.0, &script.id)),
            ),
            contracts::UI_COMPONENT => (
                Role::Ui,
                Rc::new(ScriptedUi::new(stub, UiNode::new(&script.id, DEFAULT_UI_BOUNDS))),
            ),
            contracts::TASK => (Role::Task, Rc::new(ScriptedTask::new(stub, &script.id))),
            _ => return Err(unknown()),
        };

        self.runtime.attach(&host)?;
        if let Some(lifecycle) = lifecycle_of(host.as_ref()) {
            lifecycle.create(&self.runtime)?;
        }

        debug!(target: "scripting", "Started {} '{}'", role, script.id);
        self.instances.push(Instance {
            id: script.id.clone(),
            role,
            host,
        });
        Ok(())
    }

    /// Add a native host object, created as-is.
    pub fn add_instance(&mut self, id: &str, role: Role, host: HostRef) -> Result<(), BridgeError> {
        if let Some(lifecycle) = lifecycle_of(host.as_ref()) {
            lifecycle.create(&self.runtime)?;
        }
        self.instances.push(Instance {
            id: id.to_string(),
            role,
            host,
        });
        Ok(())
    }

    /// Scripts always have a room to spawn into and collide with.
    fn ensure_room(&mut self) {
        if self.instances.iter().any(|i| i.role == Role::Room) {
            return;
        }
        let (width, height) = self.room_size;
        self.instances.push(Instance {
            id: DEFAULT_ROOM.to_string(),
            role: Role::Room,
            host: Rc::new(Room::new(DEFAULT_ROOM, width, height)),
        });
    }

    /// Run one frame: fire timers, process, resolve collisions, drop finished
    /// instances, then render rooms, world objects and UI in that order.
    pub fn step(&mut self, delta: f64, now: Instant) -> FrameReport {
        self.frame += 1;
        let mut failures = std::mem::take(&mut self.pending_failures);

        for (id, name) in self.scheduler.tick(now) {
            debug!(target: "scripting", "Timer {} '{}' fired", id.raw(), name);
            failures += self.deliver(&HostEvent::timer(id.raw(), &name)).1;
        }

        failures += self.each(PROCESS_ORDER, "process", |rt, l| l.process(rt, delta));
        failures += self.collide();
        failures += self.prune_finished();

        let canvas: HostRef = Rc::new(Canvas::new());
        failures += self.each(RENDER_ORDER, "render", |rt, l| l.render(rt, &canvas));
        let commands = component::<Canvas>(canvas.as_ref())
            .map(Canvas::take)
            .unwrap_or_default();
        drop(canvas);

        if self.frame % SWEEP_INTERVAL_FRAMES == 0 {
            match self.runtime.sweep() {
                Ok(swept) if swept > 0 => {
                    debug!(target: "scripting", "Swept {} dead proxies", swept)
                }
                Ok(_) => {}
                Err(e) => warn!(target: "scripting", "Proxy sweep failed: {}", e),
            }
        }

        if failures > 0 {
            warn!(target: "scripting", "Frame {} had {} script failure(s)", self.frame, failures);
        }

        FrameReport {
            frame: self.frame,
            commands,
            failures,
        }
    }

    /// Offer an event to rooms, then world objects, then UI until one
    /// handles it.
    pub fn dispatch_event(&mut self, event: &HostEvent) -> bool {
        let (handled, failures) = self.deliver(event);
        self.pending_failures += failures;
        handled
    }

    /// Destroy every instance and load the script directory again.
    pub fn reload_scripts(&mut self) -> usize {
        let previous = self.instances.len();
        info!(target: "scripting", "Reloading scripts");

        self.pending_failures += self.destroy_all();
        self.scheduler.clear();
        if let Err(e) = self.runtime.sweep() {
            warn!(target: "scripting", "Proxy sweep failed: {}", e);
        }

        let loaded = self.load_scripts();
        if previous > 0 && loaded == 0 {
            warn!(
                target: "scripting",
                "Script reload resulted in zero scripts. Check logs for loading errors."
            );
        }
        loaded
    }

    /// Reload when the scanner has seen the script directory change.
    pub fn poll_reload(&mut self, now: Instant) -> bool {
        let changed = match &mut self.scanner {
            Some(scanner) if scanner.should_scan(now) => scanner.scan_changes(now).has_changes(),
            _ => false,
        };
        if changed {
            self.reload_scripts();
        }
        changed
    }

    /// Destroy every instance, returning how many destroy calls failed.
    pub fn shutdown(&mut self) -> usize {
        let failures = self.destroy_all();
        debug!(target: "scripting", "Runner stopped after {} frame(s)", self.frame);
        failures
    }

    fn each(
        &self,
        roles: &[Role],
        stage: &str,
        f: impl Fn(&GuestRuntime, &dyn Lifecycle) -> Result<(), BridgeError>,
    ) -> usize {
        let mut failures = 0;
        for role in roles {
            for instance in self.instances.iter().filter(|i| i.role == *role) {
                let Some(lifecycle) = instance.lifecycle() else {
                    continue;
                };
                if let Err(e) = f(&self.runtime, lifecycle) {
                    error!(
                        target: "scripting",
                        "{} '{}' failed during {}: {}",
                        role,
                        instance.id,
                        stage,
                        e
                    );
                    failures += 1;
                }
            }
        }
        failures
    }

    fn deliver(&self, event: &HostEvent) -> (bool, usize) {
        let mut failures = 0;
        for role in EVENT_ORDER {
            for instance in self.instances.iter().filter(|i| i.role == *role) {
                let Some(lifecycle) = instance.lifecycle() else {
                    continue;
                };
                match lifecycle.on_event(&self.runtime, event) {
                    Ok(true) => return (true, failures),
                    Ok(false) => {}
                    Err(e) => {
                        error!(
                            target: "scripting",
                            "{} '{}' failed handling event '{}': {}",
                            role,
                            instance.id,
                            event.name,
                            e
                        );
                        failures += 1;
                    }
                }
            }
        }
        (false, failures)
    }

    /// Tell each live scripted world object about the solid room children it
    /// overlaps.
    fn collide(&self) -> usize {
        let rooms: Vec<&Room> = self
            .instances
            .iter()
            .filter(|i| i.role == Role::Room)
            .filter_map(|i| component::<Room>(i.host.as_ref()))
            .collect();

        let mut failures = 0;
        for instance in self.instances.iter().filter(|i| i.role == Role::WorldObject) {
            let Some(object) = component::<ScriptedObject>(instance.host.as_ref()) else {
                continue;
            };
            if !object.body().is_alive() {
                continue;
            }
            let bounds = object.body().bounds();
            for room in &rooms {
                for other in room.overlapping(&bounds) {
                    if let Err(e) = object.collide(&self.runtime, &other) {
                        error!(
                            target: "scripting",
                            "world object '{}' failed during collision: {}",
                            instance.id,
                            e
                        );
                        failures += 1;
                    }
                }
            }
        }
        failures
    }

    fn prune_finished(&mut self) -> usize {
        let (finished, live): (Vec<Instance>, Vec<Instance>) =
            std::mem::take(&mut self.instances)
                .into_iter()
                .partition(Instance::is_finished);
        self.instances = live;

        let mut failures = 0;
        for instance in finished {
            debug!(target: "scripting", "{} '{}' finished", instance.role, instance.id);
            if let Some(Err(e)) = instance.lifecycle().map(|l| l.destroy(&self.runtime)) {
                error!(
                    target: "scripting",
                    "{} '{}' failed during destroy: {}",
                    instance.role,
                    instance.id,
                    e
                );
                failures += 1;
            }
        }
        failures
    }

    fn destroy_all(&mut self) -> usize {
        let mut failures = 0;
        for instance in std::mem::take(&mut self.instances) {
            if let Some(Err(e)) = instance.lifecycle().map(|l| l.destroy(&self.runtime)) {
                error!(
                    target: "scripting",
                    "{} '{}' failed during destroy: {}",
                    instance.role,
                    instance.id,
                    e
                );
                failures += 1;
            }
        }
        failures
    }
}

impl Drop for FrameRunner {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
