// Integration tests for the standard catalog and script-backed roles

use std::rc::Rc;
use std::time::{Duration, Instant};

use lantern_bridge::{component, BridgeError, GuestRuntime, HostRef};
use lantern_world::{
    contracts, lifecycle_of, standard_registry, Canvas, DrawCommand, HostEvent, ObjectKind, Point,
    Rect, Room, Scheduler, ScriptedObject, ScriptedRoom, ScriptedTask, ScriptedUi, UiNode,
};

fn runtime() -> GuestRuntime {
    GuestRuntime::new(Rc::new(standard_registry().expect("catalog"))).expect("runtime")
}

fn canvas() -> HostRef {
    Rc::new(Canvas::new())
}

fn commands(canvas: &HostRef) -> Vec<DrawCommand> {
    component::<Canvas>(canvas.as_ref())
        .map(|c| c.take())
        .unwrap_or_default()
}

#[test]
fn test_room_spawns_and_removes_from_script() -> anyhow::Result<()> {
    let rt = runtime();
    let room: HostRef = Rc::new(Room::new("arena", 320.0, 200.0));
    rt.set_global("room", rt.wrap(&room)?)?;

    rt.exec(
        r#"
        hero = room:spawn("sprite", 10, 20, "hero")
        local wall = room:spawn("collider", 0, 0)
        hero:setVelocity(2, 0)
        assert(room:count() == 2)
        assert(room:objects()[1] == hero)
        wall:setSize(100, 100)
        assert(wall:overlaps(hero))
        assert(room:remove(wall))
        assert(not pcall(function() return wall:getX() end))
        "#,
        "room.lua",
    )?;

    let native = component::<Room>(room.as_ref()).expect("room");
    assert_eq!(native.count(), 1);

    lifecycle_of(room.as_ref()).expect("lifecycle").process(&rt, 0.5)?;
    assert_eq!(rt.eval::<f64>("return hero:getX()", "room.lua")?, 11.0);
    Ok(())
}

#[test]
fn test_destroyed_children_are_dropped_on_process() -> anyhow::Result<()> {
    let rt = runtime();
    let room: HostRef = Rc::new(Room::new("arena", 320.0, 200.0));
    rt.set_global("room", rt.wrap(&room)?)?;

    rt.exec(
        "doomed = room:spawn('prop', 0, 0)\ndoomed:destroy()",
        "destroy.lua",
    )?;
    assert!(!rt.eval::<bool>("return doomed:isAlive()", "destroy.lua")?);

    lifecycle_of(room.as_ref()).expect("lifecycle").process(&rt, 0.1)?;
    assert_eq!(rt.eval::<i64>("return room:count()", "destroy.lua")?, 0);
    assert!(rt.eval::<bool>("return not pcall(doomed.isAlive)", "destroy.lua")?);
    Ok(())
}

#[test]
fn test_receiver_as_argument_needs_colon_call() -> anyhow::Result<()> {
    let rt = runtime();
    let p: HostRef = Rc::new(Point::new(3.0, 4.0));
    let origin: HostRef = Rc::new(Point::new(0.0, 0.0));
    rt.set_global("p", rt.wrap(&p)?)?;
    rt.set_global("origin", rt.wrap(&origin)?)?;

    let distances: (f64, f64, f64) = rt.eval(
        "return p:distanceTo(p), p.distanceTo(origin), p:distanceTo(origin)",
        "distance.lua",
    )?;
    assert_eq!(distances, (0.0, 5.0, 5.0));

    // A leading receiver is always taken as `self`, so this call has no argument.
    assert!(rt.eval::<bool>("return not pcall(p.distanceTo, p)", "distance.lua")?);
    Ok(())
}

#[test]
fn test_scenery_cannot_move() -> anyhow::Result<()> {
    let rt = runtime();
    let room: HostRef = Rc::new(Room::new("garden", 100.0, 100.0));
    rt.set_global("room", rt.wrap(&room)?)?;

    let (has_set_x, x, name): (bool, f64, String) = rt.eval(
        "local tree = room:spawn('scenery', 4, 5)\nreturn tree.setX ~= nil, tree:getX(), tostring(tree)",
        "scenery.lua",
    )?;
    assert!(!has_set_x);
    assert_eq!(x, 4.0);
    assert!(name.starts_with("scenery("));
    Ok(())
}

#[test]
fn test_scripted_room_falls_back_to_native_render() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("room").expect("contract"),
        "return { create = function(self) self:setTag('boss') end }",
        "lair.lua",
    )?;
    let lair = ScriptedRoom::new(stub, Room::new("lair", 64.0, 64.0));
    lair.room().spawn(ObjectKind::Sprite, 1.0, 2.0, "bat");
    let lair: HostRef = Rc::new(lair);
    rt.attach(&lair)?;

    let lifecycle = lifecycle_of(lair.as_ref()).expect("lifecycle");
    lifecycle.create(&rt)?;
    assert_eq!(
        component::<lantern_world::Tag>(lair.as_ref()).map(|t| t.get()),
        Some("boss".to_string())
    );

    let canvas = canvas();
    lifecycle.render(&rt, &canvas)?;
    assert_eq!(
        commands(&canvas),
        vec![DrawCommand::Sprite {
            image: "bat".to_string(),
            frame: 0,
            x: 1.0,
            y: 2.0,
            depth: 0,
        }]
    );
    Ok(())
}

#[test]
fn test_scripted_room_render_hook_replaces_default() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("room").expect("contract"),
        r#"
        function create(self) end
        function onRender(self, canvas)
            canvas:drawText(self:getName(), 0, 0)
        end
        "#,
        "title.lua",
    )?;
    let title = ScriptedRoom::new(stub, Room::new("title", 64.0, 64.0));
    title.room().spawn(ObjectKind::Sprite, 0.0, 0.0, "hidden");
    let title: HostRef = Rc::new(title);
    rt.attach(&title)?;

    let canvas = canvas();
    lifecycle_of(title.as_ref())
        .expect("lifecycle")
        .render(&rt, &canvas)?;
    assert_eq!(
        commands(&canvas),
        vec![DrawCommand::Text {
            text: "title".to_string(),
            x: 0.0,
            y: 0.0,
        }]
    );
    Ok(())
}

#[test]
fn test_focus_change_reaches_ui_script() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("ui_component").expect("contract"),
        r#"
        return {
            create = function(self) end,
            onFocus = function(self, focused)
                self:setLabel(focused and "on" or "off")
            end,
        }
        "#,
        "button.lua",
    )?;
    let button: HostRef = Rc::new(ScriptedUi::new(
        stub,
        UiNode::new("idle", Rect::new(0.0, 0.0, 40.0, 12.0)),
    ));
    rt.set_global("button", rt.attach(&button)?)?;

    rt.exec("button:setFocused(true)", "focus.lua")?;
    assert_eq!(rt.eval::<String>("return button:getLabel()", "focus.lua")?, "on");

    // Unchanged focus does not call the hook again.
    rt.exec("button:setLabel('manual')\nbutton:setFocused(true)", "focus.lua")?;
    assert_eq!(rt.eval::<String>("return button:getLabel()", "focus.lua")?, "manual");
    Ok(())
}

#[test]
fn test_ui_default_render_draws_bounds_and_label() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("ui_component").expect("contract"),
        "return { create = function(self) end }",
        "panel.lua",
    )?;
    let panel: HostRef = Rc::new(ScriptedUi::new(
        stub,
        UiNode::new("Score", Rect::new(5.0, 6.0, 50.0, 10.0)),
    ));
    rt.attach(&panel)?;

    let canvas = canvas();
    lifecycle_of(panel.as_ref())
        .expect("lifecycle")
        .render(&rt, &canvas)?;
    let drawn = commands(&canvas);
    assert_eq!(drawn.len(), 2);
    assert!(matches!(&drawn[1], DrawCommand::Text { text, .. } if text == "Score"));
    Ok(())
}

#[test]
fn test_scheduler_from_script() -> anyhow::Result<()> {
    let rt = runtime();
    let start = Instant::now();
    let scheduler: HostRef = Rc::new(Scheduler::new(start));
    rt.set_global("scheduler", rt.wrap(&scheduler)?)?;

    let id: u64 = rt.eval("return scheduler:schedule(100, 'blink')", "timer.lua")?;
    assert_eq!(rt.eval::<i64>("return scheduler:activeCount()", "timer.lua")?, 1);

    let fired = component::<Scheduler>(scheduler.as_ref())
        .expect("scheduler")
        .tick(start + Duration::from_millis(150));
    assert_eq!(fired.len(), 1);

    rt.set_global("id", id)?;
    assert!(rt.eval::<bool>("return scheduler:check(id)", "timer.lua")?);
    assert!(!rt.eval::<bool>("return scheduler:check(id)", "timer.lua")?);
    Ok(())
}

#[test]
fn test_task_finishes_when_process_returns_true() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("task").expect("contract"),
        "return { process = function(self, dt) return self:getElapsed() >= 1.0 end }",
        "countdown.lua",
    )?;
    let task: HostRef = Rc::new(ScriptedTask::new(stub, "countdown"));
    rt.attach(&task)?;

    let lifecycle = lifecycle_of(task.as_ref()).expect("lifecycle");
    lifecycle.process(&rt, 0.5)?;
    assert!(!lifecycle.is_finished());
    lifecycle.process(&rt, 0.5)?;
    assert!(lifecycle.is_finished());
    Ok(())
}

#[test]
fn test_world_object_script_handles_events() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("world_object").expect("contract"),
        r#"
        return {
            create = function(self) self:setFrame(2) end,
            process = function(self, dt) self:move(dt, 0) end,
            onEvent = function(self, event) return event.name == "jump" end,
        }
        "#,
        "hero.lua",
    )?;
    let hero: HostRef = Rc::new(ScriptedObject::new(stub, 0.0, 0.0, "hero"));
    rt.set_global("hero", rt.attach(&hero)?)?;

    let lifecycle = lifecycle_of(hero.as_ref()).expect("lifecycle");
    lifecycle.create(&rt)?;
    lifecycle.process(&rt, 3.0)?;
    assert!(lifecycle.on_event(&rt, &HostEvent::new("jump"))?);
    assert!(!lifecycle.on_event(&rt, &HostEvent::new("duck"))?);

    let (x, frame, contract): (f64, i64, String) = rt.eval(
        "return hero:getX(), hero:getFrame(), hero:getContract()",
        "hero.lua",
    )?;
    assert_eq!(x, 3.0);
    assert_eq!(frame, 2);
    assert_eq!(contract, "world_object");
    Ok(())
}

#[test]
fn test_world_object_script_owns_movement() -> anyhow::Result<()> {
    let rt = runtime();
    let contract = contracts::by_id("world_object").expect("contract");

    let err = rt
        .load_contract(&contract, "function create(self) end", "idle.lua")
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::MissingHook { ref missing, .. } if missing == &vec!["process".to_string()]
    ));

    // A process hook that ignores velocity leaves the object where it is.
    let stub = rt.load_contract(
        &contract,
        r#"
        return {
            create = function(self) self:setVelocity(5, 5) end,
            process = function(self, dt) end,
        }
        "#,
        "anchor.lua",
    )?;
    let anchor: HostRef = Rc::new(ScriptedObject::new(stub, 1.0, 1.0, "anchor"));
    rt.attach(&anchor)?;

    let lifecycle = lifecycle_of(anchor.as_ref()).expect("lifecycle");
    lifecycle.create(&rt)?;
    lifecycle.process(&rt, 1.0)?;
    let body = component::<ScriptedObject>(anchor.as_ref()).expect("object").body();
    assert_eq!(body.transform.position(), (1.0, 1.0));
    Ok(())
}

#[test]
fn test_collision_hook_receives_other_object() -> anyhow::Result<()> {
    let rt = runtime();
    let stub = rt.load_contract(
        &contracts::by_id("world_object").expect("contract"),
        r#"
        return {
            create = function(self) end,
            process = function(self, dt) end,
            onCollision = function(self, other)
                if other:isSolid() then other:setTag("hit") end
            end,
        }
        "#,
        "bumper.lua",
    )?;
    let bumper = ScriptedObject::new(stub, 0.0, 0.0, "bumper");
    let room = Room::new("pit", 100.0, 100.0);
    let wall = room.spawn(ObjectKind::Collider, 8.0, 8.0, "wall");
    room.spawn(ObjectKind::Collider, 50.0, 50.0, "far");

    let overlapping = room.overlapping(&bumper.body().bounds());
    assert_eq!(overlapping.len(), 1);

    let bumper: HostRef = Rc::new(bumper);
    rt.attach(&bumper)?;
    let scripted = component::<ScriptedObject>(bumper.as_ref()).expect("scripted object");
    for other in &overlapping {
        scripted.collide(&rt, other)?;
    }

    assert_eq!(
        component::<lantern_world::Tag>(wall.as_ref()).map(|t| t.get()),
        Some("hit".to_string())
    );
    Ok(())
}
