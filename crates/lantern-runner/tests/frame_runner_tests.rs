// Integration tests for the frame runner driving a script directory

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use lantern_bridge::component;
use lantern_runner::{FrameRunner, Role, ScriptFile};
use lantern_world::config::LanternConfig;
use lantern_world::{DrawCommand, HostEvent, Tag};
use tempfile::TempDir;

const ARENA: &str = r#"
function create(self)
    self:spawn("sprite", 5, 5, "coin")
    scheduler:schedule(10, "spawn_wall")
end

function onEvent(self, event)
    if event.name == "timer" and event.timer == "spawn_wall" then
        self:spawn("collider", 0, 0, "wall")
        return true
    end
    return false
end
"#;

const HERO: &str = r#"
return {
    create = function(self) self:setPosition(0, 0) end,
    process = function(self, dt) self:move(1, 0) end,
    onCollision = function(self, other) self:setTag("bumped") end,
}
"#;

const HUD: &str = r#"
return {
    create = function(self) self:setLabel("HUD") end,
    onEvent = function(self, event) return event.name == "click" end,
}
"#;

const COUNTDOWN: &str = r#"
return {
    process = function(self, dt) return self:getElapsed() >= 0.25 end,
}
"#;

fn write(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).unwrap();
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn tag_of(runner: &FrameRunner, id: &str) -> Option<String> {
    let instance = runner.instance(id)?;
    component::<Tag>(instance.host.as_ref()).map(|t| t.get())
}

fn scene_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "arena.room.lua", ARENA);
    write(dir.path(), "hero.world_object.lua", HERO);
    write(dir.path(), "hud.ui_component.lua", HUD);
    write(dir.path(), "countdown.task.lua", COUNTDOWN);
    dir
}

#[test]
fn test_frames_drive_every_role() -> anyhow::Result<()> {
    let dir = scene_dir();
    let start = Instant::now();
    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_script_dir(dir.path().to_path_buf())
        .with_start(start)
        .build()?;

    assert_eq!(runner.instance_count(), 4);
    assert_eq!(runner.instance("arena").map(|i| i.role), Some(Role::Room));

    let first = runner.step(0.1, start + ms(5));
    assert_eq!(first.frame, 1);
    assert_eq!(first.failures, 0);
    assert_eq!(
        first.commands[..2],
        [
            DrawCommand::Sprite {
                image: "coin".to_string(),
                frame: 0,
                x: 5.0,
                y: 5.0,
                depth: 0,
            },
            DrawCommand::Sprite {
                image: "hero".to_string(),
                frame: 0,
                x: 1.0,
                y: 0.0,
                depth: 0,
            },
        ]
    );
    assert!(matches!(&first.commands[3], DrawCommand::Text { text, .. } if text == "HUD"));
    assert_eq!(first.commands.len(), 4);

    // The timer fires, the room spawns a wall and the hero runs into it.
    assert_ne!(tag_of(&runner, "hero").as_deref(), Some("bumped"));
    let second = runner.step(0.1, start + ms(20));
    assert_eq!(second.failures, 0);
    assert_eq!(tag_of(&runner, "hero").as_deref(), Some("bumped"));

    // The countdown reaches 0.25s and is dropped.
    runner.step(0.1, start + ms(30));
    assert!(runner.instance("countdown").is_none());
    assert_eq!(runner.instance_count(), 3);
    Ok(())
}

#[test]
fn test_events_stop_at_first_handler() -> anyhow::Result<()> {
    let dir = scene_dir();
    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_script_dir(dir.path().to_path_buf())
        .build()?;

    assert!(runner.dispatch_event(&HostEvent::new("click")));
    assert!(!runner.dispatch_event(&HostEvent::new("keypress").with("key", "space")));
    Ok(())
}

#[test]
fn test_failing_hooks_are_counted_not_fatal() -> anyhow::Result<()> {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "broken.task.lua",
        "return { process = function(self, dt) error('boom') end }",
    );
    write(dir.path(), "countdown.task.lua", COUNTDOWN);

    let start = Instant::now();
    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_script_dir(dir.path().to_path_buf())
        .with_start(start)
        .build()?;

    for frame in 1..=3 {
        let report = runner.step(0.1, start + ms(frame * 16));
        assert_eq!(report.failures, 1);
    }
    assert!(runner.instance("broken").is_some());
    assert!(runner.instance("countdown").is_none());
    Ok(())
}

#[test]
fn test_bad_scripts_are_skipped() -> anyhow::Result<()> {
    let dir = TempDir::new().unwrap();
    // Missing the required process hook.
    write(dir.path(), "lazy.world_object.lua", "function create(self) end");
    write(dir.path(), "typo.room.lua", "function create(self) end end");
    write(dir.path(), "off.task.lua", COUNTDOWN);
    write(dir.path(), "countdown.task.lua", COUNTDOWN);

    let config = LanternConfig::from_toml_str("[scripting.config.off]\nenabled = false")?;
    let runner = FrameRunner::builder()
        .with_standard_registry()
        .with_config(config)
        .with_script_dir(dir.path().to_path_buf())
        .build()?;

    let ids: Vec<&str> = runner.instances().iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["countdown", "default"]);
    Ok(())
}

#[test]
fn test_reload_destroys_old_instances() -> anyhow::Result<()> {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "stubborn.task.lua",
        r#"
        return {
            process = function(self, dt) end,
            destroy = function(self) error("not leaving") end,
        }
        "#,
    );

    let start = Instant::now();
    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_script_dir(dir.path().to_path_buf())
        .with_start(start)
        .build()?;
    runner.scheduler().schedule(ms(1), "stale");

    fs::remove_file(dir.path().join("stubborn.task.lua"))?;
    write(dir.path(), "countdown.task.lua", COUNTDOWN);
    assert_eq!(runner.reload_scripts(), 1);
    assert!(runner.instance("stubborn").is_none());
    assert!(runner.instance("countdown").is_some());
    assert_eq!(runner.scheduler().active_count(), 0);

    // The failed destroy shows up in the next frame's report.
    let report = runner.step(0.1, start + ms(16));
    assert_eq!(report.failures, 1);
    Ok(())
}

#[test]
fn test_poll_reload_picks_up_new_scripts() -> anyhow::Result<()> {
    let dir = TempDir::new().unwrap();
    let config = LanternConfig::from_toml_str(
        "[scripting]\nhot_reload = true\nhot_reload_interval_ms = 0",
    )?;
    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_config(config)
        .with_script_dir(dir.path().to_path_buf())
        .build()?;
    assert!(!runner.poll_reload(Instant::now()));
    assert!(runner.instance("countdown").is_none());

    write(dir.path(), "countdown.task.lua", COUNTDOWN);
    assert!(runner.poll_reload(Instant::now()));
    assert!(runner.instance("countdown").is_some());
    Ok(())
}

#[test]
fn test_load_script_with_directive() -> anyhow::Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticker.lua");
    fs::write(&path, format!("--! contract: task\n{COUNTDOWN}"))?;

    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_script_dir(dir.path().join("empty"))
        .build()?;
    let before = runner.instance_count();
    runner.load_script(&ScriptFile::read(&path)?)?;
    assert_eq!(runner.instance_count(), before + 1);
    assert_eq!(runner.instance("ticker").map(|i| i.role), Some(Role::Task));
    Ok(())
}

#[test]
fn test_scripts_share_the_scheduler() -> anyhow::Result<()> {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "alarm.task.lua",
        r#"
        local id
        return {
            create = function(self) id = scheduler:schedule(50, "alarm") end,
            process = function(self, dt) return scheduler:check(id) end,
        }
        "#,
    );

    let start = Instant::now();
    let mut runner = FrameRunner::builder()
        .with_standard_registry()
        .with_script_dir(dir.path().to_path_buf())
        .with_start(start)
        .build()?;

    runner.step(0.016, start + ms(16));
    assert!(runner.instance("alarm").is_some());
    runner.step(0.016, start + ms(64));
    assert!(runner.instance("alarm").is_none());
    Ok(())
}
