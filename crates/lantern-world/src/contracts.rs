//! Lifecycle contracts for the script-implementable host roles.

use std::rc::Rc;

use lantern_bridge::Contract;

pub const ROOM: &str = "room";
pub const WORLD_OBJECT: &str = "world_object";
pub const UI_COMPONENT: &str = "ui_component";
pub const TASK: &str = "task";

pub fn room() -> Contract {
    Contract::new(ROOM, &["create"], &["process", "onRender", "onEvent", "destroy"])
}

pub fn world_object() -> Contract {
    Contract::new(
        WORLD_OBJECT,
        &["create", "process"],
        &["onRender", "onEvent", "onCollision", "destroy"],
    )
}

pub fn ui_component() -> Contract {
    Contract::new(
        UI_COMPONENT,
        &["create"],
        &["process", "onRender", "onEvent", "onFocus", "destroy"],
    )
}

pub fn task() -> Contract {
    Contract::new(TASK, &["process"], &["create", "destroy"])
}

/// Contract for a role id, as used in script directives and file names.
pub fn by_id(id: &str) -> Option<Rc<Contract>> {
    let contract = match id {
        ROOM => room(),
        WORLD_OBJECT => world_object(),
        UI_COMPONENT => ui_component(),
        TASK => task(),
        _ => return None,
    };
    Some(Rc::new(contract))
}

pub fn ids() -> [&'static str; 4] {
    [ROOM, WORLD_OBJECT, UI_COMPONENT, TASK]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_id_resolves() {
        for id in ids() {
            assert_eq!(by_id(id).map(|c| c.id().to_string()), Some(id.to_string()));
        }
        assert!(by_id("widget").is_none());
    }

    #[test]
    fn test_task_only_requires_process() {
        let task = task();
        assert_eq!(task.required(), ["process"]);
        assert!(task.recognizes("create"));
        assert!(!task.recognizes("onRender"));
    }
}
