//! Per-frame draw list. The actual rasterizer is outside this crate; a frame
//! just records what it would draw.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;

use lantern_bridge::{HostObject, HostType};

use crate::types::CANVAS;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Sprite {
        image: String,
        frame: i64,
        x: f64,
        y: f64,
        depth: i64,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl fmt::Display for DrawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawCommand::Sprite {
                image,
                frame,
                x,
                y,
                depth,
            } => write!(f, "sprite {image}#{frame} at ({x}, {y}) depth {depth}"),
            DrawCommand::Text { text, x, y } => write!(f, "text {text:?} at ({x}, {y})"),
            DrawCommand::Rect {
                x,
                y,
                width,
                height,
            } => write!(f, "rect {width}x{height} at ({x}, {y})"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Canvas {
    commands: RefCell<Vec<DrawCommand>>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&self, command: DrawCommand) {
        self.commands.borrow_mut().push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    /// Take the recorded commands, leaving the canvas empty.
    pub fn take(&self) -> Vec<DrawCommand> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }
}

impl HostObject for Canvas {
    fn host_type(&self) -> &'static HostType {
        &CANVAS
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
