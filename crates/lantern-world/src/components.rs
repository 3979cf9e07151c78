//! Shared state embedded in host objects.
//!
//! Interface capabilities (positionable, taggable, renderable) work on these
//! components rather than on concrete object types, so any object that embeds
//! one gets the capability for free.

use std::cell::{Cell, RefCell};

#[derive(Debug, Default)]
pub struct Transform {
    x: Cell<f64>,
    y: Cell<f64>,
}

impl Transform {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Cell::new(x),
            y: Cell::new(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x.get()
    }

    pub fn y(&self) -> f64 {
        self.y.get()
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x.get(), self.y.get())
    }

    pub fn set_x(&self, x: f64) {
        self.x.set(x);
    }

    pub fn set_y(&self, y: f64) {
        self.y.set(y);
    }

    pub fn set_position(&self, x: f64, y: f64) {
        self.x.set(x);
        self.y.set(y);
    }

    pub fn translate(&self, dx: f64, dy: f64) {
        self.set_position(self.x() + dx, self.y() + dy);
    }

    pub fn distance_to(&self, other: &Transform) -> f64 {
        let (dx, dy) = (other.x() - self.x(), other.y() - self.y());
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Default)]
pub struct Tag(RefCell<String>);

impl Tag {
    pub fn new(tag: &str) -> Self {
        Self(RefCell::new(tag.to_string()))
    }

    pub fn get(&self) -> String {
        self.0.borrow().clone()
    }

    pub fn set(&self, tag: &str) {
        *self.0.borrow_mut() = tag.to_string();
    }
}

/// Render state: visibility, draw order and the current animation frame.
#[derive(Debug)]
pub struct Visual {
    visible: Cell<bool>,
    depth: Cell<i64>,
    frame: Cell<i64>,
    image: String,
}

impl Visual {
    pub fn new(image: &str) -> Self {
        Self {
            visible: Cell::new(true),
            depth: Cell::new(0),
            frame: Cell::new(0),
            image: image.to_string(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    pub fn depth(&self) -> i64 {
        self.depth.get()
    }

    pub fn set_depth(&self, depth: i64) {
        self.depth.set(depth);
    }

    pub fn frame(&self) -> i64 {
        self.frame.get()
    }

    pub fn set_frame(&self, frame: i64) {
        self.frame.set(frame.max(0));
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_translate_and_distance() {
        let a = Transform::new(0.0, 0.0);
        let b = Transform::new(3.0, 0.0);
        b.translate(0.0, 4.0);
        assert_eq!(b.position(), (3.0, 4.0));
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_frame_never_negative() {
        let visual = Visual::new("hero");
        visual.set_frame(-3);
        assert_eq!(visual.frame(), 0);
    }

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
    }
}
