//! Runtime type descriptors for host objects.
//!
//! Host types form an open hierarchy: a type may extend one parent and
//! implement any number of interface types. Types are declared as `static`s
//! and compared by address.

use std::hash::{Hash, Hasher};
use std::ptr;

/// Static description of a host runtime type.
#[derive(Debug)]
pub struct HostType {
    pub name: &'static str,
    pub parent: Option<&'static HostType>,
    pub interfaces: &'static [&'static HostType],
}

impl HostType {
    /// A root type with no parent and no interfaces.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            interfaces: &[],
        }
    }

    /// Breadth-first distance from this type to `target` through parents and
    /// interfaces. `Some(0)` means `target` is this type.
    pub fn distance_to(&self, target: &HostType) -> Option<usize> {
        let mut frontier: Vec<&HostType> = vec![self];
        let mut depth = 0;

        while !frontier.is_empty() {
            if frontier.iter().any(|t| ptr::eq(*t, target)) {
                return Some(depth);
            }

            let mut next = Vec::new();
            for ty in frontier {
                if let Some(parent) = ty.parent {
                    next.push(parent);
                }
                next.extend(ty.interfaces.iter().copied());
            }

            frontier = next;
            depth += 1;
        }

        None
    }

    /// Whether a value of this type can be used where `target` is expected.
    pub fn is_a(&self, target: &HostType) -> bool {
        self.distance_to(target).is_some()
    }
}

/// Identity key for a host type, usable in hash maps.
#[derive(Debug, Clone, Copy)]
pub struct HostTypeKey(pub &'static HostType);

impl PartialEq for HostTypeKey {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl Eq for HostTypeKey {}

impl Hash for HostTypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.0, state);
    }
}
