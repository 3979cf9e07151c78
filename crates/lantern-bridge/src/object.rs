use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::contract::Stub;
use crate::host_type::HostType;

/// A host object that can be handed to guest code.
///
/// Capabilities that target an interface type (rather than a concrete type)
/// reach the shared state they need through [`HostObject::component`], e.g. a
/// `Transform` embedded in every positionable object.
pub trait HostObject: Any {
    fn host_type(&self) -> &'static HostType;

    fn as_any(&self) -> &dyn Any;

    /// Look up an embedded component by its concrete type id.
    fn component(&self, _id: TypeId) -> Option<&dyn Any> {
        None
    }

    /// Script-backed objects expose the stub carrying their hooks.
    fn as_stub(&self) -> Option<&Stub> {
        None
    }
}

/// Strong handle to a host object. The host side owns these; the guest side
/// only ever sees weak proxies.
pub type HostRef = Rc<dyn HostObject>;

/// Borrow `C` from a host object, either because the object *is* a `C` or
/// because it embeds one as a component.
pub fn component<C: Any>(object: &dyn HostObject) -> Option<&C> {
    if let Some(direct) = object.as_any().downcast_ref::<C>() {
        return Some(direct);
    }
    object
        .component(TypeId::of::<C>())
        .and_then(|c| c.downcast_ref::<C>())
}

/// Stable identity of a host object: the address of its `Rc` allocation.
///
/// The allocation is kept alive by any outstanding `Weak`, so the address
/// cannot be reused while a proxy cache entry still refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(usize);

impl HostId {
    pub fn of(object: &HostRef) -> Self {
        HostId(Rc::as_ptr(object) as *const () as usize)
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
