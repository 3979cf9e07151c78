//! Capability descriptors and the operation tables they contribute.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use mlua::{FromLuaMulti, IntoLuaMulti, Lua, MultiValue};

use crate::host_type::HostType;
use crate::proxy::GuestProxy;

/// Native implementation of one guest-visible operation.
pub type NativeFn = Rc<dyn Fn(&Lua, &GuestProxy, MultiValue) -> mlua::Result<MultiValue>>;

/// Runs after composition and may delete operations that are not valid for a
/// narrower capability.
pub type PostHook = Rc<dyn Fn(&mut OperationTable)>;

/// One named operation and the capability that contributed it.
#[derive(Clone)]
pub struct Operation {
    pub capability: Rc<str>,
    pub func: NativeFn,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Name → operation map.
#[derive(Clone, Default, Debug)]
pub struct OperationTable {
    ops: BTreeMap<String, Operation>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, op: Operation) -> Option<Operation> {
        self.ops.insert(name.into(), op)
    }

    pub fn remove(&mut self, name: &str) -> Option<Operation> {
        self.ops.remove(name)
    }

    /// Copy every operation from `other`, overwriting same-named entries.
    pub fn merge_from(&mut self, other: &OperationTable) {
        for (name, op) in &other.ops {
            self.ops.insert(name.clone(), op.clone());
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Operation)> {
        self.ops.iter().map(|(name, op)| (name.as_str(), op))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Declares a host capability: a target host type plus the operations guest
/// code may call on objects of that type. Immutable once registered.
pub struct CapabilityDescriptor {
    name: Rc<str>,
    target: &'static HostType,
    operations: OperationTable,
    primary: bool,
    post_hook: Option<PostHook>,
}

impl CapabilityDescriptor {
    pub fn new(name: &str, target: &'static HostType) -> Self {
        Self {
            name: Rc::from(name),
            target,
            operations: OperationTable::new(),
            primary: false,
            post_hook: None,
        }
    }

    /// Mark this capability as the guest-visible type name of its targets.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Add an operation working directly on raw guest values.
    pub fn raw_operation<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&Lua, &GuestProxy, MultiValue) -> mlua::Result<MultiValue> + 'static,
    {
        self.operations.insert(
            name,
            Operation {
                capability: self.name.clone(),
                func: Rc::new(func),
            },
        );
        self
    }

    /// Add an operation with typed arguments and results.
    pub fn operation<A, R, F>(self, name: &str, func: F) -> Self
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(&Lua, &GuestProxy, A) -> mlua::Result<R> + 'static,
    {
        self.raw_operation(name, move |lua, proxy, args| {
            let args = A::from_lua_multi(args, lua)?;
            func(lua, proxy, args)?.into_lua_multi(lua)
        })
    }

    pub fn post_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut OperationTable) + 'static,
    {
        self.post_hook = Some(Rc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &'static HostType {
        self.target
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn hook(&self) -> Option<&PostHook> {
        self.post_hook.as_ref()
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("target", &self.target.name)
            .field("operations", &self.operations.names().collect::<Vec<_>>())
            .field("primary", &self.primary)
            .field("post_hook", &self.post_hook.is_some())
            .finish()
    }
}

/// The merged operation set for one host runtime type. Computed once per type
/// and shared by every proxy of that type.
#[derive(Debug)]
pub struct ComposedTable {
    pub(crate) host_type: &'static HostType,
    pub(crate) type_name: String,
    pub(crate) capabilities: Vec<String>,
    pub(crate) operations: OperationTable,
}

impl ComposedTable {
    pub fn host_type(&self) -> &'static HostType {
        self.host_type
    }

    /// Name of the primary capability; what guest code sees as the type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Applied capabilities, least specific first.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static THING: HostType = HostType::new("Thing");

    #[test]
    fn test_descriptor_builder_records_provenance() {
        let desc = CapabilityDescriptor::new("thing", &THING)
            .primary()
            .operation("answer", |_, _, ()| Ok(42));

        assert!(desc.is_primary());
        assert_eq!(desc.name(), "thing");
        let op = desc.operations().get("answer").expect("operation registered");
        assert_eq!(&*op.capability, "thing");
    }

    #[test]
    fn test_merge_overwrites_same_named_operations() {
        let base = CapabilityDescriptor::new("base", &THING)
            .operation("f", |_, _, ()| Ok(1))
            .operation("g", |_, _, ()| Ok(1));
        let narrow = CapabilityDescriptor::new("narrow", &THING).operation("g", |_, _, ()| Ok(2));

        let mut table = OperationTable::new();
        table.merge_from(base.operations());
        table.merge_from(narrow.operations());

        assert_eq!(table.len(), 2);
        assert_eq!(&*table.get("f").unwrap().capability, "base");
        assert_eq!(&*table.get("g").unwrap().capability, "narrow");
    }
}
