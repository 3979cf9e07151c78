//! Guest proxies and the identity-preserving proxy cache.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::{Rc, Weak};

use mlua::{
    AnyUserData, LightUserData, Lua, MetaMethod, MultiValue, Table, UserData, UserDataMethods,
    Value,
};
use tracing::trace;

use crate::capability::{ComposedTable, Operation};
use crate::contract::Contract;
use crate::error::BridgeError;
use crate::object::{component, HostId, HostObject, HostRef};
use crate::registry::CapabilityRegistry;

/// Cache entry shared by every guest handle for one host object.
pub struct ProxyEntry {
    id: HostId,
    host: Weak<dyn HostObject>,
    table: Rc<ComposedTable>,
    /// Contract of a script-backed host, kept so hook reads on a dead proxy
    /// can still be recognized.
    contract: Option<Rc<Contract>>,
}

impl ProxyEntry {
    fn is_alive(&self) -> bool {
        self.host.strong_count() > 0
    }
}

/// What guest code holds: a weak handle to a host object plus its composed
/// operation table. Carries no state of its own.
#[derive(Clone)]
pub struct GuestProxy {
    entry: Rc<ProxyEntry>,
}

impl GuestProxy {
    pub fn id(&self) -> HostId {
        self.entry.id
    }

    /// Guest-visible type name (the primary capability).
    pub fn type_name(&self) -> &str {
        self.entry.table.type_name()
    }

    pub fn table(&self) -> &Rc<ComposedTable> {
        &self.entry.table
    }

    pub fn is_alive(&self) -> bool {
        self.entry.is_alive()
    }

    /// Same host object as `other`.
    pub fn same_object(&self, other: &GuestProxy) -> bool {
        self.entry.id == other.entry.id
    }

    /// Upgrade to the host object, or `None` once it has been dropped.
    pub fn upgrade(&self) -> Option<HostRef> {
        self.entry.host.upgrade()
    }

    /// Upgrade to the host object or fail with a dead reference naming the
    /// attempted operation.
    pub fn host(&self, operation: &str) -> Result<HostRef, BridgeError> {
        self.upgrade().ok_or_else(|| self.dead(operation))
    }

    /// Run `f` against the `C` inside the host object. The strong reference is
    /// only held for the duration of the call.
    pub fn with<C: Any, R>(&self, operation: &str, f: impl FnOnce(&C) -> R) -> Result<R, BridgeError> {
        let host = self.host(operation)?;
        let target = component::<C>(host.as_ref()).ok_or_else(|| BridgeError::TypeMismatch {
            operation: operation.to_string(),
            expected: short_type_name::<C>().to_string(),
            found: host.host_type().name.to_string(),
        })?;
        Ok(f(target))
    }

    /// Extract the proxy behind a guest value, if it is one.
    pub fn from_value(value: &Value) -> Option<GuestProxy> {
        match value {
            Value::UserData(ud) => ud
                .borrow::<GuestProxy>()
                .ok()
                .map(|p| GuestProxy::clone(&p)),
            _ => None,
        }
    }

    fn dead(&self, operation: &str) -> BridgeError {
        let capability = self
            .entry
            .table
            .get(operation)
            .map(|op| op.capability.to_string())
            .unwrap_or_else(|| self.type_name().to_string());
        BridgeError::DeadReference {
            capability,
            operation: operation.to_string(),
        }
    }

    fn bind(&self, lua: &Lua, name: &str, op: &Operation) -> mlua::Result<Value> {
        let proxy = self.clone();
        let name = name.to_string();
        let func = op.func.clone();
        let bound = lua.create_function(move |lua, mut args: MultiValue| {
            // `p:op()` passes the proxy itself first; `p.op()` does not. A
            // leading receiver always counts as `self`, so passing an object
            // to its own operation takes colon syntax: `p:op(p)`.
            let is_self = args
                .iter()
                .next()
                .and_then(GuestProxy::from_value)
                .is_some_and(|first| first.same_object(&proxy));
            if is_self {
                args.pop_front();
            }
            if !proxy.is_alive() {
                return Err(proxy.dead(&name).into());
            }
            func(lua, &proxy, args)
        })?;
        Ok(Value::Function(bound))
    }
}

fn short_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    full.rsplit("::").next().unwrap_or(full)
}

impl UserData for GuestProxy {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let Value::String(key) = key else {
                return Ok(Value::Nil);
            };
            let key = key.to_str()?.to_string();

            if let Some(op) = this.entry.table.get(&key) {
                return this.bind(lua, &key, op);
            }

            // Script-backed objects also expose their hooks by name.
            match this.upgrade() {
                Some(host) => {
                    if let Some(hook) = host.as_stub().and_then(|stub| stub.hook(&key)) {
                        return Ok(Value::Function(hook));
                    }
                }
                None if this.entry.contract.as_ref().is_some_and(|c| c.recognizes(&key)) => {
                    return Err(this.dead(&key).into());
                }
                None => {}
            }

            Ok(Value::Nil)
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, this, (key, value): (String, Value)| {
                let host = this.host(&key)?;
                match host.as_stub() {
                    Some(stub) => Ok(stub.assign_hook(&key, value)?),
                    None => Err(mlua::Error::RuntimeError(format!(
                        "cannot assign field '{}' on {}",
                        key,
                        this.type_name()
                    ))),
                }
            },
        );

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(GuestProxy::from_value(&other).is_some_and(|other| other.same_object(this)))
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            let state = if this.is_alive() { "" } else { ", dead" };
            Ok(format!("{}({}{})", this.type_name(), this.entry.id, state))
        });
    }
}

/// Identity-preserving store of guest proxies.
///
/// Entries live on the host side and hold the object weakly. The userdata
/// handles live in a weak-valued guest table, so the guest collects a proxy
/// once it stops referencing it.
pub struct ProxyCache {
    entries: RefCell<HashMap<HostId, Rc<ProxyEntry>>>,
    handles: Table,
}

impl ProxyCache {
    pub fn new(lua: &Lua) -> mlua::Result<Self> {
        let handles = lua.create_table()?;
        let mode = lua.create_table()?;
        mode.set("__mode", "v")?;
        handles.set_metatable(Some(mode));

        Ok(Self {
            entries: RefCell::new(HashMap::new()),
            handles,
        })
    }

    /// Proxy for `object`, reusing the live one if it exists.
    pub fn wrap(
        &self,
        lua: &Lua,
        registry: &CapabilityRegistry,
        object: &HostRef,
    ) -> Result<AnyUserData, BridgeError> {
        let id = HostId::of(object);
        let key = LightUserData(id.as_usize() as *mut c_void);

        let live = self
            .entries
            .borrow()
            .get(&id)
            .filter(|entry| entry.is_alive())
            .cloned();

        let entry = match live {
            Some(entry) => {
                if let Ok(Value::UserData(handle)) = self.handles.raw_get::<Value>(key) {
                    return Ok(handle);
                }
                entry
            }
            None => {
                let table = registry.resolve(object.host_type())?;
                Rc::new(ProxyEntry {
                    id,
                    host: Rc::downgrade(object),
                    table,
                    contract: object.as_stub().map(|stub| stub.contract().clone()),
                })
            }
        };

        let handle = lua
            .create_userdata(GuestProxy {
                entry: entry.clone(),
            })
            .map_err(|e| BridgeError::from_lua("wrap", e))?;
        self.handles
            .raw_set(key, handle.clone())
            .map_err(|e| BridgeError::from_lua("wrap", e))?;
        self.entries.borrow_mut().insert(id, entry);

        trace!(target: "bridge", "Created proxy {} for {}", id, object.host_type().name);
        Ok(handle)
    }

    /// Drop entries whose host object is gone. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let dead: Vec<HostId> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_alive())
            .map(|(id, _)| *id)
            .collect();

        for id in &dead {
            entries.remove(id);
            let key = LightUserData(id.as_usize() as *mut c_void);
            let _ = self.handles.raw_set(key, Value::Nil);
        }
        dead.len()
    }

    /// Number of entries, live or not yet swept.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.is_alive())
            .count()
    }
}

/// Proxy behind a userdata handle.
pub fn proxy_of(handle: &AnyUserData) -> Result<GuestProxy, BridgeError> {
    handle
        .borrow::<GuestProxy>()
        .map(|p| GuestProxy::clone(&p))
        .map_err(|e| BridgeError::from_lua("unwrap", e))
}
