//! The guest runtime: one Lua state plus the registry and proxy cache that
//! serve it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use mlua::{AnyUserData, FromLuaMulti, Function, IntoLua, IntoLuaMulti, Lua, MultiValue, Value};
use tracing::{debug, info};

use crate::contract::{Contract, HookOutcome, Stub};
use crate::error::BridgeError;
use crate::loader::ScriptLoader;
use crate::object::HostRef;
use crate::proxy::{proxy_of, ProxyCache};
use crate::registry::{global_registry, CapabilityRegistry};

/// Shared state reachable from native operations through the Lua app data.
#[derive(Clone)]
struct BridgeContext {
    registry: Rc<CapabilityRegistry>,
    cache: Rc<ProxyCache>,
    activity: Rc<ContractActivity>,
}

impl BridgeContext {
    fn of(lua: &Lua) -> Result<Self, BridgeError> {
        lua.app_data_ref::<BridgeContext>()
            .map(|ctx| ctx.clone())
            .ok_or(BridgeError::NoRegistry)
    }
}

/// Contracts that are loading or running a hook in one runtime.
///
/// A contract may not be loaded again while either is in progress.
#[derive(Debug, Default)]
pub(crate) struct ContractActivity {
    loading: RefCell<HashSet<String>>,
    running: RefCell<HashMap<String, usize>>,
}

impl ContractActivity {
    /// The activity tracker of the runtime that owns `lua`, if any.
    pub(crate) fn of(lua: &Lua) -> Option<Rc<Self>> {
        lua.app_data_ref::<BridgeContext>()
            .map(|ctx| ctx.activity.clone())
    }

    fn is_busy(&self, contract: &str) -> bool {
        self.loading.borrow().contains(contract) || self.running.borrow().contains_key(contract)
    }

    fn enter_load(self: &Rc<Self>, contract: &str) -> Result<LoadGuard, BridgeError> {
        if self.is_busy(contract) {
            return Err(BridgeError::ReentrantLoad {
                contract: contract.to_string(),
            });
        }
        self.loading.borrow_mut().insert(contract.to_string());
        Ok(LoadGuard {
            activity: self.clone(),
            contract: contract.to_string(),
        })
    }

    /// Mark a hook of `contract` as running until the guard drops. Hooks may
    /// nest.
    pub(crate) fn enter_hook(self: &Rc<Self>, contract: &str) -> HookGuard {
        *self
            .running
            .borrow_mut()
            .entry(contract.to_string())
            .or_insert(0) += 1;
        HookGuard {
            activity: self.clone(),
            contract: contract.to_string(),
        }
    }
}

/// Marks a contract as loading until dropped.
struct LoadGuard {
    activity: Rc<ContractActivity>,
    contract: String,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.activity.loading.borrow_mut().remove(&self.contract);
    }
}

/// Marks one hook call as running until dropped.
pub(crate) struct HookGuard {
    activity: Rc<ContractActivity>,
    contract: String,
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let mut running = self.activity.running.borrow_mut();
        if let Some(count) = running.get_mut(&self.contract) {
            *count -= 1;
            if *count == 0 {
                running.remove(&self.contract);
            }
        }
    }
}

/// Wrap `object` using the bridge installed in `lua`. This is how native
/// operations hand other host objects back to guest code.
pub fn wrap_in(lua: &Lua, object: &HostRef) -> Result<AnyUserData, BridgeError> {
    let ctx = BridgeContext::of(lua)?;
    ctx.cache.wrap(lua, &ctx.registry, object)
}

/// Load a contract from inside a native function. Fails with
/// [`BridgeError::ReentrantLoad`] when the same contract is already loading
/// or one of its hooks is running.
pub fn load_contract_in(
    lua: &Lua,
    contract: &Rc<Contract>,
    source: &str,
    source_name: &str,
) -> Result<Stub, BridgeError> {
    let ctx = BridgeContext::of(lua)?;
    let _guard = ctx.activity.enter_load(contract.id())?;
    ScriptLoader::new(lua).load(contract, source, source_name)
}

/// Owns the Lua state. Everything here runs on the thread that created it.
pub struct GuestRuntime {
    lua: Lua,
    registry: Rc<CapabilityRegistry>,
    cache: Rc<ProxyCache>,
}

impl GuestRuntime {
    pub fn new(registry: Rc<CapabilityRegistry>) -> Result<Self, BridgeError> {
        let lua = Lua::new();
        let cache = Rc::new(ProxyCache::new(&lua).map_err(|e| BridgeError::from_lua("init", e))?);

        lua.set_app_data(BridgeContext {
            registry: registry.clone(),
            cache: cache.clone(),
            activity: Rc::new(ContractActivity::default()),
        });
        install_log(&lua).map_err(|e| BridgeError::from_lua("init", e))?;

        info!(
            target: "bridge",
            "Guest runtime ready with {} capabilities",
            registry.descriptors().len()
        );

        Ok(Self {
            lua,
            registry,
            cache,
        })
    }

    /// Build a runtime on the registry installed with
    /// [`install_global`](crate::registry::install_global).
    pub fn from_global() -> Result<Self, BridgeError> {
        let registry = global_registry().ok_or(BridgeError::NoRegistry)?;
        Self::new(registry)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn registry(&self) -> &Rc<CapabilityRegistry> {
        &self.registry
    }

    /// The guest proxy for `object`; the same handle for as long as it lives.
    pub fn wrap(&self, object: &HostRef) -> Result<AnyUserData, BridgeError> {
        self.cache.wrap(&self.lua, &self.registry, object)
    }

    /// The host object behind a proxy, or `None` once it has been dropped.
    pub fn unwrap(&self, proxy: &AnyUserData) -> Option<HostRef> {
        proxy_of(proxy).ok()?.upgrade()
    }

    pub fn unwrap_or_fail(&self, proxy: &AnyUserData) -> Result<HostRef, BridgeError> {
        proxy_of(proxy)?.host("unwrap")
    }

    pub fn load_contract(
        &self,
        contract: &Rc<Contract>,
        source: &str,
        source_name: &str,
    ) -> Result<Stub, BridgeError> {
        load_contract_in(&self.lua, contract, source, source_name)
    }

    /// Wrap a script-backed object and bind its proxy as the `self` argument
    /// its hooks receive.
    pub fn attach(&self, object: &HostRef) -> Result<AnyUserData, BridgeError> {
        let proxy = self.wrap(object)?;
        if let Some(stub) = object.as_stub() {
            stub.bind_self(proxy.clone());
            debug!(target: "bridge", "Attached {} to {}", stub.source_name(), object.host_type().name);
        }
        Ok(proxy)
    }

    pub fn invoke(
        &self,
        stub: &Stub,
        hook: &str,
        args: impl IntoLuaMulti,
    ) -> Result<HookOutcome, BridgeError> {
        let args = args
            .into_lua_multi(&self.lua)
            .map_err(|e| BridgeError::from_lua(stub.source_name(), e))?;
        stub.invoke(hook, args)
    }

    /// `(ok, result)` form of [`invoke`](Self::invoke); `ok` is false when the
    /// hook is absent.
    pub fn invoke_pair(
        &self,
        stub: &Stub,
        hook: &str,
        args: impl IntoLuaMulti,
    ) -> Result<(bool, MultiValue), BridgeError> {
        self.invoke(stub, hook, args).map(HookOutcome::into_pair)
    }

    pub fn set_global(&self, name: &str, value: impl IntoLua) -> Result<(), BridgeError> {
        self.lua
            .globals()
            .set(name, value)
            .map_err(|e| BridgeError::from_lua(name, e))
    }

    /// Run a chunk in the shared globals.
    pub fn exec(&self, source: &str, source_name: &str) -> Result<(), BridgeError> {
        self.lua
            .load(source)
            .set_name(source_name)
            .exec()
            .map_err(|e| BridgeError::from_lua(source_name, e))
    }

    pub fn eval<R: FromLuaMulti>(&self, source: &str, source_name: &str) -> Result<R, BridgeError> {
        self.lua
            .load(source)
            .set_name(source_name)
            .eval()
            .map_err(|e| BridgeError::from_lua(source_name, e))
    }

    /// Run a full guest collection cycle, then drop cache entries whose host
    /// objects are gone. Returns how many entries were dropped.
    pub fn sweep(&self) -> Result<usize, BridgeError> {
        self.lua
            .gc_collect()
            .map_err(|e| BridgeError::from_lua("gc", e))?;
        Ok(self.cache.sweep())
    }

    /// Cache entries whose host object is still alive.
    pub fn cached_proxies(&self) -> usize {
        self.cache.live_count()
    }
}

fn install_log(lua: &Lua) -> mlua::Result<()> {
    let log = lua.create_function(|lua, args: MultiValue| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for value in args {
            parts.push(match value {
                Value::String(s) => s.to_string_lossy(),
                other => tostring.call::<String>(other)?,
            });
        }
        info!(target: "script", "{}", parts.join(" "));
        Ok(())
    })?;
    lua.globals().set("log", log)
}
