//! Script loader: runs one guest source unit and builds a [`Stub`] from it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use mlua::{Lua, Table, Value};
use tracing::{debug, info, warn};

use crate::contract::{Contract, Stub};
use crate::error::BridgeError;
use crate::runtime::ContractActivity;

/// Per-load state. A load ends in `Ready` or `Failed`; a failed stub is
/// never handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Loading => "loading",
            LoadState::Ready => "ready",
            LoadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Loads guest scripts against contracts inside one Lua state.
pub struct ScriptLoader<'lua> {
    lua: &'lua Lua,
}

impl<'lua> ScriptLoader<'lua> {
    pub fn new(lua: &'lua Lua) -> Self {
        Self { lua }
    }

    /// Execute `source` in a fresh environment and collect the hooks named by
    /// `contract`.
    ///
    /// Hooks come from the table the chunk returns, or from the globals the
    /// chunk defined when it returns nothing. Names the contract does not know
    /// are ignored.
    pub fn load(
        &self,
        contract: &Rc<Contract>,
        source: &str,
        source_name: &str,
    ) -> Result<Stub, BridgeError> {
        debug!(
            target: "bridge",
            "{} '{}' against contract '{}'",
            LoadState::Loading,
            source_name,
            contract.id()
        );

        match self.build_stub(contract, source, source_name) {
            Ok(stub) => {
                info!(
                    target: "bridge",
                    "Script '{}' is {} ({}: {})",
                    source_name,
                    LoadState::Ready,
                    contract.id(),
                    stub.present_hooks().join(", ")
                );
                Ok(stub)
            }
            Err(e) => {
                warn!(target: "bridge", "Script '{}' {}: {}", source_name, LoadState::Failed, e);
                Err(e)
            }
        }
    }

    fn build_stub(
        &self,
        contract: &Rc<Contract>,
        source: &str,
        source_name: &str,
    ) -> Result<Stub, BridgeError> {
        let exec_err = |e: mlua::Error| BridgeError::from_lua(source_name, e);

        let env = self.fresh_environment().map_err(exec_err)?;
        let returned = self
            .lua
            .load(source)
            .set_name(source_name)
            .set_environment(env.clone())
            .eval::<Value>()
            .map_err(exec_err)?;

        let hook_table = match returned {
            Value::Table(table) => table,
            _ => env,
        };

        let mut hooks = HashMap::new();
        let mut missing = Vec::new();
        for name in contract.hook_names() {
            match hook_table.raw_get::<Value>(name).map_err(exec_err)? {
                Value::Function(func) => {
                    hooks.insert(name.to_string(), func);
                }
                _ if contract.is_required(name) => missing.push(name.to_string()),
                _ => {}
            }
        }

        if !missing.is_empty() {
            return Err(BridgeError::MissingHook {
                contract: contract.id().to_string(),
                source_name: source_name.to_string(),
                missing,
            });
        }

        Ok(Stub::new(
            contract.clone(),
            source_name.to_string(),
            hooks,
            ContractActivity::of(self.lua),
        ))
    }

    fn fresh_environment(&self) -> mlua::Result<Table> {
        let env = self.lua.create_table()?;
        let meta = self.lua.create_table()?;
        meta.set("__index", self.lua.globals())?;
        env.set_metatable(Some(meta));
        Ok(env)
    }
}
